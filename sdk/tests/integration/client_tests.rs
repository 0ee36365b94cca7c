//! Client construction tests.

use baas_sdk::prelude::*;
use baas_sdk::testing::MockHttpExecutor;
use baas_sdk::{KeyValueStore, MemoryStore};
use std::sync::Arc;
use std::time::Duration;

#[test]
fn test_builder_rejects_missing_organization() {
    let err = BaasClient::builder().application("app").build().unwrap_err();
    assert!(matches!(err, BaasError::InvalidConfiguration(ref m) if m.contains("organization")));
}

#[test]
fn test_builder_rejects_bad_url() {
    let err = BaasClient::builder()
        .api_url("ftp://example.com")
        .organization("org")
        .application("app")
        .build()
        .unwrap_err();
    assert!(matches!(err, BaasError::InvalidConfiguration(_)));
}

#[tokio::test]
async fn test_builder_with_default_transport() {
    let client = BaasClient::builder()
        .organization("org")
        .application("app")
        .request_timeout(Duration::from_secs(5))
        .build()
        .unwrap();
    assert_eq!(client.config().request_timeout, Duration::from_secs(5));
    assert_eq!(client.config().app_url(), "https://api.baas.io/org/app");
}

#[tokio::test]
async fn test_custom_key_value_store_is_used() {
    let kv = Arc::new(MemoryStore::new());
    let client = BaasClient::builder()
        .organization("org")
        .application("app")
        .http_executor(Arc::new(MockHttpExecutor::new()))
        .key_value_store(kv.clone())
        .build()
        .unwrap();

    client
        .registration()
        .store()
        .set_pending_tags(&TagSet::parse("b,a"))
        .unwrap();
    assert_eq!(
        kv.get("baas_need_register_tag_for_push").unwrap(),
        Some("a,b".to_string())
    );
}

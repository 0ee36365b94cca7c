//! Push registration tests: reconciliation, retry and serialization.

use crate::init_tracing;
use baas_sdk::prelude::*;
use baas_sdk::testing::{EndpointOp, MockDeviceEndpoint, MockHttpExecutor, MockResponse, RecordingCallbacks};
use baas_sdk::{http::Method, RegisterReason, RegistrationPhase};
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;

fn client_with(endpoint: &MockDeviceEndpoint, identity: &SharedIdentity) -> BaasClient {
    BaasClient::builder()
        .organization("org")
        .application("app")
        .http_executor(Arc::new(MockHttpExecutor::new()))
        .device_endpoint(Arc::new(endpoint.clone()))
        .identity(Arc::new(identity.clone()))
        .build()
        .expect("client")
}

#[tokio::test]
async fn test_register_over_http() {
    init_tracing();
    let executor = MockHttpExecutor::new();
    executor.respond(MockResponse::json(
        200,
        &json!({"entities": [{"uuid": "dev-42", "type": "device"}]}),
    ));
    let tokens = SharedToken::new("access-1");
    let client = BaasClient::builder()
        .api_url("https://api.example.com")
        .organization("org")
        .application("app")
        .http_executor(Arc::new(executor.clone()))
        .token_provider(Arc::new(tokens.clone()))
        .identity(Arc::new(SharedIdentity::new("alice")))
        .build()
        .unwrap();

    let ctx = TaskContext::detached("register");
    client
        .registration()
        .store()
        .set_pending_tags(&TagSet::parse("news"))
        .unwrap();
    let outcome = client.registration().register(&ctx, "T1").await.unwrap();

    assert_eq!(
        outcome,
        RegistrationOutcome::Registered {
            device_id: "dev-42".to_string(),
            reason: RegisterReason::NotRegistered,
            attempts: 1,
        }
    );
    let request = executor.last_request().unwrap();
    assert_eq!(request.method, Method::Post);
    assert_eq!(request.url, "https://api.example.com/org/app/pushes/devices");
    assert_eq!(request.header_value("Authorization"), Some("Bearer access-1"));
    assert_eq!(request.timeout, Some(Duration::from_secs(60)));
    assert_eq!(
        request.json().unwrap(),
        json!({"token": "T1", "tags": ["news"], "platform": "G"})
    );

    let state = client.registration().store().load().unwrap();
    assert_eq!(state.device_id, "dev-42");
    assert_eq!(state.registered_username, "alice");
}

#[tokio::test]
async fn test_unregister_over_http() {
    let executor = MockHttpExecutor::new();
    executor.respond(MockResponse::json(200, &json!({"entities": [{"uuid": "dev-1"}]})));
    executor.respond(MockResponse::json(200, &json!({"entities": [{"uuid": "dev-1"}]})));
    let client = BaasClient::builder()
        .api_url("https://api.example.com")
        .organization("org")
        .application("app")
        .http_executor(Arc::new(executor.clone()))
        .build()
        .unwrap();

    let ctx = TaskContext::detached("unregister");
    client.registration().register(&ctx, "T1").await.unwrap();
    let outcome = client.registration().unregister(&ctx).await.unwrap();

    assert_eq!(outcome, RegistrationOutcome::Unregistered);
    let request = executor.last_request().unwrap();
    assert_eq!(request.method, Method::Delete);
    assert_eq!(
        request.url,
        "https://api.example.com/org/app/pushes/devices/dev-1"
    );
}

#[tokio::test]
async fn test_server_error_document_over_http() {
    let executor = MockHttpExecutor::new();
    executor.respond(MockResponse::json(
        400,
        &json!({"error": "invalid_token", "error_description": "token rejected"}),
    ));
    let client = BaasClient::builder()
        .organization("org")
        .application("app")
        .http_executor(Arc::new(executor.clone()))
        .registration_retry(RetryPlan::no_retry())
        .build()
        .unwrap();

    let ctx = TaskContext::detached("register");
    let err = client.registration().register(&ctx, "T1").await.unwrap_err();
    assert_eq!(err.status(), Some(400));
    assert!(err.to_string().contains("token rejected"));
    assert_eq!(client.registration().store().device_id().unwrap(), "");
}

#[tokio::test]
async fn test_idempotent_registration() {
    let endpoint = MockDeviceEndpoint::new();
    let client = client_with(&endpoint, &SharedIdentity::new("alice"));
    let ctx = TaskContext::detached("register");

    client.registration().register(&ctx, "T1").await.unwrap();
    let again = client.registration().register(&ctx, "T1").await.unwrap();

    assert_eq!(again, RegistrationOutcome::AlreadyRegistered);
    assert_eq!(endpoint.calls().len(), 1);
    assert_eq!(client.registration().phase(), RegistrationPhase::Registered);
}

#[tokio::test(start_paused = true)]
async fn test_overlapping_calls_are_serialized() {
    init_tracing();
    let endpoint = MockDeviceEndpoint::new().with_delay(Duration::from_secs(1));
    let client = client_with(&endpoint, &SharedIdentity::new("alice"));
    client
        .registration()
        .store()
        .set_pending_tags(&TagSet::parse("news"))
        .unwrap();

    let (first_cb, first) = RecordingCallbacks::create();
    let (second_cb, second) = RecordingCallbacks::create();
    client.registration().register_async("T1", first_cb).unwrap();
    tokio::time::sleep(Duration::from_millis(10)).await;
    client
        .registration()
        .set_tags_async(TagSet::parse("news,sports"), second_cb);

    let first = first.outcome().await.unwrap();
    let second = second.outcome().await.unwrap();

    assert!(matches!(
        first,
        RegistrationOutcome::Registered {
            reason: RegisterReason::NotRegistered,
            ..
        }
    ));
    assert!(matches!(
        second,
        RegistrationOutcome::Registered {
            reason: RegisterReason::TagsChanged,
            ..
        }
    ));

    let calls = endpoint.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].op, EndpointOp::Create);
    assert_eq!(calls[1].op, EndpointOp::Update);
    assert!(calls[1].at - calls[0].at >= Duration::from_secs(1));
    assert_eq!(endpoint.max_in_flight(), 1);
    assert_eq!(
        client.registration().store().load().unwrap().registered_tags,
        TagSet::parse("news,sports")
    );
}

#[tokio::test(start_paused = true)]
async fn test_duplicate_calls_coalesce() {
    let endpoint = MockDeviceEndpoint::new().with_delay(Duration::from_millis(500));
    let client = client_with(&endpoint, &SharedIdentity::new("alice"));

    let (a_cb, a) = RecordingCallbacks::create();
    let (b_cb, b) = RecordingCallbacks::create();
    client.registration().register_async("T1", a_cb).unwrap();
    client.registration().register_async("T1", b_cb).unwrap();

    let mut outcomes = vec![a.outcome().await.unwrap(), b.outcome().await.unwrap()];
    outcomes.retain(|o| *o != RegistrationOutcome::AlreadyRegistered);

    assert_eq!(outcomes.len(), 1);
    assert_eq!(endpoint.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn test_retry_until_success_with_growing_delays() {
    let endpoint = MockDeviceEndpoint::new();
    endpoint.fail_times(3);
    let client = client_with(&endpoint, &SharedIdentity::new("alice"));
    let ctx = TaskContext::detached("register");

    let outcome = client.registration().register(&ctx, "T1").await.unwrap();
    assert!(matches!(
        outcome,
        RegistrationOutcome::Registered { attempts: 4, .. }
    ));

    let calls = endpoint.calls();
    assert_eq!(calls.len(), 4);
    let gaps: Vec<Duration> = calls.windows(2).map(|w| w[1].at - w[0].at).collect();
    assert!(gaps.windows(2).all(|g| g[1] >= g[0]));
    assert!(gaps[0] >= Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn test_exhausted_retries_reported_once() {
    let endpoint = MockDeviceEndpoint::new();
    endpoint.fail_times(5);
    let client = client_with(&endpoint, &SharedIdentity::new("alice"));
    client
        .registration()
        .store()
        .set_pending_tags(&TagSet::parse("news"))
        .unwrap();
    let before = client.registration().store().load().unwrap();

    let (callbacks, recorded) = RecordingCallbacks::create();
    let handle = client.registration().register_async("T1", callbacks).unwrap();

    let err = recorded.outcome().await.unwrap_err();
    assert!(matches!(err, BaasError::Transport(_)));
    assert_eq!(handle.wait().await, TaskStatus::Failed);
    assert_eq!(recorded.terminal_count(), 1);
    assert_eq!(endpoint.calls().len(), 5);

    assert_eq!(client.registration().store().load().unwrap(), before);
}

#[tokio::test]
async fn test_session_events_follow_identity() {
    let endpoint = MockDeviceEndpoint::new();
    let identity = SharedIdentity::anonymous();
    let client = client_with(&endpoint, &identity);
    let ctx = TaskContext::detached("session");

    client.registration().register(&ctx, "T1").await.unwrap();

    identity.sign_in("bob");
    let signed_in = client
        .registration()
        .on_session_event(&ctx, SessionEvent::SignedIn)
        .await
        .unwrap();
    assert!(matches!(
        signed_in,
        RegistrationOutcome::Registered {
            reason: RegisterReason::UsernameChanged,
            ..
        }
    ));

    let unsubscribed = client
        .registration()
        .on_session_event(&ctx, SessionEvent::Unsubscribed)
        .await
        .unwrap();
    assert_eq!(unsubscribed, RegistrationOutcome::Unregistered);

    let ops: Vec<EndpointOp> = endpoint.calls().iter().map(|c| c.op).collect();
    assert_eq!(ops, vec![EndpointOp::Create, EndpointOp::Update, EndpointOp::Delete]);
}

#[tokio::test]
async fn test_state_survives_restart() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("push.json");
    let endpoint = MockDeviceEndpoint::new();
    let identity = SharedIdentity::new("alice");

    let build = || {
        BaasClient::builder()
            .organization("org")
            .application("app")
            .http_executor(Arc::new(MockHttpExecutor::new()))
            .device_endpoint(Arc::new(endpoint.clone()))
            .identity(Arc::new(identity.clone()))
            .state_file(&path)
            .build()
            .unwrap()
    };

    let ctx = TaskContext::detached("register");
    build().registration().register(&ctx, "T1").await.unwrap();

    let restarted = build();
    assert_eq!(restarted.registration().phase(), RegistrationPhase::Registered);
    let outcome = restarted
        .registration()
        .on_session_event(&ctx, SessionEvent::SignedIn)
        .await
        .unwrap();
    assert_eq!(outcome, RegistrationOutcome::AlreadyRegistered);
    assert_eq!(endpoint.calls().len(), 1);
}

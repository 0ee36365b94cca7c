//! Integration tests for baas-sdk
//!
//! These tests drive the public API end to end against the in-process test
//! doubles from the `testing` feature: a scripted HTTP executor and an
//! in-memory device endpoint. No network access is needed.
//!
//! ```bash
//! cargo test --test integration -p baas-sdk
//! ```

mod client_tests;
mod registration_tests;
mod task_tests;
mod transfer_tests;

use std::future::Future;
use std::time::Duration;

/// Default timeout for a single test
pub const TEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Initialize tracing once for all tests
static TRACING_INITIALIZED: std::sync::Once = std::sync::Once::new();

pub fn init_tracing() {
    TRACING_INITIALIZED.call_once(|| {
        use tracing_subscriber::{fmt, EnvFilter};

        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

        let _ = fmt()
            .with_env_filter(filter)
            .with_target(true)
            .with_test_writer()
            .try_init();
    });
}

/// Run a test body with a timeout so a lost callback fails instead of hanging.
pub async fn with_timeout<F, T>(duration: Duration, name: &str, future: F) -> T
where
    F: Future<Output = T>,
{
    match tokio::time::timeout(duration, future).await {
        Ok(result) => result,
        Err(_) => panic!("Test '{}' timed out after {:?}", name, duration),
    }
}

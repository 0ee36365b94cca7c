//! BaasClient - entry point tying transfers and push registration together

mod builder;

pub use builder::BaasClientBuilder;

use crate::config::ClientConfig;
use crate::registration::RegistrationReconciler;
use crate::task::TaskRunner;
use crate::transfer::Transfers;
use std::sync::Arc;

/// Client for one baas.io application.
///
/// Cloning is cheap; clones share the transport, task runner and registration
/// state.
///
/// # Example
///
/// ```ignore
/// let client = BaasClient::builder()
///     .api_url("https://api.baas.io")
///     .organization("my-org")
///     .application("my-app")
///     .state_file(data_dir.join("push.json"))
///     .build()?;
///
/// let handle = client.transfers().upload(
///     UploadRequest::new("photo.png", "photos"),
///     TaskCallbacks::new().on_progress(|p| println!("{:?}", p.fraction())),
/// )?;
/// ```
#[derive(Clone)]
pub struct BaasClient {
    config: Arc<ClientConfig>,
    transfers: Transfers,
    registration: RegistrationReconciler,
    runner: TaskRunner,
}

impl BaasClient {
    pub fn builder() -> BaasClientBuilder {
        BaasClientBuilder::new()
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// File upload, update and download
    pub fn transfers(&self) -> &Transfers {
        &self.transfers
    }

    /// Push device registration
    pub fn registration(&self) -> &RegistrationReconciler {
        &self.registration
    }

    /// Runner used for background operations
    pub fn runner(&self) -> &TaskRunner {
        &self.runner
    }
}

impl std::fmt::Debug for BaasClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BaasClient")
            .field("app_url", &self.config.app_url())
            .field("registration", &self.registration)
            .finish_non_exhaustive()
    }
}

//! BaasClient builder for fluent configuration

use crate::config::{ChunkSize, ClientConfig, ReconcilerConfig, TaskRunnerConfig, TransferConfig};
use crate::error::Result;
use crate::http::{HttpExecutor, ReqwestExecutor, SharedToken, TokenProvider};
use crate::registration::{
    DeviceEndpoint, HttpDeviceEndpoint, IdentityProvider, JsonFileStore, KeyValueStore,
    MemoryStore, RegistrationReconciler, RegistrationStore, SharedIdentity,
};
use crate::task::{NotificationContext, TaskRunner};
use crate::transfer::Transfers;
use baas_core::RetryPlan;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Builder for creating BaasClient instances
///
/// Example:
/// ```ignore
/// let client = BaasClient::builder()
///     .api_url("https://api.baas.io")
///     .organization("my-org")
///     .application("my-app")
///     .token_provider(session_token.clone())
///     .identity(session_user.clone())
///     .max_concurrent_tasks(4)
///     .build()?;
/// ```
pub struct BaasClientBuilder {
    config: ClientConfig,
    transfer: TransferConfig,
    runner_config: TaskRunnerConfig,
    reconciler: ReconcilerConfig,
    executor: Option<Arc<dyn HttpExecutor>>,
    tokens: Option<Arc<dyn TokenProvider>>,
    identity: Option<Arc<dyn IdentityProvider>>,
    kv_store: Option<Arc<dyn KeyValueStore>>,
    state_file: Option<PathBuf>,
    endpoint: Option<Arc<dyn DeviceEndpoint>>,
    notifier: Option<Arc<dyn NotificationContext>>,
}

impl Default for BaasClientBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl BaasClientBuilder {
    /// Create a new builder with default values
    pub fn new() -> Self {
        Self {
            config: ClientConfig::default(),
            transfer: TransferConfig::default(),
            runner_config: TaskRunnerConfig::DEFAULT,
            reconciler: ReconcilerConfig::default(),
            executor: None,
            tokens: None,
            identity: None,
            kv_store: None,
            state_file: None,
            endpoint: None,
            notifier: None,
        }
    }

    /// Set the API base URL
    ///
    /// Default: "https://api.baas.io"
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.config.api_url = url.into();
        self
    }

    /// Set the organization id or name
    pub fn organization(mut self, organization: impl Into<String>) -> Self {
        self.config.organization_id = organization.into();
        self
    }

    /// Set the application id or name
    pub fn application(mut self, application: impl Into<String>) -> Self {
        self.config.application_id = application.into();
        self
    }

    /// Set the per-request timeout
    ///
    /// Default: 60 seconds
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the connect timeout
    ///
    /// Default: 10 seconds
    pub fn connect_timeout(mut self, timeout: Duration) -> Self {
        self.config.connect_timeout = timeout;
        self
    }

    /// Set the complete endpoint configuration
    pub fn config(mut self, config: ClientConfig) -> Self {
        self.config = config;
        self
    }

    /// Set the transfer configuration
    ///
    /// The chunk sizes stay shared with `config`, so they can still be
    /// changed after the client is built.
    pub fn transfer_config(mut self, transfer: TransferConfig) -> Self {
        self.transfer = transfer;
        self
    }

    /// Use the same chunk size for uploads and downloads
    pub fn chunk_size(mut self, size: ChunkSize) -> Self {
        self.transfer.upload_chunk_size = size.clone();
        self.transfer.download_chunk_size = size;
        self
    }

    /// Limit how many background tasks run at once
    pub fn max_concurrent_tasks(mut self, max: usize) -> Self {
        self.runner_config.max_concurrent = Some(max);
        self
    }

    /// Set the task runner configuration
    pub fn runner_config(mut self, config: TaskRunnerConfig) -> Self {
        self.runner_config = config;
        self
    }

    /// Deliver callbacks through a custom notification context
    pub fn notifier(mut self, notifier: Arc<dyn NotificationContext>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Set the push registration configuration
    pub fn reconciler_config(mut self, config: ReconcilerConfig) -> Self {
        self.reconciler = config;
        self
    }

    /// Set the retry plan for device registration
    pub fn registration_retry(mut self, retry: RetryPlan) -> Self {
        self.reconciler.retry = retry;
        self
    }

    /// Use a custom HTTP transport
    ///
    /// Default: [`ReqwestExecutor`] with the configured timeouts
    pub fn http_executor(mut self, executor: Arc<dyn HttpExecutor>) -> Self {
        self.executor = Some(executor);
        self
    }

    /// Source of the access token sent with every request
    ///
    /// Default: an empty [`SharedToken`] (anonymous)
    pub fn token_provider(mut self, tokens: Arc<dyn TokenProvider>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Source of the signed-in username used for push registration
    ///
    /// Default: an anonymous [`SharedIdentity`]
    pub fn identity(mut self, identity: Arc<dyn IdentityProvider>) -> Self {
        self.identity = Some(identity);
        self
    }

    /// Keep registration state in a custom key-value store
    pub fn key_value_store(mut self, store: Arc<dyn KeyValueStore>) -> Self {
        self.kv_store = Some(store);
        self
    }

    /// Keep registration state in a JSON file
    ///
    /// Ignored when [`BaasClientBuilder::key_value_store`] is set. Without
    /// either, state lives in memory only.
    pub fn state_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.state_file = Some(path.into());
        self
    }

    /// Use a custom device endpoint
    ///
    /// Default: [`HttpDeviceEndpoint`] on the client's transport
    pub fn device_endpoint(mut self, endpoint: Arc<dyn DeviceEndpoint>) -> Self {
        self.endpoint = Some(endpoint);
        self
    }

    /// Build the BaasClient
    pub fn build(self) -> Result<super::BaasClient> {
        self.config.validate()?;
        if let Some(0) = self.runner_config.max_concurrent {
            return Err(crate::error::BaasError::InvalidConfiguration(
                "max_concurrent_tasks must be at least 1".to_string(),
            ));
        }
        let config = Arc::new(self.config);

        let executor: Arc<dyn HttpExecutor> = match self.executor {
            Some(executor) => executor,
            None => Arc::new(ReqwestExecutor::new(&config)?),
        };
        let tokens: Arc<dyn TokenProvider> = match self.tokens {
            Some(tokens) => tokens,
            None => Arc::new(SharedToken::default()),
        };
        let identity: Arc<dyn IdentityProvider> = match self.identity {
            Some(identity) => identity,
            None => Arc::new(SharedIdentity::anonymous()),
        };
        let kv: Arc<dyn KeyValueStore> = match (self.kv_store, self.state_file) {
            (Some(store), _) => store,
            (None, Some(path)) => Arc::new(JsonFileStore::open(path)?),
            (None, None) => Arc::new(MemoryStore::new()),
        };
        let endpoint: Arc<dyn DeviceEndpoint> = match self.endpoint {
            Some(endpoint) => endpoint,
            None => Arc::new(HttpDeviceEndpoint::new(
                Arc::clone(&executor),
                Arc::clone(&tokens),
                Arc::clone(&config),
            )),
        };

        let mut runner = TaskRunner::new(self.runner_config);
        if let Some(notifier) = self.notifier {
            runner = runner.with_notifier(notifier);
        }

        let transfers = Transfers::new(
            executor,
            Arc::clone(&tokens),
            Arc::clone(&config),
            self.transfer,
            runner.clone(),
        );
        let registration = RegistrationReconciler::new(
            RegistrationStore::new(kv),
            endpoint,
            identity,
            self.reconciler,
            runner.clone(),
        );

        tracing::debug!(app_url = %config.app_url(), "BaasClient built");

        Ok(super::BaasClient {
            config,
            transfers,
            registration,
            runner,
        })
    }
}

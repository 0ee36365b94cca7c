//! Configuration presets for the baas.io client
//!
//! This module provides configuration options for the API endpoint, file
//! transfers, task execution and push registration, with sensible defaults
//! and presets for common use cases.

use baas_core::RetryPlan;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Smallest accepted transfer chunk size, in bytes
pub const MIN_BUFFER_SIZE: usize = 4096;

/// Shared, runtime-adjustable transfer chunk size.
///
/// Clones share the same value. Transfers read it once when they start, so a
/// change only affects transfers started afterwards.
#[derive(Debug, Clone)]
pub struct ChunkSize(Arc<AtomicUsize>);

impl ChunkSize {
    /// Create a chunk size setting, rejecting values below [`MIN_BUFFER_SIZE`]
    pub fn new(size: usize) -> Result<Self, ConfigError> {
        validate_chunk_size(size)?;
        Ok(Self(Arc::new(AtomicUsize::new(size))))
    }

    /// Current value
    pub fn get(&self) -> usize {
        self.0.load(Ordering::Acquire)
    }

    /// Replace the value. On error the previous value is kept.
    pub fn set(&self, size: usize) -> Result<(), ConfigError> {
        validate_chunk_size(size)?;
        self.0.store(size, Ordering::Release);
        Ok(())
    }
}

impl Default for ChunkSize {
    fn default() -> Self {
        Self(Arc::new(AtomicUsize::new(MIN_BUFFER_SIZE)))
    }
}

fn validate_chunk_size(size: usize) -> Result<(), ConfigError> {
    if size < MIN_BUFFER_SIZE {
        return Err(ConfigError::InvalidValue(format!(
            "chunk size {size} is below the minimum of {MIN_BUFFER_SIZE} bytes"
        )));
    }
    Ok(())
}

/// Configuration for file transfers
#[derive(Debug, Clone, Default)]
pub struct TransferConfig {
    /// Chunk size used when reading a file for upload
    pub upload_chunk_size: ChunkSize,
    /// Chunk size used when writing a downloaded file
    pub download_chunk_size: ChunkSize,
}

impl TransferConfig {
    /// Create a new configuration with validation
    pub fn new(upload_chunk_size: usize, download_chunk_size: usize) -> Result<Self, ConfigError> {
        Ok(Self {
            upload_chunk_size: ChunkSize::new(upload_chunk_size)?,
            download_chunk_size: ChunkSize::new(download_chunk_size)?,
        })
    }
}

/// Configuration for the background task runner
#[derive(Debug, Clone, Default)]
pub struct TaskRunnerConfig {
    /// Maximum number of tasks running concurrently (`None` = unbounded)
    pub max_concurrent: Option<usize>,
}

impl TaskRunnerConfig {
    /// Default configuration: no concurrency bound
    pub const DEFAULT: Self = Self {
        max_concurrent: None,
    };

    /// Low-resource configuration for constrained devices
    pub const LOW_RESOURCE: Self = Self {
        max_concurrent: Some(2),
    };

    /// Create a bounded configuration with validation
    pub fn bounded(max_concurrent: usize) -> Result<Self, ConfigError> {
        if max_concurrent == 0 {
            return Err(ConfigError::InvalidValue(
                "max_concurrent must be positive".to_string(),
            ));
        }
        Ok(Self {
            max_concurrent: Some(max_concurrent),
        })
    }
}

/// Configuration for push registration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReconcilerConfig {
    /// Retry plan for create/update calls
    pub retry: RetryPlan,
    /// Platform code sent with every device write
    pub platform: String,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            retry: RetryPlan::default(),
            platform: crate::registration::DEFAULT_PLATFORM.to_string(),
        }
    }
}

impl ReconcilerConfig {
    /// Single attempt, no backoff
    pub fn no_retry() -> Self {
        Self {
            retry: RetryPlan::no_retry(),
            ..Self::default()
        }
    }

    /// Set the retry plan
    pub fn with_retry(mut self, retry: RetryPlan) -> Self {
        self.retry = retry;
        self
    }

    /// Set the platform code
    pub fn with_platform(mut self, platform: impl Into<String>) -> Self {
        self.platform = platform.into();
        self
    }
}

/// API endpoint configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Base URL of the API, e.g. `https://api.baas.io`
    pub api_url: String,
    /// Organization id or name
    pub organization_id: String,
    /// Application id or name
    pub application_id: String,
    /// Deadline for API calls such as device registration. Transfers are
    /// not bounded by it; for them it only limits how long the connection
    /// may stay idle.
    pub request_timeout: Duration,
    /// Timeout for establishing connections
    pub connect_timeout: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: "https://api.baas.io".to_string(),
            organization_id: String::new(),
            application_id: String::new(),
            request_timeout: Duration::from_secs(60),
            connect_timeout: Duration::from_secs(10),
        }
    }
}

impl ClientConfig {
    /// Create a new configuration with validation
    pub fn new(
        api_url: impl Into<String>,
        organization_id: impl Into<String>,
        application_id: impl Into<String>,
    ) -> Result<Self, ConfigError> {
        let config = Self {
            api_url: api_url.into(),
            organization_id: organization_id.into(),
            application_id: application_id.into(),
            ..Self::default()
        };
        config.validate()?;
        Ok(config)
    }

    /// Check that all required fields are present
    pub fn validate(&self) -> Result<(), ConfigError> {
        let url = self.api_url.trim();
        if url.is_empty() {
            return Err(ConfigError::MissingField("api_url"));
        }
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue(format!(
                "api_url must be an http(s) URL: {url}"
            )));
        }
        if self.organization_id.trim().is_empty() {
            return Err(ConfigError::MissingField("organization_id"));
        }
        if self.application_id.trim().is_empty() {
            return Err(ConfigError::MissingField("application_id"));
        }
        if self.request_timeout.is_zero() {
            return Err(ConfigError::InvalidValue(
                "request_timeout must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// `{api_url}/{organization}/{application}` without a trailing slash
    pub fn app_url(&self) -> String {
        format!(
            "{}/{}/{}",
            self.api_url.trim_end_matches('/'),
            self.organization_id,
            self.application_id
        )
    }

    /// Set the request timeout
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    /// Set the connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }
}

/// Configuration error
#[derive(Debug, Clone, thiserror::Error)]
pub enum ConfigError {
    /// Invalid configuration value
    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),

    /// Required field not set
    #[error("Missing configuration field: {0}")]
    MissingField(&'static str),
}

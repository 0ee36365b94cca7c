//! Error types for the baas.io SDK

// Re-export core error types
pub use baas_core::CoreError;

use crate::config::ConfigError;

/// Main error type for the baas.io SDK
#[derive(Debug, thiserror::Error)]
pub enum BaasError {
    /// Invalid argument, rejected before any I/O
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Network failure (connect, timeout, broken stream)
    #[error("Transport error: {0}")]
    Transport(String),

    /// The server answered with an error status or an error document
    #[error("Server error{}: {message}", fmt_status(.status))]
    Server {
        status: Option<u16>,
        message: String,
    },

    /// Task was cancelled
    #[error("Task cancelled")]
    Cancelled,

    /// Local file I/O error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Local key-value persistence failed
    #[error("Storage error: {0}")]
    Storage(String),

    /// Serialization/deserialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    /// The operation panicked
    #[error("Task panicked: {0}")]
    TaskPanicked(String),

    /// Generic error
    #[error("{0}")]
    Other(String),
}

fn fmt_status(status: &Option<u16>) -> String {
    status.map(|s| format!(" ({s})")).unwrap_or_default()
}

/// Result type alias for baas.io SDK operations
pub type Result<T> = std::result::Result<T, BaasError>;

/// Coarse classification of a [`BaasError`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    Validation,
    Transport,
    Server,
    Cancelled,
    Local,
    Internal,
}

impl BaasError {
    /// Build a server error from an HTTP status.
    pub fn from_status(status: u16) -> Self {
        BaasError::Server {
            status: Some(status),
            message: format!("Http Status code is {status}"),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            BaasError::InvalidInput(_) => ErrorKind::Validation,
            BaasError::Transport(_) | BaasError::Io(_) => ErrorKind::Transport,
            BaasError::Server { .. } => ErrorKind::Server,
            BaasError::Cancelled => ErrorKind::Cancelled,
            BaasError::Storage(_)
            | BaasError::Serialization(_)
            | BaasError::InvalidConfiguration(_) => ErrorKind::Local,
            BaasError::TaskPanicked(_) | BaasError::Other(_) => ErrorKind::Internal,
        }
    }

    /// Whether the registration reconciler may retry after this error.
    ///
    /// Transport-class and server errors are retried; validation, local and
    /// cancellation errors abort the retry loop.
    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Transport | ErrorKind::Server)
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, BaasError::Cancelled)
    }

    /// HTTP status carried by a server error, if any.
    pub fn status(&self) -> Option<u16> {
        match self {
            BaasError::Server { status, .. } => *status,
            _ => None,
        }
    }
}

impl From<CoreError> for BaasError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::InvalidRetryPlan(msg) => BaasError::InvalidConfiguration(msg),
            CoreError::InvalidTag(tag) => BaasError::InvalidInput(format!("invalid tag: {tag}")),
            other @ CoreError::ProgressOverflow { .. } => BaasError::Other(other.to_string()),
        }
    }
}

impl From<ConfigError> for BaasError {
    fn from(err: ConfigError) -> Self {
        BaasError::InvalidConfiguration(err.to_string())
    }
}

impl From<reqwest::Error> for BaasError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_builder() {
            return BaasError::InvalidInput(err.to_string());
        }
        if let Some(status) = err.status() {
            return BaasError::Server {
                status: Some(status.as_u16()),
                message: err.to_string(),
            };
        }
        BaasError::Transport(err.to_string())
    }
}

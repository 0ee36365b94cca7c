//! Core error types for the baas.io client SDK
//!
//! These errors describe values that cannot be constructed. Runtime failures
//! (transport, server, cancellation) live in the SDK crate, which wraps these.

/// Core error type for value construction and validation
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CoreError {
    /// A progress sample reported more transferred bytes than the declared total
    #[error("Invalid progress: transferred {transferred} exceeds total {total}")]
    ProgressOverflow { transferred: u64, total: u64 },

    /// A retry plan that cannot run (e.g. zero attempts)
    #[error("Invalid retry plan: {0}")]
    InvalidRetryPlan(String),

    /// A tag that is not allowed in a tag set
    #[error("Invalid tag: {0}")]
    InvalidTag(String),
}

/// Result type alias for core operations
pub type CoreResult<T> = std::result::Result<T, CoreError>;

//! Progress samples emitted by long-running transfers.
//!
//! A sample is either a byte count (with an optional known total) or an error
//! notification, never both. Samples are immutable once built.

use crate::error::{CoreError, CoreResult};
use serde::{Deserialize, Serialize};

/// One progress notification from a running task.
///
/// Exactly one of the byte data or `error` is populated:
/// - byte samples always carry `transferred_bytes`, and carry `total_bytes`
///   when the size is known up front
/// - error samples carry neither byte field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressSample {
    #[serde(skip_serializing_if = "Option::is_none")]
    total_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    transferred_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<String>,
}

impl ProgressSample {
    /// Progress against a known total.
    ///
    /// Fails when `transferred` exceeds `total`.
    pub fn bytes(total: u64, transferred: u64) -> CoreResult<Self> {
        if transferred > total {
            return Err(CoreError::ProgressOverflow { transferred, total });
        }
        Ok(Self {
            total_bytes: Some(total),
            transferred_bytes: Some(transferred),
            error: None,
        })
    }

    /// Progress when the total size is not known (e.g. no `Content-Length`).
    pub fn transferred_only(transferred: u64) -> Self {
        Self {
            total_bytes: None,
            transferred_bytes: Some(transferred),
            error: None,
        }
    }

    /// Progress with an optional total.
    pub fn with_total(total: Option<u64>, transferred: u64) -> CoreResult<Self> {
        match total {
            Some(total) => Self::bytes(total, transferred),
            None => Ok(Self::transferred_only(transferred)),
        }
    }

    /// An error notification. Clears both byte fields.
    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            total_bytes: None,
            transferred_bytes: None,
            error: Some(message.into()),
        }
    }

    pub fn total_bytes(&self) -> Option<u64> {
        self.total_bytes
    }

    pub fn transferred_bytes(&self) -> Option<u64> {
        self.transferred_bytes
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Completed fraction in `0.0..=1.0`, when the total is known.
    ///
    /// An empty transfer (total of zero) counts as complete.
    pub fn fraction(&self) -> Option<f64> {
        let total = self.total_bytes?;
        let transferred = self.transferred_bytes?;
        if total == 0 {
            return Some(1.0);
        }
        Some(transferred as f64 / total as f64)
    }
}

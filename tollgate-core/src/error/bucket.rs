//! Token bucket error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors returned while waiting for permits from a token bucket.
///
/// ```
/// use tollgate_core::error::BucketError;
///
/// let error = BucketError::ExceedsCapacity { requested: 5, capacity: 2 };
/// assert!(error.to_string().contains("exceeds bucket capacity"));
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum BucketError {
    /// The bucket was shut down while the request was pending, or before it
    /// was made.
    #[error("[Bucket] Token bucket is unavailable")]
    Unavailable,

    /// More tokens were requested than the bucket can ever hold.
    #[error("[Bucket] Requested {requested} tokens exceeds bucket capacity {capacity}")]
    ExceedsCapacity {
        /// Number of tokens requested.
        requested: u32,
        /// Bucket capacity.
        capacity: u32,
    },
}

impl BucketError {
    /// Bucket errors are terminal for the request that received them.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        false
    }

    /// Returns the severity level of this error.
    #[must_use]
    pub const fn severity(&self) -> super::ErrorSeverity {
        match self {
            Self::Unavailable => super::ErrorSeverity::Warning,
            Self::ExceedsCapacity { .. } => super::ErrorSeverity::Fatal,
        }
    }
}

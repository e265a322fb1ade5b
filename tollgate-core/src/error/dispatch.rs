//! Dispatcher admission error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by the rate-limited dispatcher itself.
///
/// These never wrap a failure of the dispatched work; work failures are
/// handed back to the caller untouched.
///
/// ```
/// use tollgate_core::error::DispatchError;
///
/// let error = DispatchError::QueueFull { capacity: 10 };
/// assert!(error.is_queue_full());
/// assert!(error.to_string().contains("10"));
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum DispatchError {
    /// Submission rejected because the admission queue is at capacity.
    #[error("[Dispatch] Queue is full ({capacity} entries waiting)")]
    QueueFull {
        /// Configured queue capacity.
        capacity: usize,
    },

    /// Submission rejected because the dispatcher has been closed.
    #[error("[Dispatch] Dispatcher is closed")]
    Closed,

    /// The admitted call was dropped before producing a result.
    #[error("[Dispatch] Call was abandoned before completion")]
    Abandoned,
}

impl DispatchError {
    /// Returns true for [`DispatchError::QueueFull`].
    #[must_use]
    pub const fn is_queue_full(&self) -> bool {
        matches!(self, Self::QueueFull { .. })
    }

    /// Only a full queue clears up on its own.
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        self.is_queue_full()
    }

    /// Returns the severity level of this error.
    #[must_use]
    pub const fn severity(&self) -> super::ErrorSeverity {
        match self {
            Self::QueueFull { .. } => super::ErrorSeverity::Recoverable,
            Self::Closed => super::ErrorSeverity::Info,
            Self::Abandoned => super::ErrorSeverity::Warning,
        }
    }
}

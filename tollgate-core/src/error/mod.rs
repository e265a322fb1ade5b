//! Error types and handling framework.
//!
//! Errors are grouped by the layer that raises them:
//! - [`TollgateError`] - Top-level error type
//!   - [`BucketError`] - Token bucket permit failures
//!   - [`DispatchError`] - Admission failures of the rate-limited dispatcher
//!   - [`ConfigError`] - Configuration loading and validation errors
//!
//! Admission-level errors are reported as soon as a call is submitted. Errors
//! produced by the wrapped work are never converted into any of these types;
//! they reach the caller verbatim.
//!
//! ```
//! use tollgate_core::error::{DispatchError, TollgateError};
//!
//! let error = TollgateError::from(DispatchError::QueueFull { capacity: 8 });
//! assert!(error.to_string().contains("Queue is full"));
//! assert!(error.is_recoverable());
//! ```

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Error severity levels for categorizing errors.
///
/// ```
/// use tollgate_core::error::ErrorSeverity;
///
/// let severity = ErrorSeverity::Recoverable;
/// assert!(severity.is_recoverable());
/// assert!(!severity.is_fatal());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum ErrorSeverity {
    /// Unrecoverable error; the component cannot continue.
    Fatal,

    /// The operation failed but may succeed if attempted again later.
    #[default]
    Recoverable,

    /// Non-critical issue that should be logged.
    Warning,

    /// Expected or handled condition.
    Info,
}

impl ErrorSeverity {
    /// Returns true if this error is recoverable (not fatal).
    #[must_use]
    pub const fn is_recoverable(&self) -> bool {
        !matches!(self, Self::Fatal)
    }

    /// Returns true if this error is fatal.
    #[must_use]
    pub const fn is_fatal(&self) -> bool {
        matches!(self, Self::Fatal)
    }

    /// Returns the severity as a static string.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Fatal => "FATAL",
            Self::Recoverable => "RECOVERABLE",
            Self::Warning => "WARNING",
            Self::Info => "INFO",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

mod bucket;
mod config;
mod dispatch;

pub use bucket::BucketError;
pub use config::ConfigError;
pub use dispatch::DispatchError;

/// Top-level error type for Tollgate.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TollgateError {
    /// Token bucket error.
    #[error("{0}")]
    Bucket(#[from] BucketError),

    /// Dispatcher admission error.
    #[error("{0}")]
    Dispatch(#[from] DispatchError),

    /// Configuration error.
    #[error("{0}")]
    Config(#[from] ConfigError),
}

impl TollgateError {
    /// Returns the severity level of this error.
    #[must_use]
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Bucket(e) => e.severity(),
            Self::Dispatch(e) => e.severity(),
            Self::Config(e) => e.severity(),
        }
    }

    /// Returns true if retrying the operation later may succeed.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Bucket(e) => e.is_recoverable(),
            Self::Dispatch(e) => e.is_recoverable(),
            Self::Config(_) => false,
        }
    }

    /// Returns the error category name.
    #[must_use]
    pub const fn category(&self) -> &'static str {
        match self {
            Self::Bucket(_) => "Bucket",
            Self::Dispatch(_) => "Dispatch",
            Self::Config(_) => "Config",
        }
    }
}

/// Result type alias using [`TollgateError`].
pub type Result<T> = std::result::Result<T, TollgateError>;

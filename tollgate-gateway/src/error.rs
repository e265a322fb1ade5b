//! Client error type.

use thiserror::Error;
use tollgate_core::error::{ConfigError, DispatchError, ErrorSeverity};

use crate::rest::TransportError;

/// Error returned by [`ShopClient`](crate::rest::ShopClient) calls.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ClientError {
    /// Invalid client configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The call was not admitted or never ran.
    #[error(transparent)]
    Dispatch(#[from] DispatchError),

    /// The transport failed or the server returned an error status.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The response body did not have the expected shape.
    #[error("[Client] Failed to decode response: {reason}")]
    Decode {
        /// Decoder message.
        reason: String,
    },
}

impl ClientError {
    /// Returns true if retrying the call later may succeed.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        match self {
            Self::Config(_) | Self::Decode { .. } => false,
            Self::Dispatch(e) => e.is_recoverable(),
            Self::Transport(e) => e.is_transient(),
        }
    }

    /// Returns the severity level of this error.
    #[must_use]
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Config(e) => e.severity(),
            Self::Dispatch(e) => e.severity(),
            Self::Transport(e) if e.is_transient() => ErrorSeverity::Recoverable,
            Self::Transport(_) | Self::Decode { .. } => ErrorSeverity::Warning,
        }
    }
}

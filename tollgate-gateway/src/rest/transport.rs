//! The seam between the client and an HTTP implementation.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use thiserror::Error;

use super::request::{ApiRequest, ApiResponse};

/// Sends stamped requests over the wire.
///
/// Implementations perform no retries and no rate limiting; both are decided
/// above this layer. A non-success status must be reported as
/// [`TransportError::Http`] with the response headers attached so the call
/// quota can still be read from it.
#[async_trait]
pub trait Transport: Send + Sync {
    /// Performs one request.
    async fn send(&self, request: ApiRequest) -> Result<ApiResponse, TransportError>;
}

/// Failure reported by a [`Transport`].
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum TransportError {
    /// No response within the request timeout.
    #[error("[Transport] Request timeout after {timeout_ms}ms")]
    Timeout {
        /// Timeout in milliseconds.
        timeout_ms: u64,
    },

    /// The connection could not be established or broke.
    #[error("[Transport] Connection failed: {reason}")]
    ConnectionFailed {
        /// Reason for the failure.
        reason: String,
    },

    /// The server answered with a non-success status.
    #[error("[Transport] HTTP error: status {status_code} - {reason}")]
    Http {
        /// HTTP status code.
        status_code: u16,
        /// Status text or error body.
        reason: String,
        /// Response headers, names lowercase.
        headers: HashMap<String, String>,
    },
}

impl TransportError {
    /// Returns a response header carried by the failure, if any.
    #[must_use]
    pub fn response_header(&self, name: &str) -> Option<&str> {
        match self {
            Self::Http { headers, .. } => headers
                .get(&name.to_ascii_lowercase())
                .map(String::as_str),
            _ => None,
        }
    }

    /// Returns the HTTP status, if the server answered.
    #[must_use]
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Self::Http { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// Returns true for failures that may succeed when tried again later.
    #[must_use]
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Timeout { .. } | Self::ConnectionFailed { .. } => true,
            Self::Http { status_code, .. } => *status_code == 429 || *status_code >= 500,
        }
    }
}

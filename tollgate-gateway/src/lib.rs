//! # Tollgate Gateway
//!
//! Client-side rate limiting for a shop's admin REST API.
//!
//! Calls are queued, paced by a token bucket and capped per release interval
//! before they reach the transport. The call quota the server reports in
//! every response is tracked and published to subscribers.
//!
//! # Architecture
//!
//! - `rest` - token bucket, dispatcher, quota tracker and shop client
//! - `error` - the client error type
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tollgate_core::config::{BucketConfig, DispatcherConfig};
//! use tollgate_gateway::rest::{RateLimitedDispatcher, TokenBucket};
//!
//! let bucket = Arc::new(TokenBucket::new(BucketConfig::default())?);
//! let dispatcher = RateLimitedDispatcher::new(
//!     DispatcherConfig::new(2, Duration::from_secs(1)),
//!     bucket,
//! )?;
//! let value = dispatcher.submit(|| async { 42 })?.await?;
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

/// Client error type
pub mod error;

/// Rate-limited REST infrastructure
pub mod rest;

pub use error::ClientError;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::error::ClientError;
    pub use crate::rest::{
        Admission, ApiRequest, ApiResponse, HttpMethod, QuotaTracker, RateLimited,
        RateLimitedDispatcher, ShopClient, TokenBucket, Transport, TransportError,
    };
}

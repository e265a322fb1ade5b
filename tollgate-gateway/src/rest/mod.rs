//! Rate-limited REST access to a shop's admin API.
//!
//! This module provides:
//! - [`TokenBucket`]: timer-refilled permits with FIFO waiters
//! - [`RateLimitedDispatcher`]: bounded admission queue with timer-released
//!   concurrency slots
//! - [`QuotaTracker`]: the call quota reported in response headers
//! - [`ShopClient`]: request stamping on top of a pluggable [`Transport`]
//!
//! # Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use tollgate_core::config::{AutoLimitConfig, ClientConfig};
//! use tollgate_gateway::rest::ShopClient;
//!
//! let config = ClientConfig::with_access_token("acme", token)
//!     .auto_limit(AutoLimitConfig::default());
//! let client = ShopClient::new(config, Arc::new(transport))?;
//!
//! let shop = client.get("/admin/shop.json", Some("shop")).await?;
//! ```

mod client;
mod dispatcher;
mod quota;
mod request;
mod token_bucket;
mod transport;

pub use client::ShopClient;
pub use dispatcher::{Admission, DispatcherStats, RateLimited, RateLimitedDispatcher};
pub use quota::{CALL_LIMIT_HEADER, QuotaTracker, parse_call_limit};
pub use request::{ACCESS_TOKEN_HEADER, ApiRequest, ApiResponse, HttpMethod};
pub use token_bucket::TokenBucket;
pub use transport::{Transport, TransportError};

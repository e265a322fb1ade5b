//! # Tollgate Core
//!
//! Shared building blocks for the Tollgate shop API client.
//!
//! This crate provides:
//! - Error types for the token bucket, dispatcher and configuration layers
//! - Configuration structs with validation and environment overrides
//! - Value types such as [`types::CallLimits`] and [`types::ShopName`]

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::cast_possible_truncation)]

/// Error types and handling
pub mod error;

/// Configuration management
pub mod config;

/// Shared value types
pub mod types;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::*;
    pub use crate::error::{BucketError, ConfigError, DispatchError, ErrorSeverity, TollgateError};
    pub use crate::types::*;
}

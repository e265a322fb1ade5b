//! # Tollgate Telemetry
//!
//! Logging for the Tollgate shop API client.
//!
//! - Structured logging through `tracing`, in JSON or pretty format
//! - stdout and rolling file outputs
//! - Masking of access tokens and passwords before they reach a log line

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::module_name_repetitions)]

/// Logging configuration and initialization
pub mod logging;

/// Sensitive data masking
pub mod masking;

/// Prelude for convenient imports
pub mod prelude {
    pub use crate::logging::{LogConfig, LogFormat, LogOutput, Rotation, init_logging};
    pub use crate::masking::SensitiveDataMasker;
}

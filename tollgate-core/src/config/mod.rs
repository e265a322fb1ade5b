//! Configuration management.
//!
//! - YAML, TOML and JSON configuration files
//! - Validation with path-qualified error messages
//! - Environment variable overrides for credentials
//!
//! # Example
//!
//! ```rust,ignore
//! use tollgate_core::config::{ClientConfig, ConfigLoader};
//!
//! let config: ClientConfig = ConfigLoader::new()
//!     .with_env_prefix("TOLLGATE")
//!     .load_config("tollgate.toml")?;
//! ```

mod client_config;
mod loader;
mod traits;
mod validation;

pub use client_config::{
    AutoLimitConfig, BucketConfig, ClientConfig, Credentials, DEFAULT_QUEUE_CAPACITY,
    DispatcherConfig,
};
pub use loader::{ConfigFormat, ConfigLoader};
pub use traits::{Configurable, Validatable};
pub use validation::{EnvOverride, ValidationContext};

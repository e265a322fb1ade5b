//! Traits implemented by configuration sections.

use super::validation::EnvOverride;
use crate::error::ConfigError;

/// A configuration section that can check its own values.
///
/// Implementations report the first problem found. Field names in the error
/// are dotted paths from the configuration root.
pub trait Validatable {
    /// Checks every setting.
    fn validate(&self) -> Result<(), ConfigError>;
}

/// A configuration section that accepts environment overrides.
///
/// ```
/// use tollgate_core::config::{Configurable, EnvOverride};
///
/// struct Proxy {
///     timeout_ms: u64,
/// }
///
/// impl Configurable for Proxy {
///     const ENV_VARS: &'static [&'static str] = &["TIMEOUT_MS"];
///
///     fn apply_env_overrides(&mut self, env: &EnvOverride) {
///         env.number("TIMEOUT_MS", &mut self.timeout_ms);
///     }
/// }
///
/// assert_eq!(Proxy::env_var_names("TOLLGATE"), vec!["TOLLGATE_TIMEOUT_MS"]);
/// ```
pub trait Configurable {
    /// Variable names read by [`Configurable::apply_env_overrides`],
    /// without the prefix.
    const ENV_VARS: &'static [&'static str];

    /// Replaces fields whose variables are set.
    fn apply_env_overrides(&mut self, env: &EnvOverride);

    /// Returns the full variable names for `prefix`.
    #[must_use]
    fn env_var_names(prefix: &str) -> Vec<String> {
        let env = EnvOverride::new(prefix);
        Self::ENV_VARS.iter().map(|name| env.var_name(name)).collect()
    }
}

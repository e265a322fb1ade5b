//! Validation and environment override helpers.

use std::fmt::Display;
use std::str::FromStr;

use crate::error::ConfigError;

/// Collects field errors under a dotted section path.
///
/// ```
/// use tollgate_core::config::ValidationContext;
///
/// let mut ctx = ValidationContext::new();
/// ctx.scope("auto_limit", |ctx| {
///     ctx.scope("bucket", |ctx| {
///         ctx.positive("capacity", 0u32);
///     });
/// });
/// let err = ctx.into_result().unwrap_err();
/// assert_eq!(err.field(), Some("auto_limit.bucket.capacity"));
/// ```
#[derive(Debug, Clone, Default)]
pub struct ValidationContext {
    path: Vec<String>,
    errors: Vec<ConfigError>,
}

impl ValidationContext {
    /// Creates an empty context at the configuration root.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Runs `f` with `section` appended to the path.
    pub fn scope<R>(&mut self, section: &str, f: impl FnOnce(&mut Self) -> R) -> R {
        self.path.push(section.to_string());
        let result = f(self);
        self.path.pop();
        result
    }

    /// Returns `field` prefixed with the current section path.
    #[must_use]
    pub fn field_path(&self, field: &str) -> String {
        if self.path.is_empty() {
            field.to_string()
        } else {
            format!("{}.{field}", self.path.join("."))
        }
    }

    /// Records an error when `value` is empty.
    pub fn require(&mut self, field: &str, value: &str) -> &mut Self {
        if value.is_empty() {
            let error = ConfigError::missing_field(self.field_path(field));
            self.errors.push(error);
        }
        self
    }

    /// Records an error when `value` is zero or negative.
    pub fn positive<T>(&mut self, field: &str, value: T) -> &mut Self
    where
        T: PartialOrd + Default + Display,
    {
        if value <= T::default() {
            let error = ConfigError::invalid_value(
                self.field_path(field),
                format!("Value {value} must be positive"),
            );
            self.errors.push(error);
        }
        self
    }

    /// Returns the errors recorded so far.
    #[must_use]
    pub fn errors(&self) -> &[ConfigError] {
        &self.errors
    }

    /// Returns the first recorded error, if any.
    pub fn into_result(self) -> Result<(), ConfigError> {
        self.errors.into_iter().next().map_or(Ok(()), Err)
    }
}

/// Reads `{prefix}_{NAME}` environment variables into configuration fields.
///
/// Unset variables leave the field untouched. Numbers that fail to parse
/// are ignored.
///
/// ```
/// use tollgate_core::config::EnvOverride;
///
/// let env = EnvOverride::new("TOLLGATE_DOC");
/// assert_eq!(env.var_name("SHOP_NAME"), "TOLLGATE_DOC_SHOP_NAME");
///
/// let mut timeout_ms = 60_000u64;
/// env.number("UNSET_FOR_DOCTEST", &mut timeout_ms);
/// assert_eq!(timeout_ms, 60_000);
/// ```
#[derive(Debug, Clone)]
pub struct EnvOverride {
    prefix: String,
}

impl EnvOverride {
    /// Creates a reader for variables starting with `{prefix}_`.
    #[must_use]
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
        }
    }

    /// Returns the full variable name for `name`.
    #[must_use]
    pub fn var_name(&self, name: &str) -> String {
        format!("{}_{name}", self.prefix)
    }

    fn read(&self, name: &str) -> Option<String> {
        std::env::var(self.var_name(name)).ok()
    }

    /// Overrides a required string.
    pub fn string(&self, name: &str, target: &mut String) {
        if let Some(value) = self.read(name) {
            *target = value;
        }
    }

    /// Overrides an optional string, such as a credential.
    pub fn optional(&self, name: &str, target: &mut Option<String>) {
        if let Some(value) = self.read(name) {
            *target = Some(value);
        }
    }

    /// Overrides a number.
    pub fn number<T: FromStr>(&self, name: &str, target: &mut T) {
        if let Some(value) = self.read(name)
            && let Ok(parsed) = value.trim().parse()
        {
            *target = parsed;
        }
    }
}

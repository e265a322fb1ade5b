//! Configuration error types.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::ErrorSeverity;

/// Rejected client, dispatcher or bucket configuration.
///
/// Field names are dotted paths from the configuration root, such as
/// `auto_limit.bucket.capacity`.
///
/// ```
/// use tollgate_core::error::ConfigError;
///
/// let error = ConfigError::invalid_value("auto_limit.interval_ms", "Value 0 must be positive");
/// assert_eq!(error.field(), Some("auto_limit.interval_ms"));
/// assert!(error.to_string().starts_with("[Config]"));
/// ```
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConfigError {
    /// A required setting is absent or empty.
    #[error("[Config] '{field}' is required")]
    MissingField {
        /// Dotted path of the setting.
        field: String,
    },

    /// A setting is present but out of range or malformed.
    #[error("[Config] '{field}' is invalid: {reason}")]
    InvalidValue {
        /// Dotted path of the setting.
        field: String,
        /// What is wrong with it.
        reason: String,
    },

    /// The configuration file could not be opened.
    #[error("[Config] Cannot read {path}: {reason}")]
    FileReadError {
        /// File path.
        path: String,
        /// I/O error text.
        reason: String,
    },

    /// The configuration text is not valid YAML, TOML or JSON, or does not
    /// match the expected shape.
    #[error("[Config] Cannot parse {path}: {reason}")]
    InvalidFormat {
        /// File path, or `<string>` for in-memory content.
        path: String,
        /// Parser message.
        reason: String,
    },

    /// Settings are individually valid but inconsistent, such as credentials
    /// of both kinds at once.
    #[error("[Config] {reason}")]
    ValidationFailed {
        /// Description of the conflict.
        reason: String,
    },
}

impl ConfigError {
    /// Shorthand for [`ConfigError::MissingField`].
    #[must_use]
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingField {
            field: field.into(),
        }
    }

    /// Shorthand for [`ConfigError::InvalidValue`].
    #[must_use]
    pub fn invalid_value(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field: field.into(),
            reason: reason.into(),
        }
    }

    /// Returns the offending setting, when the error names one.
    #[must_use]
    pub fn field(&self) -> Option<&str> {
        match self {
            Self::MissingField { field } | Self::InvalidValue { field, .. } => Some(field),
            _ => None,
        }
    }

    /// Configuration errors always stop client construction. A file that
    /// could not be read is the only case worth retrying.
    #[must_use]
    pub const fn severity(&self) -> ErrorSeverity {
        match self {
            Self::FileReadError { .. } => ErrorSeverity::Recoverable,
            _ => ErrorSeverity::Fatal,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field() {
        let error = ConfigError::missing_field("shop_name");
        assert_eq!(error.to_string(), "[Config] 'shop_name' is required");
        assert_eq!(error.field(), Some("shop_name"));
        assert!(error.severity().is_fatal());
    }

    #[test]
    fn test_invalid_value() {
        let error = ConfigError::invalid_value("auto_limit.bucket.capacity", "Value 0 must be positive");
        assert_eq!(
            error.to_string(),
            "[Config] 'auto_limit.bucket.capacity' is invalid: Value 0 must be positive"
        );
    }

    #[test]
    fn test_errors_without_field() {
        let error = ConfigError::ValidationFailed {
            reason: "Missing or invalid options".to_string(),
        };
        assert_eq!(error.field(), None);
        assert_eq!(error.to_string(), "[Config] Missing or invalid options");

        let error = ConfigError::FileReadError {
            path: "tollgate.yaml".to_string(),
            reason: "permission denied".to_string(),
        };
        assert!(error.severity().is_recoverable());
    }

    #[test]
    fn test_serde_roundtrip() {
        let error = ConfigError::InvalidFormat {
            path: "tollgate.toml".to_string(),
            reason: "expected `=`".to_string(),
        };
        let json = serde_json::to_string(&error).unwrap();
        let parsed: ConfigError = serde_json::from_str(&json).unwrap();
        assert_eq!(error, parsed);
    }
}

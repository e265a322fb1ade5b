//! Loading configuration from YAML, TOML or JSON.

use serde::de::DeserializeOwned;
use std::path::Path;

use crate::config::{Configurable, EnvOverride, Validatable};
use crate::error::ConfigError;

const IN_MEMORY: &str = "<string>";

/// Configuration file syntax.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConfigFormat {
    /// `.yaml` or `.yml`
    #[default]
    Yaml,
    /// `.toml`
    Toml,
    /// `.json`
    Json,
}

impl ConfigFormat {
    /// Picks the format from a file extension, ignoring case.
    #[must_use]
    pub fn from_path(path: &Path) -> Option<Self> {
        let ext = path.extension()?.to_str()?.to_ascii_lowercase();
        match ext.as_str() {
            "yaml" | "yml" => Some(Self::Yaml),
            "toml" => Some(Self::Toml),
            "json" => Some(Self::Json),
            _ => None,
        }
    }

    /// Returns the canonical file extension.
    #[must_use]
    pub const fn extension(&self) -> &'static str {
        match self {
            Self::Yaml => "yaml",
            Self::Toml => "toml",
            Self::Json => "json",
        }
    }

    /// Deserializes `content`, naming `origin` in any error.
    fn parse<T: DeserializeOwned>(self, content: &str, origin: &str) -> Result<T, ConfigError> {
        let parsed = match self {
            Self::Yaml => serde_yaml::from_str(content).map_err(|e| e.to_string()),
            Self::Toml => toml::from_str(content).map_err(|e| e.to_string()),
            Self::Json => serde_json::from_str(content).map_err(|e| e.to_string()),
        };
        parsed.map_err(|reason| ConfigError::InvalidFormat {
            path: origin.to_string(),
            reason: format!("{} {reason}", self.extension().to_ascii_uppercase()),
        })
    }
}

/// Reads a configuration, applies environment overrides, then validates.
///
/// Overrides run before validation, so credentials may be left out of the
/// file and supplied as `{PREFIX}_ACCESS_TOKEN` or
/// `{PREFIX}_API_KEY`/`{PREFIX}_PASSWORD`.
///
/// ```rust,ignore
/// use tollgate_core::config::{ClientConfig, ConfigLoader};
///
/// let config: ClientConfig = ConfigLoader::new()
///     .with_env_prefix("TOLLGATE")
///     .load_config("tollgate.yaml")?;
/// ```
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    env: Option<EnvOverride>,
    validate: bool,
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl ConfigLoader {
    /// Creates a loader that validates and reads no environment variables.
    #[must_use]
    pub fn new() -> Self {
        Self {
            env: None,
            validate: true,
        }
    }

    /// Reads overrides from `{prefix}_*` variables.
    #[must_use]
    pub fn with_env_prefix(mut self, prefix: impl Into<String>) -> Self {
        self.env = Some(EnvOverride::new(prefix));
        self
    }

    /// Turns validation on or off. On by default.
    #[must_use]
    pub fn with_validation(mut self, validate: bool) -> Self {
        self.validate = validate;
        self
    }

    /// Loads, overrides and validates a configuration file.
    ///
    /// # Errors
    ///
    /// - `ConfigError::InvalidFormat` for an unknown extension or bad syntax
    /// - `ConfigError::FileReadError` if the file cannot be read
    /// - any error reported by [`Validatable::validate`]
    pub fn load_config<T, P>(&self, path: P) -> Result<T, ConfigError>
    where
        T: DeserializeOwned + Configurable + Validatable,
        P: AsRef<Path>,
    {
        let config = self.load_file(path)?;
        self.finish(config)
    }

    /// Loads, overrides and validates in-memory content.
    ///
    /// # Errors
    ///
    /// As [`ConfigLoader::load_config`], minus file access.
    pub fn load_config_str<T>(&self, content: &str, format: ConfigFormat) -> Result<T, ConfigError>
    where
        T: DeserializeOwned + Configurable + Validatable,
    {
        let config = self.load_str(content, format)?;
        self.finish(config)
    }

    fn finish<T>(&self, mut config: T) -> Result<T, ConfigError>
    where
        T: Configurable + Validatable,
    {
        if let Some(env) = &self.env {
            config.apply_env_overrides(env);
        }
        if self.validate {
            config.validate()?;
        }
        Ok(config)
    }

    /// Deserializes a file as-is, without overrides or validation.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidFormat` or `ConfigError::FileReadError`.
    pub fn load_file<T, P>(&self, path: P) -> Result<T, ConfigError>
    where
        T: DeserializeOwned,
        P: AsRef<Path>,
    {
        let path = path.as_ref();
        let origin = path.display().to_string();
        let Some(format) = ConfigFormat::from_path(path) else {
            return Err(ConfigError::InvalidFormat {
                path: origin,
                reason: "expected a .yaml, .yml, .toml or .json file".to_string(),
            });
        };
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::FileReadError {
            path: origin.clone(),
            reason: e.to_string(),
        })?;
        format.parse(&content, &origin)
    }

    /// Deserializes a string as-is, without overrides or validation.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::InvalidFormat` if the content does not parse.
    pub fn load_str<T: DeserializeOwned>(
        &self,
        content: &str,
        format: ConfigFormat,
    ) -> Result<T, ConfigError> {
        format.parse(content, IN_MEMORY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ClientConfig, DispatcherConfig};

    #[test]
    fn test_format_from_path() {
        let cases = [
            ("tollgate.yaml", Some(ConfigFormat::Yaml)),
            ("tollgate.YML", Some(ConfigFormat::Yaml)),
            ("tollgate.toml", Some(ConfigFormat::Toml)),
            ("tollgate.json", Some(ConfigFormat::Json)),
            ("tollgate.ini", None),
            ("tollgate", None),
        ];
        for (path, expected) in cases {
            assert_eq!(ConfigFormat::from_path(Path::new(path)), expected, "{path}");
        }
    }

    #[test]
    fn test_same_config_in_every_format() {
        let loader = ConfigLoader::new();
        let yaml: DispatcherConfig = loader
            .load_str("concurrency_limit: 4\ninterval_ms: 250\n", ConfigFormat::Yaml)
            .unwrap();
        let toml: DispatcherConfig = loader
            .load_str("concurrency_limit = 4\ninterval_ms = 250\n", ConfigFormat::Toml)
            .unwrap();
        let json: DispatcherConfig = loader
            .load_str(r#"{"concurrency_limit": 4, "interval_ms": 250}"#, ConfigFormat::Json)
            .unwrap();
        assert_eq!(yaml, toml);
        assert_eq!(toml, json);
        assert_eq!(json.release_delay().as_millis(), 250);
    }

    #[test]
    fn test_syntax_error_names_format() {
        let err = ConfigLoader::new()
            .load_str::<DispatcherConfig>("concurrency_limit = [", ConfigFormat::Toml)
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidFormat { ref path, .. } if path == IN_MEMORY));
        assert!(err.to_string().contains("TOML"));
    }

    #[test]
    fn test_validation_toggle() {
        let yaml = "shop_name: acme\n";
        let err = ConfigLoader::new()
            .load_config_str::<ClientConfig>(yaml, ConfigFormat::Yaml)
            .unwrap_err();
        assert!(matches!(err, ConfigError::ValidationFailed { .. }));

        let config: ClientConfig = ConfigLoader::new()
            .with_validation(false)
            .load_config_str(yaml, ConfigFormat::Yaml)
            .unwrap();
        assert_eq!(config.access_token, None);
    }

    #[test]
    fn test_file_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tollgate.toml");
        std::fs::write(
            &path,
            "shop_name = \"acme\"\naccess_token = \"shpat_abc\"\ntimeout_ms = 5000\n",
        )
        .unwrap();

        let config: ClientConfig = ConfigLoader::new().load_config(&path).unwrap();
        assert_eq!(config.shop_name, "acme");
        assert_eq!(config.timeout_ms, 5_000);
    }

    #[test]
    fn test_missing_file() {
        let err = ConfigLoader::new()
            .load_file::<ClientConfig, _>("/nonexistent/tollgate.yaml")
            .unwrap_err();
        assert!(matches!(err, ConfigError::FileReadError { .. }));
    }

    #[test]
    fn test_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tollgate.ini");
        std::fs::write(&path, "shop_name=acme").unwrap();

        let err = ConfigLoader::new()
            .load_file::<ClientConfig, _>(&path)
            .unwrap_err();
        assert!(err.to_string().contains(".toml"));
    }
}

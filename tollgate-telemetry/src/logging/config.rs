//! Logging settings.

use serde::{Deserialize, Serialize};

/// Where and how log lines are written.
///
/// Deserializes from the `logging` section of a configuration file. Every
/// field has a default, so an empty section logs JSON to stdout at `info`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Filter directive such as `info` or `tollgate_gateway=debug`.
    /// `RUST_LOG` wins when set.
    pub level: String,
    /// Line format for stdout. Files are always JSON.
    pub format: LogFormat,
    /// Destinations; each gets its own layer.
    pub outputs: Vec<LogOutput>,
    /// Adds source file, line and thread id to each line.
    pub with_source: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Json,
            outputs: vec![LogOutput::Stdout],
            with_source: false,
        }
    }
}

impl LogConfig {
    /// Human-readable stdout logging at `debug`, for local runs.
    #[must_use]
    pub fn development() -> Self {
        Self {
            level: "debug".to_string(),
            format: LogFormat::Pretty,
            with_source: true,
            ..Self::default()
        }
    }

    /// Adds a daily-rotated JSON file in `directory`.
    #[must_use]
    pub fn with_file(mut self, directory: impl Into<String>) -> Self {
        self.outputs.push(LogOutput::File {
            directory: directory.into(),
            file_name: default_file_name(),
            rotation: Rotation::Daily,
        });
        self
    }
}

/// Stdout line format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// One JSON object per line.
    #[default]
    Json,
    /// Multi-line, colored.
    Pretty,
}

/// A log destination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum LogOutput {
    /// Standard output.
    Stdout,
    /// Rolling files written by a background worker.
    File {
        /// Directory, created if missing.
        directory: String,
        /// Base file name; rotation appends a date suffix.
        #[serde(default = "default_file_name")]
        file_name: String,
        /// How often a new file is started.
        #[serde(default)]
        rotation: Rotation,
    },
}

fn default_file_name() -> String {
    "tollgate.log".to_string()
}

/// File rotation period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rotation {
    /// New file every hour.
    Hourly,
    /// New file every day.
    #[default]
    Daily,
    /// Single file.
    Never,
}

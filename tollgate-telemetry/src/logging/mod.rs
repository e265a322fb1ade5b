//! Structured logging for Tollgate.
//!
//! - JSON and pretty formats
//! - stdout and rolling file outputs
//! - `RUST_LOG` overrides the configured level

mod config;

pub use config::{LogConfig, LogFormat, LogOutput, Rotation};

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation as AppenderRotation};
use tracing_subscriber::registry::LookupSpan;
use tracing_subscriber::{EnvFilter, Layer, fmt, layer::SubscriberExt, util::SubscriberInitExt};

type BoxedLayer<S> = Box<dyn Layer<S> + Send + Sync>;

/// Installs the global subscriber described by `config`.
///
/// Keep the returned guards alive until shutdown; dropping one stops its
/// file writer after flushing.
///
/// ```no_run
/// use tollgate_telemetry::logging::{LogConfig, init_logging};
///
/// let _guards = init_logging(&LogConfig::default()).expect("logging");
/// ```
pub fn init_logging(config: &LogConfig) -> Result<Vec<WorkerGuard>, LoggingError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| LoggingError::InvalidConfig(format!("level '{}': {e}", config.level)))?,
    };

    let mut guards = Vec::new();
    let layers = config
        .outputs
        .iter()
        .map(|output| -> Result<BoxedLayer<_>, LoggingError> {
            match output {
                LogOutput::Stdout => Ok(stdout_layer(config)),
                LogOutput::File {
                    directory,
                    file_name,
                    rotation,
                } => {
                    std::fs::create_dir_all(directory)?;
                    let appender = RollingFileAppender::new(
                        appender_rotation(*rotation),
                        directory,
                        file_name,
                    );
                    let (writer, guard) = tracing_appender::non_blocking(appender);
                    guards.push(guard);
                    Ok(file_layer(config, writer))
                }
            }
        })
        .collect::<Result<Vec<_>, _>>()?;

    tracing_subscriber::registry()
        .with(filter)
        .with(layers)
        .try_init()
        .map_err(|e| LoggingError::InvalidConfig(e.to_string()))?;

    Ok(guards)
}

fn stdout_layer<S>(config: &LogConfig) -> BoxedLayer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    let layer = fmt::layer()
        .with_file(config.with_source)
        .with_line_number(config.with_source)
        .with_thread_ids(config.with_source);

    match config.format {
        LogFormat::Json => layer.json().flatten_event(true).boxed(),
        LogFormat::Pretty => layer.pretty().boxed(),
    }
}

fn file_layer<S>(config: &LogConfig, writer: NonBlocking) -> BoxedLayer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_file(config.with_source)
        .with_line_number(config.with_source)
        .with_thread_ids(config.with_source)
        .json()
        .flatten_event(true)
        .boxed()
}

const fn appender_rotation(rotation: Rotation) -> AppenderRotation {
    match rotation {
        Rotation::Hourly => AppenderRotation::HOURLY,
        Rotation::Daily => AppenderRotation::DAILY,
        Rotation::Never => AppenderRotation::NEVER,
    }
}

/// Errors that can occur during logging initialization.
#[derive(Debug, thiserror::Error)]
pub enum LoggingError {
    /// Failed to create log directory
    #[error("Failed to create log directory: {0}")]
    DirectoryCreation(#[from] std::io::Error),

    /// Invalid configuration, or a global subscriber is already installed
    #[error("Invalid logging configuration: {0}")]
    InvalidConfig(String),
}

//! # Logger
//!
//! Installs the process-wide `tracing` subscriber for fanout binaries.
//!
//! * Compact console output and/or a rolling log file written through a
//!   non-blocking worker.
//! * Filters come from the configured level, an optional directive string
//!   (e.g., `"fanout_pubsub=debug,info"`) and `RUST_LOG`.
//! * Settings can be given through [`LoggerBuilder`] or deserialized into a
//!   [`LoggerConfig`] and applied with [`Logger::from_config`].
//!
//! ## Example
//!
//! ```rust
//! use fanout_logger::{LevelFilter, Logger};
//!
//! let _logger = Logger::builder()
//!     .name("fanout-demo")
//!     .console(true)
//!     .level(LevelFilter::DEBUG)
//!     .init()
//!     .unwrap();
//! ```

mod error;

pub use crate::error::{LoggerError, LoggerErrorExt};
pub use tracing::level_filters::LevelFilter;
pub use tracing_appender::rolling::Rotation;

use serde::Deserialize;
use std::fs;
use std::path::PathBuf;
use std::str::FromStr;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::RollingFileAppender;
use tracing_subscriber::fmt::layer;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

const DEFAULT_MAX_FILES: usize = 10;
const LOG_FILE_SUFFIX: &str = "log";

/// How often the log file rolls over.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RotationPolicy {
    Minutely,
    Hourly,
    #[default]
    Daily,
    Never,
}

impl From<RotationPolicy> for Rotation {
    fn from(policy: RotationPolicy) -> Self {
        match policy {
            RotationPolicy::Minutely => Self::MINUTELY,
            RotationPolicy::Hourly => Self::HOURLY,
            RotationPolicy::Daily => Self::DAILY,
            RotationPolicy::Never => Self::NEVER,
        }
    }
}

/// Deserializable logger settings, e.g. the `[logger]` table of a config file.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct LoggerConfig {
    /// Default level (`trace`, `debug`, `info`, `warn`, `error`, `off`).
    pub level: String,
    pub console: bool,
    /// Directory for rolling log files; file output is off when absent.
    pub directory: Option<PathBuf>,
    pub rotation: RotationPolicy,
    pub max_files: usize,
    /// Write file output as JSON lines.
    pub json: bool,
    /// Extra filter directives layered over `level`.
    pub filter: Option<String>,
}

impl Default for LoggerConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            console: true,
            directory: None,
            rotation: RotationPolicy::Daily,
            max_files: DEFAULT_MAX_FILES,
            json: false,
            filter: None,
        }
    }
}

/// A builder for configuring and initializing the global tracing subscriber.
#[derive(Debug)]
pub struct LoggerBuilder {
    name: String,
    console: bool,
    directory: Option<PathBuf>,
    level: LevelFilter,
    rotation: Rotation,
    max_files: usize,
    json: bool,
    env_filter: Option<String>,
}

impl LoggerBuilder {
    /// Sets the name used as the log file prefix.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Configures the minimum log level to be emitted.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn level(mut self, level: LevelFilter) -> Self {
        self.level = level;
        self
    }

    /// Adds explicit filter directives (e.g., `fanout_pubsub=debug`).
    ///
    /// `RUST_LOG` is ignored when directives are set. Invalid directives make
    /// [`LoggerBuilder::init`] fail.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn env_filter(mut self, filter: impl Into<String>) -> Self {
        self.env_filter = Some(filter.into());
        self
    }

    /// Enables or disables console output.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn console(mut self, enabled: bool) -> Self {
        self.console = enabled;
        self
    }

    /// Writes rolling log files into `directory`.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.directory = Some(directory.into());
        self
    }

    /// Configures the log file rotation strategy.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    /// Configures the maximum number of log files to keep.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn max_files(mut self, max: usize) -> Self {
        self.max_files = max;
        self
    }

    /// Writes file output as JSON lines.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub const fn json(mut self, enabled: bool) -> Self {
        self.json = enabled;
        self
    }

    /// Consumes the builder and installs the global tracing subscriber.
    ///
    /// The returned [`Logger`] owns the file writer's [`WorkerGuard`]; keep it alive
    /// until shutdown so buffered lines are flushed.
    ///
    /// # Errors
    /// Returns [`LoggerError::Subscriber`] if a global subscriber is already set,
    /// [`LoggerError::InvalidConfiguration`] for invalid settings, and
    /// [`LoggerError::Appender`] or [`LoggerError::Internal`] if the log directory
    /// cannot be prepared.
    pub fn init(self) -> Result<Logger, LoggerError> {
        self.validate()?;

        let env_filter = self.build_env_filter()?;
        let mut layers = Vec::new();

        if self.console {
            layers.push(layer().compact().with_ansi(true).boxed());
        }

        let guard = if let Some(directory) = &self.directory {
            fs::create_dir_all(directory).map_err(|e| LoggerError::Internal {
                message: e.to_string().into(),
                context: Some(format!("Failed to create path: {}", directory.display()).into()),
            })?;

            let appender = RollingFileAppender::builder()
                .rotation(self.rotation.clone())
                .filename_prefix(&self.name)
                .filename_suffix(LOG_FILE_SUFFIX)
                .max_log_files(self.max_files)
                .build(directory)?;

            let (writer, guard) = tracing_appender::non_blocking(appender);
            let file_layer = layer().with_writer(writer).with_ansi(false);
            layers.push(if self.json { file_layer.json().boxed() } else { file_layer.boxed() });
            Some(guard)
        } else {
            None
        };

        if layers.is_empty() {
            return Err(LoggerError::InvalidConfiguration {
                message: "No logging layers enabled. Enable console or file output.".into(),
                context: None,
            });
        }

        tracing_subscriber::registry().with(env_filter).with(layers).try_init()?;

        Ok(Logger { guard })
    }

    fn validate(&self) -> Result<(), LoggerError> {
        if self.name.trim().is_empty() {
            return Err(LoggerError::InvalidConfiguration {
                message: "Logger name cannot be empty".into(),
                context: None,
            });
        }
        if self.max_files == 0 {
            return Err(LoggerError::InvalidConfiguration {
                message: "max_files must be greater than zero".into(),
                context: None,
            });
        }
        Ok(())
    }

    fn build_env_filter(&self) -> Result<EnvFilter, LoggerError> {
        let builder = EnvFilter::builder().with_default_directive(self.level.into());
        self.env_filter.as_ref().map_or_else(
            || Ok(builder.from_env_lossy()),
            |filter| {
                builder.parse(filter).map_err(|e| LoggerError::InvalidConfiguration {
                    message: format!("Invalid env filter '{filter}': {e}").into(),
                    context: None,
                })
            },
        )
    }
}

/// A handle to the initialized logging system.
///
/// Holds the background writer guard. Drop it only when the application is
/// shutting down.
#[must_use = "Dropping this handle will stop background logging threads."]
#[derive(Debug)]
pub struct Logger {
    guard: Option<WorkerGuard>,
}

impl Logger {
    /// Returns a [`LoggerBuilder`] with console output at `INFO`.
    #[must_use = "The builder must be configured before it can be used to initialize the logger."]
    pub fn builder() -> LoggerBuilder {
        LoggerBuilder {
            name: String::new(),
            console: true,
            directory: None,
            level: LevelFilter::INFO,
            rotation: Rotation::DAILY,
            max_files: DEFAULT_MAX_FILES,
            json: false,
            env_filter: None,
        }
    }

    /// Builds a [`LoggerBuilder`] from deserialized settings.
    ///
    /// # Errors
    /// Returns [`LoggerError::InvalidConfiguration`] if `config.level` is not a level name.
    pub fn builder_from_config(
        name: impl Into<String>,
        config: &LoggerConfig,
    ) -> Result<LoggerBuilder, LoggerError> {
        let level =
            LevelFilter::from_str(&config.level).map_err(|e| LoggerError::InvalidConfiguration {
                message: format!("Invalid level '{}': {e}", config.level).into(),
                context: None,
            })?;

        let mut builder = Self::builder()
            .name(name)
            .level(level)
            .console(config.console)
            .rotation(config.rotation.into())
            .max_files(config.max_files)
            .json(config.json);
        if let Some(directory) = &config.directory {
            builder = builder.directory(directory);
        }
        if let Some(filter) = &config.filter {
            builder = builder.env_filter(filter);
        }
        Ok(builder)
    }

    /// Installs the global subscriber described by `config`.
    ///
    /// # Errors
    /// See [`Logger::builder_from_config`] and [`LoggerBuilder::init`].
    pub fn from_config(name: impl Into<String>, config: &LoggerConfig) -> Result<Self, LoggerError> {
        Self::builder_from_config(name, config)?.init()
    }

    /// Best-effort synchronization point before shutdown.
    pub fn flush(&self) {
        tracing::debug!("Logger flushed");
    }

    /// Whether a file writer is attached.
    #[must_use]
    pub const fn has_file_output(&self) -> bool {
        self.guard.is_some()
    }
}

impl Drop for Logger {
    fn drop(&mut self) {
        if self.guard.is_some() {
            tracing::info!("Logging system shutting down, flushing buffers...");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_initial_state() {
        let builder = Logger::builder().name("test-app").env_filter("fanout=debug");
        assert!(builder.console);
        assert_eq!(builder.level, LevelFilter::INFO);
        assert_eq!(builder.env_filter.as_deref(), Some("fanout=debug"));
        assert!(builder.directory.is_none());
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = Logger::builder().init().expect_err("unnamed logger must be rejected");
        assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_no_layers_rejected() {
        let err = Logger::builder().name("silent").console(false).init().expect_err("no output");
        assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_builder_from_config() {
        let config: LoggerConfig = serde_json::from_str(
            r#"{"level": "debug", "directory": "/tmp/fanout", "rotation": "hourly", "max_files": 3}"#,
        )
        .unwrap();

        let builder = Logger::builder_from_config("demo", &config).unwrap();
        assert_eq!(builder.name, "demo");
        assert_eq!(builder.level, LevelFilter::DEBUG);
        assert_eq!(builder.max_files, 3);
        assert_eq!(builder.rotation, Rotation::HOURLY);
        assert_eq!(builder.directory.as_deref(), Some(std::path::Path::new("/tmp/fanout")));
    }

    #[test]
    fn test_invalid_level_rejected() {
        let config = LoggerConfig { level: "loud".to_owned(), ..LoggerConfig::default() };
        let err = Logger::builder_from_config("demo", &config).expect_err("bad level");
        assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));
    }

    #[test]
    fn test_invalid_filter_rejected() {
        let err = Logger::builder()
            .name("filtered")
            .env_filter("fanout=loud")
            .init()
            .expect_err("malformed directive");
        assert!(matches!(err, LoggerError::InvalidConfiguration { .. }));
    }
}

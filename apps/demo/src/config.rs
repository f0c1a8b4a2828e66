use config::{Config, Environment, File};
use fanout_logger::LoggerConfig;
use fanout_pubsub::{DEFAULT_INBOX_CAPACITY, SubscribeOptions, Topic};
use serde::Deserialize;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::info;

/// Prefix of environment overrides, e.g. `FANOUT__MESSAGES=50`.
pub const ENV_PREFIX: &str = "FANOUT";

/// Base name of the config file probed when no path is given.
pub const DEFAULT_CONFIG_FILE: &str = "fanout";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config error{}: {source}", format_context(.context))]
    Config {
        #[source]
        source: config::ConfigError,
        context: Option<Cow<'static, str>>,
    },
}

trait ConfigResultExt<T> {
    fn context(self, context: &'static str) -> Result<T, ConfigError>;
}

impl<T> ConfigResultExt<T> for Result<T, config::ConfigError> {
    fn context(self, context: &'static str) -> Result<T, ConfigError> {
        self.map_err(|source| ConfigError::Config { source, context: Some(Cow::Borrowed(context)) })
    }
}

fn format_context(context: &Option<Cow<'static, str>>) -> Cow<'static, str> {
    context.as_ref().map_or(Cow::Borrowed(""), |c| Cow::Owned(format!(" ({c})")))
}

/// Whole-run settings for the demo workload.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct DemoConfig {
    pub logger: LoggerConfig,
    /// Values published to each topic.
    pub messages: usize,
    pub topics: Vec<TopicConfig>,
}

impl Default for DemoConfig {
    fn default() -> Self {
        Self {
            logger: LoggerConfig::default(),
            messages: 10,
            topics: vec![TopicConfig {
                name: Topic::new("orders"),
                subscribers: 2,
                max_concurrency: 2,
                inbox_capacity: DEFAULT_INBOX_CAPACITY,
                work_ms: 50,
            }],
        }
    }
}

/// One topic and the subscribers the demo attaches to it.
#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TopicConfig {
    pub name: Topic,
    #[serde(default = "default_subscribers")]
    pub subscribers: usize,
    /// `0` leaves each subscriber unbounded.
    #[serde(default)]
    pub max_concurrency: usize,
    #[serde(default = "default_inbox_capacity")]
    pub inbox_capacity: usize,
    /// Simulated handler latency in milliseconds.
    #[serde(default)]
    pub work_ms: u64,
}

impl TopicConfig {
    #[must_use]
    pub const fn options(&self) -> SubscribeOptions {
        SubscribeOptions::new().with_max_concurrency(self.max_concurrency)
    }
}

const fn default_subscribers() -> usize {
    1
}

const fn default_inbox_capacity() -> usize {
    DEFAULT_INBOX_CAPACITY
}

/// Loads [`DemoConfig`] from a TOML file overlaid with `FANOUT__*` environment variables.
///
/// An explicit `path` must exist. Without one, `fanout.toml` in the working directory is
/// used when present and the built-in defaults otherwise.
///
/// # Errors
/// Returns [`ConfigError`] if the file is missing or malformed, or if the merged
/// settings do not match [`DemoConfig`].
pub fn load_config(path: Option<&Path>) -> Result<DemoConfig, ConfigError> {
    let (effective_path, required) = path.map_or_else(
        || (PathBuf::from(DEFAULT_CONFIG_FILE), false),
        |p| (p.to_path_buf(), true),
    );

    let builder = Config::builder()
        .add_source(File::from(effective_path.as_path()).required(required))
        .add_source(
            Environment::with_prefix(ENV_PREFIX)
                .separator("__")
                .convert_case(config::Case::Snake),
        );

    info!("Loading config from {}", effective_path.display());

    builder
        .build()
        .context("Failed to build config")?
        .try_deserialize::<DemoConfig>()
        .context("Failed to deserialize config")
}

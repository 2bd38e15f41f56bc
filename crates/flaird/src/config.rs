//! Configuration file parsing and structures.
//!
//! flaird uses a single TOML file: logging, the HTTP API listener, the two
//! poll cadences and one section per integration.

use serde::Deserialize;
use serde::Serialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::filter::Targets;

#[cfg(feature = "integration_flair")]
use crate::integrations::flair::FlairConfig;

/// Top-level configuration structure
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub polling: PollingConfig,
    #[serde(default)]
    pub integrations: IntegrationsConfig,
}

#[derive(Debug, Default, Deserialize, Serialize, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    Trace,
    Debug,
    #[default]
    Info,
    Warn,
    Error,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Trace => LevelFilter::TRACE,
            LogLevel::Debug => LevelFilter::DEBUG,
            LogLevel::Info => LevelFilter::INFO,
            LogLevel::Warn => LevelFilter::WARN,
            LogLevel::Error => LevelFilter::ERROR,
        }
    }
}

#[derive(Debug, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level: trace, debug, info, warn, error
    #[serde(default)]
    pub level: LogLevel,

    /// Per-target levels, e.g. `"flaird::integrations::flair" = "debug"`
    #[serde(default)]
    pub overrides: HashMap<String, LogLevel>,
}

impl LoggingConfig {
    /// Build the subscriber filter from the default level and overrides
    pub fn filter(&self) -> Targets {
        Targets::new()
            .with_default(LevelFilter::from(self.level))
            .with_targets(
                self.overrides
                    .iter()
                    .map(|(target, level)| (target.clone(), LevelFilter::from(*level))),
            )
    }
}

fn default_listen() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8565
}

/// HTTP API listener
#[derive(Debug, Deserialize)]
pub struct ApiConfig {
    #[serde(default = "default_listen")]
    pub listen: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            listen: default_listen(),
            port: default_port(),
        }
    }
}

fn default_short_poll_secs() -> u64 {
    60
}

fn default_long_poll_secs() -> u64 {
    300
}

/// Poll cadences delivered to every integration
#[derive(Debug, Deserialize)]
pub struct PollingConfig {
    /// Fast cadence: refresh observed state
    #[serde(default = "default_short_poll_secs")]
    pub short_poll_secs: u64,

    /// Slow cadence: heartbeat and credential renewal
    #[serde(default = "default_long_poll_secs")]
    pub long_poll_secs: u64,
}

impl Default for PollingConfig {
    fn default() -> Self {
        Self {
            short_poll_secs: default_short_poll_secs(),
            long_poll_secs: default_long_poll_secs(),
        }
    }
}

impl PollingConfig {
    pub fn short_poll(&self) -> Duration {
        Duration::from_secs(self.short_poll_secs.max(1))
    }

    pub fn long_poll(&self) -> Duration {
        Duration::from_secs(self.long_poll_secs.max(1))
    }
}

/// Integration configuration container
#[derive(Debug, Default, Deserialize)]
pub struct IntegrationsConfig {
    /// Flair smart vent integration
    #[cfg(feature = "integration_flair")]
    #[serde(default)]
    pub flair: Option<FlairConfig>,
}

impl IntegrationsConfig {
    /// Custom parameters handed to an integration through its `Config` hook
    pub fn custom_params(&self, integration_name: &str) -> Option<HashMap<String, String>> {
        match integration_name {
            #[cfg(feature = "integration_flair")]
            "flair" => self.flair.as_ref().map(FlairConfig::custom_params),
            _ => None,
        }
    }
}

impl Config {
    /// Load configuration from a TOML file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path.as_ref())
            .map_err(|e| ConfigError::Io(path.as_ref().to_path_buf(), e))?;

        toml::from_str(&contents).map_err(ConfigError::Parse)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {0}: {1}")]
    Io(PathBuf, #[source] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),
}

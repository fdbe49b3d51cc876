//! Client settings.
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML file,
//! `MERKLE_COURIER_*` environment variables (nested keys split on `__`) and
//! finally `SERVER_URL`.

use ::config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::{path::Path, time::Duration};

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";
pub const DEFAULT_BATCH_SIZE: usize = 4000;
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_millis(100);
pub const DEFAULT_RETRY_TIMEOUT: Duration = Duration::from_secs(30);

const ENV_PREFIX: &str = "MERKLE_COURIER";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_server_url")]
    pub server_url: String,
    #[serde(default)]
    pub transport: TransportConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Batch sizing and retry budget for uploads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportConfig {
    /// Items per batch at the first attempt for every offset
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// Pause between a failed attempt and the retry
    #[serde(default = "default_retry_interval", rename = "retry_interval_ms", with = "millis")]
    pub retry_interval: Duration,
    /// Wall-clock budget for a single offset, measured from its first attempt
    #[serde(default = "default_retry_timeout", rename = "retry_timeout_ms", with = "millis")]
    pub retry_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive, e.g. `info` or `merkle_courier=debug`
    #[serde(default = "default_log_level")]
    pub level: String,
    #[serde(default)]
    pub json: bool,
}

fn default_server_url() -> String {
    DEFAULT_SERVER_URL.to_string()
}

fn default_batch_size() -> usize {
    DEFAULT_BATCH_SIZE
}

fn default_retry_interval() -> Duration {
    DEFAULT_RETRY_INTERVAL
}

fn default_retry_timeout() -> Duration {
    DEFAULT_RETRY_TIMEOUT
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            server_url: default_server_url(),
            transport: TransportConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for TransportConfig {
    fn default() -> Self {
        TransportConfig {
            batch_size: DEFAULT_BATCH_SIZE,
            retry_interval: DEFAULT_RETRY_INTERVAL,
            retry_timeout: DEFAULT_RETRY_TIMEOUT,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        LoggingConfig {
            level: default_log_level(),
            json: false,
        }
    }
}

impl Settings {
    /// Loads settings from the process environment and an optional file
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();

        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(false));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        if let Ok(server_url) = std::env::var("SERVER_URL") {
            if !server_url.is_empty() {
                builder = builder.set_override("server_url", server_url)?;
            }
        }

        builder.build()?.try_deserialize()
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let millis = u64::try_from(duration.as_millis()).map_err(serde::ser::Error::custom)?;
        serializer.serialize_u64(millis)
    }

    pub fn deserialize<'de, D>(d: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

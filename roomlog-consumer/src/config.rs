//! Consumer configuration.
//!
//! Shares the `[log]` and `[logging]` sections with the producer and adds
//! a `[consumer]` section.

use roomlog_core::DEFAULT_REDELIVERY_WINDOW;
use roomlog_log::{load_toml, ConfigError, LogConfig, LoggingConfig};
use serde::Deserialize;
use std::path::Path;

/// Root configuration for a consumer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConsumerConfig {
    /// Output log configuration.
    #[serde(default)]
    pub log: LogConfig,
    /// Consumer behaviour.
    #[serde(default)]
    pub consumer: ConsumerSettings,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl ConsumerConfig {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if
    /// `batch_size` is zero.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let config: Self = load_toml(path)?;
        if config.consumer.batch_size == 0 {
            return Err(ConfigError::Invalid {
                path: path.to_path_buf(),
                reason: "consumer.batch_size must be at least 1".to_string(),
            });
        }
        Ok(config)
    }
}

/// The `[consumer]` section.
#[derive(Debug, Clone, Deserialize)]
pub struct ConsumerSettings {
    /// Name used in log output (default: "consumer").
    #[serde(default = "default_name")]
    pub name: String,
    /// Records read from the log per poll (default: 100). Must be at
    /// least 1.
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,
    /// What to do with a record that cannot be applied (default: skip).
    #[serde(default)]
    pub error_policy: ErrorPolicy,
    /// Recently applied events remembered per room to recognise
    /// redelivered records (default: 1024).
    #[serde(default = "default_redelivery_window")]
    pub redelivery_window: usize,
}

fn default_name() -> String {
    "consumer".to_string()
}

fn default_batch_size() -> usize {
    100
}

fn default_redelivery_window() -> usize {
    DEFAULT_REDELIVERY_WINDOW
}

impl Default for ConsumerSettings {
    fn default() -> Self {
        Self {
            name: default_name(),
            batch_size: default_batch_size(),
            error_policy: ErrorPolicy::default(),
            redelivery_window: default_redelivery_window(),
        }
    }
}

/// Handling of records that are malformed or cannot be applied.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ErrorPolicy {
    /// Log the record and move past it.
    #[default]
    Skip,
    /// Stop on the record; the read offset stays on it.
    Halt,
}

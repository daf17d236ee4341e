//! Configuration shared by the producer and consumers.
//!
//! Both sides load their configuration from TOML files with [`load_toml`].
//! Every field here has a default.

use roomlog_types::Codec;
use serde::de::DeserializeOwned;
use serde::Deserialize;
use std::path::{Path, PathBuf};

/// Output log configuration. Producer and consumers must agree on it.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct LogConfig {
    /// Record encoding: `"json"` or `"msgpack"` (default: json).
    #[serde(default)]
    pub codec: Codec,
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `tracing` filter directive, e.g. `"info,roomlog_producer=debug"`
    /// (default: info). `RUST_LOG` is not consulted.
    #[serde(default = "default_filter")]
    pub filter: String,
}

fn default_filter() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
        }
    }
}

/// Read and parse a TOML configuration file.
pub fn load_toml<T: DeserializeOwned>(path: &Path) -> Result<T, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    toml::from_str(&content).map_err(|e| ConfigError::ParseError {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Configuration error types.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file {path}: {source}")]
    ReadError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },
    /// Failed to parse configuration file.
    #[error("failed to parse config file {path}: {source}")]
    ParseError {
        /// Path to the configuration file.
        path: PathBuf,
        /// Underlying TOML parse error.
        source: toml::de::Error,
    },
    /// The file parsed but a value is out of range.
    #[error("invalid config file {path}: {reason}")]
    Invalid {
        /// Path to the configuration file.
        path: PathBuf,
        /// What is wrong with it.
        reason: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[derive(Debug, Deserialize)]
    struct Sample {
        #[serde(default)]
        log: LogConfig,
        #[serde(default)]
        logging: LoggingConfig,
    }

    #[test]
    fn sections_from_toml_string() {
        let sample: Sample =
            toml::from_str("[log]\ncodec = \"msgpack\"\n\n[logging]\nfilter = \"debug\"\n").unwrap();
        assert_eq!(sample.log.codec, Codec::MessagePack);
        assert_eq!(sample.logging.filter, "debug");
    }

    #[test]
    fn empty_sections_use_defaults() {
        let sample: Sample = toml::from_str("").unwrap();
        assert_eq!(sample.log.codec, Codec::Json);
        assert_eq!(sample.logging.filter, "info");
    }

    #[test]
    fn unknown_codec_is_rejected() {
        assert!(toml::from_str::<Sample>("[log]\ncodec = \"xml\"\n").is_err());
    }

    #[test]
    fn load_toml_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[log]\ncodec = \"json\"").unwrap();
        let sample: Sample = load_toml(file.path()).unwrap();
        assert_eq!(sample.log.codec, Codec::Json);
    }

    #[test]
    fn load_toml_missing_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_toml::<Sample>(&dir.path().join("absent.toml")).unwrap_err();
        assert!(matches!(err, ConfigError::ReadError { .. }));
    }

    #[test]
    fn load_toml_invalid_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[log\ncodec =").unwrap();
        let err = load_toml::<Sample>(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }
}

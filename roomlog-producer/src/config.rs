//! Configuration loading for the producer.
//!
//! Configuration is loaded from a TOML file. Every section and field has a
//! default, so an empty file is a valid configuration.

use roomlog_log::{load_toml, ConfigError, LogConfig, LoggingConfig};
use serde::Deserialize;
use std::path::Path;

/// Root configuration for the producer.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    /// Output log configuration.
    #[serde(default)]
    pub log: LogConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        load_toml(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roomlog_types::Codec;
    use std::io::Write;

    #[test]
    fn default_config_is_valid() {
        let config = Config::default();
        assert_eq!(config.log.codec, Codec::Json);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn config_from_toml_string() {
        let toml = r#"
[log]
codec = "msgpack"

[logging]
filter = "debug"
"#;
        let config: Config = toml::from_str(toml).unwrap();
        assert_eq!(config.log.codec, Codec::MessagePack);
        assert_eq!(config.logging.filter, "debug");
    }

    #[test]
    fn empty_config_uses_defaults() {
        let config: Config = toml::from_str("").unwrap();
        assert_eq!(config.log.codec, Codec::Json);
        assert_eq!(config.logging.filter, "info");
    }

    #[test]
    fn from_file_reads_toml() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[log]\ncodec = \"msgpack\"").unwrap();
        let config = Config::from_file(file.path()).unwrap();
        assert_eq!(config.log.codec, Codec::MessagePack);
    }

    #[test]
    fn from_file_invalid_is_parse_error() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[log\ncodec =").unwrap();
        let err = Config::from_file(file.path()).unwrap_err();
        assert!(matches!(err, ConfigError::ParseError { .. }));
    }
}

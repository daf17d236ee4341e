//! Tracing subscriber setup.

use crate::config::LoggingConfig;
use tracing_subscriber::EnvFilter;

/// Install a global `fmt` subscriber filtered by `config.filter`.
///
/// An unparsable filter falls back to `info`. Returns `false` if a global
/// subscriber was already installed, which is expected in tests and when
/// the host process configures tracing itself.
pub fn init_tracing(config: &LoggingConfig) -> bool {
    let (filter, rejected) = match EnvFilter::try_new(&config.filter) {
        Ok(filter) => (filter, None),
        Err(e) => (EnvFilter::new("info"), Some(e)),
    };

    let installed = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .try_init()
        .is_ok();

    if let Some(e) = rejected {
        tracing::warn!(filter = %config.filter, error = %e, "Invalid log filter, using info");
    }
    installed
}

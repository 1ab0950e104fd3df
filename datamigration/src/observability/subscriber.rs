//! Installation of the global `tracing` subscriber.

use crate::config::LoggingConfig;
use crate::errors::ConfigError;
use tracing_subscriber::EnvFilter;

/// Builds the filter: `RUST_LOG` wins, the configured level otherwise.
///
/// # Errors
///
/// Returns an error if the configured level is not a valid filter directive.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, ConfigError> {
    match EnvFilter::try_from_default_env() {
        Ok(filter) => Ok(filter),
        Err(_) => EnvFilter::try_new(&config.level)
            .map_err(|e| ConfigError::invalid("logging.level", e.to_string())),
    }
}

/// Installs a formatted subscriber for the whole process.
///
/// # Errors
///
/// Returns an error if the level is invalid or a global subscriber is
/// already installed.
pub fn init_tracing(config: &LoggingConfig) -> Result<(), ConfigError> {
    let filter = build_filter(config)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = if config.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    };

    installed.map_err(|e| ConfigError::Logging(e.to_string()))
}

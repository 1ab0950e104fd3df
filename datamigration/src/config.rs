//! Configuration for migration runs.

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Number of records copied per page unless configured otherwise.
pub const DEFAULT_PAGE_SIZE: usize = 50;

/// Top-level configuration.
///
/// Every field has a default, so `{}` is a valid document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MigrationConfig {
    /// Records requested from the source per page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
    /// Where run status is persisted.
    #[serde(default)]
    pub status_store: StatusStoreConfig,
    /// Logging setup.
    #[serde(default)]
    pub logging: LoggingConfig,
}

fn default_page_size() -> usize {
    DEFAULT_PAGE_SIZE
}

impl Default for MigrationConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
            status_store: StatusStoreConfig::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl MigrationConfig {
    /// Creates a configuration with defaults.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Sets the status store backend.
    #[must_use]
    pub fn with_status_store(mut self, status_store: StatusStoreConfig) -> Self {
        self.status_store = status_store;
        self
    }

    /// Parses and validates a JSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if the document is malformed or fails validation.
    pub fn from_json_str(json: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read, is malformed or fails
    /// validation.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path)?;
        Self::from_json_str(&contents)
    }

    /// Validates field values.
    ///
    /// # Errors
    ///
    /// Returns an error naming the first invalid field.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.page_size == 0 {
            return Err(ConfigError::invalid(
                "page_size",
                "must be greater than zero",
            ));
        }
        if let StatusStoreConfig::File { directory } = &self.status_store {
            if directory.as_os_str().is_empty() {
                return Err(ConfigError::invalid(
                    "status_store.directory",
                    "must not be empty",
                ));
            }
        }
        if self.logging.level.trim().is_empty() {
            return Err(ConfigError::invalid("logging.level", "must not be empty"));
        }
        Ok(())
    }
}

/// Status store backend selection.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StatusStoreConfig {
    /// Process memory; lost on exit.
    #[default]
    Memory,
    /// One JSON document per run under `directory`.
    File {
        /// Directory holding the run documents.
        directory: PathBuf,
    },
}

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Filter directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Emit JSON lines instead of human-readable output.
    #[serde(default)]
    pub json: bool,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            json: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_empty_document_uses_defaults() {
        let config = MigrationConfig::from_json_str("{}").unwrap();
        assert_eq!(config, MigrationConfig::default());
        assert_eq!(config.page_size, 50);
        assert_eq!(config.status_store, StatusStoreConfig::Memory);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn test_full_document() {
        let config = MigrationConfig::from_json_str(
            r#"{
                "page_size": 200,
                "status_store": {"kind": "file", "directory": "/var/lib/migration"},
                "logging": {"level": "debug", "json": true}
            }"#,
        )
        .unwrap();

        assert_eq!(config.page_size, 200);
        assert_eq!(
            config.status_store,
            StatusStoreConfig::File {
                directory: PathBuf::from("/var/lib/migration")
            }
        );
        assert!(config.logging.json);
    }

    #[test]
    fn test_zero_page_size_rejected() {
        let err = MigrationConfig::from_json_str(r#"{"page_size": 0}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref field, .. } if field == "page_size"));
    }

    #[test]
    fn test_empty_directory_rejected() {
        let config = MigrationConfig::new().with_status_store(StatusStoreConfig::File {
            directory: PathBuf::new(),
        });
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_malformed_document() {
        let err = MigrationConfig::from_json_str("{page_size:").unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("migration.json");
        std::fs::write(&path, r#"{"page_size": 10}"#).unwrap();

        let config = MigrationConfig::from_file(&path).unwrap();
        assert_eq!(config.page_size, 10);

        let missing = MigrationConfig::from_file(dir.path().join("absent.json"));
        assert!(matches!(missing, Err(ConfigError::Io(_))));
    }
}

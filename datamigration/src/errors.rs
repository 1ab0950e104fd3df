//! Error types for the migration engine.
//!
//! Steps only ever convert [`DataAccessError`] into a FAILED step. Every other
//! error in this module is an invariant or configuration violation and
//! propagates out of the driver untouched.

use crate::core::StepName;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Convenient result alias using [`MigrationError`] as the default error.
pub type Result<T, E = MigrationError> = std::result::Result<T, E>;

/// The main error type for migration operations.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The status store holds no aggregate for the run being updated.
    #[error("Invalid migration status: no status record exists for run {run_id}")]
    InvalidMigrationStatus {
        /// The run whose aggregate is missing.
        run_id: Uuid,
    },

    /// The resolver has no step registered under this name.
    #[error("Unknown step: {0}")]
    UnknownStep(StepName),

    /// The migration plan failed validation.
    #[error("{0}")]
    InvalidPlan(#[from] PlanValidationError),

    /// The status store failed.
    #[error("{0}")]
    Store(#[from] StoreError),

    /// The configuration is unreadable or invalid.
    #[error("{0}")]
    Config(#[from] ConfigError),

    /// A data-access failure surfaced outside a step.
    #[error("{0}")]
    DataAccess(#[from] DataAccessError),

    /// A generic internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl MigrationError {
    /// Creates an invalid migration status error.
    #[must_use]
    pub fn invalid_status(run_id: Uuid) -> Self {
        Self::InvalidMigrationStatus { run_id }
    }
}

/// Category of a data-access failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataAccessKind {
    /// The database could not be reached or the connection dropped.
    Connectivity,
    /// A constraint was violated on write.
    Constraint,
    /// A row could not be mapped to or from the database representation.
    Serialization,
    /// Anything else reported by the storage layer.
    Other,
}

impl fmt::Display for DataAccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Connectivity => write!(f, "connectivity"),
            Self::Constraint => write!(f, "constraint"),
            Self::Serialization => write!(f, "serialization"),
            Self::Other => write!(f, "other"),
        }
    }
}

/// Which side of the copy reported a failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DataTarget {
    /// The legacy database being read.
    Source,
    /// The replacement database being written.
    Destination,
}

impl fmt::Display for DataTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Source => write!(f, "source"),
            Self::Destination => write!(f, "destination"),
        }
    }
}

/// An unrecoverable failure reported by a paged reader or bulk writer.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{target} {kind} failure: {message}")]
pub struct DataAccessError {
    /// The failure category.
    pub kind: DataAccessKind,
    /// The side that failed.
    pub target: DataTarget,
    /// Driver-level detail.
    pub message: String,
}

impl DataAccessError {
    /// Creates a new data-access error.
    #[must_use]
    pub fn new(kind: DataAccessKind, target: DataTarget, message: impl Into<String>) -> Self {
        Self {
            kind,
            target,
            message: message.into(),
        }
    }

    /// Creates an error raised while reading the source.
    #[must_use]
    pub fn reading(kind: DataAccessKind, message: impl Into<String>) -> Self {
        Self::new(kind, DataTarget::Source, message)
    }

    /// Creates an error raised while writing the destination.
    #[must_use]
    pub fn writing(kind: DataAccessKind, message: impl Into<String>) -> Self {
        Self::new(kind, DataTarget::Destination, message)
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("kind".to_string(), serde_json::json!(self.kind.to_string()));
        map.insert("target".to_string(), serde_json::json!(self.target.to_string()));
        map.insert("message".to_string(), serde_json::json!(self.message));
        map
    }
}

/// Errors raised by a status store backend.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Reading or writing the backing medium failed.
    #[error("Status store IO error: {0}")]
    Io(#[from] std::io::Error),

    /// An aggregate could not be encoded or decoded.
    #[error("Status store serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Backend-specific failure.
    #[error("Status store backend error: {0}")]
    Backend(String),
}

/// Errors raised while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration file could not be read.
    #[error("Could not read configuration: {0}")]
    Io(#[from] std::io::Error),

    /// The configuration document is malformed.
    #[error("Could not parse configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// A field holds an unusable value.
    #[error("Invalid configuration for '{field}': {reason}")]
    Invalid {
        /// The offending field.
        field: String,
        /// Why the value was rejected.
        reason: String,
    },

    /// The logging subscriber could not be installed.
    #[error("Could not initialize logging: {0}")]
    Logging(String),
}

impl ConfigError {
    /// Creates an invalid field error.
    #[must_use]
    pub fn invalid(field: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Invalid {
            field: field.into(),
            reason: reason.into(),
        }
    }
}

/// Error raised when a migration plan fails validation.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct PlanValidationError {
    /// The error message.
    pub message: String,
    /// The steps involved in the error.
    pub steps: Vec<String>,
    /// Stable error code (e.g. "PLAN-CYCLE").
    pub code: String,
    /// Hint for fixing the error.
    pub fix_hint: Option<String>,
}

impl PlanValidationError {
    /// Creates a new plan validation error.
    #[must_use]
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            steps: Vec::new(),
            code: code.into(),
            fix_hint: None,
        }
    }

    /// Sets the steps involved.
    #[must_use]
    pub fn with_steps(mut self, steps: Vec<String>) -> Self {
        self.steps = steps;
        self
    }

    /// Sets the fix hint.
    #[must_use]
    pub fn with_fix_hint(mut self, hint: impl Into<String>) -> Self {
        self.fix_hint = Some(hint.into());
        self
    }

    /// Converts to a dictionary representation.
    #[must_use]
    pub fn to_dict(&self) -> HashMap<String, serde_json::Value> {
        let mut map = HashMap::new();
        map.insert("code".to_string(), serde_json::json!(self.code));
        map.insert("message".to_string(), serde_json::json!(self.message));
        map.insert("steps".to_string(), serde_json::json!(self.steps));
        if let Some(ref hint) = self.fix_hint {
            map.insert("fix_hint".to_string(), serde_json::json!(hint));
        }
        map
    }
}

/// Error raised when the transition table loops back on itself.
#[derive(Debug, Clone, Error)]
#[error("Cycle detected in migration plan: {}", cycle_path.join(" -> "))]
pub struct CycleDetectedError {
    /// The path of steps forming the cycle.
    pub cycle_path: Vec<String>,
}

impl CycleDetectedError {
    /// Creates a new cycle detected error.
    #[must_use]
    pub fn new(cycle_path: Vec<String>) -> Self {
        Self { cycle_path }
    }
}

impl From<CycleDetectedError> for PlanValidationError {
    fn from(err: CycleDetectedError) -> Self {
        PlanValidationError::new("PLAN-CYCLE", err.to_string())
            .with_steps(err.cycle_path)
            .with_fix_hint("Every step must eventually lead to END; point the last step at END.")
    }
}

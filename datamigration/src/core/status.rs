//! Step status enum.

use serde::{Deserialize, Serialize};
use std::fmt;

/// The migration status of a single step.
///
/// `PENDING → IN_PROGRESS → {COMPLETED | FAILED | BLOCKED}`. A BLOCKED step
/// may start again, which puts it back to IN_PROGRESS.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StepStatus {
    /// Step has not run yet.
    #[default]
    Pending,
    /// Step is copying pages.
    InProgress,
    /// Every page was copied.
    Completed,
    /// A data-access failure stopped the step.
    Failed,
    /// An external block request stopped the step.
    Blocked,
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Pending => write!(f, "PENDING"),
            Self::InProgress => write!(f, "IN_PROGRESS"),
            Self::Completed => write!(f, "COMPLETED"),
            Self::Failed => write!(f, "FAILED"),
            Self::Blocked => write!(f, "BLOCKED"),
        }
    }
}

impl StepStatus {
    /// Returns true if the status ends an attempt.
    #[must_use]
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Blocked)
    }

    /// Returns true if the step must run again when the run is resumed.
    #[must_use]
    pub fn needs_rerun(&self) -> bool {
        !matches!(self, Self::Completed)
    }
}

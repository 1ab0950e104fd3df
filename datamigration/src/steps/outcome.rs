use crate::context::InterruptReason;
use crate::copier::CopyOutcome;
use crate::core::StepName;
use crate::errors::DataAccessError;
use serde::Serialize;

/// Result of one step activation, as seen by the lifecycle wrapper.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StepOutcome {
    /// All work done; continue with the default successor.
    Completed {
        /// Records written.
        records: u64,
    },
    /// An external pause or lock loss was honored; the run halts at `END`.
    Interrupted {
        /// Records written before stopping.
        records: u64,
        /// Why the step stopped.
        reason: InterruptReason,
    },
    /// A data-access failure; the run halts at `ERROR`.
    Failed {
        /// Records written before the failure.
        records: u64,
        /// The failure.
        cause: DataAccessError,
    },
}

impl StepOutcome {
    /// Records written during the activation.
    #[must_use]
    pub fn records(&self) -> u64 {
        match self {
            Self::Completed { records }
            | Self::Interrupted { records, .. }
            | Self::Failed { records, .. } => *records,
        }
    }

    /// Short label used in logs and events.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Completed { .. } => "completed",
            Self::Interrupted { .. } => "interrupted",
            Self::Failed { .. } => "failed",
        }
    }

    /// Picks the next identity: the default successor on success, `END` on
    /// interruption, `ERROR` on failure.
    #[must_use]
    pub fn route(&self, default_next: StepName) -> StepName {
        match self {
            Self::Completed { .. } => default_next,
            Self::Interrupted { .. } => StepName::end(),
            Self::Failed { .. } => StepName::error(),
        }
    }
}

impl From<CopyOutcome> for StepOutcome {
    fn from(outcome: CopyOutcome) -> Self {
        match outcome {
            CopyOutcome::Completed { records, .. } => Self::Completed { records },
            CopyOutcome::Interrupted {
                records, reason, ..
            } => Self::Interrupted { records, reason },
            CopyOutcome::Failed { records, cause, .. } => Self::Failed { records, cause },
        }
    }
}

/// What the lifecycle wrapper reports for one activation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StepReport {
    /// The step that ran.
    pub step: StepName,
    /// How it ended.
    pub outcome: StepOutcome,
    /// The identity the driver moves to next.
    pub next: StepName,
    /// Wall-clock duration in milliseconds.
    pub elapsed_ms: f64,
}

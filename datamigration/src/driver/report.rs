use crate::core::StepName;
use crate::steps::{StepOutcome, StepReport};
use serde::Serialize;
use uuid::Uuid;

/// Summary of one driver invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    /// The run.
    pub run_id: Uuid,
    /// Identity the driver started from.
    pub initial: StepName,
    /// Terminal identity the driver halted at: `END` or `ERROR`.
    pub terminal: StepName,
    /// Every activated step, in visit order.
    pub steps: Vec<StepReport>,
    /// Wall-clock duration in milliseconds.
    pub elapsed_ms: f64,
}

impl RunReport {
    /// Step names in visit order.
    #[must_use]
    pub fn visited(&self) -> Vec<&StepName> {
        self.steps.iter().map(|report| &report.step).collect()
    }

    /// Records written across all activated steps.
    #[must_use]
    pub fn total_records(&self) -> u64 {
        self.steps.iter().map(|report| report.outcome.records()).sum()
    }

    /// Returns true if the run reached `END` without an interruption.
    #[must_use]
    pub fn is_success(&self) -> bool {
        self.terminal.is_end()
            && !self
                .steps
                .iter()
                .any(|report| matches!(report.outcome, StepOutcome::Interrupted { .. }))
    }

    /// Returns true if a step was interrupted.
    #[must_use]
    pub fn was_interrupted(&self) -> bool {
        self.steps
            .last()
            .is_some_and(|report| matches!(report.outcome, StepOutcome::Interrupted { .. }))
    }

    /// Returns the report of `step`, if it was activated.
    #[must_use]
    pub fn step(&self, step: &str) -> Option<&StepReport> {
        self.steps.iter().find(|report| report.step.as_str() == step)
    }
}

//! Scripted steps for driver tests.

use crate::context::InterruptReason;
use crate::core::StepName;
use crate::errors::{DataAccessError, MigrationError};
use crate::steps::lifecycle::{update_on_block, update_on_end, update_on_failure, update_on_start};
use crate::steps::{Step, StepContext, StepOutcome};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::Arc;

/// Visit order shared by several scripted steps.
pub type VisitLog = Arc<Mutex<Vec<StepName>>>;

/// A step that returns a fixed outcome and keeps its status record
/// consistent with it.
#[derive(Debug)]
pub struct ScriptedStep {
    name: StepName,
    next: StepName,
    outcome: StepOutcome,
    activations: Mutex<usize>,
    log: Option<VisitLog>,
}

impl ScriptedStep {
    /// Creates a step ending with `outcome`.
    pub fn new(name: impl Into<StepName>, next: impl Into<StepName>, outcome: StepOutcome) -> Self {
        Self {
            name: name.into(),
            next: next.into(),
            outcome,
            activations: Mutex::new(0),
            log: None,
        }
    }

    /// A step that completes after writing `records`.
    pub fn completing(name: impl Into<StepName>, next: impl Into<StepName>, records: u64) -> Self {
        Self::new(name, next, StepOutcome::Completed { records })
    }

    /// A step that is interrupted by a block request after `records`.
    pub fn interrupting(name: impl Into<StepName>, next: impl Into<StepName>, records: u64) -> Self {
        Self::new(
            name,
            next,
            StepOutcome::Interrupted {
                records,
                reason: InterruptReason::BlockRequested,
            },
        )
    }

    /// A step that fails with `cause` before writing anything.
    pub fn failing(
        name: impl Into<StepName>,
        next: impl Into<StepName>,
        cause: DataAccessError,
    ) -> Self {
        Self::new(name, next, StepOutcome::Failed { records: 0, cause })
    }

    /// Appends every activation to `log`.
    #[must_use]
    pub fn with_log(mut self, log: VisitLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Number of times the step was executed.
    #[must_use]
    pub fn activations(&self) -> usize {
        *self.activations.lock()
    }
}

#[async_trait]
impl Step for ScriptedStep {
    fn step_name(&self) -> &StepName {
        &self.name
    }

    fn next_state(&self) -> StepName {
        self.next.clone()
    }

    async fn execute_step(&self, ctx: &StepContext) -> Result<StepOutcome, MigrationError> {
        *self.activations.lock() += 1;
        if let Some(log) = &self.log {
            log.lock().push(self.name.clone());
        }

        update_on_start(ctx, &self.name).await?;
        match &self.outcome {
            StepOutcome::Completed { records } => update_on_end(ctx, &self.name, *records).await?,
            StepOutcome::Interrupted { records, .. } => {
                update_on_block(ctx, &self.name, *records).await?;
            }
            StepOutcome::Failed { records, .. } => {
                update_on_failure(ctx, &self.name, *records).await?;
            }
        }
        Ok(self.outcome.clone())
    }
}

use super::StepOutcome;
use crate::config::DEFAULT_PAGE_SIZE;
use crate::context::RunStateReader;
use crate::core::{AggregateStatus, StepName, StepStatusRecord};
use crate::errors::MigrationError;
use crate::store::StatusStore;
use async_trait::async_trait;
use std::fmt::Debug;
use std::sync::Arc;
use uuid::Uuid;

/// Everything a step may touch while it runs.
#[derive(Clone)]
pub struct StepContext {
    run: RunStateReader,
    store: Arc<dyn StatusStore>,
    page_size: usize,
}

impl Debug for StepContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StepContext")
            .field("run_id", &self.run.run_id())
            .field("store", &self.store.backend_type())
            .field("page_size", &self.page_size)
            .finish()
    }
}

impl StepContext {
    /// Creates a context.
    pub fn new(run: RunStateReader, store: Arc<dyn StatusStore>) -> Self {
        Self {
            run,
            store,
            page_size: DEFAULT_PAGE_SIZE,
        }
    }

    /// Sets the run-wide page size.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Read-only view of the run flags.
    #[must_use]
    pub fn run(&self) -> &RunStateReader {
        &self.run
    }

    /// The run id.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run.run_id()
    }

    /// The status store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn StatusStore> {
        &self.store
    }

    /// Records requested per page by steps without their own setting.
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }
}

/// One migratable unit.
///
/// Implementations only move data and classify the result; lifecycle
/// bookkeeping lives in [`lifecycle`](super::lifecycle).
#[async_trait]
pub trait Step: Send + Sync + Debug {
    /// Stable identity used for logging and status lookup.
    fn step_name(&self) -> &StepName;

    /// Default successor, read before the step executes.
    fn next_state(&self) -> StepName;

    /// Performs the work.
    ///
    /// Data-access failures are reported through [`StepOutcome::Failed`];
    /// an `Err` is an invariant violation and aborts the run.
    async fn execute_step(&self, ctx: &StepContext) -> Result<StepOutcome, MigrationError>;

    /// Projects this step's record out of the run aggregate.
    fn data_migration_status<'a>(
        &self,
        details: &'a AggregateStatus,
    ) -> Option<&'a StepStatusRecord> {
        details.step(self.step_name().as_str())
    }
}

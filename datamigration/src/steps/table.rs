use super::lifecycle::{
    check_execution_block, update_on_failure, update_on_start, update_on_step_end,
};
use super::{Step, StepContext, StepOutcome};
use crate::context::InterruptReason;
use crate::copier::{CopyOutcome, TableCopier};
use crate::core::StepName;
use crate::errors::MigrationError;
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{info, warn};

/// Copies one table from source to destination, page by page.
///
/// Every concrete table migration is an instance of this type: it binds an
/// injected [`TableCopier`] to a step identity and its default successor.
#[derive(Debug, Clone)]
pub struct TableMigrationStep {
    name: StepName,
    next: StepName,
    copier: Arc<dyn TableCopier>,
    page_size: Option<usize>,
}

impl TableMigrationStep {
    /// Creates a step named `name` that continues with `next`.
    pub fn new(name: impl Into<StepName>, next: impl Into<StepName>, copier: Arc<dyn TableCopier>) -> Self {
        Self {
            name: name.into(),
            next: next.into(),
            copier,
            page_size: None,
        }
    }

    /// Creates a step named after the copier's table, e.g.
    /// `EXECUTE_CDI_DETAIL_TABLE_MIGRATION`.
    pub fn for_table(copier: Arc<dyn TableCopier>, next: impl Into<StepName>) -> Self {
        let name = StepName::for_table(copier.table());
        Self::new(name, next, copier)
    }

    /// Overrides the run-wide page size for this table.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = Some(page_size.max(1));
        self
    }

    /// Page size override, if any.
    #[must_use]
    pub fn page_size(&self) -> Option<usize> {
        self.page_size
    }

    /// The table being copied.
    #[must_use]
    pub fn table(&self) -> &str {
        self.copier.table()
    }
}

#[async_trait]
impl Step for TableMigrationStep {
    fn step_name(&self) -> &StepName {
        &self.name
    }

    fn next_state(&self) -> StepName {
        self.next.clone()
    }

    async fn execute_step(&self, ctx: &StepContext) -> Result<StepOutcome, MigrationError> {
        // Without the lock the shared status record belongs to someone else.
        if ctx.run().flags().interruption() == Some(InterruptReason::LockLost) {
            warn!(run_id = %ctx.run_id(), step = %self.name, "Lock lost before step started");
            return Ok(StepOutcome::Interrupted {
                records: 0,
                reason: InterruptReason::LockLost,
            });
        }

        update_on_start(ctx, &self.name).await?;

        if let Some(reason) = check_execution_block(ctx, &self.name, true).await? {
            info!(run_id = %ctx.run_id(), step = %self.name, %reason, "Run interrupted before step started");
            return Ok(StepOutcome::Interrupted { records: 0, reason });
        }

        let page_size = self.page_size.unwrap_or_else(|| ctx.page_size());
        let outcome = self.copier.copy(ctx.run(), page_size).await;
        info!(
            run_id = %ctx.run_id(),
            step = %self.name,
            table = self.copier.table(),
            records = outcome.records(),
            pages = outcome.pages(),
            page_size,
            "Copy finished"
        );

        match &outcome {
            CopyOutcome::Failed { records, .. } => {
                update_on_failure(ctx, &self.name, *records).await?;
            }
            CopyOutcome::Completed { records, .. } => {
                update_on_step_end(ctx, &self.name, *records, None).await?;
            }
            CopyOutcome::Interrupted {
                records, reason, ..
            } => {
                update_on_step_end(ctx, &self.name, *records, Some(*reason)).await?;
            }
        }
        Ok(outcome.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::{InterruptReason, SharedRunState};
    use crate::copier::PagedTableCopier;
    use crate::core::{AggregateStatus, StepStatus};
    use crate::steps::call;
    use crate::store::{InMemoryStatusStore, StatusStore};
    use crate::testing::{InMemoryTable, Interruption, InterruptingWriter};
    use pretty_assertions::assert_eq;

    const NEXT: &str = "EXECUTE_CDI_FASCIA_COSTO_SERVIZIO_TABLE_MIGRATION";

    struct Fixture {
        state: SharedRunState,
        store: InMemoryStatusStore,
        ctx: StepContext,
        source: Arc<InMemoryTable<u32>>,
    }

    async fn fixture(rows: u32) -> Fixture {
        let state = SharedRunState::for_new_run();
        let store = InMemoryStatusStore::new();
        store
            .put(state.run_id(), AggregateStatus::new(state.run_id()))
            .await
            .unwrap();
        let ctx = StepContext::new(state.reader(), Arc::new(store.clone()));
        Fixture {
            state,
            store,
            ctx,
            source: Arc::new(InMemoryTable::with_rows((0..rows).collect())),
        }
    }

    fn step(copier: impl TableCopier + 'static) -> TableMigrationStep {
        TableMigrationStep::for_table(Arc::new(copier), NEXT)
    }

    #[tokio::test]
    async fn test_full_copy_completes() {
        let f = fixture(125).await;
        let destination = Arc::new(InMemoryTable::<u32>::new());
        let step = step(PagedTableCopier::new("CDI_DETAIL", f.source.clone(), destination.clone()));

        let report = call(&step, &f.ctx).await.unwrap();

        assert_eq!(report.step.as_str(), "EXECUTE_CDI_DETAIL_TABLE_MIGRATION");
        assert_eq!(report.next.as_str(), NEXT);
        assert_eq!(f.source.read_count(), 3);
        assert_eq!(destination.len(), 125);

        let aggregate = f.store.get(f.state.run_id()).await.unwrap().unwrap();
        let record = step.data_migration_status(&aggregate).unwrap();
        assert_eq!(record.status, StepStatus::Completed);
        assert_eq!(record.records, 125);
        assert!(record.start.is_some() && record.end.is_some());
    }

    #[tokio::test]
    async fn test_block_mid_table() {
        let f = fixture(125).await;
        let destination = Arc::new(InMemoryTable::<u32>::new());
        let writer = InterruptingWriter::new(
            destination.clone(),
            f.state.controller(),
            2,
            Interruption::Block,
        );
        let step = step(PagedTableCopier::new("CDI_DETAIL", f.source.clone(), writer));

        let report = call(&step, &f.ctx).await.unwrap();

        assert!(report.next.is_end());
        assert_eq!(destination.len(), 100);
        let aggregate = f.store.get(f.state.run_id()).await.unwrap().unwrap();
        let record = step.data_migration_status(&aggregate).unwrap();
        assert_eq!(record.status, StepStatus::Blocked);
        assert_eq!(record.records, 100);
    }

    #[tokio::test]
    async fn test_write_fault_fails_step() {
        let f = fixture(125).await;
        let destination = Arc::new(InMemoryTable::<u32>::new().fail_write_on_page(2));
        let step = step(PagedTableCopier::new("CDI_DETAIL", f.source.clone(), destination.clone()));

        let report = call(&step, &f.ctx).await.unwrap();

        assert!(report.next.is_error());
        assert_eq!(destination.len(), 50);
        assert_eq!(f.source.read_count(), 2);
        let aggregate = f.store.get(f.state.run_id()).await.unwrap().unwrap();
        assert_eq!(aggregate.status_of(step.step_name().as_str()), StepStatus::Failed);
        assert_eq!(aggregate.total_records(), 50);
    }

    #[tokio::test]
    async fn test_block_before_start_touches_no_data() {
        let f = fixture(125).await;
        f.state.controller().request_block("nightly freeze");
        let destination = Arc::new(InMemoryTable::<u32>::new());
        let step = step(PagedTableCopier::new("CDI_DETAIL", f.source.clone(), destination.clone()));

        let report = call(&step, &f.ctx).await.unwrap();

        assert_eq!(
            report.outcome,
            StepOutcome::Interrupted {
                records: 0,
                reason: InterruptReason::BlockRequested,
            }
        );
        assert!(report.next.is_end());
        assert_eq!(f.source.read_count(), 0);
        assert!(destination.is_empty());
        assert_eq!(
            f.store
                .get(f.state.run_id())
                .await
                .unwrap()
                .unwrap()
                .status_of(step.step_name().as_str()),
            StepStatus::Blocked
        );
    }

    #[tokio::test]
    async fn test_lost_lock_before_start_leaves_status_untouched() {
        let f = fixture(10).await;
        f.state.controller().release_lock();
        let step = step(PagedTableCopier::new(
            "CDI_DETAIL",
            f.source.clone(),
            Arc::new(InMemoryTable::<u32>::new()),
        ));

        let report = call(&step, &f.ctx).await.unwrap();

        assert_eq!(
            report.outcome,
            StepOutcome::Interrupted {
                records: 0,
                reason: InterruptReason::LockLost,
            }
        );
        assert!(report.next.is_end());
        assert_eq!(f.source.read_count(), 0);
        assert_eq!(f.store.history(f.state.run_id()).await.unwrap().len(), 1);
        let aggregate = f.store.get(f.state.run_id()).await.unwrap().unwrap();
        assert!(step.data_migration_status(&aggregate).is_none());
        assert_eq!(aggregate.last_executed_step, None);
    }

    #[tokio::test]
    async fn test_lock_lost_mid_table_keeps_record_in_progress() {
        let f = fixture(125).await;
        let destination = Arc::new(InMemoryTable::<u32>::new());
        let writer = InterruptingWriter::new(
            destination.clone(),
            f.state.controller(),
            1,
            Interruption::ReleaseLock,
        );
        let step = step(PagedTableCopier::new("CDI_DETAIL", f.source.clone(), writer));

        let report = call(&step, &f.ctx).await.unwrap();

        assert!(report.next.is_end());
        assert_eq!(report.outcome.records(), 50);
        let aggregate = f.store.get(f.state.run_id()).await.unwrap().unwrap();
        let record = step.data_migration_status(&aggregate).unwrap();
        assert_eq!(record.status, StepStatus::InProgress);
        assert_eq!(record.records, 0);
        assert!(record.end.is_none());
    }

    #[tokio::test]
    async fn test_page_size_is_honored() {
        let f = fixture(125).await;
        let step = step(PagedTableCopier::new(
            "CDI_DETAIL",
            f.source.clone(),
            Arc::new(InMemoryTable::<u32>::new()),
        ))
        .with_page_size(100);

        call(&step, &f.ctx).await.unwrap();

        assert_eq!(step.page_size(), Some(100));
        assert_eq!(f.source.read_count(), 2);
    }

    #[tokio::test]
    async fn test_context_page_size_applies_without_override() {
        let f = fixture(125).await;
        let ctx = f.ctx.clone().with_page_size(10);
        let step = step(PagedTableCopier::new(
            "CDI_DETAIL",
            f.source.clone(),
            Arc::new(InMemoryTable::<u32>::new()),
        ));

        call(&step, &ctx).await.unwrap();

        assert_eq!(step.page_size(), None);
        assert_eq!(f.source.read_count(), 13);
    }

    #[tokio::test]
    async fn test_step_override_beats_context_page_size() {
        let f = fixture(125).await;
        let ctx = f.ctx.clone().with_page_size(10);
        let step = step(PagedTableCopier::new(
            "CDI_DETAIL",
            f.source.clone(),
            Arc::new(InMemoryTable::<u32>::new()),
        ))
        .with_page_size(100);

        call(&step, &ctx).await.unwrap();

        assert_eq!(f.source.read_count(), 2);
    }
}

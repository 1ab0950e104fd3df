//! Lifecycle bookkeeping shared by every step.
//!
//! [`call`] is the single entry point the driver uses to activate a step.
//! The `update_on_*` helpers read the run aggregate, change this step's
//! record and write the whole aggregate back.

use super::{Step, StepContext, StepOutcome, StepReport};
use crate::context::InterruptReason;
use crate::core::{StepName, StepStatus, StepStatusRecord, Timestamp};
use crate::errors::MigrationError;
use crate::observability::SpanTimer;
use chrono::Utc;
use tracing::{debug, error, info, warn};

/// Activates `step` once and decides where the run goes next.
///
/// The default successor is read before the step executes. An interrupted
/// step routes to `END`, a failed one to `ERROR`. Elapsed time is logged
/// whatever the outcome.
///
/// # Errors
///
/// Propagates invariant violations raised by the step, such as a missing run
/// aggregate or a failing status store.
pub async fn call(step: &dyn Step, ctx: &StepContext) -> Result<StepReport, MigrationError> {
    let name = step.step_name().clone();
    let timer = SpanTimer::start(name.as_str());
    let default_next = step.next_state();
    let run_id = ctx.run_id();

    info!(%run_id, step = %name, next = %default_next, "Executing step");
    let result = step.execute_step(ctx).await;
    let elapsed_ms = timer.finish();

    let outcome = match result {
        Ok(outcome) => outcome,
        Err(err) => {
            error!(%run_id, step = %name, error = %err, elapsed_ms, "Step aborted");
            return Err(err);
        }
    };

    match &outcome {
        StepOutcome::Completed { records } => {
            info!(%run_id, step = %name, records, "Step completed");
        }
        StepOutcome::Interrupted { records, reason } => {
            info!(%run_id, step = %name, records, %reason, "Step interrupted, run will stop");
        }
        StepOutcome::Failed { records, cause } => {
            error!(%run_id, step = %name, records, error = %cause, "Step failed");
        }
    }

    let next = outcome.route(default_next);
    info!(%run_id, step = %name, %next, elapsed_ms, "Step finished in {:.0} ms", elapsed_ms);

    Ok(StepReport {
        step: name,
        outcome,
        next,
        elapsed_ms,
    })
}

/// Reports an interruption if the run may not start new work.
///
/// When `update_status` is set a block request marks the step BLOCKED first.
/// A lost lock never writes: the status record is no longer ours.
///
/// # Errors
///
/// Fails if the BLOCKED status cannot be persisted.
pub async fn check_execution_block(
    ctx: &StepContext,
    step: &StepName,
    update_status: bool,
) -> Result<Option<InterruptReason>, MigrationError> {
    let Some(reason) = ctx.run().flags().interruption() else {
        return Ok(None);
    };

    match reason {
        InterruptReason::LockLost => {
            warn!(run_id = %ctx.run_id(), step = %step, "Lock lost, leaving status untouched");
        }
        InterruptReason::BlockRequested if update_status => {
            update_on_block(ctx, step, 0).await?;
        }
        InterruptReason::BlockRequested => {}
    }
    Ok(Some(reason))
}

/// Marks `step` IN_PROGRESS and stamps its start time.
///
/// # Errors
///
/// Fails with [`MigrationError::InvalidMigrationStatus`] if the run has no
/// aggregate, or if the store fails.
pub async fn update_on_start(ctx: &StepContext, step: &StepName) -> Result<(), MigrationError> {
    update_status(ctx, step, |record, now| record.begin(now)).await
}

/// Marks `step` COMPLETED.
///
/// # Errors
///
/// See [`update_on_start`].
pub async fn update_on_end(
    ctx: &StepContext,
    step: &StepName,
    records: u64,
) -> Result<(), MigrationError> {
    finish(ctx, step, StepStatus::Completed, records).await
}

/// Marks `step` FAILED.
///
/// # Errors
///
/// See [`update_on_start`].
pub async fn update_on_failure(
    ctx: &StepContext,
    step: &StepName,
    records: u64,
) -> Result<(), MigrationError> {
    finish(ctx, step, StepStatus::Failed, records).await
}

/// Marks `step` BLOCKED.
///
/// # Errors
///
/// See [`update_on_start`].
pub async fn update_on_block(
    ctx: &StepContext,
    step: &StepName,
    records: u64,
) -> Result<(), MigrationError> {
    finish(ctx, step, StepStatus::Blocked, records).await
}

/// Closes a step that stopped paging: BLOCKED if a block was requested,
/// COMPLETED if it ran out of pages. Returns the status written, or `None`
/// when the lock was lost and the record was left as it was.
///
/// # Errors
///
/// See [`update_on_start`].
pub async fn update_on_step_end(
    ctx: &StepContext,
    step: &StepName,
    records: u64,
    interruption: Option<InterruptReason>,
) -> Result<Option<StepStatus>, MigrationError> {
    match interruption {
        Some(InterruptReason::LockLost) => {
            warn!(run_id = %ctx.run_id(), step = %step, records, "Lock lost, leaving status untouched");
            Ok(None)
        }
        Some(InterruptReason::BlockRequested) => {
            update_on_block(ctx, step, records).await?;
            Ok(Some(StepStatus::Blocked))
        }
        None => {
            update_on_end(ctx, step, records).await?;
            Ok(Some(StepStatus::Completed))
        }
    }
}

async fn finish(
    ctx: &StepContext,
    step: &StepName,
    status: StepStatus,
    records: u64,
) -> Result<(), MigrationError> {
    update_status(ctx, step, move |record, now| record.finish(status, now, records)).await
}

async fn update_status<F>(ctx: &StepContext, step: &StepName, mutate: F) -> Result<(), MigrationError>
where
    F: FnOnce(&mut StepStatusRecord, Timestamp) + Send,
{
    let run_id = ctx.run_id();
    let mut aggregate = ctx
        .store()
        .get(run_id)
        .await?
        .ok_or_else(|| MigrationError::invalid_status(run_id))?;

    let now = Utc::now();
    let record = aggregate.step_mut(step);
    mutate(record, now);
    let status = record.status;
    let records = record.records;
    aggregate.last_executed_step = Some(step.clone());
    aggregate.updated_at = now;

    ctx.store().put(run_id, aggregate).await?;
    debug!(%run_id, step = %step, %status, records, "Updated step status");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SharedRunState;
    use crate::core::AggregateStatus;
    use crate::errors::{DataAccessError, DataAccessKind};
    use crate::store::{InMemoryStatusStore, StatusStore};
    use crate::testing::ScriptedStep;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;

    async fn context_with_aggregate(state: &SharedRunState) -> (StepContext, InMemoryStatusStore) {
        let store = InMemoryStatusStore::new();
        store
            .put(state.run_id(), AggregateStatus::new(state.run_id()))
            .await
            .unwrap();
        (StepContext::new(state.reader(), Arc::new(store.clone())), store)
    }

    #[tokio::test]
    async fn test_call_keeps_default_successor_on_success() {
        let state = SharedRunState::for_new_run();
        let (ctx, _) = context_with_aggregate(&state).await;
        let step = ScriptedStep::completing("A", "B", 10);

        let report = call(&step, &ctx).await.unwrap();

        assert_eq!(report.next, StepName::new("B"));
        assert_eq!(report.outcome, StepOutcome::Completed { records: 10 });
        assert!(report.elapsed_ms >= 0.0);
    }

    #[tokio::test]
    async fn test_call_routes_interruption_to_end() {
        let state = SharedRunState::for_new_run();
        let (ctx, store) = context_with_aggregate(&state).await;
        let step = ScriptedStep::interrupting("A", "B", 5);

        let report = call(&step, &ctx).await.unwrap();

        assert!(report.next.is_end());
        let aggregate = store.get(state.run_id()).await.unwrap().unwrap();
        assert_eq!(aggregate.status_of("A"), StepStatus::Blocked);
    }

    #[tokio::test]
    async fn test_call_routes_failure_to_error() {
        let state = SharedRunState::for_new_run();
        let (ctx, store) = context_with_aggregate(&state).await;
        let step = ScriptedStep::failing(
            "A",
            "B",
            DataAccessError::writing(DataAccessKind::Constraint, "duplicate key"),
        );

        let report = call(&step, &ctx).await.unwrap();

        assert!(report.next.is_error());
        let aggregate = store.get(state.run_id()).await.unwrap().unwrap();
        assert_eq!(aggregate.status_of("A"), StepStatus::Failed);
    }

    #[tokio::test]
    async fn test_missing_aggregate_is_not_created() {
        let state = SharedRunState::for_new_run();
        let store = InMemoryStatusStore::new();
        let ctx = StepContext::new(state.reader(), Arc::new(store.clone()));

        let err = update_on_start(&ctx, &StepName::new("A")).await.unwrap_err();

        assert!(matches!(err, MigrationError::InvalidMigrationStatus { run_id } if run_id == state.run_id()));
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_call_propagates_invariant_violations() {
        let state = SharedRunState::for_new_run();
        let ctx = StepContext::new(state.reader(), Arc::new(InMemoryStatusStore::new()));
        let step = ScriptedStep::completing("A", "B", 1);

        let result = call(&step, &ctx).await;

        assert!(matches!(result, Err(MigrationError::InvalidMigrationStatus { .. })));
    }

    #[tokio::test]
    async fn test_updates_stamp_record_and_last_step() {
        let state = SharedRunState::for_new_run();
        let (ctx, store) = context_with_aggregate(&state).await;
        let step = StepName::new("A");

        update_on_start(&ctx, &step).await.unwrap();
        let started = store.get(state.run_id()).await.unwrap().unwrap();
        assert_eq!(started.status_of("A"), StepStatus::InProgress);
        assert!(started.step("A").unwrap().start.is_some());
        assert!(started.step("A").unwrap().end.is_none());
        assert_eq!(started.last_executed_step, Some(step.clone()));

        update_on_end(&ctx, &step, 125).await.unwrap();
        let ended = store.get(state.run_id()).await.unwrap().unwrap();
        let record = ended.step("A").unwrap();
        assert_eq!(record.status, StepStatus::Completed);
        assert_eq!(record.records, 125);
        assert!(record.end.is_some());
        assert!(ended.updated_at >= started.updated_at);
    }

    #[tokio::test]
    async fn test_update_on_step_end_chooses_status() {
        let state = SharedRunState::for_new_run();
        let (ctx, _) = context_with_aggregate(&state).await;

        let blocked = update_on_step_end(
            &ctx,
            &StepName::new("A"),
            100,
            Some(InterruptReason::BlockRequested),
        )
        .await
        .unwrap();
        let completed = update_on_step_end(&ctx, &StepName::new("B"), 125, None)
            .await
            .unwrap();

        assert_eq!(blocked, Some(StepStatus::Blocked));
        assert_eq!(completed, Some(StepStatus::Completed));
    }

    #[tokio::test]
    async fn test_update_on_step_end_skips_write_without_lock() {
        let state = SharedRunState::for_new_run();
        let (ctx, store) = context_with_aggregate(&state).await;
        let step = StepName::new("A");
        update_on_start(&ctx, &step).await.unwrap();

        let written = update_on_step_end(&ctx, &step, 50, Some(InterruptReason::LockLost))
            .await
            .unwrap();

        assert_eq!(written, None);
        let aggregate = store.get(state.run_id()).await.unwrap().unwrap();
        assert_eq!(aggregate.status_of("A"), StepStatus::InProgress);
        assert_eq!(aggregate.step("A").unwrap().records, 0);
    }

    #[tokio::test]
    async fn test_check_execution_block() {
        let state = SharedRunState::for_new_run();
        let (ctx, store) = context_with_aggregate(&state).await;
        let step = StepName::new("A");

        assert_eq!(check_execution_block(&ctx, &step, true).await.unwrap(), None);

        state.controller().request_block("operator pause");
        assert_eq!(
            check_execution_block(&ctx, &step, false).await.unwrap(),
            Some(InterruptReason::BlockRequested)
        );
        assert_eq!(
            store.get(state.run_id()).await.unwrap().unwrap().status_of("A"),
            StepStatus::Pending
        );

        check_execution_block(&ctx, &step, true).await.unwrap();
        assert_eq!(
            store.get(state.run_id()).await.unwrap().unwrap().status_of("A"),
            StepStatus::Blocked
        );
    }

    #[tokio::test]
    async fn test_lost_lock_counts_as_interruption() {
        let state = SharedRunState::for_new_run();
        let (ctx, store) = context_with_aggregate(&state).await;
        state.controller().release_lock();

        assert_eq!(
            check_execution_block(&ctx, &StepName::new("A"), true)
                .await
                .unwrap(),
            Some(InterruptReason::LockLost)
        );
        assert_eq!(store.history(state.run_id()).await.unwrap().len(), 1);
        assert_eq!(
            store.get(state.run_id()).await.unwrap().unwrap().status_of("A"),
            StepStatus::Pending
        );
    }
}

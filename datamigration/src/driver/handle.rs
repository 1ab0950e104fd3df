//! In-process trigger and query surface for a run executing in the
//! background.

use super::{MigrationDriver, RunReport};
use crate::context::RunController;
use crate::core::{AggregateStatus, StepName};
use crate::errors::MigrationError;
use crate::store::StatusStore;
use std::sync::Arc;
use tokio::task::JoinHandle;
use uuid::Uuid;

/// A run spawned on the tokio runtime.
pub struct MigrationHandle {
    run_id: Uuid,
    controller: RunController,
    store: Arc<dyn StatusStore>,
    task: JoinHandle<Result<RunReport, MigrationError>>,
}

impl std::fmt::Debug for MigrationHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MigrationHandle")
            .field("run_id", &self.run_id)
            .field("finished", &self.task.is_finished())
            .finish_non_exhaustive()
    }
}

impl MigrationDriver {
    /// Spawns the run from `initial` on the current runtime.
    #[must_use]
    pub fn spawn(self, initial: StepName) -> MigrationHandle {
        let (run_id, controller, store) = self.handles();
        let task = tokio::spawn(async move { self.run(initial).await });
        MigrationHandle {
            run_id,
            controller,
            store,
            task,
        }
    }

    /// Spawns [`resume`](Self::resume) on the current runtime.
    #[must_use]
    pub fn spawn_resume(self) -> MigrationHandle {
        let (run_id, controller, store) = self.handles();
        let task = tokio::spawn(async move { self.resume().await });
        MigrationHandle {
            run_id,
            controller,
            store,
            task,
        }
    }

    fn handles(&self) -> (Uuid, RunController, Arc<dyn StatusStore>) {
        (self.run_id(), self.controller(), Arc::clone(self.store()))
    }
}

impl MigrationHandle {
    /// The run id.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Asks the run to pause at the next page boundary.
    ///
    /// Returns true if this call set the flag.
    pub fn request_block(&self, reason: impl Into<String>) -> bool {
        self.controller.request_block(reason)
    }

    /// Revokes the run's exclusivity lock.
    pub fn release_lock(&self) {
        self.controller.release_lock();
    }

    /// Current aggregate of the run.
    ///
    /// # Errors
    ///
    /// Fails if the store fails.
    pub async fn status(&self) -> Result<Option<AggregateStatus>, MigrationError> {
        Ok(self.store.get(self.run_id).await?)
    }

    /// Returns true once the run has stopped.
    #[must_use]
    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }

    /// Waits for the run to stop.
    ///
    /// # Errors
    ///
    /// Returns the run's own error, or [`MigrationError::Internal`] if the
    /// task panicked or was cancelled.
    pub async fn join(self) -> Result<RunReport, MigrationError> {
        self.task
            .await
            .map_err(|err| MigrationError::Internal(format!("migration task failed: {err}")))?
    }
}

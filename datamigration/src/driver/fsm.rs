//! The finite-state-machine driver.

use super::RunReport;
use crate::config::{MigrationConfig, DEFAULT_PAGE_SIZE};
use crate::context::{RunController, SharedRunState};
use crate::core::{AggregateStatus, StepName};
use crate::errors::MigrationError;
use crate::events::{EventSink, NoOpEventSink};
use crate::observability::SpanTimer;
use crate::registry::{StepRegistry, StepResolver};
use crate::steps::{call, StepContext};
use crate::store::{build_status_store, StatusStore};
use serde_json::json;
use std::fmt;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{error, info};
use uuid::Uuid;

/// Drives one run from an initial step to `END` or `ERROR`.
///
/// Steps are awaited one after another, so exactly one step is active at any
/// time. The next identity is chosen by the step's lifecycle wrapper; the
/// driver only follows it.
pub struct MigrationDriver {
    registry: Arc<StepRegistry>,
    store: Arc<dyn StatusStore>,
    state: SharedRunState,
    events: Arc<dyn EventSink>,
    page_size: usize,
    active: Mutex<()>,
}

impl fmt::Debug for MigrationDriver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MigrationDriver")
            .field("run_id", &self.state.run_id())
            .field("registry", &self.registry)
            .field("store", &self.store.backend_type())
            .field("page_size", &self.page_size)
            .finish_non_exhaustive()
    }
}

impl MigrationDriver {
    /// Creates a driver for the run owned by `state`.
    pub fn new(
        registry: Arc<StepRegistry>,
        store: Arc<dyn StatusStore>,
        state: SharedRunState,
    ) -> Self {
        Self {
            registry,
            store,
            state,
            events: Arc::new(NoOpEventSink),
            page_size: DEFAULT_PAGE_SIZE,
            active: Mutex::new(()),
        }
    }

    /// Creates a driver for a new run using the configured status store and
    /// page size.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or the store cannot be opened.
    pub async fn from_config(
        registry: Arc<StepRegistry>,
        config: &MigrationConfig,
    ) -> Result<Self, MigrationError> {
        config.validate()?;
        let store = build_status_store(&config.status_store).await?;
        Ok(Self::new(registry, store, SharedRunState::for_new_run())
            .with_page_size(config.page_size))
    }

    /// Creates a driver for an existing run, typically one that was blocked
    /// or failed in an earlier process.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or the store cannot be opened.
    pub async fn for_run(
        registry: Arc<StepRegistry>,
        config: &MigrationConfig,
        run_id: Uuid,
    ) -> Result<Self, MigrationError> {
        config.validate()?;
        let store = build_status_store(&config.status_store).await?;
        Ok(Self::new(registry, store, SharedRunState::new(run_id))
            .with_page_size(config.page_size))
    }

    /// Creates a driver for the most recently updated run that has not
    /// reached `END`, or for a new run if every stored run is finished.
    ///
    /// This is the re-trigger entry point: calling
    /// [`resume`](Self::resume) on the result continues where the previous
    /// attempt stopped.
    ///
    /// # Errors
    ///
    /// Fails if the configuration is invalid or the store fails.
    pub async fn for_latest_run(
        registry: Arc<StepRegistry>,
        config: &MigrationConfig,
    ) -> Result<Self, MigrationError> {
        config.validate()?;
        let store = build_status_store(&config.status_store).await?;
        let state = match latest_unfinished_run(store.as_ref(), &registry).await? {
            Some(run_id) => {
                info!(%run_id, "Re-attaching to unfinished migration run");
                SharedRunState::new(run_id)
            }
            None => SharedRunState::for_new_run(),
        };
        Ok(Self::new(registry, store, state).with_page_size(config.page_size))
    }

    /// Sets the page size for steps that do not override it.
    #[must_use]
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    /// Page size handed to every step.
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Sets the event sink.
    #[must_use]
    pub fn with_event_sink(mut self, events: Arc<dyn EventSink>) -> Self {
        self.events = events;
        self
    }

    /// The run this driver owns.
    #[must_use]
    pub fn run_id(&self) -> Uuid {
        self.state.run_id()
    }

    /// Handle for blocking the run or revoking its lock.
    #[must_use]
    pub fn controller(&self) -> RunController {
        self.state.controller()
    }

    /// The step registry.
    #[must_use]
    pub fn registry(&self) -> &Arc<StepRegistry> {
        &self.registry
    }

    /// The status store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn StatusStore> {
        &self.store
    }

    /// Initializes the run aggregate with every step PENDING.
    ///
    /// An existing aggregate is returned untouched.
    ///
    /// # Errors
    ///
    /// Fails if the store fails.
    pub async fn start(&self) -> Result<AggregateStatus, MigrationError> {
        let run_id = self.run_id();
        if let Some(existing) = self.store.get(run_id).await? {
            return Ok(existing);
        }

        let aggregate =
            AggregateStatus::new(run_id).with_steps(self.registry.names().iter().cloned());
        self.store.put(run_id, aggregate.clone()).await?;
        info!(%run_id, steps = aggregate.steps.len(), "Initialized migration run");
        Ok(aggregate)
    }

    /// Runs from `initial` until a terminal identity is reached.
    ///
    /// # Errors
    ///
    /// Fails on invariant violations: an unknown step, a missing aggregate,
    /// a failing status store, or a second concurrent invocation. Data-access
    /// failures are not errors; they end the run at `ERROR`.
    pub async fn run(&self, initial: StepName) -> Result<RunReport, MigrationError> {
        let _active = self.active.try_lock().map_err(|_| {
            MigrationError::Internal(format!("run {} is already active", self.run_id()))
        })?;

        let run_id = self.run_id();
        let timer = SpanTimer::start(run_id.to_string());
        let ctx = StepContext::new(self.state.reader(), Arc::clone(&self.store))
            .with_page_size(self.page_size);

        info!(%run_id, %initial, "Starting migration run");
        self.events.try_emit(
            "run.started",
            Some(json!({"run_id": run_id.to_string(), "initial": initial})),
        );

        let mut current = initial.clone();
        let mut steps = Vec::new();

        while !current.is_terminal() {
            let step = self.registry.resolve(&current)?;
            self.events.try_emit(
                "step.started",
                Some(json!({"run_id": run_id.to_string(), "step": current})),
            );

            let report = match call(step.as_ref(), &ctx).await {
                Ok(report) => report,
                Err(err) => {
                    error!(%run_id, step = %current, error = %err, "Migration run aborted");
                    self.events.try_emit(
                        "run.finished",
                        Some(json!({
                            "run_id": run_id.to_string(),
                            "terminal": null,
                            "error": err.to_string(),
                        })),
                    );
                    return Err(err);
                }
            };

            self.events.try_emit(
                &format!("step.{}", report.outcome.label()),
                Some(json!({
                    "run_id": run_id.to_string(),
                    "step": report.step,
                    "next": report.next,
                    "records": report.outcome.records(),
                    "elapsed_ms": report.elapsed_ms,
                })),
            );

            current = report.next.clone();
            steps.push(report);
        }

        let elapsed_ms = timer.finish();
        info!(
            %run_id,
            terminal = %current,
            steps = steps.len(),
            elapsed_ms,
            "Migration run finished"
        );
        self.events.try_emit(
            "run.finished",
            Some(json!({
                "run_id": run_id.to_string(),
                "terminal": current,
                "steps": steps.len(),
                "elapsed_ms": elapsed_ms,
            })),
        );

        Ok(RunReport {
            run_id,
            initial,
            terminal: current,
            steps,
            elapsed_ms,
        })
    }

    /// Initializes the run if needed and continues from its resume point.
    ///
    /// # Errors
    ///
    /// See [`run`](Self::run).
    pub async fn resume(&self) -> Result<RunReport, MigrationError> {
        let aggregate = self.start().await?;
        let resume_point = self.registry.transitions().resume_point(&aggregate);
        info!(run_id = %self.run_id(), step = %resume_point, "Resuming migration run");
        self.run(resume_point).await
    }

    /// Current aggregate of the run.
    ///
    /// # Errors
    ///
    /// Fails if the store fails.
    pub async fn status(&self) -> Result<Option<AggregateStatus>, MigrationError> {
        Ok(self.store.get(self.run_id()).await?)
    }

    /// Every aggregate written for the run, oldest first.
    ///
    /// # Errors
    ///
    /// Fails if the store fails.
    pub async fn history(&self) -> Result<Vec<AggregateStatus>, MigrationError> {
        Ok(self.store.history(self.run_id()).await?)
    }
}

/// The unfinished run with the newest `updated_at`, if any.
async fn latest_unfinished_run(
    store: &dyn StatusStore,
    registry: &StepRegistry,
) -> Result<Option<Uuid>, MigrationError> {
    let mut latest: Option<AggregateStatus> = None;
    for run_id in store.run_ids().await? {
        let Some(aggregate) = store.get(run_id).await? else {
            continue;
        };
        if registry.transitions().resume_point(&aggregate).is_terminal() {
            continue;
        }
        if latest
            .as_ref()
            .map_or(true, |current| aggregate.updated_at > current.updated_at)
        {
            latest = Some(aggregate);
        }
    }
    Ok(latest.map(|aggregate| aggregate.run_id))
}

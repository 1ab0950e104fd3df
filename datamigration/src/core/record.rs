//! Persisted progress records: one per step, aggregated per run.

use super::{StepName, StepStatus};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Represents a timestamp that can be serialized/deserialized.
pub type Timestamp = DateTime<Utc>;

/// Progress of one step within a run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepStatusRecord {
    /// Current status.
    pub status: StepStatus,
    /// When the current attempt started.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start: Option<Timestamp>,
    /// When the current attempt reached a terminal status.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end: Option<Timestamp>,
    /// Records written by the current attempt.
    #[serde(default)]
    pub records: u64,
}

impl StepStatusRecord {
    /// Creates a pending record.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Opens a new attempt.
    ///
    /// Values from a previous attempt are cleared so that `end` and
    /// `records` always describe the attempt that `start` belongs to.
    pub fn begin(&mut self, now: Timestamp) {
        self.status = StepStatus::InProgress;
        self.start = Some(now);
        self.end = None;
        self.records = 0;
    }

    /// Closes the current attempt with a terminal status.
    pub fn finish(&mut self, status: StepStatus, now: Timestamp, records: u64) {
        debug_assert!(status.is_terminal(), "finish() requires a terminal status");
        self.status = status;
        self.end = Some(now);
        self.records = records;
    }

    /// Returns the attempt duration in milliseconds once it has ended.
    #[must_use]
    pub fn duration_ms(&self) -> Option<i64> {
        match (self.start, self.end) {
            (Some(start), Some(end)) => Some((end - start).num_milliseconds()),
            _ => None,
        }
    }
}

/// The full status document of one migration run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AggregateStatus {
    /// The run this document belongs to.
    pub run_id: Uuid,
    /// When the run was first initialized.
    pub created_at: Timestamp,
    /// When the document was last written.
    pub updated_at: Timestamp,
    /// The step that last touched this document.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_executed_step: Option<StepName>,
    /// Per-step progress.
    #[serde(default)]
    pub steps: BTreeMap<StepName, StepStatusRecord>,
}

impl AggregateStatus {
    /// Creates an empty aggregate for `run_id`.
    #[must_use]
    pub fn new(run_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            run_id,
            created_at: now,
            updated_at: now,
            last_executed_step: None,
            steps: BTreeMap::new(),
        }
    }

    /// Registers every step as PENDING.
    #[must_use]
    pub fn with_steps<I>(mut self, steps: I) -> Self
    where
        I: IntoIterator<Item = StepName>,
    {
        for name in steps {
            self.steps.entry(name).or_default();
        }
        self
    }

    /// Returns the record of `step`, if it was registered.
    #[must_use]
    pub fn step(&self, step: &str) -> Option<&StepStatusRecord> {
        self.steps.get(step)
    }

    /// Returns the record of `step`, registering it as PENDING if needed.
    pub fn step_mut(&mut self, step: &StepName) -> &mut StepStatusRecord {
        self.steps.entry(step.clone()).or_default()
    }

    /// Returns the status of `step`, PENDING when unknown.
    #[must_use]
    pub fn status_of(&self, step: &str) -> StepStatus {
        self.step(step).map(|record| record.status).unwrap_or_default()
    }

    /// Sum of records written across all steps.
    #[must_use]
    pub fn total_records(&self) -> u64 {
        self.steps.values().map(|record| record.records).sum()
    }

    /// Returns the steps currently in `status`.
    #[must_use]
    pub fn steps_with_status(&self, status: StepStatus) -> Vec<&StepName> {
        self.steps
            .iter()
            .filter(|(_, record)| record.status == status)
            .map(|(name, _)| name)
            .collect()
    }

    /// Returns true if every registered step is COMPLETED.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        !self.steps.is_empty()
            && self
                .steps
                .values()
                .all(|record| record.status == StepStatus::Completed)
    }
}

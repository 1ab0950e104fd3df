use crate::core::{AggregateStatus, StepName};
use std::collections::BTreeMap;

/// Static step topology: each step's successor, ending at `END` or `ERROR`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransitionTable {
    first: StepName,
    successors: BTreeMap<StepName, StepName>,
    order: Vec<StepName>,
}

impl TransitionTable {
    /// Creates a table from a validated plan.
    pub(crate) fn new(
        first: StepName,
        successors: BTreeMap<StepName, StepName>,
        order: Vec<StepName>,
    ) -> Self {
        Self {
            first,
            successors,
            order,
        }
    }

    /// The step a fresh run starts with.
    #[must_use]
    pub fn first(&self) -> &StepName {
        &self.first
    }

    /// Successor of `step`, if registered.
    #[must_use]
    pub fn next(&self, step: &str) -> Option<&StepName> {
        self.successors.get(step)
    }

    /// Steps in execution order, from the first to the one leading to `END`.
    #[must_use]
    pub fn order(&self) -> &[StepName] {
        &self.order
    }

    /// Returns true if `step` is registered.
    #[must_use]
    pub fn contains(&self, step: &str) -> bool {
        self.successors.contains_key(step)
    }

    /// Number of registered steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.successors.len()
    }

    /// Returns true if no step is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.successors.is_empty()
    }

    /// Where a re-triggered run should continue.
    ///
    /// The last executed step is rerun unless it completed, in which case its
    /// successor is returned. Runs that never executed a step, or whose last
    /// step is no longer part of the plan, start from the first step.
    #[must_use]
    pub fn resume_point(&self, aggregate: &AggregateStatus) -> StepName {
        let Some(last) = aggregate
            .last_executed_step
            .as_ref()
            .filter(|last| self.contains(last.as_str()))
        else {
            return self.first.clone();
        };

        if aggregate.status_of(last.as_str()).needs_rerun() {
            last.clone()
        } else {
            self.next(last.as_str())
                .cloned()
                .unwrap_or_else(StepName::end)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StepStatus;
    use chrono::Utc;
    use uuid::Uuid;

    fn table() -> TransitionTable {
        let successors = BTreeMap::from([
            (StepName::new("A"), StepName::new("B")),
            (StepName::new("B"), StepName::end()),
        ]);
        TransitionTable::new(
            StepName::new("A"),
            successors,
            vec![StepName::new("A"), StepName::new("B")],
        )
    }

    fn aggregate_after(step: &str, status: StepStatus) -> AggregateStatus {
        let mut aggregate = AggregateStatus::new(Uuid::new_v4());
        let name = StepName::new(step);
        aggregate.step_mut(&name).begin(Utc::now());
        if status.is_terminal() {
            aggregate.step_mut(&name).finish(status, Utc::now(), 0);
        }
        aggregate.last_executed_step = Some(name);
        aggregate
    }

    #[test]
    fn test_lookup() {
        let table = table();
        assert_eq!(table.first().as_str(), "A");
        assert_eq!(table.next("A"), Some(&StepName::new("B")));
        assert!(table.next("B").is_some_and(StepName::is_end));
        assert_eq!(table.next("C"), None);
        assert_eq!(table.len(), 2);
    }

    #[test]
    fn test_fresh_run_resumes_at_first() {
        let aggregate = AggregateStatus::new(Uuid::new_v4());
        assert_eq!(table().resume_point(&aggregate).as_str(), "A");
    }

    #[test]
    fn test_blocked_step_is_rerun() {
        let aggregate = aggregate_after("A", StepStatus::Blocked);
        assert_eq!(table().resume_point(&aggregate).as_str(), "A");
    }

    #[test]
    fn test_failed_step_is_rerun() {
        let aggregate = aggregate_after("B", StepStatus::Failed);
        assert_eq!(table().resume_point(&aggregate).as_str(), "B");
    }

    #[test]
    fn test_step_left_in_progress_is_rerun() {
        let aggregate = aggregate_after("A", StepStatus::InProgress);
        assert_eq!(table().resume_point(&aggregate).as_str(), "A");
    }

    #[test]
    fn test_completed_step_moves_on() {
        assert_eq!(
            table()
                .resume_point(&aggregate_after("A", StepStatus::Completed))
                .as_str(),
            "B"
        );
        assert!(table()
            .resume_point(&aggregate_after("B", StepStatus::Completed))
            .is_end());
    }

    #[test]
    fn test_unknown_last_step_restarts() {
        let aggregate = aggregate_after("RETIRED", StepStatus::Completed);
        assert_eq!(table().resume_point(&aggregate).as_str(), "A");
    }
}

use super::TransitionTable;
use crate::core::StepName;
use crate::errors::MigrationError;
use crate::steps::Step;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Maps a step identity to the executable step.
pub trait StepResolver: Send + Sync {
    /// Resolves `step`.
    ///
    /// # Errors
    ///
    /// Returns [`MigrationError::UnknownStep`] if nothing is registered under
    /// that name.
    fn resolve(&self, step: &StepName) -> Result<Arc<dyn Step>, MigrationError>;
}

/// Validated set of steps plus their transition table.
///
/// Built by [`MigrationPlanBuilder`](super::MigrationPlanBuilder).
#[derive(Clone)]
pub struct StepRegistry {
    steps: HashMap<StepName, Arc<dyn Step>>,
    transitions: TransitionTable,
}

impl StepRegistry {
    pub(crate) fn new(steps: HashMap<StepName, Arc<dyn Step>>, transitions: TransitionTable) -> Self {
        Self { steps, transitions }
    }

    /// The transition table.
    #[must_use]
    pub fn transitions(&self) -> &TransitionTable {
        &self.transitions
    }

    /// Registered step names in execution order.
    #[must_use]
    pub fn names(&self) -> &[StepName] {
        self.transitions.order()
    }

    /// Returns the step registered under `step`.
    #[must_use]
    pub fn get(&self, step: &str) -> Option<&Arc<dyn Step>> {
        self.steps.get(step)
    }

    /// Number of registered steps.
    #[must_use]
    pub fn len(&self) -> usize {
        self.steps.len()
    }

    /// Returns true if no step is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }
}

impl fmt::Debug for StepRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StepRegistry")
            .field("order", &self.transitions.order())
            .finish()
    }
}

impl StepResolver for StepRegistry {
    fn resolve(&self, step: &StepName) -> Result<Arc<dyn Step>, MigrationError> {
        self.steps
            .get(step)
            .cloned()
            .ok_or_else(|| MigrationError::UnknownStep(step.clone()))
    }
}

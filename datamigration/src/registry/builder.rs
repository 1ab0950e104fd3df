//! Migration plan builder with validation.

use super::{StepRegistry, TransitionTable};
use crate::core::StepName;
use crate::errors::{CycleDetectedError, PlanValidationError};
use crate::steps::Step;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

/// Builder for a validated [`StepRegistry`].
///
/// Each step declares its own successor through [`Step::next_state`]; the
/// builder checks that those successors form a single chain ending at `END`.
#[derive(Debug, Default)]
pub struct MigrationPlanBuilder {
    steps: Vec<Arc<dyn Step>>,
    first: Option<StepName>,
}

impl MigrationPlanBuilder {
    /// Creates an empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a step.
    #[must_use]
    pub fn step(mut self, step: Arc<dyn Step>) -> Self {
        self.add_step(step);
        self
    }

    /// Adds a step in place.
    pub fn add_step(&mut self, step: Arc<dyn Step>) {
        self.steps.push(step);
    }

    /// Sets the first step. Defaults to the first step added.
    #[must_use]
    pub fn starting_at(mut self, first: impl Into<StepName>) -> Self {
        self.first = Some(first.into());
        self
    }

    /// Returns the number of steps added.
    #[must_use]
    pub fn step_count(&self) -> usize {
        self.steps.len()
    }

    /// Validates the plan and builds the registry.
    ///
    /// # Errors
    ///
    /// Rejects empty plans, duplicate or malformed names, reserved names,
    /// successors that are neither registered nor terminal, cycles, and steps
    /// unreachable from the first one.
    pub fn build(self) -> Result<StepRegistry, PlanValidationError> {
        let Some(first_added) = self.steps.first() else {
            return Err(PlanValidationError::new("PLAN-EMPTY", "Migration plan has no steps")
                .with_fix_hint("Add at least one step before building."));
        };
        let first = self
            .first
            .clone()
            .unwrap_or_else(|| first_added.step_name().clone());

        let mut steps: HashMap<StepName, Arc<dyn Step>> = HashMap::new();
        let mut successors = BTreeMap::new();

        for step in &self.steps {
            let name = step.step_name().clone();
            validate_name(&name)?;
            if steps.contains_key(&name) {
                return Err(PlanValidationError::new(
                    "PLAN-DUPLICATE",
                    format!("Step '{name}' is registered more than once"),
                )
                .with_steps(vec![name.to_string()]));
            }
            successors.insert(name.clone(), step.next_state());
            steps.insert(name, Arc::clone(step));
        }

        for (name, next) in &successors {
            if !next.is_terminal() && !successors.contains_key(next) {
                return Err(PlanValidationError::new(
                    "PLAN-UNKNOWN-SUCCESSOR",
                    format!("Step '{name}' continues with unknown step '{next}'"),
                )
                .with_steps(vec![name.to_string(), next.to_string()])
                .with_fix_hint("Register the successor or point the step at END."));
            }
        }

        if !successors.contains_key(&first) {
            return Err(PlanValidationError::new(
                "PLAN-UNKNOWN-FIRST",
                format!("First step '{first}' is not registered"),
            )
            .with_steps(vec![first.to_string()]));
        }

        detect_cycles(&successors)?;

        let order = chain_from(&first, &successors);
        let reached: HashSet<&StepName> = order.iter().collect();
        let mut unreachable: Vec<String> = successors
            .keys()
            .filter(|name| !reached.contains(name))
            .map(ToString::to_string)
            .collect();
        if !unreachable.is_empty() {
            unreachable.sort();
            return Err(PlanValidationError::new(
                "PLAN-UNREACHABLE",
                format!("Steps never reached from '{first}': {}", unreachable.join(", ")),
            )
            .with_steps(unreachable)
            .with_fix_hint("Link every step into the chain starting at the first step."));
        }

        Ok(StepRegistry::new(
            steps,
            TransitionTable::new(first, successors, order),
        ))
    }
}

fn validate_name(name: &StepName) -> Result<(), PlanValidationError> {
    if name.is_terminal() {
        return Err(PlanValidationError::new(
            "PLAN-RESERVED-NAME",
            format!("'{name}' is reserved for a terminal state"),
        )
        .with_steps(vec![name.to_string()]));
    }
    if !name.is_well_formed() {
        return Err(PlanValidationError::new(
            "PLAN-INVALID-NAME",
            format!("Step name '{name}' is not an upper-case identifier"),
        )
        .with_steps(vec![name.to_string()])
        .with_fix_hint("Use names such as EXECUTE_CDI_DETAIL_TABLE_MIGRATION."));
    }
    Ok(())
}

/// Follows every step's successor chain looking for a revisit.
fn detect_cycles(successors: &BTreeMap<StepName, StepName>) -> Result<(), CycleDetectedError> {
    let mut cleared: HashSet<&StepName> = HashSet::new();

    for start in successors.keys() {
        let mut path: Vec<&StepName> = Vec::new();
        let mut current = start;

        loop {
            if cleared.contains(current) || current.is_terminal() {
                break;
            }
            if let Some(position) = path.iter().position(|name| *name == current) {
                let mut cycle: Vec<String> =
                    path[position..].iter().map(ToString::to_string).collect();
                cycle.push(current.to_string());
                return Err(CycleDetectedError::new(cycle));
            }
            path.push(current);
            match successors.get(current) {
                Some(next) => current = next,
                None => break,
            }
        }

        cleared.extend(path);
    }

    Ok(())
}

fn chain_from(first: &StepName, successors: &BTreeMap<StepName, StepName>) -> Vec<StepName> {
    let mut order = Vec::new();
    let mut current = first;
    while let Some(next) = successors.get(current) {
        order.push(current.clone());
        current = next;
    }
    order
}

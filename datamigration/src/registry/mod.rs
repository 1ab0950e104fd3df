//! Step registry and transition table.

mod builder;
mod resolver;
mod transition;

pub use builder::MigrationPlanBuilder;
pub use resolver::{StepRegistry, StepResolver};
pub use transition::TransitionTable;

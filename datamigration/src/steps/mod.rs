//! Steps and their lifecycle.
//!
//! A step is one migratable unit. The driver activates it through
//! [`call`], which classifies the [`StepOutcome`] and picks the next
//! identity; status bookkeeping is shared through the helpers in
//! [`lifecycle`].

mod base;
pub mod lifecycle;
mod outcome;
mod table;

pub use base::{Step, StepContext};
pub use lifecycle::call;
pub use outcome::{StepOutcome, StepReport};
pub use table::TableMigrationStep;

//! Testing utilities for migration runs.
//!
//! This module provides:
//! - In-memory tables with fault injection
//! - A writer that interrupts the run mid-table
//! - Scripted steps and run assertions

mod assertions;
mod mocks;
mod tables;

pub use assertions::{
    assert_ended, assert_errored, assert_step_records, assert_step_status, assert_visit_order,
};
pub use mocks::{ScriptedStep, VisitLog};
pub use tables::{InMemoryTable, Interruption, InterruptingWriter};

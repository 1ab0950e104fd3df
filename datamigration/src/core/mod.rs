//! Core domain model types.
//!
//! This module contains the fundamental types used throughout the engine:
//! - Step identities and the `END` / `ERROR` sentinels
//! - The step status enum
//! - Per-step and per-run status records

mod name;
mod record;
mod status;

pub use name::StepName;
pub use record::{AggregateStatus, StepStatusRecord, Timestamp};
pub use status::StepStatus;

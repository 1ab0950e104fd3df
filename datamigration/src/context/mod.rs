//! Run-scoped coordination state.

mod shared;

pub use shared::{InterruptReason, RunController, RunFlags, RunStateReader, SharedRunState};

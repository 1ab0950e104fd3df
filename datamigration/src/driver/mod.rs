//! Migration driver.
//!
//! The driver owns the run-wide [`SharedRunState`](crate::context::SharedRunState),
//! activates one step at a time and follows the identity each step returns
//! until it reaches `END` or `ERROR`.

mod fsm;
mod handle;
mod report;

pub use fsm::MigrationDriver;
pub use handle::MigrationHandle;
pub use report::RunReport;

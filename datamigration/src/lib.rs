//! # Datamigration
//!
//! A resumable, step-sequenced engine for migrating relational tables from a
//! legacy database to its replacement.
//!
//! Each table is copied by one step. Steps run strictly one after another,
//! persist their own progress and can be paused at any page boundary:
//!
//! - **Paged copy**: read a page, commit it, advance; stop cleanly when the
//!   run is blocked or loses its lock
//! - **Step lifecycle**: IN_PROGRESS on start, then COMPLETED, BLOCKED or
//!   FAILED, with timestamps and record counts
//! - **FSM driver**: follows each step's successor until `END` or `ERROR`
//! - **Resumable runs**: a re-triggered run continues at the last step that
//!   did not complete
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use datamigration::prelude::*;
//!
//! let registry = MigrationPlanBuilder::new()
//!     .step(Arc::new(TableMigrationStep::for_table(detail_copier, "END")))
//!     .build()?;
//!
//! // Picks up the last blocked or failed run, or starts a new one.
//! let driver = MigrationDriver::for_latest_run(Arc::new(registry), &config).await?;
//! let report = driver.resume().await?;
//! ```

#![forbid(unsafe_code)]
#![warn(
    clippy::all,
    clippy::pedantic,
    missing_docs,
    rust_2018_idioms
)]
#![allow(
    clippy::module_name_repetitions,
    clippy::must_use_candidate,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc
)]

pub mod config;
pub mod context;
pub mod copier;
pub mod core;
pub mod driver;
pub mod errors;
pub mod events;
pub mod observability;
pub mod registry;
pub mod steps;
pub mod store;
pub mod testing;

/// Prelude module for convenient imports
pub mod prelude {
    pub use crate::config::{LoggingConfig, MigrationConfig, StatusStoreConfig};
    pub use crate::context::{InterruptReason, RunController, RunStateReader, SharedRunState};
    pub use crate::copier::{
        BulkWriter, CopyOutcome, FnTableCopier, Page, PageCursor, PagedReader, PagedTableCopier,
        TableCopier,
    };
    pub use crate::core::{AggregateStatus, StepName, StepStatus, StepStatusRecord};
    pub use crate::driver::{MigrationDriver, MigrationHandle, RunReport};
    pub use crate::errors::{
        DataAccessError, DataAccessKind, MigrationError, PlanValidationError, StoreError,
    };
    pub use crate::events::{EventSink, LoggingEventSink, NoOpEventSink};
    pub use crate::observability::init_tracing;
    pub use crate::registry::{MigrationPlanBuilder, StepRegistry, StepResolver};
    pub use crate::steps::{Step, StepContext, StepOutcome, TableMigrationStep};
    pub use crate::store::{FileStatusStore, InMemoryStatusStore, StatusStore};
}

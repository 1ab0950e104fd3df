//! Lifecycle event emission.
//!
//! The driver reports `run.started`, `step.started`, `step.completed`,
//! `step.interrupted`, `step.failed` and `run.finished` through an
//! [`EventSink`]. The default sink discards everything.

mod sink;

pub use sink::{CollectingEventSink, EventSink, LoggingEventSink, NoOpEventSink};

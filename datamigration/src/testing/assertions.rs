//! Assertions over run reports and status aggregates.

use crate::core::{AggregateStatus, StepStatus};
use crate::driver::RunReport;

/// Asserts that `step` has `expected` status in `aggregate`.
pub fn assert_step_status(aggregate: &AggregateStatus, step: &str, expected: StepStatus) {
    let actual = aggregate.status_of(step);
    assert_eq!(
        actual, expected,
        "Expected step {step} to be {expected}, got {actual}"
    );
}

/// Asserts that `step` finished with `expected` records.
pub fn assert_step_records(aggregate: &AggregateStatus, step: &str, expected: u64) {
    let actual = aggregate.step(step).map(|record| record.records);
    assert_eq!(
        actual,
        Some(expected),
        "Expected step {step} to have {expected} records, got {actual:?}"
    );
}

/// Asserts that the run visited exactly `expected`, in order.
pub fn assert_visit_order(report: &RunReport, expected: &[&str]) {
    let visited: Vec<&str> = report.visited().iter().map(|name| name.as_str()).collect();
    assert_eq!(
        visited, expected,
        "Expected visit order {expected:?}, got {visited:?}"
    );
}

/// Asserts that the run halted at `END`.
pub fn assert_ended(report: &RunReport) {
    assert!(
        report.terminal.is_end(),
        "Expected run to end at END, got {}",
        report.terminal
    );
}

/// Asserts that the run halted at `ERROR`.
pub fn assert_errored(report: &RunReport) {
    assert!(
        report.terminal.is_error(),
        "Expected run to end at ERROR, got {}",
        report.terminal
    );
}

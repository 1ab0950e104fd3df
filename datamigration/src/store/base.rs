use crate::core::AggregateStatus;
use crate::errors::StoreError;
use async_trait::async_trait;
use uuid::Uuid;

/// Persistence for the per-run [`AggregateStatus`] document.
///
/// Callers always read the whole aggregate, mutate it and write the whole
/// aggregate back; implementations never need partial-field updates. Every
/// `put` is also appended to an audit history that is never truncated.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait StatusStore: Send + Sync {
    /// Returns the current aggregate of `run_id`, or `None` if the run was
    /// never initialized.
    async fn get(&self, run_id: Uuid) -> Result<Option<AggregateStatus>, StoreError>;

    /// Replaces the aggregate of `run_id`.
    async fn put(&self, run_id: Uuid, status: AggregateStatus) -> Result<(), StoreError>;

    /// Returns every aggregate ever written for `run_id`, oldest first.
    async fn history(&self, run_id: Uuid) -> Result<Vec<AggregateStatus>, StoreError>;

    /// Returns the ids of all known runs.
    async fn run_ids(&self) -> Result<Vec<Uuid>, StoreError>;

    /// Get the backend type name for logging/debugging.
    fn backend_type(&self) -> &'static str;
}

//! Source and destination ports consumed by the copier.

use super::{Page, PageCursor};
use crate::errors::DataAccessError;
use async_trait::async_trait;
use std::sync::Arc;

/// Reads a source table one page at a time.
#[async_trait]
pub trait PagedReader<R: Send + 'static>: Send + Sync {
    /// Reads the page at `cursor`.
    async fn read(&self, cursor: PageCursor) -> Result<Page<R>, DataAccessError>;
}

/// Writes records to a destination table.
///
/// A successful return means the records are durably committed. Writes are
/// page-atomic: on error nothing from `records` may remain visible.
///
/// A blocked step restarts from its first page when resumed, so writers
/// should upsert by primary key to keep reruns free of duplicates.
#[async_trait]
pub trait BulkWriter<R: Send + 'static>: Send + Sync {
    /// Writes and flushes `records`.
    async fn write_all(&self, records: Vec<R>) -> Result<(), DataAccessError>;
}

#[async_trait]
impl<R, T> PagedReader<R> for Arc<T>
where
    R: Send + 'static,
    T: PagedReader<R> + ?Sized,
{
    async fn read(&self, cursor: PageCursor) -> Result<Page<R>, DataAccessError> {
        (**self).read(cursor).await
    }
}

#[async_trait]
impl<R, T> BulkWriter<R> for Arc<T>
where
    R: Send + 'static,
    T: BulkWriter<R> + ?Sized,
{
    async fn write_all(&self, records: Vec<R>) -> Result<(), DataAccessError> {
        (**self).write_all(records).await
    }
}

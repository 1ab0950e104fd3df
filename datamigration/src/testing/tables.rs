//! In-memory source and destination tables.

use crate::context::RunController;
use crate::copier::{BulkWriter, Page, PageCursor, PagedReader};
use crate::errors::{DataAccessError, DataAccessKind};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

/// A table held in memory, usable as both source and destination.
///
/// Failures can be injected on the n-th read or the n-th write (1-based).
pub struct InMemoryTable<R> {
    rows: Mutex<Vec<R>>,
    reads: AtomicUsize,
    writes: AtomicUsize,
    fail_read_on: Option<usize>,
    fail_write_on: Option<usize>,
    key: Option<fn(&R) -> u64>,
}

impl<R> std::fmt::Debug for InMemoryTable<R> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryTable")
            .field("rows", &self.len())
            .field("reads", &self.read_count())
            .field("writes", &self.write_count())
            .field("keyed", &self.key.is_some())
            .finish()
    }
}

impl<R> Default for InMemoryTable<R> {
    fn default() -> Self {
        Self::with_rows(Vec::new())
    }
}

impl<R> InMemoryTable<R> {
    /// Creates an empty table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a table holding `rows`.
    #[must_use]
    pub fn with_rows(rows: Vec<R>) -> Self {
        Self {
            rows: Mutex::new(rows),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
            fail_read_on: None,
            fail_write_on: None,
            key: None,
        }
    }

    /// Fails the `page`-th read with a connectivity error.
    #[must_use]
    pub fn fail_read_on_page(mut self, page: usize) -> Self {
        self.fail_read_on = Some(page);
        self
    }

    /// Fails the `page`-th write with a constraint error.
    #[must_use]
    pub fn fail_write_on_page(mut self, page: usize) -> Self {
        self.fail_write_on = Some(page);
        self
    }

    /// Makes writes upsert by `key` instead of appending.
    #[must_use]
    pub fn keyed_by(mut self, key: fn(&R) -> u64) -> Self {
        self.key = Some(key);
        self
    }

    /// Number of rows held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.rows.lock().len()
    }

    /// Returns true if the table holds no rows.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows.lock().is_empty()
    }

    /// Number of reads served or failed.
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Number of writes applied or failed.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }
}

impl<R: Clone> InMemoryTable<R> {
    /// Returns a copy of the rows.
    #[must_use]
    pub fn rows(&self) -> Vec<R> {
        self.rows.lock().clone()
    }
}

#[async_trait]
impl<R> PagedReader<R> for InMemoryTable<R>
where
    R: Clone + Send + Sync + 'static,
{
    async fn read(&self, cursor: PageCursor) -> Result<Page<R>, DataAccessError> {
        let read = self.reads.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_read_on == Some(read) {
            return Err(DataAccessError::reading(
                DataAccessKind::Connectivity,
                format!("simulated failure reading page {read}"),
            ));
        }
        Ok(Page::from_slice(&self.rows.lock(), cursor))
    }
}

#[async_trait]
impl<R> BulkWriter<R> for InMemoryTable<R>
where
    R: Send + 'static,
{
    async fn write_all(&self, records: Vec<R>) -> Result<(), DataAccessError> {
        let write = self.writes.fetch_add(1, Ordering::SeqCst) + 1;
        if self.fail_write_on == Some(write) {
            return Err(DataAccessError::writing(
                DataAccessKind::Constraint,
                format!("simulated failure writing page {write}"),
            ));
        }

        let mut rows = self.rows.lock();
        match self.key {
            Some(key) => {
                for record in records {
                    let id = key(&record);
                    match rows.iter().position(|row| key(row) == id) {
                        Some(index) => rows[index] = record,
                        None => rows.push(record),
                    }
                }
            }
            None => rows.extend(records),
        }
        Ok(())
    }
}

/// What an [`InterruptingWriter`] does to the run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interruption {
    /// Request a block.
    Block,
    /// Release the exclusivity lock.
    ReleaseLock,
}

/// Writer that interrupts the run once `after` writes have been committed.
///
/// Simulates an operator acting while a step is mid-table.
#[derive(Debug)]
pub struct InterruptingWriter<W> {
    inner: W,
    controller: RunController,
    after: usize,
    interruption: Interruption,
    writes: AtomicUsize,
}

impl<W> InterruptingWriter<W> {
    /// Wraps `inner`.
    pub fn new(inner: W, controller: RunController, after: usize, interruption: Interruption) -> Self {
        Self {
            inner,
            controller,
            after,
            interruption,
            writes: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl<R, W> BulkWriter<R> for InterruptingWriter<W>
where
    R: Send + 'static,
    W: BulkWriter<R>,
{
    async fn write_all(&self, records: Vec<R>) -> Result<(), DataAccessError> {
        self.inner.write_all(records).await?;
        if self.writes.fetch_add(1, Ordering::SeqCst) + 1 == self.after {
            match self.interruption {
                Interruption::Block => {
                    self.controller.request_block("operator pause");
                }
                Interruption::ReleaseLock => self.controller.release_lock(),
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::SharedRunState;
    use crate::errors::DataTarget;

    #[tokio::test]
    async fn test_read_pages() {
        let table = InMemoryTable::with_rows(vec![1, 2, 3]);
        let page = table.read(PageCursor::first(2)).await.unwrap();

        assert_eq!(page.records, vec![1, 2]);
        assert!(page.has_more());
        assert_eq!(table.read_count(), 1);
    }

    #[tokio::test]
    async fn test_injected_write_failure() {
        let table = InMemoryTable::<i32>::new().fail_write_on_page(2);

        table.write_all(vec![1, 2]).await.unwrap();
        let err = table.write_all(vec![3]).await.unwrap_err();
        table.write_all(vec![4]).await.unwrap();

        assert_eq!(err.target, DataTarget::Destination);
        assert_eq!(table.rows(), vec![1, 2, 4]);
        assert_eq!(table.write_count(), 3);
    }

    #[tokio::test]
    async fn test_keyed_table_upserts() {
        let table = InMemoryTable::<(u64, &'static str)>::new().keyed_by(|row| row.0);

        table.write_all(vec![(1, "a"), (2, "b")]).await.unwrap();
        table.write_all(vec![(2, "c"), (3, "d")]).await.unwrap();

        assert_eq!(table.rows(), vec![(1, "a"), (2, "c"), (3, "d")]);
    }

    #[tokio::test]
    async fn test_interrupting_writer() {
        let state = SharedRunState::for_new_run();
        let writer = InterruptingWriter::new(
            InMemoryTable::<i32>::new(),
            state.controller(),
            2,
            Interruption::Block,
        );

        writer.write_all(vec![1]).await.unwrap();
        assert!(!state.flags().block_requested);
        writer.write_all(vec![2]).await.unwrap();
        assert!(state.flags().block_requested);
    }
}

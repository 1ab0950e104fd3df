//! The paged copy loop and the copiers built on it.

use super::{BulkWriter, Page, PageCursor, PagedReader};
use crate::context::{InterruptReason, RunFlags, RunStateReader};
use crate::errors::DataAccessError;
use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::Serialize;
use std::fmt::Debug;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::debug;

/// Returns true if the copy loop may request the page at `next`.
///
/// Evaluated only between pages: the run must not be blocked, must still
/// hold its lock, and the source must have another page.
#[must_use]
pub fn can_continue_read_pages(flags: RunFlags, next: Option<&PageCursor>) -> bool {
    flags.can_proceed() && next.is_some()
}

/// How a copy ended.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum CopyOutcome {
    /// Every page was read and written.
    Completed {
        /// Records written.
        records: u64,
        /// Pages read and committed.
        pages: u64,
    },
    /// Paging stopped at a page boundary because the run was interrupted.
    Interrupted {
        /// Records written before stopping.
        records: u64,
        /// Pages read and committed before stopping.
        pages: u64,
        /// Why paging stopped.
        reason: InterruptReason,
    },
    /// A read or write failed; no later page was requested.
    Failed {
        /// Records committed before the failure.
        records: u64,
        /// Pages committed before the failure.
        pages: u64,
        /// The data-access failure.
        cause: DataAccessError,
    },
}

impl CopyOutcome {
    /// Records committed to the destination.
    #[must_use]
    pub fn records(&self) -> u64 {
        match self {
            Self::Completed { records, .. }
            | Self::Interrupted { records, .. }
            | Self::Failed { records, .. } => *records,
        }
    }

    /// Pages committed to the destination.
    #[must_use]
    pub fn pages(&self) -> u64 {
        match self {
            Self::Completed { pages, .. }
            | Self::Interrupted { pages, .. }
            | Self::Failed { pages, .. } => *pages,
        }
    }

    /// Returns true if the source was exhausted.
    #[must_use]
    pub fn is_completed(&self) -> bool {
        matches!(self, Self::Completed { .. })
    }
}

/// Copies `reader` into `writer` page by page.
///
/// Each page is committed before the next one is requested, and the running
/// count only includes committed pages. After every page a single snapshot of
/// the run flags decides both whether to continue and, if not, whether the
/// copy was interrupted. A page already in flight always completes.
pub async fn copy_pages<R, Rd, W>(
    reader: &Rd,
    writer: &W,
    run: &RunStateReader,
    page_size: usize,
) -> CopyOutcome
where
    R: Send + 'static,
    Rd: PagedReader<R> + ?Sized,
    W: BulkWriter<R> + ?Sized,
{
    let mut cursor = PageCursor::first(page_size);
    let mut records = 0_u64;
    let mut pages = 0_u64;

    loop {
        let Page {
            records: batch,
            next,
        } = match reader.read(cursor).await {
            Ok(page) => page,
            Err(cause) => return CopyOutcome::Failed { records, pages, cause },
        };

        let count = batch.len() as u64;
        if !batch.is_empty() {
            if let Err(cause) = writer.write_all(batch).await {
                return CopyOutcome::Failed { records, pages, cause };
            }
        }
        records += count;
        pages += 1;
        debug!(
            run_id = %run.run_id(),
            page = cursor.page(),
            page_records = count,
            records,
            "Copied page"
        );

        let flags = run.flags();
        match next {
            Some(next) if can_continue_read_pages(flags, Some(&next)) => cursor = next,
            Some(_) => {
                let reason = flags
                    .interruption()
                    .unwrap_or(InterruptReason::BlockRequested);
                return CopyOutcome::Interrupted {
                    records,
                    pages,
                    reason,
                };
            }
            None => return CopyOutcome::Completed { records, pages },
        }
    }
}

/// Object-safe copy of one table, as injected into a table migration step.
#[async_trait]
pub trait TableCopier: Send + Sync + Debug {
    /// Name of the table being copied.
    fn table(&self) -> &str;

    /// Runs the copy under `run`'s flags.
    async fn copy(&self, run: &RunStateReader, page_size: usize) -> CopyOutcome;
}

/// [`TableCopier`] pairing a [`PagedReader`] with a [`BulkWriter`].
pub struct PagedTableCopier<R, Rd, W> {
    table: String,
    reader: Rd,
    writer: W,
    _record: PhantomData<fn() -> R>,
}

impl<R, Rd, W> PagedTableCopier<R, Rd, W>
where
    R: Send + 'static,
    Rd: PagedReader<R>,
    W: BulkWriter<R>,
{
    /// Creates a copier for `table`.
    pub fn new(table: impl Into<String>, reader: Rd, writer: W) -> Self {
        Self {
            table: table.into(),
            reader,
            writer,
            _record: PhantomData,
        }
    }
}

impl<R, Rd, W> Debug for PagedTableCopier<R, Rd, W> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PagedTableCopier")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl<R, Rd, W> TableCopier for PagedTableCopier<R, Rd, W>
where
    R: Send + 'static,
    Rd: PagedReader<R>,
    W: BulkWriter<R>,
{
    fn table(&self) -> &str {
        &self.table
    }

    async fn copy(&self, run: &RunStateReader, page_size: usize) -> CopyOutcome {
        copy_pages(&self.reader, &self.writer, run, page_size).await
    }
}

/// Boxed copy function: receives the run flags and the page size.
pub type CopyFn =
    Arc<dyn Fn(RunStateReader, usize) -> BoxFuture<'static, CopyOutcome> + Send + Sync>;

/// [`TableCopier`] delegating to a plain async function.
#[derive(Clone)]
pub struct FnTableCopier {
    table: String,
    func: CopyFn,
}

impl FnTableCopier {
    /// Creates a copier for `table` running `func`.
    pub fn new<F>(table: impl Into<String>, func: F) -> Self
    where
        F: Fn(RunStateReader, usize) -> BoxFuture<'static, CopyOutcome> + Send + Sync + 'static,
    {
        Self {
            table: table.into(),
            func: Arc::new(func),
        }
    }
}

impl Debug for FnTableCopier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FnTableCopier")
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl TableCopier for FnTableCopier {
    fn table(&self) -> &str {
        &self.table
    }

    async fn copy(&self, run: &RunStateReader, page_size: usize) -> CopyOutcome {
        (self.func)(run.clone(), page_size).await
    }
}

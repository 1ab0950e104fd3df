use serde::{Deserialize, Serialize};

/// Position of one page within a source table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PageCursor {
    page: usize,
    page_size: usize,
}

impl PageCursor {
    /// Cursor on the first page.
    ///
    /// A `page_size` of zero is treated as one.
    #[must_use]
    pub fn first(page_size: usize) -> Self {
        Self {
            page: 0,
            page_size: page_size.max(1),
        }
    }

    /// Zero-based page number.
    #[must_use]
    pub fn page(&self) -> usize {
        self.page
    }

    /// Records per page.
    #[must_use]
    pub fn page_size(&self) -> usize {
        self.page_size
    }

    /// Index of the first record on this page.
    #[must_use]
    pub fn offset(&self) -> usize {
        self.page.saturating_mul(self.page_size)
    }

    /// Cursor on the following page.
    #[must_use]
    pub fn next(&self) -> Self {
        Self {
            page: self.page + 1,
            page_size: self.page_size,
        }
    }
}

/// One page of records returned by a [`PagedReader`](super::PagedReader).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Page<R> {
    /// Records on this page, in source order.
    pub records: Vec<R>,
    /// Cursor of the following page; `None` once the source is exhausted.
    pub next: Option<PageCursor>,
}

impl<R> Page<R> {
    /// Creates a page followed by `next`.
    #[must_use]
    pub fn new(records: Vec<R>, next: Option<PageCursor>) -> Self {
        Self { records, next }
    }

    /// Creates the final page of a source.
    #[must_use]
    pub fn last(records: Vec<R>) -> Self {
        Self::new(records, None)
    }

    /// Slices the page at `cursor` out of `rows`.
    #[must_use]
    pub fn from_slice(rows: &[R], cursor: PageCursor) -> Self
    where
        R: Clone,
    {
        let start = cursor.offset().min(rows.len());
        let end = start.saturating_add(cursor.page_size()).min(rows.len());
        let next = (end < rows.len()).then(|| cursor.next());
        Self::new(rows[start..end].to_vec(), next)
    }

    /// Returns true if another page follows.
    #[must_use]
    pub fn has_more(&self) -> bool {
        self.next.is_some()
    }

    /// Number of records on this page.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns true if the page holds no records.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

//! Paged table copy: read a page from the source, commit it to the
//! destination, advance, repeat until the source is exhausted or the run is
//! interrupted.

mod cursor;
mod paged;
mod ports;

pub use cursor::{Page, PageCursor};
pub use paged::{
    can_continue_read_pages, copy_pages, CopyFn, CopyOutcome, FnTableCopier, PagedTableCopier,
    TableCopier,
};
pub use ports::{BulkWriter, PagedReader};

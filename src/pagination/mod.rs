//! Pagination
//!
//! Cursor-following walks over report resources and the sinks that receive
//! each page.

pub mod sink;
pub mod walker;

pub use sink::{FileSink, InMemorySink, StorageSink};
pub use walker::{
    extract_cursor, Page, PaginationWalker, StartPosition, WalkOptions, WalkState, WalkSummary,
    DEFAULT_CURSOR_FIELD,
};

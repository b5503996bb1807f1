//! # bookmark-core
//!
//! Core types, traits and pagination logic for the bookmark service.
//!
//! Bookmarks carry a variable-precision display date ([`DisplayDate`]) that
//! reduces to a single sort key. Listings are served in `(sort_date,
//! bookmark_id)` order through opaque, filter-bound cursors ([`CursorCodec`])
//! so clients can resume without server-side state.

pub mod cursor;
pub mod defaults;
pub mod display_date;
pub mod error;
pub mod filter;
pub mod models;
pub mod page;
pub mod pagination;
pub mod planner;
pub mod traits;

// Re-export commonly used types at crate root
pub use cursor::{Cursor, CursorCodec, Direction};
pub use display_date::{DisplayDate, Granularity};
pub use error::{Error, Result};
pub use filter::{BookmarkFilter, DateRangeFilter, FilterFingerprint, TopicFilter};
pub use models::*;
pub use page::{Keyed, Page, PaginatedResultAssembler};
pub use pagination::Paginator;
pub use planner::{
    OrderedQuery, PageState, PaginationConfig, QueryPlanner, Seek, TotalCountPolicy,
};
pub use traits::*;

//! Cursor pagination over a [`BookmarkRepository`].

use std::time::Instant;

use tracing::debug;

use crate::cursor::CursorCodec;
use crate::error::Result;
use crate::filter::BookmarkFilter;
use crate::models::Bookmark;
use crate::page::{Page, PaginatedResultAssembler};
use crate::planner::{PageState, PaginationConfig, QueryPlanner};
use crate::traits::BookmarkRepository;

/// Serves one page of a filtered, ordered bookmark listing per call.
///
/// Holds no per-client state; everything needed to resume lives in the
/// cursor token.
#[derive(Debug, Clone, Copy, Default)]
pub struct Paginator {
    config: PaginationConfig,
}

impl Paginator {
    pub fn new(config: PaginationConfig) -> Self {
        Self { config }
    }

    /// Fetch the page of `filter` that follows `cursor`, or the first page.
    ///
    /// A bad token fails with `InvalidCursor` and a token minted for another
    /// filter with `CursorFilterMismatch`; neither falls back to page one.
    pub async fn list(
        &self,
        repo: &dyn BookmarkRepository,
        filter: &BookmarkFilter,
        cursor: Option<&str>,
        count: Option<i64>,
    ) -> Result<Page<Bookmark>> {
        let start = Instant::now();
        let fingerprint = filter.fingerprint();

        let cursor = cursor.map(CursorCodec::decode).transpose()?;
        if let Some(c) = &cursor {
            CursorCodec::validate(c, &fingerprint)?;
        }

        let page_size = self.config.page_size(count);
        let query = QueryPlanner::plan(filter, cursor.as_ref(), page_size);
        let rows = repo.fetch_page(&query).await?;
        let state = QueryPlanner::state(&query, rows.len());

        let total_count = match state {
            PageState::LastPage if query.is_first_page() => Some(rows.len() as i64),
            _ if self.config.total_count.should_count(filter) => Some(repo.count(filter).await?),
            _ => None,
        };

        let page = PaginatedResultAssembler::assemble(rows, page_size, &fingerprint, total_count);

        debug!(
            subsystem = "pagination",
            component = "paginator",
            op = "list",
            filter_kind = filter.kind(),
            filter_fingerprint = %fingerprint,
            page_size,
            has_cursor = cursor.is_some(),
            has_next = page.next_cursor.is_some(),
            result_count = page.items.len(),
            total_count = ?page.total_count,
            page_state = ?state,
            duration_ms = start.elapsed().as_millis() as u64,
            "Listed bookmark page"
        );

        Ok(page)
    }
}

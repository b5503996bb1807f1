//! Query planning for paginated list requests.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::cursor::Cursor;
use crate::defaults;
use crate::error::{Error, Result};
use crate::filter::BookmarkFilter;

/// When a list response reports `total_count`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TotalCountPolicy {
    /// Count on every request.
    Always,
    /// Count only when the filter is narrow (see [`BookmarkFilter::is_narrow`]).
    #[default]
    NarrowFilters,
    /// Never count. A first page that is also the last still reports its length.
    Never,
}

impl TotalCountPolicy {
    pub fn should_count(self, filter: &BookmarkFilter) -> bool {
        match self {
            TotalCountPolicy::Always => true,
            TotalCountPolicy::NarrowFilters => filter.is_narrow(),
            TotalCountPolicy::Never => false,
        }
    }
}

impl FromStr for TotalCountPolicy {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "always" => Ok(TotalCountPolicy::Always),
            "narrow" | "narrow_filters" => Ok(TotalCountPolicy::NarrowFilters),
            "never" => Ok(TotalCountPolicy::Never),
            other => Err(Error::Config(format!(
                "unknown total count policy: {}",
                other
            ))),
        }
    }
}

/// Page size limits and count policy, fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PaginationConfig {
    pub default_page_size: i64,
    pub max_page_size: i64,
    pub total_count: TotalCountPolicy,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_page_size: defaults::PAGE_SIZE,
            max_page_size: defaults::MAX_PAGE_SIZE,
            total_count: TotalCountPolicy::default(),
        }
    }
}

impl PaginationConfig {
    pub fn new(default_page_size: i64, max_page_size: i64) -> Result<Self> {
        if max_page_size < 1 {
            return Err(Error::Config(format!(
                "max page size must be positive, got {}",
                max_page_size
            )));
        }
        if default_page_size < 1 || default_page_size > max_page_size {
            return Err(Error::Config(format!(
                "default page size {} must be in 1..={}",
                default_page_size, max_page_size
            )));
        }
        Ok(Self {
            default_page_size,
            max_page_size,
            total_count: TotalCountPolicy::default(),
        })
    }

    pub fn with_total_count(mut self, policy: TotalCountPolicy) -> Self {
        self.total_count = policy;
        self
    }

    /// Effective page size for a requested `count`.
    ///
    /// Absent or non-positive values fall back to the default; anything above
    /// the maximum is clamped down to it.
    pub fn page_size(&self, requested: Option<i64>) -> usize {
        let size = match requested {
            Some(n) if n > 0 => n.min(self.max_page_size),
            _ => self.default_page_size,
        };
        size as usize
    }
}

/// Strict lower bound on `(sort_date, bookmark_id)` taken from a cursor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Seek {
    pub sort_key: DateTime<Utc>,
    pub bookmark_id: Uuid,
}

impl Seek {
    /// True when `(sort_key, id)` sorts strictly after this bound.
    pub fn admits(&self, sort_key: DateTime<Utc>, id: Uuid) -> bool {
        (sort_key, id) > (self.sort_key, self.bookmark_id)
    }
}

/// Where a request sits in the forward-only page sequence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PageState {
    FirstPage,
    MiddlePage,
    LastPage,
}

/// A bounded, ordered store query.
///
/// Rows matching `filter` and admitted by `seek` are returned ordered by
/// `(sort_date ASC, bookmark_id ASC)`, at most `limit` of them. `limit` is
/// one more than the page size so the assembler can tell whether a further
/// page exists.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderedQuery {
    pub filter: BookmarkFilter,
    pub seek: Option<Seek>,
    pub limit: usize,
}

impl OrderedQuery {
    pub fn page_size(&self) -> usize {
        self.limit - 1
    }

    pub fn is_first_page(&self) -> bool {
        self.seek.is_none()
    }
}

pub struct QueryPlanner;

impl QueryPlanner {
    /// Build the store query for one page. The cursor must already be validated.
    pub fn plan(filter: &BookmarkFilter, cursor: Option<&Cursor>, page_size: usize) -> OrderedQuery {
        OrderedQuery {
            filter: filter.clone(),
            seek: cursor.map(|c| Seek {
                sort_key: c.sort_key,
                bookmark_id: c.tie_break_id,
            }),
            limit: page_size.max(1) + 1,
        }
    }

    /// Classify a fetched page.
    pub fn state(query: &OrderedQuery, fetched: usize) -> PageState {
        if fetched < query.limit {
            PageState::LastPage
        } else if query.is_first_page() {
            PageState::FirstPage
        } else {
            PageState::MiddlePage
        }
    }
}

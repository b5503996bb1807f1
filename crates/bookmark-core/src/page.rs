//! Page shape returned by list operations.

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::cursor::CursorCodec;
use crate::filter::FilterFingerprint;

/// Rows that can be paged over: they expose the `(sort_key, id)` pair.
pub trait Keyed {
    fn sort_key(&self) -> DateTime<Utc>;
    fn key_id(&self) -> Uuid;
}

/// One page of a list result.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Exact number of matching rows; `None` means unknown, never zero.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<i64>,
    /// Token for the following page; absent on the last page.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl<T> Page<T> {
    pub fn is_last(&self) -> bool {
        self.next_cursor.is_none()
    }

    pub fn map<U, F: FnMut(T) -> U>(self, f: F) -> Page<U> {
        Page {
            items: self.items.into_iter().map(f).collect(),
            total_count: self.total_count,
            next_cursor: self.next_cursor,
        }
    }
}

pub struct PaginatedResultAssembler;

impl PaginatedResultAssembler {
    /// Turn up to `page_size + 1` fetched rows into a page.
    ///
    /// The extra row, when present, proves another page exists; it is dropped
    /// and the cursor is taken from the last row kept.
    pub fn assemble<T: Keyed>(
        mut rows: Vec<T>,
        page_size: usize,
        fingerprint: &FilterFingerprint,
        total_count: Option<i64>,
    ) -> Page<T> {
        let has_more = rows.len() > page_size;
        rows.truncate(page_size);

        let next_cursor = if has_more {
            rows.last()
                .map(|row| CursorCodec::encode(row.sort_key(), row.key_id(), *fingerprint))
        } else {
            None
        };

        Page {
            items: rows,
            total_count,
            next_cursor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::filter::BookmarkFilter;
    use chrono::TimeZone;

    #[derive(Debug, Clone, PartialEq)]
    struct Row(DateTime<Utc>, Uuid);

    impl Keyed for Row {
        fn sort_key(&self) -> DateTime<Utc> {
            self.0
        }
        fn key_id(&self) -> Uuid {
            self.1
        }
    }

    fn rows(n: u128) -> Vec<Row> {
        let at = Utc.with_ymd_and_hms(2017, 1, 1, 0, 0, 0).unwrap();
        (1..=n).map(|i| Row(at, Uuid::from_u128(i))).collect()
    }

    #[test]
    fn test_exactly_page_size_is_last() {
        let fp = BookmarkFilter::default().fingerprint();
        let page = PaginatedResultAssembler::assemble(rows(3), 3, &fp, Some(3));
        assert_eq!(page.items.len(), 3);
        assert!(page.is_last());
        assert_eq!(page.total_count, Some(3));
    }

    #[test]
    fn test_extra_row_yields_cursor_from_last_kept() {
        let fp = BookmarkFilter::default().fingerprint();
        let page = PaginatedResultAssembler::assemble(rows(4), 3, &fp, None);
        assert_eq!(page.items.len(), 3);
        let token = page.next_cursor.expect("cursor");
        let cursor = CursorCodec::decode(&token).unwrap();
        assert_eq!(cursor.tie_break_id, Uuid::from_u128(3));
        assert_eq!(cursor.fingerprint, fp);
        assert_eq!(page.total_count, None);
    }

    #[test]
    fn test_map_keeps_cursor_and_count() {
        let fp = BookmarkFilter::default().fingerprint();
        let page = PaginatedResultAssembler::assemble(rows(4), 3, &fp, Some(4));
        let cursor = page.next_cursor.clone();

        let ids = page.map(|row| row.1);
        assert_eq!(ids.items, vec![Uuid::from_u128(1), Uuid::from_u128(2), Uuid::from_u128(3)]);
        assert_eq!(ids.next_cursor, cursor);
        assert_eq!(ids.total_count, Some(4));
    }

    #[test]
    fn test_empty_rows() {
        let fp = BookmarkFilter::default().fingerprint();
        let page: Page<Row> = PaginatedResultAssembler::assemble(vec![], 3, &fp, Some(0));
        assert!(page.items.is_empty());
        assert!(page.is_last());
        assert_eq!(page.total_count, Some(0));
    }
}

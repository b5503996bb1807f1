//! SQL rendering of planned bookmark queries.
//!
//! Builds parameterized clauses with `$n` placeholders and returns the
//! parameters in bind order, so callers never interpolate user input.

use chrono::{DateTime, Utc};
use sqlx::postgres::PgArguments;
use sqlx::query::QueryAs;
use sqlx::Postgres;
use uuid::Uuid;

use bookmark_core::{BookmarkFilter, OrderedQuery};

/// A bind parameter for a generated query.
#[derive(Debug, Clone, PartialEq)]
pub enum QueryParam {
    Uuid(Uuid),
    Timestamp(DateTime<Utc>),
    StringArray(Vec<String>),
    Int(i64),
}

/// Columns selected for a full bookmark row, topics aggregated in name order.
pub(crate) const BOOKMARK_COLUMNS: &str = r#"
    b.bookmark_id,
    b.url,
    b.summary,
    b.description,
    b.sort_date,
    b.display_date_format,
    b.status,
    b.created_on,
    b.submitted_on,
    ARRAY(
        SELECT bt.topic FROM bookmark_topics bt
        WHERE bt.bookmark_id = b.bookmark_id
        ORDER BY bt.topic
    )::text[] AS topics
"#;

/// Renders [`OrderedQuery`] values and filters as SQL against `bookmarks b`.
///
/// Placeholders are numbered from `$1` in the order of the returned params.
#[derive(Debug, Default, Clone, Copy)]
pub struct BookmarkQueryBuilder;

impl BookmarkQueryBuilder {
    pub fn new() -> Self {
        Self
    }

    /// WHERE clause for a filter, without the keyword.
    pub fn filter_clause(&self, filter: &BookmarkFilter) -> (String, Vec<QueryParam>) {
        let mut idx = 0;
        match filter {
            BookmarkFilter::Topics(t) if t.topics.is_empty() => ("TRUE".to_string(), vec![]),
            BookmarkFilter::Topics(t) => {
                idx += 1;
                (
                    format!(
                        "EXISTS (SELECT 1 FROM bookmark_topics bt WHERE bt.bookmark_id = b.bookmark_id AND bt.topic = ANY(${}::text[]))",
                        idx
                    ),
                    vec![QueryParam::StringArray(t.topics.iter().cloned().collect())],
                )
            }
            BookmarkFilter::DateRange(range) => {
                idx += 1;
                let mut clause = format!("b.sort_date >= ${}", idx);
                let mut params = vec![QueryParam::Timestamp(range.start)];
                if let Some(end) = range.end {
                    idx += 1;
                    clause.push_str(&format!(" AND b.sort_date < ${}", idx));
                    params.push(QueryParam::Timestamp(end));
                }
                (clause, params)
            }
        }
    }

    /// Full page SELECT: filter, strict row-value seek, key order, limit.
    pub fn page(&self, query: &OrderedQuery) -> (String, Vec<QueryParam>) {
        let (mut where_clause, mut params) = self.filter_clause(&query.filter);
        let mut idx = params.len();

        if let Some(seek) = &query.seek {
            where_clause.push_str(&format!(
                " AND (b.sort_date, b.bookmark_id) > (${}, ${})",
                idx + 1,
                idx + 2
            ));
            idx += 2;
            params.push(QueryParam::Timestamp(seek.sort_key));
            params.push(QueryParam::Uuid(seek.bookmark_id));
        }

        idx += 1;
        params.push(QueryParam::Int(query.limit as i64));

        let sql = format!(
            "SELECT {} FROM bookmarks b WHERE {} ORDER BY b.sort_date ASC, b.bookmark_id ASC LIMIT ${}",
            BOOKMARK_COLUMNS.trim(),
            where_clause,
            idx
        );
        (sql, params)
    }

    /// `COUNT(*)` over every row matching the filter.
    pub fn count(&self, filter: &BookmarkFilter) -> (String, Vec<QueryParam>) {
        let (where_clause, params) = self.filter_clause(filter);
        (
            format!("SELECT COUNT(*) FROM bookmarks b WHERE {}", where_clause),
            params,
        )
    }
}

/// Bind generated parameters in order.
pub(crate) fn bind_params<'q, O>(
    mut q: QueryAs<'q, Postgres, O, PgArguments>,
    params: &'q [QueryParam],
) -> QueryAs<'q, Postgres, O, PgArguments> {
    for param in params {
        q = match param {
            QueryParam::Uuid(id) => q.bind(id),
            QueryParam::Timestamp(ts) => q.bind(ts),
            QueryParam::StringArray(arr) => q.bind(arr),
            QueryParam::Int(val) => q.bind(val),
        };
    }
    q
}

#[cfg(test)]
mod tests {
    use super::*;
    use bookmark_core::{Cursor, DateRangeFilter, QueryPlanner, TopicFilter};
    use chrono::TimeZone;

    fn utc(y: i32, m: u32, d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(y, m, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn test_all_filter_is_true() {
        let (clause, params) = BookmarkQueryBuilder::new().filter_clause(&BookmarkFilter::default());
        assert_eq!(clause, "TRUE");
        assert!(params.is_empty());
    }

    #[test]
    fn test_topic_filter_uses_any() {
        let filter = BookmarkFilter::Topics(TopicFilter::new(["b", "a"]));
        let (clause, params) = BookmarkQueryBuilder::new().filter_clause(&filter);
        assert!(clause.contains("bt.topic = ANY($1::text[])"));
        assert_eq!(
            params,
            vec![QueryParam::StringArray(vec!["a".into(), "b".into()])]
        );
    }

    #[test]
    fn test_date_range_bounds() {
        let filter = BookmarkFilter::DateRange(
            DateRangeFilter::new(utc(2017, 1, 1), Some(utc(2017, 2, 1))).unwrap(),
        );
        let (clause, params) = BookmarkQueryBuilder::new().filter_clause(&filter);
        assert_eq!(clause, "b.sort_date >= $1 AND b.sort_date < $2");
        assert_eq!(params.len(), 2);

        let open = BookmarkFilter::DateRange(DateRangeFilter::new(utc(2017, 1, 1), None).unwrap());
        let (clause, params) = BookmarkQueryBuilder::new().filter_clause(&open);
        assert_eq!(clause, "b.sort_date >= $1");
        assert_eq!(params, vec![QueryParam::Timestamp(utc(2017, 1, 1))]);
    }

    #[test]
    fn test_first_page_sql() {
        let query = QueryPlanner::plan(&BookmarkFilter::default(), None, 2);
        let (sql, params) = BookmarkQueryBuilder::new().page(&query);
        assert!(sql.contains("WHERE TRUE ORDER BY b.sort_date ASC, b.bookmark_id ASC LIMIT $1"));
        assert_eq!(params, vec![QueryParam::Int(3)]);
    }

    #[test]
    fn test_seek_page_sql() {
        let filter = BookmarkFilter::DateRange(DateRangeFilter::new(utc(2017, 1, 1), None).unwrap());
        let id = Uuid::now_v7();
        let cursor = Cursor::forward(utc(2017, 3, 1), id, filter.fingerprint());
        let query = QueryPlanner::plan(&filter, Some(&cursor), 10);
        let (sql, params) = BookmarkQueryBuilder::new().page(&query);

        assert!(sql.contains("b.sort_date >= $1 AND (b.sort_date, b.bookmark_id) > ($2, $3)"));
        assert!(sql.ends_with("LIMIT $4"));
        assert_eq!(
            params,
            vec![
                QueryParam::Timestamp(utc(2017, 1, 1)),
                QueryParam::Timestamp(utc(2017, 3, 1)),
                QueryParam::Uuid(id),
                QueryParam::Int(11),
            ]
        );
    }

    #[test]
    fn test_count_sql() {
        let filter = BookmarkFilter::Topics(TopicFilter::new(["a"]));
        let (sql, params) = BookmarkQueryBuilder::new().count(&filter);
        assert!(sql.starts_with("SELECT COUNT(*) FROM bookmarks b WHERE EXISTS"));
        assert_eq!(params.len(), 1);
    }
}

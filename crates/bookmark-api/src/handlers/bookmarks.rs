//! Bookmark HTTP handlers.
//!
//! List responses look like:
//!
//! ```json
//! {
//!   "bookmarks": [<bookmark>, ...],
//!   "total_count": 3,
//!   "next_cursor": "..."
//! }
//! ```
//!
//! `total_count` is omitted when the count was not computed and
//! `next_cursor` is omitted on the last page.

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use uuid::Uuid;

use bookmark_core::{
    Bookmark, BookmarkFilter, BookmarkNote, BookmarkStatus, BookmarkWithNotes,
    CreateBookmarkRequest, DisplayDate, UpdateBookmarkRequest,
};

use super::{parse_id, parse_json};
use crate::{ApiError, AppState};

/// Bookmark JSON representation.
#[derive(Debug, Clone, Serialize)]
pub struct BookmarkResponse {
    pub bookmark_id: Uuid,
    pub url: String,
    /// Registered domain of `url`, e.g. `cnn.com`.
    pub tld: Option<String>,
    pub summary: String,
    pub description: Option<String>,
    pub display_date: DisplayDate,
    pub sort_date: DateTime<Utc>,
    pub status: BookmarkStatus,
    pub topics: Vec<String>,
    pub created_on: DateTime<Utc>,
    pub submitted_on: Option<DateTime<Utc>>,
    /// Present on the single-bookmark endpoint only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<Vec<BookmarkNote>>,
}

impl From<Bookmark> for BookmarkResponse {
    fn from(b: Bookmark) -> Self {
        Self {
            tld: b.registered_domain(),
            bookmark_id: b.bookmark_id,
            url: b.url,
            summary: b.summary,
            description: b.description,
            sort_date: b.display_date.sort_key(),
            display_date: b.display_date,
            status: b.status,
            topics: b.topics,
            created_on: b.created_on,
            submitted_on: b.submitted_on,
            notes: None,
        }
    }
}

impl From<BookmarkWithNotes> for BookmarkResponse {
    fn from(b: BookmarkWithNotes) -> Self {
        Self {
            notes: Some(b.notes),
            ..Self::from(b.bookmark)
        }
    }
}

#[derive(Debug, Serialize)]
pub struct BookmarkListResponse {
    pub bookmarks: Vec<BookmarkResponse>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total_count: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_cursor: Option<String>,
}

impl BookmarkListResponse {
    fn single(bookmark: Bookmark) -> Self {
        Self {
            bookmarks: vec![bookmark.into()],
            total_count: None,
            next_cursor: None,
        }
    }
}

/// Query parameters for listing bookmarks.
///
/// `topic` may repeat, so the query string is read as raw pairs rather than
/// into a struct.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct ListBookmarksQuery {
    pub topics: Vec<String>,
    pub start: Option<String>,
    pub end: Option<String>,
    pub count: Option<i64>,
    pub cursor: Option<String>,
}

impl ListBookmarksQuery {
    pub fn from_pairs(pairs: Vec<(String, String)>) -> Result<Self, ApiError> {
        let mut query = Self::default();
        for (key, value) in pairs {
            match key.as_str() {
                "topic" => query.topics.push(value),
                "start" => query.start = Some(value),
                "end" => query.end = Some(value),
                "cursor" => query.cursor = Some(value),
                "count" => query.count = Some(parse_count(&value)?),
                _ => {}
            }
        }
        Ok(query)
    }

    pub fn filter(&self) -> Result<BookmarkFilter, ApiError> {
        Ok(BookmarkFilter::from_params(
            self.topics.clone(),
            self.start.as_deref(),
            self.end.as_deref(),
        )?)
    }
}

/// Parse `count`, saturating integers too large for `i64`.
///
/// Out-of-range sizes are clamped by the paginator, so only text that is not
/// an integer at all is rejected.
fn parse_count(value: &str) -> Result<i64, ApiError> {
    let trimmed = value.trim();
    if let Ok(count) = trimmed.parse::<i64>() {
        return Ok(count);
    }
    let (negative, digits) = match trimmed.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, trimmed.strip_prefix('+').unwrap_or(trimmed)),
    };
    if digits.is_empty() || !digits.bytes().all(|b| b.is_ascii_digit()) {
        return Err(ApiError::BadRequest(format!(
            "count must be a valid int. was: {}",
            value
        )));
    }
    Ok(if negative { i64::MIN } else { i64::MAX })
}

/// List bookmarks, filtered by topic or by display-date range.
///
/// # Returns
/// - 200 OK with a page of bookmarks ordered by `sort_date`, then id
/// - 400 Bad Request for a bad filter, count or cursor
pub async fn list_bookmarks(
    State(state): State<AppState>,
    pairs: Result<Query<Vec<(String, String)>>, QueryRejection>,
) -> Result<Json<BookmarkListResponse>, ApiError> {
    let Query(pairs) = pairs?;
    let query = ListBookmarksQuery::from_pairs(pairs)?;
    let filter = query.filter()?;

    let page = state
        .paginator
        .list(
            state.repo.as_ref(),
            &filter,
            query.cursor.as_deref(),
            query.count,
        )
        .await?
        .map(BookmarkResponse::from);

    Ok(Json(BookmarkListResponse {
        bookmarks: page.items,
        total_count: page.total_count,
        next_cursor: page.next_cursor,
    }))
}

/// Create a bookmark, assigning a new id unless the body supplies one.
///
/// # Returns
/// - 201 Created with `{"bookmarks": [<bookmark>]}`
/// - 400 Bad Request for missing or invalid fields
pub async fn create_bookmark(
    State(state): State<AppState>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let req: CreateBookmarkRequest = parse_json(&body)?;
    let bookmark = state.repo.insert(req.validate()?).await?;

    info!(
        subsystem = "api",
        op = "create_bookmark",
        bookmark_id = %bookmark.bookmark_id,
        "Bookmark created"
    );

    Ok((
        StatusCode::CREATED,
        Json(BookmarkListResponse::single(bookmark)),
    ))
}

/// Get one bookmark with its notes.
///
/// # Returns
/// - 200 OK with the bookmark
/// - 404 Not Found if no bookmark has the id
pub async fn get_bookmark(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<BookmarkResponse>, ApiError> {
    let id = parse_id(&id)?;
    let bookmark = state.repo.fetch_with_notes(id).await?;
    Ok(Json(bookmark.into()))
}

/// Update a bookmark, or create it with the path id if it does not exist.
///
/// Fields omitted from the body are left unchanged on update.
///
/// # Returns
/// - 200 OK when an existing bookmark was updated
/// - 201 Created when the bookmark was created
/// - 400 Bad Request for invalid fields or a disallowed status change
pub async fn put_bookmark(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let req: UpdateBookmarkRequest = parse_json(&body)?;
    let outcome = state.repo.upsert(id, req).await?;

    let status = if outcome.created {
        StatusCode::CREATED
    } else {
        StatusCode::OK
    };

    info!(
        subsystem = "api",
        op = "put_bookmark",
        bookmark_id = %id,
        created = outcome.created,
        "Bookmark stored"
    );

    Ok((status, Json(BookmarkListResponse::single(outcome.bookmark))))
}

/// Delete a bookmark and its notes. Deleting an unknown id is not an error.
///
/// # Returns
/// - 204 No Content
pub async fn delete_bookmark(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    let id = parse_id(&id)?;
    let existed = state.repo.delete(id).await?;

    info!(
        subsystem = "api",
        op = "delete_bookmark",
        bookmark_id = %id,
        existed,
        "Bookmark deleted"
    );

    Ok(StatusCode::NO_CONTENT)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn test_query_collects_repeated_topics() {
        let query = ListBookmarksQuery::from_pairs(pairs(&[
            ("topic", "a"),
            ("count", "5"),
            ("topic", "b"),
            ("cursor", "tok"),
        ]))
        .unwrap();
        assert_eq!(query.topics, vec!["a", "b"]);
        assert_eq!(query.count, Some(5));
        assert_eq!(query.cursor.as_deref(), Some("tok"));
    }

    #[test]
    fn test_query_rejects_non_integer_count() {
        let err = ListBookmarksQuery::from_pairs(pairs(&[("count", "ten")])).unwrap_err();
        assert!(matches!(err, ApiError::BadRequest(msg) if msg.contains("ten")));
    }

    #[test]
    fn test_query_saturates_oversized_count() {
        let query =
            ListBookmarksQuery::from_pairs(pairs(&[("count", "100000000000000000000")])).unwrap();
        assert_eq!(query.count, Some(i64::MAX));

        let query =
            ListBookmarksQuery::from_pairs(pairs(&[("count", "-100000000000000000000")])).unwrap();
        assert_eq!(query.count, Some(i64::MIN));

        for bad in ["", "-", "+", "1e30", "99999999999999999999x"] {
            assert!(
                ListBookmarksQuery::from_pairs(pairs(&[("count", bad)])).is_err(),
                "expected rejection for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_query_rejects_topic_with_dates() {
        let query =
            ListBookmarksQuery::from_pairs(pairs(&[("topic", "a"), ("start", "2017")])).unwrap();
        assert!(matches!(query.filter(), Err(ApiError::BadRequest(_))));
    }

    #[test]
    fn test_response_carries_sort_date() {
        let bookmark = CreateBookmarkRequest {
            url: Some("https://example.com".into()),
            summary: Some("s".into()),
            display_date: Some("2017.06".into()),
            ..Default::default()
        }
        .validate()
        .map(|new| Bookmark::from_new(new, Utc::now()))
        .unwrap();

        let json = serde_json::to_value(BookmarkResponse::from(bookmark)).unwrap();
        assert_eq!(json["display_date"], "2017.06");
        assert_eq!(json["sort_date"], "2017-06-01T00:00:00Z");
        assert_eq!(json["status"], "new");
        assert_eq!(json["tld"], "example.com");
        assert!(json.get("notes").is_none());
    }
}

//! PostgreSQL bookmark repository.

use std::collections::BTreeSet;
use std::time::Instant;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{Pool, Postgres, Transaction};
use tracing::{debug, info};
use uuid::Uuid;

use bookmark_core::{
    Bookmark, BookmarkFilter, BookmarkNote, BookmarkPatch, BookmarkRepository, BookmarkStatus,
    DisplayDate, Error, NewBookmark, NewNote, OrderedQuery, Result,
};

use crate::query::{bind_params, BookmarkQueryBuilder, BOOKMARK_COLUMNS};
use crate::timestamp_now;

/// A `bookmarks` row with its aggregated topics.
#[derive(Debug, sqlx::FromRow)]
struct BookmarkRow {
    bookmark_id: Uuid,
    url: String,
    summary: String,
    description: Option<String>,
    sort_date: DateTime<Utc>,
    display_date_format: String,
    status: String,
    created_on: DateTime<Utc>,
    submitted_on: Option<DateTime<Utc>>,
    topics: Vec<String>,
}

impl TryFrom<BookmarkRow> for Bookmark {
    type Error = Error;

    fn try_from(row: BookmarkRow) -> Result<Self> {
        let status = row
            .status
            .parse::<BookmarkStatus>()
            .map_err(|_| Error::Internal(format!("stored status '{}' is invalid", row.status)))?;
        Ok(Bookmark {
            bookmark_id: row.bookmark_id,
            url: row.url,
            summary: row.summary,
            description: row.description,
            display_date: DisplayDate::from_stored(row.sort_date, &row.display_date_format)?,
            status,
            topics: row.topics,
            created_on: row.created_on,
            submitted_on: row.submitted_on,
        })
    }
}

/// PostgreSQL implementation of BookmarkRepository.
#[derive(Clone)]
pub struct PgBookmarkRepository {
    pool: Pool<Postgres>,
}

impl PgBookmarkRepository {
    /// Create a new PgBookmarkRepository with the given connection pool.
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }

    async fn fetch_row_tx(
        tx: &mut Transaction<'_, Postgres>,
        id: Uuid,
    ) -> Result<Option<Bookmark>> {
        let sql = format!(
            "SELECT {} FROM bookmarks b WHERE b.bookmark_id = $1 FOR UPDATE OF b",
            BOOKMARK_COLUMNS.trim()
        );
        let row = sqlx::query_as::<_, BookmarkRow>(&sql)
            .bind(id)
            .fetch_optional(&mut **tx)
            .await
            .map_err(Error::Database)?;
        row.map(Bookmark::try_from).transpose()
    }

    /// Make the topic rows of `bookmark_id` exactly `topics`.
    ///
    /// Rows for topics that stay are left untouched so their `created_on`
    /// survives; only removed topics are deleted and new ones inserted.
    async fn replace_topics_tx(
        tx: &mut Transaction<'_, Postgres>,
        bookmark_id: Uuid,
        topics: &BTreeSet<String>,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let topics: Vec<String> = topics.iter().cloned().collect();

        sqlx::query(
            "DELETE FROM bookmark_topics WHERE bookmark_id = $1 AND topic <> ALL($2::text[])",
        )
        .bind(bookmark_id)
        .bind(&topics)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;

        Self::insert_topics_tx(tx, bookmark_id, &topics, now).await
    }

    async fn insert_topics_tx(
        tx: &mut Transaction<'_, Postgres>,
        bookmark_id: Uuid,
        topics: &[String],
        now: DateTime<Utc>,
    ) -> Result<()> {
        if topics.is_empty() {
            return Ok(());
        }
        sqlx::query(
            r#"
            INSERT INTO bookmark_topics (bookmark_id, topic, created_on)
            SELECT $1, t, $3 FROM UNNEST($2::text[]) AS t
            ON CONFLICT (bookmark_id, topic) DO NOTHING
            "#,
        )
        .bind(bookmark_id)
        .bind(topics)
        .bind(now)
        .execute(&mut **tx)
        .await
        .map_err(Error::Database)?;
        Ok(())
    }

    async fn exists(&self, id: Uuid) -> Result<bool> {
        let (exists,): (bool,) =
            sqlx::query_as("SELECT EXISTS (SELECT 1 FROM bookmarks WHERE bookmark_id = $1)")
                .bind(id)
                .fetch_one(&self.pool)
                .await
                .map_err(Error::Database)?;
        Ok(exists)
    }
}

#[async_trait]
impl BookmarkRepository for PgBookmarkRepository {
    async fn insert(&self, new: NewBookmark) -> Result<Bookmark> {
        let now = timestamp_now();
        let bookmark = Bookmark::from_new(new, now);

        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        sqlx::query(
            r#"
            INSERT INTO bookmarks (
                bookmark_id, url, summary, description, sort_date,
                display_date_format, status, created_on, submitted_on
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            "#,
        )
        .bind(bookmark.bookmark_id)
        .bind(&bookmark.url)
        .bind(&bookmark.summary)
        .bind(&bookmark.description)
        .bind(bookmark.display_date.sort_key())
        .bind(bookmark.display_date.pattern())
        .bind(bookmark.status.as_str())
        .bind(bookmark.created_on)
        .bind(bookmark.submitted_on)
        .execute(&mut *tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_unique_violation() => Error::InvalidInput(format!(
                "bookmark {} already exists",
                bookmark.bookmark_id
            )),
            _ => Error::Database(e),
        })?;

        Self::insert_topics_tx(&mut tx, bookmark.bookmark_id, &bookmark.topics, now).await?;

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "bookmarks",
            op = "insert",
            bookmark_id = %bookmark.bookmark_id,
            topic_count = bookmark.topics.len(),
            "Bookmark created"
        );
        Ok(bookmark)
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<Bookmark>> {
        let sql = format!(
            "SELECT {} FROM bookmarks b WHERE b.bookmark_id = $1",
            BOOKMARK_COLUMNS.trim()
        );
        let row = sqlx::query_as::<_, BookmarkRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(Error::Database)?;
        row.map(Bookmark::try_from).transpose()
    }

    async fn update(&self, id: Uuid, patch: BookmarkPatch) -> Result<Bookmark> {
        let now = timestamp_now();
        let mut tx = self.pool.begin().await.map_err(Error::Database)?;

        let mut bookmark = Self::fetch_row_tx(&mut tx, id)
            .await?
            .ok_or(Error::BookmarkNotFound(id))?;

        let topics = patch.topics.clone();
        bookmark.apply(patch, now)?;

        sqlx::query(
            r#"
            UPDATE bookmarks SET
                url = $2,
                summary = $3,
                description = $4,
                sort_date = $5,
                display_date_format = $6,
                status = $7,
                submitted_on = $8
            WHERE bookmark_id = $1
            "#,
        )
        .bind(id)
        .bind(&bookmark.url)
        .bind(&bookmark.summary)
        .bind(&bookmark.description)
        .bind(bookmark.display_date.sort_key())
        .bind(bookmark.display_date.pattern())
        .bind(bookmark.status.as_str())
        .bind(bookmark.submitted_on)
        .execute(&mut *tx)
        .await
        .map_err(Error::Database)?;

        if let Some(topics) = &topics {
            Self::replace_topics_tx(&mut tx, id, topics, now).await?;
        }

        tx.commit().await.map_err(Error::Database)?;

        info!(
            subsystem = "db",
            component = "bookmarks",
            op = "update",
            bookmark_id = %id,
            topics_replaced = topics.is_some(),
            "Bookmark updated"
        );
        Ok(bookmark)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM bookmarks WHERE bookmark_id = $1")
            .bind(id)
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        let deleted = result.rows_affected() > 0;
        info!(
            subsystem = "db",
            component = "bookmarks",
            op = "delete",
            bookmark_id = %id,
            deleted,
            "Bookmark delete"
        );
        Ok(deleted)
    }

    async fn fetch_page(&self, query: &OrderedQuery) -> Result<Vec<Bookmark>> {
        let start = Instant::now();
        let (sql, params) = BookmarkQueryBuilder::new().page(query);

        let rows = bind_params(sqlx::query_as::<_, BookmarkRow>(&sql), &params)
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "bookmarks",
            op = "fetch_page",
            filter_kind = query.filter.kind(),
            has_cursor = query.seek.is_some(),
            limit = query.limit,
            result_count = rows.len(),
            duration_ms = start.elapsed().as_millis() as u64,
            "Fetched bookmark page"
        );

        rows.into_iter().map(Bookmark::try_from).collect()
    }

    async fn count(&self, filter: &BookmarkFilter) -> Result<i64> {
        let start = Instant::now();
        let (sql, params) = BookmarkQueryBuilder::new().count(filter);
        let (count,): (i64,) = bind_params(sqlx::query_as::<_, (i64,)>(&sql), &params)
            .fetch_one(&self.pool)
            .await
            .map_err(Error::Database)?;

        debug!(
            subsystem = "db",
            component = "bookmarks",
            op = "count",
            filter_kind = filter.kind(),
            result_count = count,
            duration_ms = start.elapsed().as_millis() as u64,
            "Counted bookmarks"
        );
        Ok(count)
    }

    async fn add_note(&self, bookmark_id: Uuid, note: NewNote) -> Result<BookmarkNote> {
        let note = BookmarkNote {
            note_id: Uuid::now_v7(),
            bookmark_id,
            text: note.text,
            author: note.author,
            created_on: timestamp_now(),
        };

        sqlx::query(
            r#"
            INSERT INTO bookmark_notes (note_id, bookmark_id, text, author, created_on)
            VALUES ($1, $2, $3, $4, $5)
            "#,
        )
        .bind(note.note_id)
        .bind(note.bookmark_id)
        .bind(&note.text)
        .bind(&note.author)
        .bind(note.created_on)
        .execute(&self.pool)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db) if db.is_foreign_key_violation() => {
                Error::BookmarkNotFound(bookmark_id)
            }
            _ => Error::Database(e),
        })?;

        info!(
            subsystem = "db",
            component = "bookmarks",
            op = "add_note",
            bookmark_id = %bookmark_id,
            "Note added"
        );
        Ok(note)
    }

    async fn list_notes(&self, bookmark_id: Uuid) -> Result<Vec<BookmarkNote>> {
        let notes = sqlx::query_as::<_, BookmarkNote>(
            r#"
            SELECT note_id, bookmark_id, text, author, created_on
            FROM bookmark_notes
            WHERE bookmark_id = $1
            ORDER BY created_on ASC, note_id ASC
            "#,
        )
        .bind(bookmark_id)
        .fetch_all(&self.pool)
        .await
        .map_err(Error::Database)?;

        if notes.is_empty() && !self.exists(bookmark_id).await? {
            return Err(Error::BookmarkNotFound(bookmark_id));
        }
        Ok(notes)
    }

    async fn health_check(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(Error::Database)?;
        Ok(())
    }
}

//! Core traits for bookmark storage.
//!
//! The repository trait is the seam between request handling and storage:
//! PostgreSQL in production, an in-memory map for tests.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::{Error, Result};
use crate::filter::BookmarkFilter;
use crate::models::*;
use crate::planner::OrderedQuery;

// =============================================================================
// BOOKMARK REPOSITORY
// =============================================================================

/// Outcome of an update-or-create call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpsertOutcome {
    pub bookmark: Bookmark,
    pub created: bool,
}

/// Repository for bookmark CRUD, topics, notes and paged reads.
#[async_trait]
pub trait BookmarkRepository: Send + Sync {
    /// Insert a new bookmark with its topics. Fails if the id is taken.
    async fn insert(&self, new: NewBookmark) -> Result<Bookmark>;

    /// Fetch a bookmark with its topics.
    async fn fetch(&self, id: Uuid) -> Result<Option<Bookmark>>;

    /// Apply a patch. Topic rows that survive a replacement keep their
    /// original `created_on`. Fails with `BookmarkNotFound` for unknown ids.
    async fn update(&self, id: Uuid, patch: BookmarkPatch) -> Result<Bookmark>;

    /// Delete a bookmark with its topics and notes. Returns whether a row existed.
    async fn delete(&self, id: Uuid) -> Result<bool>;

    /// Execute a planned page query: matching rows past the seek bound,
    /// ordered by `(sort_date, bookmark_id)`, at most `query.limit` of them.
    async fn fetch_page(&self, query: &OrderedQuery) -> Result<Vec<Bookmark>>;

    /// Count every bookmark matching `filter`, ignoring any cursor.
    async fn count(&self, filter: &BookmarkFilter) -> Result<i64>;

    /// Attach a note. Fails with `BookmarkNotFound` for unknown bookmarks.
    async fn add_note(&self, bookmark_id: Uuid, note: NewNote) -> Result<BookmarkNote>;

    /// Notes on a bookmark, oldest first.
    async fn list_notes(&self, bookmark_id: Uuid) -> Result<Vec<BookmarkNote>>;

    /// Cheap liveness check of the backing store.
    async fn health_check(&self) -> Result<()>;

    /// Fetch a bookmark together with its notes.
    async fn fetch_with_notes(&self, id: Uuid) -> Result<BookmarkWithNotes> {
        let bookmark = self.fetch(id).await?.ok_or(Error::BookmarkNotFound(id))?;
        let notes = self.list_notes(id).await?;
        Ok(BookmarkWithNotes { bookmark, notes })
    }

    /// Update the bookmark if it exists, otherwise create it under `id`.
    async fn upsert(&self, id: Uuid, req: UpdateBookmarkRequest) -> Result<UpsertOutcome> {
        match self.update(id, req.clone().validate()?).await {
            Ok(bookmark) => Ok(UpsertOutcome {
                bookmark,
                created: false,
            }),
            Err(Error::BookmarkNotFound(_)) => {
                let bookmark = self.insert(req.into_create(id).validate()?).await?;
                Ok(UpsertOutcome {
                    bookmark,
                    created: true,
                })
            }
            Err(e) => Err(e),
        }
    }
}

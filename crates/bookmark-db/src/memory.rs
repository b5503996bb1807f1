//! In-memory bookmark repository.
//!
//! Evaluates [`OrderedQuery`] with the same semantics as the SQL rendering:
//! filter, strict `(sort_date, bookmark_id)` seek, key order, limit. Used by
//! tests and by the API's test router; state is lost on drop.

use std::collections::{BTreeMap, BTreeSet};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::sync::RwLock;
use uuid::Uuid;

use bookmark_core::{
    Bookmark, BookmarkFilter, BookmarkNote, BookmarkPatch, BookmarkRepository, Error, Keyed,
    NewBookmark, NewNote, OrderedQuery, Result,
};

use crate::timestamp_now;

#[derive(Debug, Clone)]
struct StoredBookmark {
    bookmark: Bookmark,
    /// `created_on` of each topic row.
    topics: BTreeMap<String, DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct State {
    bookmarks: BTreeMap<Uuid, StoredBookmark>,
    notes: Vec<BookmarkNote>,
}

/// Thread-safe in-memory implementation of BookmarkRepository.
#[derive(Debug, Default)]
pub struct MemoryBookmarkRepository {
    state: RwLock<State>,
}

impl MemoryBookmarkRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored bookmarks.
    pub async fn len(&self) -> usize {
        self.state.read().await.bookmarks.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// `created_on` of a topic row, if the bookmark carries that topic.
    pub async fn topic_created_on(&self, id: Uuid, topic: &str) -> Option<DateTime<Utc>> {
        self.state
            .read()
            .await
            .bookmarks
            .get(&id)
            .and_then(|s| s.topics.get(topic).copied())
    }
}

fn matches(filter: &BookmarkFilter, bookmark: &Bookmark) -> bool {
    match filter {
        BookmarkFilter::Topics(t) => {
            t.topics.is_empty() || bookmark.topics.iter().any(|topic| t.topics.contains(topic))
        }
        BookmarkFilter::DateRange(range) => range.contains(bookmark.sort_key()),
    }
}

fn topic_rows(
    topics: &BTreeSet<String>,
    existing: &BTreeMap<String, DateTime<Utc>>,
    now: DateTime<Utc>,
) -> BTreeMap<String, DateTime<Utc>> {
    topics
        .iter()
        .map(|t| (t.clone(), existing.get(t).copied().unwrap_or(now)))
        .collect()
}

#[async_trait]
impl BookmarkRepository for MemoryBookmarkRepository {
    async fn insert(&self, new: NewBookmark) -> Result<Bookmark> {
        let now = timestamp_now();
        let mut state = self.state.write().await;
        if state.bookmarks.contains_key(&new.bookmark_id) {
            return Err(Error::InvalidInput(format!(
                "bookmark {} already exists",
                new.bookmark_id
            )));
        }
        let topics = topic_rows(&new.topics, &BTreeMap::new(), now);
        let bookmark = Bookmark::from_new(new, now);
        state.bookmarks.insert(
            bookmark.bookmark_id,
            StoredBookmark {
                bookmark: bookmark.clone(),
                topics,
            },
        );
        Ok(bookmark)
    }

    async fn fetch(&self, id: Uuid) -> Result<Option<Bookmark>> {
        Ok(self
            .state
            .read()
            .await
            .bookmarks
            .get(&id)
            .map(|s| s.bookmark.clone()))
    }

    async fn update(&self, id: Uuid, patch: BookmarkPatch) -> Result<Bookmark> {
        let now = timestamp_now();
        let mut state = self.state.write().await;
        let stored = state
            .bookmarks
            .get_mut(&id)
            .ok_or(Error::BookmarkNotFound(id))?;

        let topics = patch.topics.clone();
        let mut bookmark = stored.bookmark.clone();
        bookmark.apply(patch, now)?;

        if let Some(topics) = &topics {
            stored.topics = topic_rows(topics, &stored.topics, now);
        }
        stored.bookmark = bookmark.clone();
        Ok(bookmark)
    }

    async fn delete(&self, id: Uuid) -> Result<bool> {
        let mut state = self.state.write().await;
        let existed = state.bookmarks.remove(&id).is_some();
        state.notes.retain(|n| n.bookmark_id != id);
        Ok(existed)
    }

    async fn fetch_page(&self, query: &OrderedQuery) -> Result<Vec<Bookmark>> {
        let state = self.state.read().await;
        let mut rows: Vec<Bookmark> = state
            .bookmarks
            .values()
            .map(|s| &s.bookmark)
            .filter(|b| matches(&query.filter, b))
            .filter(|b| {
                query
                    .seek
                    .map_or(true, |seek| seek.admits(b.sort_key(), b.bookmark_id))
            })
            .cloned()
            .collect();
        rows.sort_by_key(|b| (b.sort_key(), b.bookmark_id));
        rows.truncate(query.limit);
        Ok(rows)
    }

    async fn count(&self, filter: &BookmarkFilter) -> Result<i64> {
        let state = self.state.read().await;
        Ok(state
            .bookmarks
            .values()
            .filter(|s| matches(filter, &s.bookmark))
            .count() as i64)
    }

    async fn add_note(&self, bookmark_id: Uuid, note: NewNote) -> Result<BookmarkNote> {
        let mut state = self.state.write().await;
        if !state.bookmarks.contains_key(&bookmark_id) {
            return Err(Error::BookmarkNotFound(bookmark_id));
        }
        let note = BookmarkNote {
            note_id: Uuid::now_v7(),
            bookmark_id,
            text: note.text,
            author: note.author,
            created_on: timestamp_now(),
        };
        state.notes.push(note.clone());
        Ok(note)
    }

    async fn list_notes(&self, bookmark_id: Uuid) -> Result<Vec<BookmarkNote>> {
        let state = self.state.read().await;
        if !state.bookmarks.contains_key(&bookmark_id) {
            return Err(Error::BookmarkNotFound(bookmark_id));
        }
        let mut notes: Vec<BookmarkNote> = state
            .notes
            .iter()
            .filter(|n| n.bookmark_id == bookmark_id)
            .cloned()
            .collect();
        notes.sort_by_key(|n| (n.created_on, n.note_id));
        Ok(notes)
    }

    async fn health_check(&self) -> Result<()> {
        Ok(())
    }
}

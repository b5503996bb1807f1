//! Core data models for the bookmark service.
//!
//! These types are shared across the bookmark crates and represent the
//! domain entities plus the request shapes that create and modify them.

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use uuid::Uuid;

use crate::defaults;
use crate::display_date::DisplayDate;
use crate::error::{Error, Result};
use crate::page::Keyed;

// =============================================================================
// STATUS
// =============================================================================

/// Review status of a bookmark.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BookmarkStatus {
    #[default]
    New,
    Submitted,
    Accepted,
    Rejected,
}

impl BookmarkStatus {
    pub const ALL: [BookmarkStatus; 4] = [
        BookmarkStatus::New,
        BookmarkStatus::Submitted,
        BookmarkStatus::Accepted,
        BookmarkStatus::Rejected,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            BookmarkStatus::New => "new",
            BookmarkStatus::Submitted => "submitted",
            BookmarkStatus::Accepted => "accepted",
            BookmarkStatus::Rejected => "rejected",
        }
    }

    /// Whether a bookmark may be created with this status.
    pub fn is_valid_initial(self) -> bool {
        matches!(self, BookmarkStatus::New | BookmarkStatus::Submitted)
    }

    /// Check a status change. Nothing moves back to `new`.
    pub fn check_transition(self, to: BookmarkStatus) -> Result<()> {
        if to == BookmarkStatus::New && self != BookmarkStatus::New {
            return Err(Error::InvalidInput(format!(
                "invalid bookmark status transition '{}' -> '{}'",
                self, to
            )));
        }
        Ok(())
    }
}

impl fmt::Display for BookmarkStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BookmarkStatus {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "new" => Ok(BookmarkStatus::New),
            "submitted" => Ok(BookmarkStatus::Submitted),
            "accepted" => Ok(BookmarkStatus::Accepted),
            "rejected" => Ok(BookmarkStatus::Rejected),
            _ => Err(Error::InvalidInput(format!(
                "invalid bookmark status '{}'; must be one of 'new', 'submitted', 'accepted', 'rejected'",
                s
            ))),
        }
    }
}

// =============================================================================
// BOOKMARK TYPES
// =============================================================================

/// A stored bookmark with its topics.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Bookmark {
    pub bookmark_id: Uuid,
    pub url: String,
    pub summary: String,
    pub description: Option<String>,
    pub display_date: DisplayDate,
    pub status: BookmarkStatus,
    /// Sorted topic names.
    pub topics: Vec<String>,
    pub created_on: DateTime<Utc>,
    pub submitted_on: Option<DateTime<Utc>>,
}

impl Keyed for Bookmark {
    fn sort_key(&self) -> DateTime<Utc> {
        self.display_date.sort_key()
    }

    fn key_id(&self) -> Uuid {
        self.bookmark_id
    }
}

impl Bookmark {
    /// Materialize a validated create request.
    pub fn from_new(new: NewBookmark, now: DateTime<Utc>) -> Self {
        let submitted_on = (new.status == BookmarkStatus::Submitted).then_some(now);
        Self {
            bookmark_id: new.bookmark_id,
            url: new.url,
            summary: new.summary,
            description: new.description,
            display_date: new.display_date,
            status: new.status,
            topics: new.topics.into_iter().collect(),
            created_on: now,
            submitted_on,
        }
    }

    /// Registered domain of `url` under the public suffix list, e.g. `cnn.com`
    /// for `https://www.cnn.com/x`.
    ///
    /// `None` when the url does not parse, has an IP or no host, or its host
    /// is itself a public suffix or ends in an unlisted one.
    pub fn registered_domain(&self) -> Option<String> {
        let parsed = url::Url::parse(&self.url).ok()?;
        let host = match parsed.host()? {
            url::Host::Domain(host) => host.trim_end_matches('.').to_string(),
            url::Host::Ipv4(_) | url::Host::Ipv6(_) => return None,
        };
        let domain = psl::domain(host.as_bytes())?;
        if !domain.suffix().is_known() {
            return None;
        }
        std::str::from_utf8(domain.as_bytes())
            .ok()
            .map(str::to_string)
    }

    /// Apply a validated patch in place.
    ///
    /// Fails without modifying anything if the status transition is not allowed.
    pub fn apply(&mut self, patch: BookmarkPatch, now: DateTime<Utc>) -> Result<()> {
        if let Some(status) = patch.status {
            self.status.check_transition(status)?;
        }

        if let Some(url) = patch.url {
            self.url = url;
        }
        if let Some(summary) = patch.summary {
            self.summary = summary;
        }
        if let Some(description) = patch.description {
            self.description = description;
        }
        if let Some(display_date) = patch.display_date {
            self.display_date = display_date;
        }
        if let Some(status) = patch.status {
            if status == BookmarkStatus::Submitted && self.submitted_on.is_none() {
                self.submitted_on = Some(now);
            }
            self.status = status;
        }
        if let Some(topics) = patch.topics {
            self.topics = topics.into_iter().collect();
        }
        Ok(())
    }
}

/// A bookmark together with its notes, for the detail endpoint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BookmarkWithNotes {
    pub bookmark: Bookmark,
    pub notes: Vec<BookmarkNote>,
}

/// A free-form note attached to a bookmark.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct BookmarkNote {
    pub note_id: Uuid,
    pub bookmark_id: Uuid,
    pub text: String,
    pub author: String,
    pub created_on: DateTime<Utc>,
}

// =============================================================================
// VALIDATED INPUT
// =============================================================================

/// Validated input for creating a bookmark.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewBookmark {
    pub bookmark_id: Uuid,
    pub url: String,
    pub summary: String,
    pub description: Option<String>,
    pub display_date: DisplayDate,
    pub status: BookmarkStatus,
    pub topics: BTreeSet<String>,
}

/// Validated changes to an existing bookmark. `None` leaves a field alone.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BookmarkPatch {
    pub url: Option<String>,
    pub summary: Option<String>,
    /// `Some(None)` clears the description.
    pub description: Option<Option<String>>,
    pub display_date: Option<DisplayDate>,
    pub status: Option<BookmarkStatus>,
    /// Replacement topic set; `Some(empty)` clears all topics.
    pub topics: Option<BTreeSet<String>>,
}

/// Validated input for a note.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewNote {
    pub text: String,
    pub author: String,
}

// =============================================================================
// REQUEST BODIES
// =============================================================================

/// Request body for creating a bookmark.
///
/// Required fields are optional here so a missing one is reported by name
/// instead of as a generic deserialization failure.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateBookmarkRequest {
    pub bookmark_id: Option<Uuid>,
    pub url: Option<String>,
    pub summary: Option<String>,
    pub display_date: Option<String>,
    pub description: Option<String>,
    pub status: Option<String>,
    pub topics: Option<Vec<String>>,
}

impl CreateBookmarkRequest {
    /// Validate the request. A server-generated id is a UUIDv7.
    pub fn validate(self) -> Result<NewBookmark> {
        let url = validate_url(require(self.url, "url")?)?;
        let summary = validate_text(require(self.summary, "summary")?, "summary")?;
        let display_date = DisplayDate::parse(&require(self.display_date, "display_date")?)?;
        let status = match self.status {
            Some(s) => s.parse::<BookmarkStatus>()?,
            None => BookmarkStatus::New,
        };
        if !status.is_valid_initial() {
            return Err(Error::InvalidInput(format!(
                "invalid status '{}' on bookmark creation; must be 'new' or 'submitted'",
                status
            )));
        }
        Ok(NewBookmark {
            bookmark_id: self.bookmark_id.unwrap_or_else(Uuid::now_v7),
            url,
            summary,
            description: self.description,
            display_date,
            status,
            topics: validate_topics(self.topics.unwrap_or_default())?,
        })
    }
}

/// Request body for updating a bookmark. Every field is optional.
///
/// An explicit `null` is distinguished from an absent field: it clears
/// `description` and `topics` and is rejected for required fields.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UpdateBookmarkRequest {
    #[serde(default, deserialize_with = "double_option")]
    pub url: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub summary: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub display_date: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub description: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub status: Option<Option<String>>,
    #[serde(default, deserialize_with = "double_option")]
    pub topics: Option<Option<Vec<String>>>,
}

impl UpdateBookmarkRequest {
    pub fn validate(self) -> Result<BookmarkPatch> {
        let url = not_cleared(self.url, "url")?.map(validate_url).transpose()?;
        let summary = not_cleared(self.summary, "summary")?
            .map(|s| validate_text(s, "summary"))
            .transpose()?;
        let display_date = not_cleared(self.display_date, "display_date")?
            .map(|s| DisplayDate::parse(&s))
            .transpose()?;
        let status = not_cleared(self.status, "status")?
            .map(|s| s.parse::<BookmarkStatus>())
            .transpose()?;
        let topics = self
            .topics
            .map(|t| validate_topics(t.unwrap_or_default()))
            .transpose()?;
        Ok(BookmarkPatch {
            url,
            summary,
            description: self.description,
            display_date,
            status,
            topics,
        })
    }

    /// Reinterpret this body as a create request for `bookmark_id`.
    ///
    /// Used when an update targets an id that does not exist yet.
    pub fn into_create(self, bookmark_id: Uuid) -> CreateBookmarkRequest {
        CreateBookmarkRequest {
            bookmark_id: Some(bookmark_id),
            url: self.url.flatten(),
            summary: self.summary.flatten(),
            display_date: self.display_date.flatten(),
            description: self.description.flatten(),
            status: self.status.flatten(),
            topics: self.topics.flatten(),
        }
    }
}

/// Request body for adding a note.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CreateNoteRequest {
    pub text: Option<String>,
    pub author: Option<String>,
}

impl CreateNoteRequest {
    pub fn validate(self) -> Result<NewNote> {
        let text = validate_text(require(self.text, "text")?, "text")?;
        let author = validate_text(require(self.author, "author")?, "author")?;
        if author.chars().count() > defaults::AUTHOR_MAX_LEN {
            return Err(Error::InvalidInput(format!(
                "author exceeds {} characters",
                defaults::AUTHOR_MAX_LEN
            )));
        }
        Ok(NewNote { text, author })
    }
}

// =============================================================================
// VALIDATION HELPERS
// =============================================================================

fn double_option<'de, T, D>(de: D) -> std::result::Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(de).map(Some)
}

fn require<T>(value: Option<T>, field: &str) -> Result<T> {
    value.ok_or_else(|| Error::InvalidInput(format!("missing required argument '{}'", field)))
}

fn not_cleared<T>(value: Option<Option<T>>, field: &str) -> Result<Option<T>> {
    match value {
        Some(None) => Err(Error::InvalidInput(format!(
            "required attribute '{}' cannot be cleared",
            field
        ))),
        Some(Some(v)) => Ok(Some(v)),
        None => Ok(None),
    }
}

fn validate_text(value: String, field: &str) -> Result<String> {
    if value.trim().is_empty() {
        return Err(Error::InvalidInput(format!("'{}' must not be empty", field)));
    }
    Ok(value)
}

fn validate_url(url: String) -> Result<String> {
    let url = validate_text(url, "url")?;
    if url.chars().count() > defaults::URL_MAX_LEN {
        return Err(Error::InvalidInput(format!(
            "url exceeds {} characters",
            defaults::URL_MAX_LEN
        )));
    }
    Ok(url)
}

fn validate_topics(topics: Vec<String>) -> Result<BTreeSet<String>> {
    topics
        .into_iter()
        .map(|topic| {
            if topic.trim().is_empty() {
                return Err(Error::InvalidInput("topic must not be empty".to_string()));
            }
            if topic.chars().count() > defaults::TOPIC_MAX_LEN {
                return Err(Error::InvalidInput(format!(
                    "topic exceeds {} characters: {}",
                    defaults::TOPIC_MAX_LEN,
                    topic
                )));
            }
            Ok(topic)
        })
        .collect()
}

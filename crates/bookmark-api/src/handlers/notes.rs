//! Bookmark note handlers.

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use serde::Serialize;

use bookmark_core::{BookmarkNote, CreateNoteRequest};

use super::{parse_id, parse_json};
use crate::{ApiError, AppState};

#[derive(Debug, Serialize)]
pub struct NoteListResponse {
    pub notes: Vec<BookmarkNote>,
}

/// List a bookmark's notes, oldest first.
///
/// # Returns
/// - 200 OK with `{"notes": [...]}`
/// - 404 Not Found if the bookmark does not exist
pub async fn list_notes(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<NoteListResponse>, ApiError> {
    let id = parse_id(&id)?;
    let notes = state.repo.list_notes(id).await?;
    Ok(Json(NoteListResponse { notes }))
}

/// Attach a note to a bookmark.
///
/// # Returns
/// - 201 Created with the stored note
/// - 400 Bad Request if `text` or `author` is missing or invalid
/// - 404 Not Found if the bookmark does not exist
pub async fn create_note(
    State(state): State<AppState>,
    Path(id): Path<String>,
    body: Bytes,
) -> Result<impl IntoResponse, ApiError> {
    let id = parse_id(&id)?;
    let req: CreateNoteRequest = parse_json(&body)?;
    let note = state.repo.add_note(id, req.validate()?).await?;
    Ok((StatusCode::CREATED, Json(note)))
}

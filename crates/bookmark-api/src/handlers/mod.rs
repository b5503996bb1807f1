//! HTTP handlers for bookmark-api.

pub mod bookmarks;
pub mod notes;
pub mod system;

use axum::body::Bytes;
use serde::de::DeserializeOwned;
use uuid::Uuid;

use crate::ApiError;

/// Parse a request body as JSON, rejecting empty or malformed bodies and unknown fields.
pub(crate) fn parse_json<T: DeserializeOwned>(body: &Bytes) -> Result<T, ApiError> {
    if body.is_empty() {
        return Err(
            bookmark_core::Error::Serialization("request body must be a JSON object".into()).into(),
        );
    }
    serde_json::from_slice(body).map_err(|e| bookmark_core::Error::from(e).into())
}

/// Parse a bookmark id path segment.
pub(crate) fn parse_id(raw: &str) -> Result<Uuid, ApiError> {
    Uuid::parse_str(raw).map_err(|_| ApiError::BadRequest(format!("Invalid bookmark id: {}", raw)))
}

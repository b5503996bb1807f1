//! # bookmark-api
//!
//! axum HTTP surface for the bookmark service.
//!
//! Routes are mounted once per supported API version (`/api/1702/...`); any
//! other version falls through to a JSON 404. Handlers work against
//! `Arc<dyn BookmarkRepository>`, so the same router serves PostgreSQL in
//! production and the in-memory repository in tests.

pub mod config;
pub mod handlers;
pub mod telemetry;

use std::sync::Arc;

use axum::{
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use tower_http::{
    catch_panic::CatchPanicLayer,
    request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::error;
use uuid::Uuid;

use bookmark_core::defaults::API_VERSIONS;
use bookmark_core::{BookmarkRepository, Paginator};

/// Shared handler state.
#[derive(Clone)]
pub struct AppState {
    pub repo: Arc<dyn BookmarkRepository>,
    pub paginator: Paginator,
}

impl AppState {
    pub fn new(repo: Arc<dyn BookmarkRepository>, paginator: Paginator) -> Self {
        Self { repo, paginator }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

/// Handler error; renders as `{"error": "..."}` with a matching status.
#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Unavailable(String),
    Internal(String),
}

impl From<bookmark_core::Error> for ApiError {
    fn from(err: bookmark_core::Error) -> Self {
        use bookmark_core::Error;

        match &err {
            Error::BookmarkNotFound(_) => ApiError::NotFound(err.to_string()),
            _ if err.is_client_error() => ApiError::BadRequest(err.to_string()),
            _ if err.is_transient() => ApiError::Unavailable(err.to_string()),
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
            ApiError::Internal(msg) => {
                error!(subsystem = "api", error = %msg, "Request failed");
                (StatusCode::INTERNAL_SERVER_ERROR, msg)
            }
        };

        let body = Json(serde_json::json!({
            "error": message,
        }));

        (status, body).into_response()
    }
}

// =============================================================================
// ROUTER
// =============================================================================

/// Request ids are UUIDv7 so they sort by arrival time in the logs.
#[derive(Clone, Copy, Default)]
pub struct MakeRequestUuidV7;

impl MakeRequestId for MakeRequestUuidV7 {
    fn make_request_id<B>(&mut self, _request: &axum::http::Request<B>) -> Option<RequestId> {
        let id = Uuid::now_v7().to_string().parse().ok()?;
        Some(RequestId::new(id))
    }
}

/// Bookmark routes, relative to `/api/<version>`.
fn versioned_routes() -> Router<AppState> {
    use handlers::{bookmarks, notes};

    Router::new()
        .route(
            "/bookmarks",
            get(bookmarks::list_bookmarks).post(bookmarks::create_bookmark),
        )
        .route(
            "/bookmarks/:id",
            get(bookmarks::get_bookmark)
                .put(bookmarks::put_bookmark)
                .delete(bookmarks::delete_bookmark),
        )
        .route(
            "/bookmarks/:id/notes",
            get(notes::list_notes).post(notes::create_note),
        )
}

/// Build the full application router with tracing and request-id layers.
pub fn build_router(state: AppState) -> Router {
    use handlers::system;

    let mut app = Router::new()
        .route("/", get(system::root))
        .route("/health", get(system::health_check))
        .route("/info", get(system::info));

    for version in API_VERSIONS {
        app = app.nest(&format!("/api/{}", version), versioned_routes());
    }

    app.fallback(system::not_found)
        .layer(CatchPanicLayer::new())
        .layer(TraceLayer::new_for_http())
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuidV7))
        .with_state(state)
}

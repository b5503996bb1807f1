//! Liveness, health and service info.

use axum::{extract::State, http::StatusCode, response::IntoResponse, Json};
use tracing::warn;

use bookmark_core::defaults::API_VERSIONS;

use crate::{ApiError, AppState};

pub async fn root() -> &'static str {
    "OK"
}

/// Report health, including a round trip to the store.
///
/// # Returns
/// - 200 OK with `{"status": "healthy", ...}`
/// - 503 Service Unavailable when the store does not answer
pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    match state.repo.health_check().await {
        Ok(()) => (
            StatusCode::OK,
            Json(serde_json::json!({
                "status": "healthy",
                "version": env!("CARGO_PKG_VERSION"),
                "database": "ok",
            })),
        ),
        Err(e) => {
            warn!(subsystem = "api", error = %e, "Health check failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(serde_json::json!({
                    "status": "unhealthy",
                    "version": env!("CARGO_PKG_VERSION"),
                    "database": e.to_string(),
                })),
            )
        }
    }
}

pub async fn info() -> impl IntoResponse {
    Json(serde_json::json!({
        "name": env!("CARGO_PKG_NAME"),
        "version": env!("CARGO_PKG_VERSION"),
        "api_versions": API_VERSIONS,
    }))
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound("Not found".to_string())
}

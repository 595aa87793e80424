use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;

/// Health probe: always returns 200 once the process is serving. Never
/// touches the corpus index, so it works before first initialization.
pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "healthy"})))
}

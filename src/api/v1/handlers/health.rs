/*
 * Responsibility
 * - GET /health (liveness of the gateway process itself)
 * - Never passes the token gate and never touches the authorization service
 */
use axum::{Json, http::StatusCode, response::IntoResponse};
use serde_json::json;

pub async fn health() -> impl IntoResponse {
    (StatusCode::OK, Json(json!({"status": "ok"})))
}

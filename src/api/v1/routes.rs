/*
 * Responsibility
 * - v1 URL structure
 * - /check: forward-auth endpoint for reverse proxies (any method, proxies differ)
 */
use axum::{Router, routing::any};

use crate::api::v1::handlers::check::check;
use crate::state::AppState;

pub fn routes() -> Router<AppState> {
    Router::new().route("/check", any(check))
}

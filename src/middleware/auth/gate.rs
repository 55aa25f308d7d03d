//! Token gate as an axum middleware for embedded deployments.
//!
//! Routes behind this layer are only reached when the gate allows the request. The routing
//! layer in front may insert a `RouteDescriptor` (and `AlreadyRouted`) into the request
//! extensions; without one the route id is `NaN`.

use axum::{
    Router,
    body::Body,
    extract::{OriginalUri, State},
    http::Request,
    middleware::{self, Next},
    response::Response,
};

use crate::error::AppError;
use crate::services::auth::{AlreadyRouted, RequestContext, RouteDescriptor};
use crate::state::AppState;

/// Put the token gate in front of every route of `router`.
///
/// ```ignore
/// let upstream = middleware::auth::gate::apply(upstream_routes, state.clone());
/// app = app.merge(upstream);
/// ```
pub fn apply(router: Router<AppState>, state: AppState) -> Router<AppState> {
    router.layer(middleware::from_fn_with_state(state, gate_middleware))
}

async fn gate_middleware(
    State(state): State<AppState>,
    req: Request<Body>,
    next: Next,
) -> Result<Response, AppError> {
    let (parts, body) = req.into_parts();

    let route = parts
        .extensions
        .get::<RouteDescriptor>()
        .cloned()
        .unwrap_or_else(RouteDescriptor::unknown);
    // nested routers strip their prefix from `uri`; exemptions match the full path
    let path = parts
        .extensions
        .get::<OriginalUri>()
        .map(|uri| uri.0.path())
        .unwrap_or_else(|| parts.uri.path());
    let ctx = RequestContext::new(&parts.headers, path, &route)
        .already_routed(parts.extensions.get::<AlreadyRouted>().is_some());

    let outcome = state.gate.evaluate(&ctx).await;

    outcome.into_result()?;
    Ok(next.run(Request::from_parts(parts, body)).await)
}

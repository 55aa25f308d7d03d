//! HTTP-level middleware applied in front of every gateway route.
//!
//! Responsibility:
//! - Request-Id generation + propagation (X-Request-Id); the token gate logs it
//! - Access logging / request tracing (TraceLayer), one span per request carrying the id
//! - Body size limit and an overall deadline
//!
//! The deadline must stay above the gate's own registry and introspection timeouts, so the
//! gate's 503 wins over a generic timeout whenever a backend call is what hangs.

use std::time::Duration;

use axum::Router;
use axum::body::Body;
use axum::error_handling::HandleErrorLayer;
use axum::http::{Request, StatusCode, header::HeaderName};
use tower::timeout::TimeoutLayer;
use tower::{BoxError, ServiceBuilder};
use tower_http::limit::RequestBodyLimitLayer;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

const REQUEST_ID: &str = "x-request-id";
const BODY_LIMIT: usize = 1024 * 1024;

/// Transport limits for the gateway listener.
#[derive(Debug, Clone, Copy)]
pub struct HttpLimits {
    pub request_timeout: Duration,
    pub body_limit: usize,
}

impl HttpLimits {
    /// Deadline sized to fit one registry lookup per stage plus one introspection call.
    pub fn for_gate(discovery_timeout: Duration, introspection_timeout: Duration) -> Self {
        Self {
            request_timeout: discovery_timeout * 2 + introspection_timeout + Duration::from_secs(1),
            body_limit: BODY_LIMIT,
        }
    }
}

pub fn apply(router: Router, limits: HttpLimits) -> Router {
    let request_id_header = HeaderName::from_static(REQUEST_ID);

    let layers = ServiceBuilder::new()
        .layer(SetRequestIdLayer::new(
            request_id_header.clone(),
            MakeRequestUuid,
        ))
        // outside the error handler so timeout responses carry the id too
        .layer(PropagateRequestIdLayer::new(request_id_header))
        .layer(HandleErrorLayer::new(|err: BoxError| async move {
            if err.is::<tower::timeout::error::Elapsed>() {
                StatusCode::GATEWAY_TIMEOUT
            } else {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }))
        .layer(TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
            let request_id = req
                .headers()
                .get(REQUEST_ID)
                .and_then(|v| v.to_str().ok())
                .unwrap_or("-");
            tracing::info_span!(
                "request",
                method = %req.method(),
                uri = %req.uri(),
                request_id,
            )
        }))
        .layer(RequestBodyLimitLayer::new(limits.body_limit))
        .layer(TimeoutLayer::new(limits.request_timeout));

    router.layer(layers)
}

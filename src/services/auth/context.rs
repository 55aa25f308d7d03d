//! Per-request input of the token gate.
//!
//! The routing collaborator decides which route a request belongs to; the gate only reads
//! the resulting `RouteDescriptor`. Nothing here is mutated once built.

use axum::http::HeaderMap;

/// Header that lets automated test harnesses skip the availability probe.
pub const BYPASS_HEADER: &str = "x-testing-pass-modulecheck";

/// Route id used when no route was assigned upstream.
pub const UNKNOWN_ROUTE_ID: &str = "NaN";

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Route identity and metadata assigned by the routing collaborator.
///
/// Inserted into request extensions by whatever matched the request to a destination.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RouteDescriptor {
    pub id: String,
    pub scope: Option<String>,
}

impl RouteDescriptor {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            scope: None,
        }
    }

    pub fn unknown() -> Self {
        Self::new(UNKNOWN_ROUTE_ID)
    }

    #[must_use]
    pub fn with_scope(mut self, scope: impl Into<String>) -> Self {
        self.scope = Some(scope.into());
        self
    }
}

/// Extension marker: an upstream stage already dispatched this request.
#[derive(Debug, Clone, Copy, Default)]
pub struct AlreadyRouted;

/// Read-only view of one request, borrowed from the inbound request.
#[derive(Debug, Clone, Copy)]
pub struct RequestContext<'a> {
    headers: &'a HeaderMap,
    path: &'a str,
    route: &'a RouteDescriptor,
    already_routed: bool,
}

impl<'a> RequestContext<'a> {
    pub fn new(headers: &'a HeaderMap, path: &'a str, route: &'a RouteDescriptor) -> Self {
        Self {
            headers,
            path,
            route,
            already_routed: false,
        }
    }

    #[must_use]
    pub fn already_routed(self, already_routed: bool) -> Self {
        Self {
            already_routed,
            ..self
        }
    }

    pub fn headers(&self) -> &'a HeaderMap {
        self.headers
    }

    pub fn path(&self) -> &'a str {
        self.path
    }

    pub fn route(&self) -> &'a RouteDescriptor {
        self.route
    }

    pub fn is_already_routed(&self) -> bool {
        self.already_routed
    }

    pub fn has_bypass_signal(&self) -> bool {
        self.headers.contains_key(BYPASS_HEADER)
    }

    pub fn request_id(&self) -> Option<&'a str> {
        self.headers
            .get(REQUEST_ID_HEADER)
            .and_then(|v| v.to_str().ok())
    }
}

/*
 * Responsibility
 * - Forward-auth endpoint (nginx auth_request / Traefik ForwardAuth)
 * - Rebuilds the original request's context from forwarded headers and asks the token gate
 * - X-Route-Id / X-Route-Scope are read only when TRUST_ROUTE_HEADERS is on; the proxy must then
 *   overwrite both on every request, or any client could claim the authorization route
 * - 204 on Allow; the rejection status (401 / 403 / 503) otherwise
 */
use axum::{
    extract::State,
    http::{HeaderMap, StatusCode, Uri},
};

use crate::error::AppError;
use crate::services::auth::{RequestContext, RouteDescriptor};
use crate::state::AppState;

pub const FORWARDED_URI: &str = "x-forwarded-uri";
pub const ROUTE_ID: &str = "x-route-id";
pub const ROUTE_SCOPE: &str = "x-route-scope";

pub async fn check(
    State(state): State<AppState>,
    headers: HeaderMap,
) -> Result<StatusCode, AppError> {
    let uri = forwarded_uri(&headers)?;
    let route = if state.trust_route_headers {
        forwarded_route(&headers)
    } else {
        RouteDescriptor::unknown()
    };

    let ctx = RequestContext::new(&headers, uri.path(), &route);
    state.gate.evaluate(&ctx).await.into_result()?;

    Ok(StatusCode::NO_CONTENT)
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn forwarded_uri(headers: &HeaderMap) -> Result<Uri, AppError> {
    let raw = header_str(headers, FORWARDED_URI).ok_or_else(|| {
        AppError::bad_request("MISSING_FORWARDED_URI", "X-Forwarded-Uri header is required")
    })?;

    raw.parse::<Uri>()
        .ok()
        .filter(|uri| uri.path().starts_with('/'))
        .ok_or_else(|| {
            AppError::bad_request("INVALID_FORWARDED_URI", "X-Forwarded-Uri is not a valid path")
        })
}

fn forwarded_route(headers: &HeaderMap) -> RouteDescriptor {
    let route = header_str(headers, ROUTE_ID)
        .map(RouteDescriptor::new)
        .unwrap_or_else(RouteDescriptor::unknown);

    match header_str(headers, ROUTE_SCOPE) {
        Some(scope) => route.with_scope(scope),
        None => route,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        headers
    }

    #[test]
    fn forwarded_uri_keeps_only_the_path() {
        let uri = forwarded_uri(&headers(&[(FORWARDED_URI, "/auth/token?grant=x")])).unwrap();
        assert_eq!(uri.path(), "/auth/token");
    }

    #[test]
    fn forwarded_uri_is_required() {
        let err = forwarded_uri(&HeaderMap::new()).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);

        let err = forwarded_uri(&headers(&[(FORWARDED_URI, "not a uri")])).unwrap_err();
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn route_defaults_to_unknown() {
        assert_eq!(forwarded_route(&HeaderMap::new()), RouteDescriptor::unknown());

        let route = forwarded_route(&headers(&[(ROUTE_ID, "orders"), (ROUTE_SCOPE, "orders:read")]));
        assert_eq!(route, RouteDescriptor::new("orders").with_scope("orders:read"));
    }
}

#![allow(clippy::unwrap_used, clippy::expect_used)]

//! End-to-end behavior of the token gate through both deployment surfaces:
//! the embedded middleware in front of upstream routes, and the forward-auth endpoint.

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
    response::Response,
    routing::get,
};
use http_body_util::BodyExt;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;
use uuid::Uuid;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use token_gate::app::build_router;
use token_gate::config::RunMode;
use token_gate::middleware::auth::gate;
use token_gate::middleware::http::HttpLimits;
use token_gate::services::auth::{
    AlreadyRouted, AvailabilityProber, BYPASS_HEADER, ExemptionPolicy, IntrospectionSettings,
    RouteDescriptor, TokenGate, TokenIntrospector,
};
use token_gate::services::discovery::{FixedDiscovery, ServiceDiscovery, ServiceInstance};
use token_gate::state::AppState;

const SERVICE: &str = "authorization-service";
const NIL: &str = "00000000-0000-0000-0000-000000000000";

fn state(mode: RunMode, discovery: FixedDiscovery) -> AppState {
    let discovery: Arc<dyn ServiceDiscovery> = Arc::new(discovery);
    let prober = AvailabilityProber::new(discovery.clone(), SERVICE, Duration::from_millis(200));
    let exemptions = ExemptionPolicy::from_globs(SERVICE, &["/auth/**"]).unwrap();
    let introspector = TokenIntrospector::new(
        mode,
        discovery,
        reqwest::Client::new(),
        IntrospectionSettings {
            request_timeout: Duration::from_secs(1),
            ..Default::default()
        },
    );
    let gate = TokenGate::new(prober, exemptions, introspector).with_availability_bypass(true);
    AppState::new(Arc::new(gate))
}

fn test_mode() -> AppState {
    state(RunMode::Test, FixedDiscovery::new())
}

/// Upstream service protected by the embedded gate.
fn upstream(state: AppState) -> Router {
    let routes = Router::new()
        .route("/orders", get(|| async { "orders" }))
        .route("/auth/{*rest}", get(|| async { "auth" }));
    gate::apply(routes, state.clone()).with_state(state)
}

fn forward_auth(state: AppState) -> Router {
    build_router(
        state,
        HttpLimits::for_gate(Duration::from_millis(200), Duration::from_secs(1)),
    )
}

fn request(uri: &str) -> axum::http::request::Builder {
    Request::builder().uri(uri)
}

async fn json_body(resp: Response) -> Value {
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

#[tokio::test]
async fn unavailable_backend_is_503() {
    let resp = upstream(test_mode())
        .oneshot(
            request("/orders")
                .header(header::AUTHORIZATION, format!("Bearer {NIL}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
    let body = json_body(resp).await;
    assert_eq!(body["error"]["code"], "SERVICE_UNAVAILABLE");
}

#[tokio::test]
async fn missing_header_is_401() {
    let resp = upstream(test_mode())
        .oneshot(
            request("/orders")
                .header(BYPASS_HEADER, "true")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn malformed_tokens_are_401() {
    for value in ["Bearer not-a-uuid", "Basic dXNlcjpwYXNz", "bearer 00000000-0000-0000-0000-000000000000"] {
        let resp = upstream(test_mode())
            .oneshot(
                request("/orders")
                    .header(BYPASS_HEADER, "true")
                    .header(header::AUTHORIZATION, value)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{value}");
    }
}

#[tokio::test]
async fn random_token_in_test_mode_is_403() {
    let resp = upstream(test_mode())
        .oneshot(
            request("/orders")
                .header(BYPASS_HEADER, "true")
                .header(header::AUTHORIZATION, format!("Bearer {}", Uuid::new_v4()))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn nil_token_in_test_mode_reaches_upstream() {
    let resp = upstream(test_mode())
        .oneshot(
            request("/orders")
                .header(BYPASS_HEADER, "true")
                .header(header::AUTHORIZATION, format!("Bearer {NIL}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    let bytes = resp.into_body().collect().await.unwrap().to_bytes();
    assert_eq!(&bytes[..], b"orders");
}

#[tokio::test]
async fn auth_paths_reach_upstream_without_token() {
    let resp = upstream(test_mode())
        .oneshot(
            request("/auth/token")
                .header(BYPASS_HEADER, "true")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn auth_route_id_is_exempt_on_any_path() {
    let resp = upstream(test_mode())
        .oneshot(
            request("/orders")
                .header(BYPASS_HEADER, "true")
                .extension(RouteDescriptor::new(SERVICE))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn already_routed_requests_pass_untouched() {
    // no bypass, no token: every check would reject
    let resp = upstream(test_mode())
        .oneshot(
            request("/orders")
                .extension(AlreadyRouted)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
}

#[tokio::test]
async fn production_mode_introspects_with_route_scope() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/oauth/check_token"))
        .and(body_string_contains("scope=orders%3Aread"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "active": true })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/oauth/check_token"))
        .and(body_string_contains("scope=orders%3Awrite"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "active": false })))
        .expect(1)
        .mount(&server)
        .await;

    let addr = server.address();
    let discovery = FixedDiscovery::new()
        .with_instances(SERVICE, [ServiceInstance::up(addr.ip().to_string(), addr.port())]);
    let state = state(RunMode::Production, discovery);
    let token = format!("Bearer {}", Uuid::new_v4());

    let resp = upstream(state.clone())
        .oneshot(
            request("/orders")
                .header(header::AUTHORIZATION, &token)
                .extension(RouteDescriptor::new("orders").with_scope("orders:read"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = upstream(state)
        .oneshot(
            request("/orders")
                .header(header::AUTHORIZATION, &token)
                .extension(RouteDescriptor::new("orders").with_scope("orders:write"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn forward_auth_allows_with_204() {
    let resp = forward_auth(test_mode())
        .oneshot(
            request("/api/v1/check")
                .header("x-forwarded-uri", "/orders/42")
                .header(BYPASS_HEADER, "true")
                .header(header::AUTHORIZATION, format!("Bearer {NIL}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
    assert!(resp.headers().contains_key("x-request-id"));
}

#[tokio::test]
async fn forward_auth_reports_rejections() {
    let resp = forward_auth(test_mode())
        .oneshot(
            request("/api/v1/check")
                .header("x-forwarded-uri", "/orders/42")
                .header(BYPASS_HEADER, "true")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let resp = forward_auth(test_mode())
        .oneshot(
            request("/api/v1/check")
                .header("x-forwarded-uri", "/orders/42")
                .header(header::AUTHORIZATION, format!("Bearer {NIL}"))
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(resp.status(), StatusCode::SERVICE_UNAVAILABLE);
}

fn backend_up() -> AppState {
    // the gate never calls this address: every request here stops before introspection
    state(
        RunMode::Production,
        FixedDiscovery::new().with_instances(SERVICE, [ServiceInstance::up("127.0.0.1", 9)]),
    )
}

#[tokio::test]
async fn forward_auth_ignores_route_headers_by_default() {
    let resp = forward_auth(backend_up())
        .oneshot(
            request("/api/v1/check")
                .header("x-forwarded-uri", "/orders/42")
                .header("x-route-id", SERVICE)
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn forward_auth_does_not_exempt_dot_segment_paths() {
    for uri in ["/auth/../orders/42", "/auth/%2e%2e/orders/42", "/auth/./../orders"] {
        let resp = forward_auth(backend_up())
            .oneshot(
                request("/api/v1/check")
                    .header("x-forwarded-uri", uri)
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(resp.status(), StatusCode::UNAUTHORIZED, "{uri}");
    }
}

#[tokio::test]
async fn forward_auth_honors_trusted_route_headers() {
    let resp = forward_auth(test_mode().with_trusted_route_headers(true))
        .oneshot(
            request("/api/v1/check")
                .header("x-forwarded-uri", "/oauth/token")
                .header("x-route-id", SERVICE)
                .header(BYPASS_HEADER, "true")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
async fn forward_auth_requires_forwarded_uri() {
    let resp = forward_auth(test_mode())
        .oneshot(request("/api/v1/check").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body = json_body(resp).await;
    assert_eq!(body["error"]["code"], "MISSING_FORWARDED_URI");
}

#[tokio::test]
async fn health_skips_the_gate() {
    let resp = forward_auth(test_mode())
        .oneshot(request("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(resp.status(), StatusCode::OK);
    assert_eq!(json_body(resp).await, json!({ "status": "ok" }));
}

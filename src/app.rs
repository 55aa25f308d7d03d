/*
 * Responsibility
 * - Config loading -> token gate construction -> Router assembly
 * - Tracing / panic hook setup
 * - axum::serve() startup
 */
use anyhow::{Context, Result};
use axum::{Router, routing::get};
use std::{panic, process};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use crate::api;
use crate::api::v1::handlers::health::health;
use crate::config::Config;
use crate::middleware::http::{self, HttpLimits};
use crate::services::auth::build_token_gate;
use crate::state::AppState;

fn init_tracing() {
    // RUST_LOG wins when set, e.g. RUST_LOG=info,token_gate=debug
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,tower_http=info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer())
        .init();
}

fn init_panic_hook(abort_on_panic: bool) {
    let default_hook = panic::take_hook();

    panic::set_hook(Box::new(move |info| {
        tracing::error!(?info, "panic");

        // test mode fails fast so a broken harness run is noticed
        if abort_on_panic {
            process::abort();
        } else {
            default_hook(info);
        }
    }))
}

pub async fn run() -> Result<()> {
    init_tracing();
    let config = Config::from_env().context("failed to load configuration")?;
    init_panic_hook(config.mode.is_test());

    tracing::info!(
        mode = ?config.mode,
        addr = %config.addr,
        discovery = ?config.discovery,
        "starting token gate"
    );

    let gate = build_token_gate(&config).await?;
    let state = AppState::new(gate).with_trusted_route_headers(config.trust_route_headers);
    let limits = HttpLimits::for_gate(config.discovery_timeout, config.introspection_timeout);

    let app = build_router(state, limits);
    let listener = tokio::net::TcpListener::bind(config.addr)
        .await
        .with_context(|| format!("failed to bind {}", config.addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

pub fn build_router(state: AppState, limits: HttpLimits) -> Router {
    let router = Router::new()
        .route("/health", get(health))
        .nest("/api/v1", api::v1::routes())
        .with_state(state);

    http::apply(router, limits)
}

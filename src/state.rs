/*
 * Responsibility
 * - Shared context bound to the Router (AppState)
 *   - gate: the token gate, built once at startup
 *   - trust_route_headers: whether forward-auth reads route identity from proxy headers
 * - Cloned per request (inner values are Arc)
 */
use std::sync::Arc;

use crate::services::auth::TokenGate;

#[derive(Clone, Debug)]
pub struct AppState {
    pub gate: Arc<TokenGate>,
    pub trust_route_headers: bool,
}

impl AppState {
    pub fn new(gate: Arc<TokenGate>) -> Self {
        Self {
            gate,
            trust_route_headers: false,
        }
    }

    #[must_use]
    pub fn with_trusted_route_headers(mut self, trusted: bool) -> Self {
        self.trust_route_headers = trusted;
        self
    }
}

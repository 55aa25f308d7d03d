//! Token introspection against the authorization service.
//!
//! Wire protocol:
//! `POST http://<host>:<port>/oauth/check_token`
//! - `Content-Type: application/x-www-form-urlencoded`, body `token=<token>&scope=<scope>`
//! - `Authorization: Bearer <token>`
//! - response: `2xx` with a JSON object holding a boolean `active`; anything else is malformed
//!
//! Every call is a single round trip. Retries belong to the transport, not to this module.

use reqwest::Client;
use serde::Deserialize;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::debug;
use url::Url;

use crate::config::RunMode;
use crate::services::auth::bearer::BearerToken;
use crate::services::auth::result_cache::IntrospectionCache;
use crate::services::discovery::{
    DiscoveryError, ServiceDiscovery, ServiceInstance, lookup_with_timeout,
};

/// What the gate does when introspection cannot produce an answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntrospectionFailurePolicy {
    /// Let the request through.
    FailOpen,
    /// Reject the request as if the authorization service were unavailable.
    FailClosed,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown introspection failure policy: {0}")]
pub struct UnknownPolicy(String);

impl FromStr for IntrospectionFailurePolicy {
    type Err = UnknownPolicy;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('_', "-").as_str() {
            "fail-open" | "open" => Ok(Self::FailOpen),
            "fail-closed" | "closed" => Ok(Self::FailClosed),
            _ => Err(UnknownPolicy(s.to_string())),
        }
    }
}

#[derive(Debug, Error)]
pub enum IntrospectError {
    #[error("no instance of {0} is registered")]
    NoInstance(String),
    #[error(transparent)]
    Discovery(#[from] DiscoveryError),
    #[error("invalid introspection endpoint: {0}")]
    Endpoint(String),
    #[error("introspection request failed: {0}")]
    Transport(#[from] reqwest::Error),
    #[error("malformed introspection response: {0}")]
    MalformedResponse(String),
}

impl IntrospectError {
    /// True for failures where the backend was never (fully) reached.
    pub fn is_transport(&self) -> bool {
        !matches!(self, Self::MalformedResponse(_))
    }
}

/// Where and how to reach the introspection endpoint.
///
/// Kept apart from `Config` so the introspector stays testable on its own.
#[derive(Debug, Clone)]
pub struct IntrospectionSettings {
    pub service_name: String,
    pub endpoint_path: String,
    pub discovery_timeout: Duration,
    pub request_timeout: Duration,
}

impl Default for IntrospectionSettings {
    fn default() -> Self {
        Self {
            service_name: "authorization-service".to_string(),
            endpoint_path: "/oauth/check_token".to_string(),
            discovery_timeout: Duration::from_secs(2),
            request_timeout: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Deserialize)]
struct IntrospectionResponse {
    active: bool,
}

#[derive(Clone)]
pub struct TokenIntrospector {
    mode: RunMode,
    discovery: Arc<dyn ServiceDiscovery>,
    http: Client,
    settings: IntrospectionSettings,
    cache: Option<IntrospectionCache>,
}

impl std::fmt::Debug for TokenIntrospector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIntrospector")
            .field("mode", &self.mode)
            .field("discovery", &self.discovery.backend_name())
            .field("settings", &self.settings)
            .field("cache", &self.cache)
            .finish()
    }
}

impl TokenIntrospector {
    pub fn new(
        mode: RunMode,
        discovery: Arc<dyn ServiceDiscovery>,
        http: Client,
        settings: IntrospectionSettings,
    ) -> Self {
        Self {
            mode,
            discovery,
            http,
            settings,
            cache: None,
        }
    }

    #[must_use]
    pub fn with_cache(mut self, cache: IntrospectionCache) -> Self {
        self.cache = Some(cache);
        self
    }

    /// Is `token` currently active for `scope`?
    ///
    /// In test mode only the nil UUID is active and nothing leaves the process.
    pub async fn introspect(&self, token: &BearerToken, scope: &str) -> Result<bool, IntrospectError> {
        if self.mode.is_test() {
            return Ok(token.is_nil());
        }

        if let Some(cache) = &self.cache {
            if let Some(active) = cache.get(token, scope).await {
                return Ok(active);
            }
        }

        let active = self.check_token(token, scope).await?;

        if let Some(cache) = &self.cache {
            cache.put(token, scope, active).await;
        }
        Ok(active)
    }

    async fn check_token(&self, token: &BearerToken, scope: &str) -> Result<bool, IntrospectError> {
        let instance = lookup_with_timeout(
            self.discovery.as_ref(),
            &self.settings.service_name,
            self.settings.discovery_timeout,
        )
        .await?
        .filter(|instance| instance.status.is_up())
        .ok_or_else(|| IntrospectError::NoInstance(self.settings.service_name.clone()))?;

        let url = endpoint_url(&instance, &self.settings.endpoint_path)?;
        debug!(%url, scope, "introspecting token");

        let resp = self
            .http
            .post(url)
            .bearer_auth(token.as_str())
            .form(&[("token", token.as_str()), ("scope", scope)])
            .timeout(self.settings.request_timeout)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            debug!(%status, "introspection endpoint answered with an error status");
            return Err(IntrospectError::MalformedResponse(format!("status {status}")));
        }
        let body = resp.bytes().await?;

        parse_active(&body).map_err(|err| {
            debug!(error = %err, "introspection response rejected");
            err
        })
    }
}

fn endpoint_url(instance: &ServiceInstance, path: &str) -> Result<Url, IntrospectError> {
    // IPv6 literals need brackets inside a URL authority
    let host = if instance.host.contains(':') && !instance.host.starts_with('[') {
        format!("[{}]", instance.host)
    } else {
        instance.host.clone()
    };

    let mut url = Url::parse(&format!("http://{}:{}", host, instance.port))
        .map_err(|e| IntrospectError::Endpoint(format!("{instance}: {e}")))?;
    url.set_path(path);
    Ok(url)
}

fn parse_active(body: &[u8]) -> Result<bool, IntrospectError> {
    if body.is_empty() {
        return Err(IntrospectError::MalformedResponse("empty body".to_string()));
    }

    serde_json::from_slice::<IntrospectionResponse>(body)
        .map(|r| r.active)
        .map_err(|e| IntrospectError::MalformedResponse(e.to_string()))
}

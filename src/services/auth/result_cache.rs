use sha2::{Digest, Sha256};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::services::auth::bearer::BearerToken;
use crate::services::cache::CacheClient;

const KEY_PREFIX: &str = "introspect";

/// Short-lived memo of introspection answers, keyed by token and scope.
///
/// Raw tokens never reach the cache backend; keys are SHA-256 digests.
/// Any cache failure is logged and treated as a miss.
#[derive(Clone)]
pub struct IntrospectionCache {
    client: Arc<dyn CacheClient>,
    ttl: Duration,
}

impl std::fmt::Debug for IntrospectionCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntrospectionCache")
            .field("backend", &self.client.backend_name())
            .field("ttl", &self.ttl)
            .finish()
    }
}

impl IntrospectionCache {
    pub fn new(client: Arc<dyn CacheClient>, ttl: Duration) -> Self {
        Self { client, ttl }
    }

    pub fn key(token: &BearerToken, scope: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(token.as_str().as_bytes());
        hasher.update([0u8]);
        hasher.update(scope.as_bytes());
        format!("{}:{}", KEY_PREFIX, hex::encode(hasher.finalize()))
    }

    pub async fn get(&self, token: &BearerToken, scope: &str) -> Option<bool> {
        let key = Self::key(token, scope);

        match self.client.get_string(&key).await {
            Ok(Some(value)) => match value.as_str() {
                "1" => Some(true),
                "0" => Some(false),
                _ => {
                    warn!(key = %key, "ignoring unexpected introspection cache value");
                    None
                }
            },
            Ok(None) => None,
            Err(err) => {
                warn!(
                    backend = self.client.backend_name(),
                    error = %err,
                    "introspection cache read failed"
                );
                None
            }
        }
    }

    pub async fn put(&self, token: &BearerToken, scope: &str, active: bool) {
        let key = Self::key(token, scope);
        let value = if active { "1" } else { "0" };

        match self.client.set_with_ttl(&key, value, self.ttl).await {
            Ok(()) => debug!(key = %key, active, "cached introspection result"),
            Err(err) => warn!(
                backend = self.client.backend_name(),
                error = %err,
                "introspection cache write failed"
            ),
        }
    }
}

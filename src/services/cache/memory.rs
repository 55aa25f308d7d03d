//! In-process TTL cache.
//!
//! Single gateway replicas use this instead of Valkey; entries are lost on restart.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use crate::services::cache::client::{CacheClient, CacheError, CacheResult};

// Expired entries are swept once the map grows past this size.
const SWEEP_THRESHOLD: usize = 10_000;

#[derive(Clone, Debug)]
struct Entry {
    value: String,
    expires_at: Instant,
}

/// Thread-safe in-memory cache with per-entry TTL.
#[derive(Clone, Debug, Default)]
pub struct MemoryCache {
    inner: Arc<Mutex<HashMap<String, Entry>>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.inner.lock().map(|map| map.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Remove all expired entries.
    pub fn evict_expired(&self) {
        let now = Instant::now();
        if let Ok(mut map) = self.inner.lock() {
            map.retain(|_, entry| entry.expires_at > now);
        }
    }
}

fn poisoned() -> CacheError {
    CacheError::BackendCommand("memory cache lock poisoned".to_string())
}

#[async_trait]
impl CacheClient for MemoryCache {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get_string(&self, key: &str) -> CacheResult<Option<String>> {
        let now = Instant::now();
        let mut map = self.inner.lock().map_err(|_| poisoned())?;

        match map.get(key) {
            Some(entry) if entry.expires_at > now => Ok(Some(entry.value.clone())),
            Some(_) => {
                map.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> CacheResult<()> {
        let now = Instant::now();
        let mut map = self.inner.lock().map_err(|_| poisoned())?;

        if map.len() >= SWEEP_THRESHOLD {
            map.retain(|_, entry| entry.expires_at > now);
        }

        map.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at: now + ttl,
            },
        );
        Ok(())
    }
}

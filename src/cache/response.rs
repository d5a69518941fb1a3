// Per-adapter response cache.
// Applies an adapter's TTLs on top of a shared backing store.

use std::sync::Arc;
use std::time::Duration;

use tracing::warn;

use super::entry::{CacheEntry, Payload};
use super::store::CacheStore;

/// TTL-aware view over a cache store, one instance per adapter.
#[derive(Clone)]
pub struct ResponseCache {
    store: Arc<dyn CacheStore>,
    ttl: Duration,
    failure_ttl: Duration,
}

impl ResponseCache {
    /// Create a cache whose results and failures share the same TTL.
    pub fn new(store: Arc<dyn CacheStore>, ttl: Duration) -> Self {
        Self {
            store,
            ttl,
            failure_ttl: ttl,
        }
    }

    /// Use a separate TTL for cached failures.
    pub fn with_failure_ttl(mut self, failure_ttl: Duration) -> Self {
        self.failure_ttl = failure_ttl;
        self
    }

    /// TTL for normalized results.
    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// TTL that applies to `entry`.
    pub fn ttl_for(&self, entry: &CacheEntry) -> Duration {
        if entry.payload.is_failure() {
            self.failure_ttl
        } else {
            self.ttl
        }
    }

    /// Check if `entry` is still within the TTL for its payload kind.
    pub fn is_fresh(&self, entry: &CacheEntry) -> bool {
        entry.is_fresh(self.ttl_for(entry))
    }

    /// Get the entry for `key`. Store failures read as a miss.
    pub async fn get(&self, key: &str) -> Option<CacheEntry> {
        match self.store.get(key).await {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key, error = %e, "Cache read failed");
                None
            }
        }
    }

    /// Get the entry for `key` only if it is still fresh.
    pub async fn get_fresh(&self, key: &str) -> Option<CacheEntry> {
        self.get(key).await.filter(|entry| self.is_fresh(entry))
    }

    /// Store `payload` under `key`, stamped now. Returns the written entry.
    pub async fn put(&self, key: &str, payload: Payload) -> CacheEntry {
        let entry = CacheEntry::new(key, payload);
        if let Err(e) = self.store.put(entry.clone()).await {
            warn!(key, error = %e, "Cache write failed");
        }
        entry
    }
}

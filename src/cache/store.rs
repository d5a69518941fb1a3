// Cache backing stores.
// Defines the storage seam and the default in-process implementation.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::Result;

use super::entry::CacheEntry;

/// Storage for cache entries, keyed by cache key.
///
/// Writes replace whole entries (last write wins). Implementations backed by an
/// external key-value service can be plugged in for multi-instance deployments.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Get the entry for `key`, fresh or not.
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>>;

    /// Store `entry` under its own key, replacing any previous entry.
    async fn put(&self, entry: CacheEntry) -> Result<()>;

    /// Number of stored entries.
    async fn len(&self) -> Result<usize>;
}

/// Process-lifetime store. Entries are never evicted, only overwritten.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: DashMap<String, CacheEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<CacheEntry>> {
        Ok(self.entries.get(key).map(|entry| entry.value().clone()))
    }

    async fn put(&self, entry: CacheEntry) -> Result<()> {
        self.entries.insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.entries.len())
    }
}

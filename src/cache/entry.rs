// Cache entry type.
// Holds one normalized payload and the moment it was fetched.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// What was cached for a key: a normalized result or a cacheable failure.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    /// Normalized adapter output.
    Result { body: Value },
    /// Stable upstream refusal (e.g. a disabled Discord widget) with its response body.
    Failure { status: u16, body: Value },
}

impl Payload {
    pub fn is_failure(&self) -> bool {
        matches!(self, Payload::Failure { .. })
    }
}

/// A cached payload with metadata. Replaced wholesale on refresh.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub key: String,
    pub payload: Payload,
    /// When the payload was fetched from upstream.
    pub fetched_at: DateTime<Utc>,
}

impl CacheEntry {
    /// Create an entry stamped with the current time.
    pub fn new(key: impl Into<String>, payload: Payload) -> Self {
        Self {
            key: key.into(),
            payload,
            fetched_at: Utc::now(),
        }
    }

    /// Time elapsed since the fetch, as seen from `now`.
    ///
    /// Entries stamped in the future count as infinitely old.
    pub fn age_at(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.fetched_at)
            .to_std()
            .unwrap_or(Duration::MAX)
    }

    /// Check if the entry is younger than `ttl` at `now`.
    pub fn is_fresh_at(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        self.age_at(now) < ttl
    }

    /// Check if the entry is still within its TTL.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        self.is_fresh_at(ttl, Utc::now())
    }
}

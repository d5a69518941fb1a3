// Cache layer for normalized upstream results.
// Entries live in a pluggable store; each adapter gets its own TTL-aware view.

pub mod entry;
pub mod keys;
pub mod response;
pub mod store;

pub use entry::{CacheEntry, Payload};
pub use keys::cache_key;
pub use response::ResponseCache;
pub use store::{CacheStore, MemoryStore};

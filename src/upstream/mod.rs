// Upstream HTTP module.
// Provides the shared client every adapter uses to reach third-party endpoints.

pub mod client;

pub use client::{UpstreamClient, looks_like_json};

// Platform adapters.
// Each adapter validates its query, fetches upstream data and normalizes it.

pub mod discord;
pub mod github;
pub mod instagram;
pub mod reddit;
pub mod scrape;
pub mod substack;
pub mod tiktok;
pub mod youtube;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, de::DeserializeOwned};
use serde_json::Value;
use tracing::warn;

use crate::error::{PulseError, Result};

pub use discord::DiscordAdapter;
pub use github::{GitHubOrgAdapter, GitHubUserAdapter};
pub use instagram::InstagramAdapter;
pub use reddit::RedditAdapter;
pub use substack::SubstackAdapter;
pub use tiktok::TikTokAdapter;
pub use youtube::YouTubeAdapter;

/// One platform integration.
///
/// `fetch` fails soft: only [`PulseError::NotFound`] and platform-specific stable
/// refusals such as [`PulseError::WidgetDisabled`] are returned as errors. Every other
/// upstream problem degrades the output instead.
#[async_trait]
pub trait Adapter: Send + Sync + 'static {
    /// Raw query string parameters.
    type Query: DeserializeOwned + Send + 'static;
    /// Validated request parameters.
    type Params: Send + Sync;
    /// Normalized result.
    type Output: Serialize + Send;

    /// Platform name, used for cache keys and logs.
    const PLATFORM: &'static str;

    /// Validate the query before any network call is made.
    fn validate(query: Self::Query) -> Result<Self::Params>;

    /// Deterministic cache key for validated parameters.
    fn cache_key(params: &Self::Params) -> String;

    /// Fetch and normalize upstream data.
    async fn fetch(&self, params: &Self::Params) -> Result<Self::Output>;
}

/// Extract a required, non-empty query parameter.
pub(crate) fn require(value: Option<String>, name: &str) -> Result<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .ok_or_else(|| PulseError::InvalidInput(format!("Missing required parameter: {}", name)))
}

/// Check a handle against a character set and length range.
pub(crate) fn check_handle(
    value: &str,
    name: &str,
    max_len: usize,
    allowed: impl Fn(char) -> bool,
) -> Result<()> {
    if value.len() > max_len || !value.chars().all(allowed) {
        return Err(PulseError::InvalidInput(format!("Invalid {}: {}", name, value)));
    }
    Ok(())
}

/// Split a comma-separated id list, keeping the first `max` valid, distinct ids.
pub(crate) fn parse_id_list(
    raw: Option<&str>,
    max: usize,
    valid: impl Fn(&str) -> bool,
) -> Vec<String> {
    let mut ids: Vec<String> = Vec::new();
    for id in raw.unwrap_or_default().split(',').map(str::trim) {
        if ids.len() >= max {
            break;
        }
        if !id.is_empty() && valid(id) && !ids.iter().any(|seen| seen == id) {
            ids.push(id.to_string());
        }
    }
    ids
}

/// Check a handle that may contain dots, rejecting leading, trailing or repeated dots.
pub(crate) fn check_dotted(value: &str, name: &str) -> Result<()> {
    if value.is_empty() || value.starts_with('.') || value.ends_with('.') || value.contains("..") {
        return Err(PulseError::InvalidInput(format!("Invalid {}: {}", name, value)));
    }
    Ok(())
}

/// Deserialize list items one at a time, dropping the ones that do not fit `T`.
pub(crate) fn parse_each<T: DeserializeOwned>(items: Vec<Value>) -> Vec<T> {
    items
        .into_iter()
        .filter_map(|item| serde_json::from_value(item).ok())
        .collect()
}

/// `deserialize_with` form of [`parse_each`]; a missing or null list is empty.
pub(crate) fn lenient_list<'de, D, T>(deserializer: D) -> std::result::Result<Vec<T>, D::Error>
where
    D: Deserializer<'de>,
    T: DeserializeOwned,
{
    let items = Option::<Vec<Value>>::deserialize(deserializer)?;
    Ok(items.map(parse_each).unwrap_or_default())
}

/// Turn a failed optional upstream call into `None`, logging why.
///
/// `NotFound` is absorbed too; callers that treat it as fatal check it first.
pub(crate) fn degrade<T>(platform: &str, what: &str, result: Result<T>) -> Option<T> {
    match result {
        Ok(value) => Some(value),
        Err(e) => {
            warn!(platform, what, error = %e, "Upstream call degraded");
            None
        }
    }
}

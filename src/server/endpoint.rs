// Cached endpoint.
// Runs validate, cache lookup, fetch and store for one adapter.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::{CacheEntry, Payload, ResponseCache};
use crate::error::Result;
use crate::platforms::Adapter;

use super::response::{ApiError, with_cache_control};

/// An adapter behind its response cache.
pub struct Endpoint<A: Adapter> {
    adapter: A,
    cache: ResponseCache,
}

impl<A: Adapter> Endpoint<A> {
    pub fn new(adapter: A, cache: ResponseCache) -> Self {
        Self { adapter, cache }
    }

    pub fn cache(&self) -> &ResponseCache {
        &self.cache
    }

    /// Answer a request for `query`.
    ///
    /// Fresh cache entries are served without touching the adapter. Otherwise the adapter
    /// runs and its result (or cacheable failure) replaces the entry.
    pub async fn serve(&self, query: A::Query) -> Response {
        let response = match self.resolve(query).await {
            Ok(response) => return response,
            Err(e) => ApiError::from(e).into_response(),
        };
        with_cache_control(response, self.cache.ttl())
    }

    async fn resolve(&self, query: A::Query) -> Result<Response> {
        let params = A::validate(query)?;
        let key = A::cache_key(&params);

        if let Some(entry) = self.cache.get_fresh(&key).await {
            debug!(platform = A::PLATFORM, key = %key, "Cache hit");
            return Ok(self.respond(entry, true));
        }

        debug!(platform = A::PLATFORM, key = %key, "Cache miss");
        let payload = match self.adapter.fetch(&params).await {
            Ok(output) => Payload::Result {
                body: serde_json::to_value(output)?,
            },
            Err(e) if e.is_cacheable() => {
                let error = ApiError::from(e);
                Payload::Failure {
                    status: error.status().as_u16(),
                    body: error.to_value(),
                }
            }
            Err(e) => {
                if !e.is_hard() {
                    warn!(
                        platform = A::PLATFORM,
                        key = %key,
                        error = %e,
                        "Adapter failed without a partial result"
                    );
                }
                return Err(e);
            }
        };

        let entry = self.cache.put(&key, payload).await;
        Ok(self.respond(entry, false))
    }

    fn respond(&self, entry: CacheEntry, cached: bool) -> Response {
        let ttl = self.cache.ttl_for(&entry);
        let response = match entry.payload {
            Payload::Result { mut body } => {
                if let Value::Object(map) = &mut body {
                    map.insert("cached".to_string(), Value::Bool(cached));
                    map.insert(
                        "fetchedAt".to_string(),
                        Value::String(entry.fetched_at.to_rfc3339()),
                    );
                }
                (StatusCode::OK, Json(body)).into_response()
            }
            Payload::Failure { status, body } => {
                let status =
                    StatusCode::from_u16(status).unwrap_or(StatusCode::SERVICE_UNAVAILABLE);
                (status, Json(body)).into_response()
            }
        };
        with_cache_control(response, ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use async_trait::async_trait;
    use axum::body::to_bytes;
    use axum::http::header::CACHE_CONTROL;
    use chrono::Utc;
    use serde::{Deserialize, Serialize};

    use crate::cache::{CacheStore, MemoryStore};
    use crate::error::PulseError;

    #[derive(Debug, Default, Deserialize)]
    struct FakeQuery {
        name: Option<String>,
    }

    #[derive(Debug, Serialize)]
    struct FakeOutput {
        name: String,
        call: usize,
        profile: Option<String>,
        #[serde(rename = "_notice", skip_serializing_if = "Option::is_none")]
        notice: Option<String>,
    }

    /// Counts fetches. Names starting with `disabled` fail like a disabled widget,
    /// `walled` degrades to an empty profile and `broken` leaks a soft error.
    #[derive(Default)]
    struct FakeAdapter {
        calls: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl Adapter for FakeAdapter {
        type Query = FakeQuery;
        type Params = String;
        type Output = FakeOutput;

        const PLATFORM: &'static str = "fake";

        fn validate(query: FakeQuery) -> Result<String> {
            crate::platforms::require(query.name, "name")
        }

        fn cache_key(name: &String) -> String {
            crate::cache::cache_key(Self::PLATFORM, &[name.as_str()])
        }

        async fn fetch(&self, name: &String) -> Result<FakeOutput> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            if name.starts_with("disabled") {
                return Err(PulseError::WidgetDisabled);
            }
            if name == "missing" {
                return Err(PulseError::NotFound(format!("'{}' not found", name)));
            }
            if name == "broken" {
                return Err(PulseError::SchemaDrift("unexpected page".into()));
            }
            let walled = name == "walled";
            Ok(FakeOutput {
                name: name.clone(),
                call,
                profile: (!walled).then(|| format!("profile of {}", name)),
                notice: walled.then(|| "Profile data is temporarily unavailable".to_string()),
            })
        }
    }

    fn endpoint() -> (Endpoint<FakeAdapter>, Arc<MemoryStore>, Arc<AtomicUsize>) {
        let store = Arc::new(MemoryStore::new());
        let calls = Arc::new(AtomicUsize::new(0));
        let adapter = FakeAdapter {
            calls: calls.clone(),
        };
        let cache = ResponseCache::new(store.clone(), Duration::from_secs(300))
            .with_failure_ttl(Duration::from_secs(120));
        (Endpoint::new(adapter, cache), store, calls)
    }

    fn query(name: &str) -> FakeQuery {
        FakeQuery {
            name: Some(name.to_string()),
        }
    }

    async fn json(response: Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn without_cached(mut body: Value) -> Value {
        if let Value::Object(map) = &mut body {
            map.remove("cached");
        }
        body
    }

    #[tokio::test]
    async fn test_miss_then_hit() {
        let (endpoint, _, calls) = endpoint();

        let first = endpoint.serve(query("alice")).await;
        assert_eq!(first.status(), StatusCode::OK);
        assert_eq!(
            first.headers()[CACHE_CONTROL],
            "public, max-age=300, s-maxage=300, stale-while-revalidate=300"
        );
        let first = json(first).await;
        assert_eq!(first["cached"], false);
        assert_eq!(first["call"], 1);
        assert!(first["fetchedAt"].is_string());

        let second = json(endpoint.serve(query("alice")).await).await;
        assert_eq!(second["cached"], true);
        assert_eq!(without_cached(first), without_cached(second));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_expired_entry_is_refetched() {
        let (endpoint, store, calls) = endpoint();
        json(endpoint.serve(query("alice")).await).await;

        let mut entry = store.get("fake:alice").await.unwrap().unwrap();
        entry.fetched_at = Utc::now() - chrono::Duration::seconds(301);
        store.put(entry).await.unwrap();

        let body = json(endpoint.serve(query("alice")).await).await;
        assert_eq!(body["cached"], false);
        assert_eq!(body["call"], 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalid_input_skips_adapter() {
        let (endpoint, store, calls) = endpoint();
        let response = endpoint.serve(FakeQuery::default()).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        let body = json(response).await;
        assert_eq!(body["error"], "Missing required parameter: name");
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_not_found_is_not_cached() {
        let (endpoint, store, calls) = endpoint();
        assert_eq!(
            endpoint.serve(query("missing")).await.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            endpoint.serve(query("missing")).await.status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_widget_disabled_is_cached_under_failure_ttl() {
        let (endpoint, store, calls) = endpoint();

        let first = endpoint.serve(query("disabled-1")).await;
        assert_eq!(first.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            first.headers()[CACHE_CONTROL],
            "public, max-age=120, s-maxage=120, stale-while-revalidate=120"
        );
        assert_eq!(json(first).await["widgetDisabled"], true);

        let second = endpoint.serve(query("disabled-1")).await;
        assert_eq!(second.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(json(second).await["widgetDisabled"], true);
        assert_eq!(calls.load(Ordering::SeqCst), 1);

        // Past the failure TTL the widget is probed again.
        let mut entry = store.get("fake:disabled-1").await.unwrap().unwrap();
        entry.fetched_at = Utc::now() - chrono::Duration::seconds(121);
        store.put(entry).await.unwrap();
        endpoint.serve(query("disabled-1")).await;
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_degraded_result_is_200_with_notice() {
        let (endpoint, store, _) = endpoint();
        let response = endpoint.serve(query("walled")).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = json(response).await;
        assert!(body["profile"].is_null());
        assert_eq!(body["_notice"], "Profile data is temporarily unavailable");
        assert_eq!(body["cached"], false);
        assert_eq!(store.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_leaked_soft_error_is_503_and_not_cached() {
        let (endpoint, store, _) = endpoint();
        let response = endpoint.serve(query("broken")).await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(
            response.headers()[CACHE_CONTROL],
            "public, max-age=300, s-maxage=300, stale-while-revalidate=300"
        );
        assert_eq!(store.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_keys_do_not_collide() {
        let (endpoint, _, calls) = endpoint();
        let alice = json(endpoint.serve(query("alice")).await).await;
        let bob = json(endpoint.serve(query("bob")).await).await;

        assert_eq!(alice["name"], "alice");
        assert_eq!(bob["name"], "bob");
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }
}

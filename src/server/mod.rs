// HTTP surface.
// Builds one cached endpoint per platform and serves them with axum.

pub mod endpoint;
pub mod handlers;
pub mod response;

use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};

use axum::{Router, routing::get};
use tokio::net::TcpListener;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::cache::{CacheStore, ResponseCache};
use crate::config::Config;
use crate::error::{PulseError, Result};
use crate::platforms::github::GitHubApi;
use crate::platforms::{
    DiscordAdapter, GitHubOrgAdapter, GitHubUserAdapter, InstagramAdapter, RedditAdapter,
    SubstackAdapter, TikTokAdapter, YouTubeAdapter,
};
use crate::upstream::UpstreamClient;

pub use endpoint::Endpoint;
pub use response::ApiError;

/// Application state shared across handlers.
pub struct AppState {
    pub github: Endpoint<GitHubUserAdapter>,
    pub github_org: Endpoint<GitHubOrgAdapter>,
    pub reddit: Endpoint<RedditAdapter>,
    pub substack: Endpoint<SubstackAdapter>,
    pub youtube: Endpoint<YouTubeAdapter>,
    pub tiktok: Endpoint<TikTokAdapter>,
    pub instagram: Endpoint<InstagramAdapter>,
    pub discord: Endpoint<DiscordAdapter>,
    /// Backing store shared by every endpoint's cache.
    pub store: Arc<dyn CacheStore>,
    pub started_at: Instant,
}

impl AppState {
    /// Wire every adapter to its cache using `config`.
    pub fn new(config: &Config, store: Arc<dyn CacheStore>) -> Result<Self> {
        let client = UpstreamClient::new(&config.upstream)?;
        let ttl = &config.ttl;
        let limits = &config.limits;
        let cache = |secs: u64| ResponseCache::new(store.clone(), Duration::from_secs(secs));

        let github_api = GitHubApi::new(client.clone(), config.upstream.github_token.as_deref())?;

        Ok(Self {
            github: Endpoint::new(
                GitHubUserAdapter::new(github_api.clone(), limits.github_events),
                cache(ttl.github),
            ),
            github_org: Endpoint::new(
                GitHubOrgAdapter::new(github_api, limits.github_events, limits.org_repos),
                cache(ttl.github),
            ),
            reddit: Endpoint::new(
                RedditAdapter::new(
                    client.clone(),
                    limits.reddit_items,
                    limits.reddit_comment_chars,
                ),
                cache(ttl.reddit),
            ),
            substack: Endpoint::new(
                SubstackAdapter::new(client.clone(), limits.substack_posts, limits.substack_stats),
                cache(ttl.substack),
            ),
            youtube: Endpoint::new(
                YouTubeAdapter::new(
                    client.clone(),
                    config.youtube.mirrors.clone(),
                    limits.youtube_videos,
                    limits.youtube_enrich,
                ),
                cache(ttl.youtube),
            ),
            tiktok: Endpoint::new(
                TikTokAdapter::new(client.clone(), limits.tiktok_videos),
                cache(ttl.tiktok),
            ),
            instagram: Endpoint::new(
                InstagramAdapter::new(client.clone(), limits.instagram_posts),
                cache(ttl.instagram),
            ),
            discord: Endpoint::new(
                DiscordAdapter::new(client, limits.discord_members),
                cache(ttl.discord)
                    .with_failure_ttl(Duration::from_secs(ttl.discord_widget_disabled)),
            ),
            store,
            started_at: Instant::now(),
        })
    }
}

/// Build the router with CORS and request tracing.
pub fn router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(handlers::health))
        .route("/api/github", get(handlers::github))
        .route("/api/github-org", get(handlers::github_org))
        .route("/api/reddit", get(handlers::reddit))
        .route("/api/substack", get(handlers::substack))
        .route("/api/youtube", get(handlers::youtube))
        .route("/api/tiktok", get(handlers::tiktok))
        .route("/api/instagram", get(handlers::instagram))
        .route("/api/discord", get(handlers::discord))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Bind to the configured address and serve until `shutdown` resolves.
pub async fn start_server(
    config: &Config,
    store: Arc<dyn CacheStore>,
    shutdown: impl Future<Output = ()> + Send + 'static,
) -> Result<()> {
    let state = Arc::new(AppState::new(config, store)?);
    let app = router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .map_err(|e| PulseError::Other(format!("Invalid listen address: {}", e)))?;
    let listener = TcpListener::bind(addr).await?;
    info!("Server listening on {}", listener.local_addr()?);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;
    info!("Server stopped");
    Ok(())
}

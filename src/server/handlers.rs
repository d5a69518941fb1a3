// Route handlers.
// Each API route extracts its query string and hands it to the matching endpoint.

use std::sync::Arc;

use axum::{
    Json,
    extract::{Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;

use crate::platforms::Adapter;
use crate::platforms::discord::DiscordQuery;
use crate::platforms::github::{OrgQuery, UserQuery};
use crate::platforms::instagram::InstagramQuery;
use crate::platforms::reddit::RedditQuery;
use crate::platforms::substack::SubstackQuery;
use crate::platforms::tiktok::TikTokQuery;
use crate::platforms::youtube::YouTubeQuery;

use super::AppState;
use super::endpoint::Endpoint;
use super::response::{ApiError, with_cache_control};

type QueryResult<T> = Result<Query<T>, QueryRejection>;

async fn serve<A: Adapter>(endpoint: &Endpoint<A>, query: QueryResult<A::Query>) -> Response {
    match query {
        Ok(Query(query)) => endpoint.serve(query).await,
        Err(rejection) => with_cache_control(
            ApiError::new(StatusCode::BAD_REQUEST, rejection.body_text()).into_response(),
            endpoint.cache().ttl(),
        ),
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    pub uptime_seconds: u64,
    pub cache_entries: Option<usize>,
}

/// GET /health
pub async fn health(State(state): State<Arc<AppState>>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        uptime_seconds: state.started_at.elapsed().as_secs(),
        cache_entries: state.store.len().await.ok(),
    })
}

/// GET /api/github?username=
pub async fn github(
    State(state): State<Arc<AppState>>,
    query: QueryResult<UserQuery>,
) -> Response {
    serve(&state.github, query).await
}

/// GET /api/github-org?org=
pub async fn github_org(
    State(state): State<Arc<AppState>>,
    query: QueryResult<OrgQuery>,
) -> Response {
    serve(&state.github_org, query).await
}

/// GET /api/reddit?username=
pub async fn reddit(
    State(state): State<Arc<AppState>>,
    query: QueryResult<RedditQuery>,
) -> Response {
    serve(&state.reddit, query).await
}

/// GET /api/substack?publication=
pub async fn substack(
    State(state): State<Arc<AppState>>,
    query: QueryResult<SubstackQuery>,
) -> Response {
    serve(&state.substack, query).await
}

/// GET /api/youtube?channelId=
pub async fn youtube(
    State(state): State<Arc<AppState>>,
    query: QueryResult<YouTubeQuery>,
) -> Response {
    serve(&state.youtube, query).await
}

/// GET /api/tiktok?username=&videoIds=
pub async fn tiktok(
    State(state): State<Arc<AppState>>,
    query: QueryResult<TikTokQuery>,
) -> Response {
    serve(&state.tiktok, query).await
}

/// GET /api/instagram?username=&postIds=
pub async fn instagram(
    State(state): State<Arc<AppState>>,
    query: QueryResult<InstagramQuery>,
) -> Response {
    serve(&state.instagram, query).await
}

/// GET /api/discord?serverId=
pub async fn discord(
    State(state): State<Arc<AppState>>,
    query: QueryResult<DiscordQuery>,
) -> Response {
    serve(&state.discord, query).await
}

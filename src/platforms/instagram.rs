// Instagram adapter.
// Scrapes the public profile page with ordered fallbacks down to the og:description meta tag.

use std::sync::LazyLock;

use async_trait::async_trait;
use futures::future::join_all;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::cache_key;
use crate::error::{PulseError, Result};
use crate::format::{Case, abbreviate, parse_abbreviated};
use crate::upstream::UpstreamClient;

use super::scrape::{Strategy, first_match, json_after, meta_content, unescape_json_str};
use super::{Adapter, check_dotted, check_handle, degrade, parse_id_list, require};

/// Upper bound on post ids read from a query.
const MAX_POST_IDS: usize = 6;
const OEMBED_URL: &str = "https://api.instagram.com/oembed/";

static FOLLOWED_BY: LazyLock<Regex> =
    LazyLock::new(|| pattern(r#""edge_followed_by":\{"count":(\d+)\}"#));
static FOLLOW: LazyLock<Regex> = LazyLock::new(|| pattern(r#""edge_follow":\{"count":(\d+)\}"#));
static MEDIA: LazyLock<Regex> =
    LazyLock::new(|| pattern(r#""edge_owner_to_timeline_media":\{"count":(\d+)"#));
static FULL_NAME: LazyLock<Regex> =
    LazyLock::new(|| pattern(r#""full_name":"((?:[^"\\]|\\.)*)""#));
static PROFILE_PIC: LazyLock<Regex> =
    LazyLock::new(|| pattern(r#""profile_pic_url_hd":"((?:[^"\\]|\\.)*)""#));
static META_COUNTS: LazyLock<Regex> = LazyLock::new(|| {
    pattern(r"([\d.,]+[KkMmBb]?)\s+Followers,\s+([\d.,]+[KkMmBb]?)\s+Following,\s+([\d.,]+[KkMmBb]?)\s+Posts")
});
static META_NAME: LazyLock<Regex> = LazyLock::new(|| pattern(r"^(.*?)\s*\(@[^)]+\)"));

fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("static Instagram pattern must compile")
}

/// Query parameters for `/api/instagram`.
#[derive(Debug, Default, Deserialize)]
pub struct InstagramQuery {
    pub username: Option<String>,
    #[serde(rename = "postIds")]
    pub post_ids: Option<String>,
}

/// Validated Instagram request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InstagramParams {
    pub username: String,
    pub post_ids: Vec<String>,
}

/// Normalized Instagram profile.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstagramUser {
    pub username: String,
    pub full_name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub verified: bool,
    pub followers: u64,
    pub following: u64,
    pub posts: u64,
    pub followers_display: String,
    pub url: String,
}

/// A caller-requested post, with oEmbed metadata when it was available.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InstagramPost {
    pub id: String,
    pub url: String,
    pub title: Option<String>,
    pub thumbnail_url: Option<String>,
    pub author_name: Option<String>,
}

/// Response for the Instagram endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct InstagramResult {
    pub user: Option<InstagramUser>,
    pub posts: Vec<InstagramPost>,
    #[serde(rename = "_notice", skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OEmbed {
    title: Option<String>,
    thumbnail_url: Option<String>,
    author_name: Option<String>,
}

/// Adapter for an Instagram profile.
pub struct InstagramAdapter {
    client: UpstreamClient,
    post_limit: usize,
}

impl InstagramAdapter {
    pub fn new(client: UpstreamClient, post_limit: usize) -> Self {
        Self { client, post_limit }
    }

    async fn profile(&self, username: &str) -> Result<Option<InstagramUser>> {
        let page = match self.client.get_text(&profile_url(username)).await {
            Ok(page) => page,
            Err(e) if e.is_not_found() => {
                return Err(PulseError::NotFound(format!(
                    "Instagram user '{}' not found",
                    username
                )));
            }
            Err(e) => {
                warn!(platform = Self::PLATFORM, username, error = %e, "Profile page fetch failed");
                return Ok(None);
            }
        };
        Ok(degrade(Self::PLATFORM, "profile", extract_user(&page, username)))
    }

    async fn post(&self, id: &str) -> InstagramPost {
        let url = format!("https://www.instagram.com/p/{}/", id);
        let meta = match self
            .client
            .get_json_lenient_with_params::<OEmbed, _>(OEMBED_URL, &[("url", url.as_str())])
            .await
        {
            Ok(meta) => meta,
            Err(e) => {
                debug!(platform = Self::PLATFORM, id, error = %e, "oEmbed lookup failed");
                None
            }
        };

        let (title, thumbnail_url, author_name) = match meta {
            Some(meta) => (meta.title, meta.thumbnail_url, meta.author_name),
            None => (None, None, None),
        };
        InstagramPost {
            id: id.to_string(),
            url,
            title,
            thumbnail_url,
            author_name,
        }
    }

    fn validate_with_limit(query: InstagramQuery, limit: usize) -> Result<InstagramParams> {
        let username = require(query.username, "username")?;
        let username = username.trim_start_matches('@').to_lowercase();
        check_handle(&username, "username", 30, |c| {
            c.is_ascii_alphanumeric() || c == '_' || c == '.'
        })?;
        check_dotted(&username, "username")?;

        let post_ids = parse_id_list(query.post_ids.as_deref(), limit, |id| {
            id.len() <= 64
                && id
                    .chars()
                    .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
        });
        Ok(InstagramParams { username, post_ids })
    }
}

#[async_trait]
impl Adapter for InstagramAdapter {
    type Query = InstagramQuery;
    type Params = InstagramParams;
    type Output = InstagramResult;

    const PLATFORM: &'static str = "instagram";

    fn validate(query: InstagramQuery) -> Result<InstagramParams> {
        Self::validate_with_limit(query, MAX_POST_IDS)
    }

    fn cache_key(params: &InstagramParams) -> String {
        let ids = params.post_ids.join(",");
        cache_key(Self::PLATFORM, &[params.username.as_str(), ids.as_str()])
    }

    async fn fetch(&self, params: &InstagramParams) -> Result<InstagramResult> {
        let ids = params.post_ids.iter().take(self.post_limit);
        let (user, posts) = tokio::join!(
            self.profile(&params.username),
            join_all(ids.map(|id| self.post(id))),
        );
        Ok(assemble(user?, posts))
    }
}

/// Combine the profile and posts, flagging a missing profile with a notice.
fn assemble(user: Option<InstagramUser>, posts: Vec<InstagramPost>) -> InstagramResult {
    let notice = user
        .is_none()
        .then(|| "Instagram profile data is temporarily unavailable".to_string());
    InstagramResult {
        user,
        posts,
        notice,
    }
}

fn profile_url(username: &str) -> String {
    format!("https://www.instagram.com/{}/", username)
}

fn edge_count(user: &Value, edge: &str) -> u64 {
    user.get(edge)
        .and_then(|e| e.get("count"))
        .and_then(Value::as_u64)
        .unwrap_or(0)
}

fn text(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Build a profile from a GraphQL-style `user` object.
fn user_from_graph(user: &Value) -> Option<InstagramUser> {
    let username = text(user, "username")?;
    let followers = edge_count(user, "edge_followed_by");
    Some(InstagramUser {
        url: profile_url(&username),
        full_name: text(user, "full_name"),
        avatar_url: text(user, "profile_pic_url_hd").or_else(|| text(user, "profile_pic_url")),
        bio: text(user, "biography"),
        verified: user.get("is_verified").and_then(Value::as_bool).unwrap_or(false),
        followers,
        following: edge_count(user, "edge_follow"),
        posts: edge_count(user, "edge_owner_to_timeline_media"),
        followers_display: abbreviate(followers, Case::Upper),
        username,
    })
}

fn from_embedded_json(page: &str) -> Option<InstagramUser> {
    let graph = json_after(page, "\"graphql\":")?;
    user_from_graph(graph.get("user")?)
}

fn from_shared_data(page: &str) -> Option<InstagramUser> {
    let data = json_after(page, "window._sharedData = ")?;
    let user = data
        .get("entry_data")?
        .get("ProfilePage")?
        .get(0)?
        .get("graphql")?
        .get("user")?;
    user_from_graph(user)
}

fn from_patterns(page: &str, username: &str) -> Option<InstagramUser> {
    let capture = |re: &Regex| {
        re.captures(page)
            .and_then(|caps| caps.get(1))
            .map(|m| unescape_json_str(m.as_str()))
            .filter(|s| !s.is_empty())
    };
    let number = |re: &Regex| capture(re).and_then(|s| s.parse::<u64>().ok());

    let followers = number(&FOLLOWED_BY)?;
    Some(InstagramUser {
        username: username.to_string(),
        full_name: capture(&FULL_NAME),
        avatar_url: capture(&PROFILE_PIC),
        bio: None,
        verified: false,
        followers,
        following: number(&FOLLOW).unwrap_or(0),
        posts: number(&MEDIA).unwrap_or(0),
        followers_display: abbreviate(followers, Case::Upper),
        url: profile_url(username),
    })
}

/// Counts from `og:description`, e.g. `1,234 Followers, 56 Following, 78 Posts - ...`.
fn from_meta_tags(page: &str, username: &str) -> Option<InstagramUser> {
    let description = meta_content(page, "og:description")?;
    let caps = META_COUNTS.captures(&description)?;
    let followers = parse_abbreviated(caps.get(1)?.as_str())?;
    let following = caps.get(2).and_then(|m| parse_abbreviated(m.as_str())).unwrap_or(0);
    let posts = caps.get(3).and_then(|m| parse_abbreviated(m.as_str())).unwrap_or(0);

    let full_name = meta_content(page, "og:title").and_then(|title| {
        META_NAME
            .captures(&title)
            .and_then(|caps| caps.get(1))
            .map(|m| m.as_str().trim().to_string())
            .filter(|name| !name.is_empty())
    });

    Some(InstagramUser {
        username: username.to_string(),
        full_name,
        avatar_url: meta_content(page, "og:image"),
        bio: None,
        verified: false,
        followers,
        following,
        posts,
        followers_display: abbreviate(followers, Case::Upper),
        url: profile_url(username),
    })
}

/// Run the extraction strategies in priority order.
fn extract_user(page: &str, username: &str) -> Result<InstagramUser> {
    let patterns = |page: &str| from_patterns(page, username);
    let meta = |page: &str| from_meta_tags(page, username);
    let strategies = [
        Strategy {
            name: "embedded_json",
            extract: &from_embedded_json,
        },
        Strategy {
            name: "shared_data",
            extract: &from_shared_data,
        },
        Strategy {
            name: "patterns",
            extract: &patterns,
        },
        Strategy {
            name: "meta_tags",
            extract: &meta,
        },
    ];
    first_match(InstagramAdapter::PLATFORM, page, &strategies)
        .map(|(_, user)| user)
        .ok_or_else(|| PulseError::SchemaDrift("no profile strategy matched".to_string()))
}

// TikTok adapter.
// Scrapes the profile page through a chain of extraction strategies; videos come from oEmbed.

use std::sync::LazyLock;

use async_trait::async_trait;
use futures::future::join_all;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, warn};

use crate::cache::cache_key;
use crate::error::{PulseError, Result};
use crate::format::{Case, abbreviate};
use crate::upstream::UpstreamClient;

use super::scrape::{Strategy, first_match, leading_json, script_by_id, unescape_json_str};
use super::{Adapter, check_dotted, check_handle, degrade, parse_id_list, require};

const MAX_VIDEO_IDS: usize = 3;
const MAX_VIDEO_ID_LEN: usize = 25;
const OEMBED_URL: &str = "https://www.tiktok.com/oembed";

static UNIQUE_ID: LazyLock<Regex> = LazyLock::new(|| pattern(r#""uniqueId":"([^"]+)""#));
static NICKNAME: LazyLock<Regex> = LazyLock::new(|| pattern(r#""nickname":"((?:[^"\\]|\\.)*)""#));
static SIGNATURE: LazyLock<Regex> =
    LazyLock::new(|| pattern(r#""signature":"((?:[^"\\]|\\.)*)""#));
static AVATAR: LazyLock<Regex> = LazyLock::new(|| pattern(r#""avatarLarger":"([^"]+)""#));
static VERIFIED: LazyLock<Regex> = LazyLock::new(|| pattern(r#""verified":(true|false)"#));
static FOLLOWERS: LazyLock<Regex> = LazyLock::new(|| pattern(r#""followerCount":(\d+)"#));
static FOLLOWING: LazyLock<Regex> = LazyLock::new(|| pattern(r#""followingCount":(\d+)"#));
static HEARTS: LazyLock<Regex> = LazyLock::new(|| pattern(r#""heartCount":(\d+)"#));
static VIDEOS: LazyLock<Regex> = LazyLock::new(|| pattern(r#""videoCount":(\d+)"#));

fn pattern(re: &str) -> Regex {
    Regex::new(re).expect("static TikTok pattern must compile")
}

/// Query parameters for `/api/tiktok`.
#[derive(Debug, Default, Deserialize)]
pub struct TikTokQuery {
    pub username: Option<String>,
    #[serde(rename = "videoIds")]
    pub video_ids: Option<String>,
}

/// Validated TikTok request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TikTokParams {
    pub username: String,
    pub video_ids: Vec<String>,
}

/// Normalized TikTok profile.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TikTokUser {
    pub username: String,
    pub nickname: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub verified: bool,
    pub followers: u64,
    pub following: u64,
    pub likes: u64,
    pub videos: u64,
    pub followers_display: String,
    pub likes_display: String,
    pub url: String,
}

/// A caller-requested video, with oEmbed metadata when it was available.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TikTokVideo {
    pub id: String,
    pub url: String,
    pub title: Option<String>,
    pub thumbnail_url: Option<String>,
    pub author_name: Option<String>,
}

/// Response for the TikTok endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct TikTokResult {
    pub user: Option<TikTokUser>,
    pub videos: Vec<TikTokVideo>,
    #[serde(rename = "_notice", skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OEmbed {
    title: Option<String>,
    thumbnail_url: Option<String>,
    author_name: Option<String>,
}

/// Adapter for a TikTok profile.
pub struct TikTokAdapter {
    client: UpstreamClient,
    video_limit: usize,
}

impl TikTokAdapter {
    pub fn new(client: UpstreamClient, video_limit: usize) -> Self {
        Self {
            client,
            video_limit,
        }
    }

    async fn profile(&self, username: &str) -> Result<Option<TikTokUser>> {
        let url = profile_url(username);
        let page = match self.client.get_text(&url).await {
            Ok(page) => page,
            Err(e) if e.is_not_found() => {
                return Err(PulseError::NotFound(format!(
                    "TikTok user '{}' not found",
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

    async fn video(&self, username: &str, id: &str) -> TikTokVideo {
        let url = format!("https://www.tiktok.com/@{}/video/{}", username, id);
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
        TikTokVideo {
            id: id.to_string(),
            url,
            title,
            thumbnail_url,
            author_name,
        }
    }
}

#[async_trait]
impl Adapter for TikTokAdapter {
    type Query = TikTokQuery;
    type Params = TikTokParams;
    type Output = TikTokResult;

    const PLATFORM: &'static str = "tiktok";

    fn validate(query: TikTokQuery) -> Result<TikTokParams> {
        let username = require(query.username, "username")?;
        let username = username.trim_start_matches('@').to_string();
        check_handle(&username, "username", 24, |c| {
            c.is_ascii_alphanumeric() || c == '_' || c == '.'
        })?;
        check_dotted(&username, "username")?;

        let video_ids = parse_id_list(query.video_ids.as_deref(), MAX_VIDEO_IDS, |id| {
            id.len() <= MAX_VIDEO_ID_LEN && id.chars().all(|c| c.is_ascii_digit())
        });
        Ok(TikTokParams {
            username,
            video_ids,
        })
    }

    fn cache_key(params: &TikTokParams) -> String {
        let username = params.username.to_lowercase();
        let ids = params.video_ids.join(",");
        cache_key(Self::PLATFORM, &[username.as_str(), ids.as_str()])
    }

    async fn fetch(&self, params: &TikTokParams) -> Result<TikTokResult> {
        let username = params.username.as_str();
        let ids = params.video_ids.iter().take(self.video_limit);
        let (user, videos) = tokio::join!(
            self.profile(username),
            join_all(ids.map(|id| self.video(username, id))),
        );
        Ok(assemble(user?, videos))
    }
}

/// Combine the profile and videos, flagging a missing profile with a notice.
fn assemble(user: Option<TikTokUser>, videos: Vec<TikTokVideo>) -> TikTokResult {
    let notice = user
        .is_none()
        .then(|| "TikTok profile data is temporarily unavailable".to_string());
    TikTokResult {
        user,
        videos,
        notice,
    }
}

fn profile_url(username: &str) -> String {
    format!("https://www.tiktok.com/@{}", username)
}

fn count(stats: &Value, keys: &[&str]) -> u64 {
    keys.iter()
        .find_map(|key| {
            let value = stats.get(*key)?;
            value
                .as_u64()
                .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
        })
        .unwrap_or(0)
}

fn text(value: &Value, key: &str) -> Option<String> {
    value
        .get(key)
        .and_then(Value::as_str)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}

/// Build a profile from a `user` object and its `stats` object.
fn user_from_json(user: &Value, stats: &Value) -> Option<TikTokUser> {
    let username = text(user, "uniqueId")?;
    let followers = count(stats, &["followerCount"]);
    let likes = count(stats, &["heartCount", "heart"]);
    Some(TikTokUser {
        url: profile_url(&username),
        nickname: text(user, "nickname"),
        avatar_url: text(user, "avatarLarger").or_else(|| text(user, "avatarMedium")),
        bio: text(user, "signature"),
        verified: user.get("verified").and_then(Value::as_bool).unwrap_or(false),
        followers,
        following: count(stats, &["followingCount"]),
        likes,
        videos: count(stats, &["videoCount"]),
        followers_display: abbreviate(followers, Case::Upper),
        likes_display: abbreviate(likes, Case::Upper),
        username,
    })
}

fn from_universal_data(page: &str) -> Option<TikTokUser> {
    let data = leading_json(script_by_id(page, "__UNIVERSAL_DATA_FOR_REHYDRATION__")?)?;
    let info = data.get("__DEFAULT_SCOPE__")?.get("webapp.user-detail")?.get("userInfo")?;
    user_from_json(info.get("user")?, info.get("stats")?)
}

fn from_sigi_state(page: &str, username: &str) -> Option<TikTokUser> {
    let data = leading_json(script_by_id(page, "SIGI_STATE")?)?;
    let module = data.get("UserModule")?;
    let users = module.get("users")?.as_object()?;
    let (key, user) = users
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(username))
        .or_else(|| users.iter().next())?;
    let stats = module.get("stats")?.get(key)?;
    user_from_json(user, stats)
}

fn from_patterns(page: &str) -> Option<TikTokUser> {
    let capture = |re: &Regex| {
        re.captures(page)
            .and_then(|caps| caps.get(1))
            .map(|m| unescape_json_str(m.as_str()))
            .filter(|s| !s.is_empty())
    };
    let number = |re: &Regex| capture(re).and_then(|s| s.parse::<u64>().ok());

    let followers = number(&FOLLOWERS)?;
    let username = capture(&UNIQUE_ID)?;
    let likes = number(&HEARTS).unwrap_or(0);
    Some(TikTokUser {
        url: profile_url(&username),
        nickname: capture(&NICKNAME),
        avatar_url: capture(&AVATAR),
        bio: capture(&SIGNATURE),
        verified: capture(&VERIFIED).as_deref() == Some("true"),
        followers,
        following: number(&FOLLOWING).unwrap_or(0),
        likes,
        videos: number(&VIDEOS).unwrap_or(0),
        followers_display: abbreviate(followers, Case::Upper),
        likes_display: abbreviate(likes, Case::Upper),
        username,
    })
}

/// Run the extraction strategies in priority order.
fn extract_user(page: &str, username: &str) -> Result<TikTokUser> {
    let sigi = |page: &str| from_sigi_state(page, username);
    let strategies = [
        Strategy {
            name: "universal_data",
            extract: &from_universal_data,
        },
        Strategy {
            name: "sigi_state",
            extract: &sigi,
        },
        Strategy {
            name: "patterns",
            extract: &from_patterns,
        },
    ];
    first_match(TikTokAdapter::PLATFORM, page, &strategies)
        .map(|(_, user)| user)
        .ok_or_else(|| PulseError::SchemaDrift("no profile strategy matched".to_string()))
}

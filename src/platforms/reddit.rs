// Reddit adapter.
// Combines the public "about" profile with the user's recent posts and comments.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::cache::cache_key;
use crate::error::{PulseError, Result};
use crate::format::{
    TimeScale, collapse_whitespace, decode_html_entities, relative_time_from_epoch, truncate_chars,
};
use crate::upstream::UpstreamClient;

use super::{Adapter, check_handle, degrade, require};

const REDDIT_BASE: &str = "https://www.reddit.com";

/// Query parameters for `/api/reddit`.
#[derive(Debug, Default, Deserialize)]
pub struct RedditQuery {
    pub username: Option<String>,
}

/// `{kind, data}` envelope used by every Reddit JSON response.
#[derive(Debug, Deserialize)]
struct Thing<T> {
    kind: String,
    data: T,
}

#[derive(Debug, Deserialize)]
struct About {
    name: String,
    #[serde(default)]
    icon_img: Option<String>,
    #[serde(default)]
    snoovatar_img: Option<String>,
    #[serde(default)]
    total_karma: Option<i64>,
    #[serde(default)]
    link_karma: i64,
    #[serde(default)]
    comment_karma: i64,
    #[serde(default)]
    created_utc: Option<f64>,
    #[serde(default)]
    subreddit: Option<ProfileSubreddit>,
}

#[derive(Debug, Deserialize)]
struct ProfileSubreddit {
    #[serde(default)]
    public_description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Listing {
    #[serde(default)]
    children: Vec<Thing<serde_json::Value>>,
}

#[derive(Debug, Deserialize)]
struct RawPost {
    id: String,
    title: String,
    subreddit_name_prefixed: String,
    #[serde(default)]
    score: i64,
    #[serde(default)]
    num_comments: u64,
    permalink: String,
    created_utc: f64,
    #[serde(default)]
    over_18: bool,
}

#[derive(Debug, Deserialize)]
struct RawComment {
    id: String,
    #[serde(default)]
    body: String,
    #[serde(default)]
    link_title: Option<String>,
    subreddit_name_prefixed: String,
    #[serde(default)]
    score: i64,
    permalink: String,
    created_utc: f64,
}

/// Normalized Reddit profile.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedditUser {
    pub name: String,
    pub avatar_url: Option<String>,
    pub description: Option<String>,
    pub total_karma: i64,
    pub link_karma: i64,
    pub comment_karma: i64,
    pub account_age: Option<String>,
    pub url: String,
}

/// A submitted post.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedditPost {
    pub id: String,
    pub title: String,
    pub subreddit: String,
    pub score: i64,
    pub comments: u64,
    pub nsfw: bool,
    pub url: String,
    pub time_ago: String,
}

/// A comment, body cleaned up for a one-line preview.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RedditComment {
    pub id: String,
    pub body: String,
    pub post_title: Option<String>,
    pub subreddit: String,
    pub score: i64,
    pub url: String,
    pub time_ago: String,
}

/// One activity item, tagged by the listing's kind discriminator.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum RedditActivity {
    Post(RedditPost),
    Comment(RedditComment),
}

/// Response for the Reddit endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct RedditResult {
    pub user: Option<RedditUser>,
    pub activities: Vec<RedditActivity>,
    #[serde(rename = "_notice", skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

/// Adapter for a Reddit user's profile and activity.
pub struct RedditAdapter {
    client: UpstreamClient,
    item_limit: usize,
    comment_chars: usize,
}

impl RedditAdapter {
    pub fn new(client: UpstreamClient, item_limit: usize, comment_chars: usize) -> Self {
        Self {
            client,
            item_limit,
            comment_chars,
        }
    }
}

#[async_trait]
impl Adapter for RedditAdapter {
    type Query = RedditQuery;
    type Params = String;
    type Output = RedditResult;

    const PLATFORM: &'static str = "reddit";

    fn validate(query: RedditQuery) -> Result<String> {
        let raw = require(query.username, "username")?;
        let username = raw
            .strip_prefix("/u/")
            .or_else(|| raw.strip_prefix("u/"))
            .unwrap_or(&raw)
            .to_string();
        check_handle(&username, "username", 20, |c| {
            c.is_ascii_alphanumeric() || c == '_' || c == '-'
        })?;
        Ok(username)
    }

    fn cache_key(username: &String) -> String {
        cache_key(Self::PLATFORM, &[username.to_lowercase().as_str()])
    }

    async fn fetch(&self, username: &String) -> Result<RedditResult> {
        let about_url = format!("{}/user/{}/about.json", REDDIT_BASE, username);
        let listing_url = format!(
            "{}/user/{}.json?limit={}",
            REDDIT_BASE, username, self.item_limit
        );

        let (about, listing) = tokio::join!(
            self.client.get_json::<Thing<About>>(&about_url),
            self.client.get_json::<Thing<Listing>>(&listing_url),
        );

        let now = Utc::now();
        let user = match about {
            Ok(about) => Some(normalize_user(about.data, now)),
            Err(e) if e.is_not_found() => {
                return Err(PulseError::NotFound(format!(
                    "Reddit user '{}' not found",
                    username
                )));
            }
            Err(e) => {
                warn!(platform = Self::PLATFORM, username = %username, error = %e, "Profile fetch failed");
                None
            }
        };
        let activities = degrade(Self::PLATFORM, "activity", listing)
            .map(|listing| {
                normalize_listing(listing.data, self.item_limit, self.comment_chars, now)
            })
            .unwrap_or_default();

        let notice = user
            .is_none()
            .then(|| "Reddit profile is temporarily unavailable".to_string());
        Ok(RedditResult {
            user,
            activities,
            notice,
        })
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

fn normalize_user(about: About, now: DateTime<Utc>) -> RedditUser {
    let avatar = non_empty(about.snoovatar_img)
        .or(non_empty(about.icon_img))
        .map(|url| decode_html_entities(&url));

    RedditUser {
        total_karma: about
            .total_karma
            .unwrap_or(about.link_karma + about.comment_karma),
        link_karma: about.link_karma,
        comment_karma: about.comment_karma,
        account_age: about
            .created_utc
            .map(|created| relative_time_from_epoch(created, now, TimeScale::REDDIT)),
        description: about
            .subreddit
            .and_then(|s| non_empty(s.public_description)),
        url: format!("{}/user/{}", REDDIT_BASE, about.name),
        avatar_url: avatar,
        name: about.name,
    }
}

/// Clean a comment body into a single bounded line.
fn comment_preview(body: &str, max_chars: usize) -> String {
    truncate_chars(&collapse_whitespace(&decode_html_entities(body)), max_chars)
}

fn normalize_listing(
    listing: Listing,
    limit: usize,
    comment_chars: usize,
    now: DateTime<Utc>,
) -> Vec<RedditActivity> {
    listing
        .children
        .into_iter()
        .filter_map(|child| match child.kind.as_str() {
            "t3" => serde_json::from_value::<RawPost>(child.data)
                .ok()
                .map(|post| {
                    RedditActivity::Post(RedditPost {
                        id: post.id,
                        title: decode_html_entities(&post.title),
                        subreddit: post.subreddit_name_prefixed,
                        score: post.score,
                        comments: post.num_comments,
                        nsfw: post.over_18,
                        url: format!("{}{}", REDDIT_BASE, post.permalink),
                        time_ago: relative_time_from_epoch(
                            post.created_utc,
                            now,
                            TimeScale::REDDIT,
                        ),
                    })
                }),
            "t1" => serde_json::from_value::<RawComment>(child.data)
                .ok()
                .map(|comment| {
                    RedditActivity::Comment(RedditComment {
                        id: comment.id,
                        body: comment_preview(&comment.body, comment_chars),
                        post_title: comment.link_title.map(|t| decode_html_entities(&t)),
                        subreddit: comment.subreddit_name_prefixed,
                        score: comment.score,
                        url: format!("{}{}", REDDIT_BASE, comment.permalink),
                        time_ago: relative_time_from_epoch(
                            comment.created_utc,
                            now,
                            TimeScale::REDDIT,
                        ),
                    })
                }),
            _ => None,
        })
        .take(limit)
        .collect()
}

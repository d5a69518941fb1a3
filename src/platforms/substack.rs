// Substack adapter.
// Pattern-matches the publication RSS feed and adds best-effort post engagement stats.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::cache::cache_key;
use crate::error::{PulseError, Result};
use crate::format::{TimeScale, relative_time, strip_tags, truncate_chars};
use crate::upstream::UpstreamClient;

use super::scrape::{xml_attr, xml_blocks, xml_text};
use super::{Adapter, check_handle, require};

const EXCERPT_CHARS: usize = 200;

/// Query parameters for `/api/substack`.
#[derive(Debug, Default, Deserialize)]
pub struct SubstackQuery {
    pub publication: Option<String>,
}

/// Publication host, e.g. `example.substack.com` or a custom domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublicationHost(String);

impl PublicationHost {
    fn feed_url(&self) -> String {
        format!("https://{}/feed", self.0)
    }

    fn post_api_url(&self, slug: &str) -> String {
        format!("https://{}/api/v1/posts/{}", self.0, slug)
    }
}

/// Normalized publication metadata.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Publication {
    pub name: String,
    pub description: Option<String>,
    pub url: String,
    pub logo_url: Option<String>,
}

/// Normalized post with engagement counts (zero when unavailable).
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubstackPost {
    pub title: String,
    pub url: String,
    pub slug: Option<String>,
    pub excerpt: Option<String>,
    pub author: Option<String>,
    pub image_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub time_ago: Option<String>,
    pub likes: u64,
    pub comments: u64,
    pub restacks: u64,
}

/// Response for the Substack endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct SubstackResult {
    pub publication: Option<Publication>,
    pub posts: Vec<SubstackPost>,
    #[serde(rename = "_notice", skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

/// Engagement fields from the undocumented post endpoint.
#[derive(Debug, Default, Deserialize)]
struct PostStats {
    #[serde(default)]
    reaction_count: u64,
    #[serde(default)]
    comment_count: u64,
    #[serde(default)]
    restacks: u64,
}

/// Adapter for a Substack publication feed.
pub struct SubstackAdapter {
    client: UpstreamClient,
    post_limit: usize,
    stats_limit: usize,
}

impl SubstackAdapter {
    pub fn new(client: UpstreamClient, post_limit: usize, stats_limit: usize) -> Self {
        Self {
            client,
            post_limit,
            stats_limit,
        }
    }

    async fn post_stats(&self, host: &PublicationHost, slug: &str) -> Option<PostStats> {
        match self.client.get_json_lenient(&host.post_api_url(slug)).await {
            Ok(stats) => stats,
            Err(e) => {
                debug!(platform = Self::PLATFORM, slug, error = %e, "Post stats unavailable");
                None
            }
        }
    }
}

#[async_trait]
impl Adapter for SubstackAdapter {
    type Query = SubstackQuery;
    type Params = PublicationHost;
    type Output = SubstackResult;

    const PLATFORM: &'static str = "substack";

    fn validate(query: SubstackQuery) -> Result<PublicationHost> {
        let publication = require(query.publication, "publication")?.to_lowercase();
        let publication = publication
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/')
            .to_string();
        check_handle(&publication, "publication", 253, |c| {
            c.is_ascii_alphanumeric() || c == '-' || c == '.'
        })?;
        if publication.starts_with('.') || publication.ends_with('.') || publication.contains("..")
        {
            return Err(PulseError::InvalidInput(format!(
                "Invalid publication: {}",
                publication
            )));
        }

        if publication.contains('.') {
            Ok(PublicationHost(publication))
        } else {
            Ok(PublicationHost(format!("{}.substack.com", publication)))
        }
    }

    fn cache_key(host: &PublicationHost) -> String {
        cache_key(Self::PLATFORM, &[host.0.as_str()])
    }

    async fn fetch(&self, host: &PublicationHost) -> Result<SubstackResult> {
        let feed = match self.client.get_text(&host.feed_url()).await {
            Ok(feed) => feed,
            Err(e) if e.is_not_found() => {
                return Err(PulseError::NotFound(format!(
                    "Substack publication '{}' not found",
                    host.0
                )));
            }
            Err(e) => {
                warn!(platform = Self::PLATFORM, host = %host.0, error = %e, "Feed fetch failed");
                return Ok(SubstackResult {
                    publication: None,
                    posts: Vec::new(),
                    notice: Some("Substack feed is temporarily unavailable".to_string()),
                });
            }
        };

        let mut result = parse_feed(&feed, self.post_limit, Utc::now());

        let slugs: Vec<Option<String>> = result
            .posts
            .iter()
            .take(self.stats_limit)
            .map(|post| post.slug.clone())
            .collect();
        let stats = join_all(slugs.iter().map(|slug| async move {
            match slug {
                Some(slug) => self.post_stats(host, slug).await,
                None => None,
            }
        }))
        .await;

        for (post, stats) in result.posts.iter_mut().zip(stats) {
            if let Some(stats) = stats {
                post.likes = stats.reaction_count;
                post.comments = stats.comment_count;
                post.restacks = stats.restacks;
            }
        }
        Ok(result)
    }
}

/// Slug of a post URL (`https://x.substack.com/p/{slug}`).
fn slug_from_url(url: &str) -> Option<String> {
    let (_, rest) = url.split_once("/p/")?;
    let slug = rest.split(['?', '#', '/']).next()?;
    (!slug.is_empty()).then(|| slug.to_string())
}

fn parse_item(item: &str, now: DateTime<Utc>) -> Option<SubstackPost> {
    let title = xml_text(item, "title")?;
    let url = xml_text(item, "link")?;
    let published_at = xml_text(item, "pubDate")
        .and_then(|date| DateTime::parse_from_rfc2822(&date).ok())
        .map(|date| date.with_timezone(&Utc));

    Some(SubstackPost {
        slug: slug_from_url(&url),
        excerpt: xml_text(item, "description")
            .map(|d| truncate_chars(&strip_tags(&d), EXCERPT_CHARS))
            .filter(|d| !d.is_empty()),
        author: xml_text(item, "dc:creator"),
        image_url: xml_attr(item, "enclosure", "url"),
        time_ago: published_at.map(|date| relative_time(date, now, TimeScale::SUBSTACK)),
        published_at,
        title,
        url,
        likes: 0,
        comments: 0,
        restacks: 0,
    })
}

/// Parse channel metadata and up to `limit` posts from RSS text.
fn parse_feed(feed: &str, limit: usize, now: DateTime<Utc>) -> SubstackResult {
    let channel = feed.split("<item").next().unwrap_or(feed);
    let publication = xml_text(channel, "title").map(|name| {
        let image = xml_blocks(channel, "image").into_iter().next();
        Publication {
            name,
            description: xml_text(channel, "description"),
            url: xml_text(channel, "link").unwrap_or_default(),
            logo_url: image.and_then(|image| xml_text(image, "url")),
        }
    });

    let posts: Vec<SubstackPost> = xml_blocks(feed, "item")
        .into_iter()
        .filter_map(|item| parse_item(item, now))
        .take(limit)
        .collect();

    let notice = publication
        .is_none()
        .then(|| "Substack feed did not contain publication metadata".to_string());
    SubstackResult {
        publication,
        posts,
        notice,
    }
}

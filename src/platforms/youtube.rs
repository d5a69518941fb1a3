// YouTube adapter.
// Parses the channel's Atom feed, then enriches it from API mirrors when one answers.

use std::sync::LazyLock;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::future::join_all;
use regex::Regex;
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use tracing::{debug, warn};

use crate::cache::cache_key;
use crate::error::{PulseError, Result};
use crate::format::{Case, TimeScale, abbreviate, format_duration, relative_time, truncate_chars};
use crate::upstream::UpstreamClient;

use super::scrape::{xml_attr, xml_blocks, xml_text};
use super::{Adapter, require};

const FEED_BASE: &str = "https://www.youtube.com/feeds/videos.xml";
const DESCRIPTION_CHARS: usize = 150;

static CHANNEL_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^UC[A-Za-z0-9_-]{22}$").expect("channel id regex must compile"));

/// Query parameters for `/api/youtube`.
#[derive(Debug, Default, Deserialize)]
pub struct YouTubeQuery {
    #[serde(rename = "channelId")]
    pub channel_id: Option<String>,
}

/// Normalized channel.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Channel {
    pub id: String,
    pub name: String,
    pub url: String,
    pub avatar_url: Option<String>,
    pub subscribers: Option<u64>,
    pub subscribers_display: Option<String>,
}

/// Normalized video.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Video {
    pub id: String,
    pub title: String,
    pub description: Option<String>,
    pub thumbnail_url: String,
    pub url: String,
    pub published_at: Option<DateTime<Utc>>,
    pub time_ago: Option<String>,
    pub views: Option<u64>,
    pub views_display: Option<String>,
    pub likes: Option<u64>,
    pub duration: Option<String>,
}

/// Response for the YouTube endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct YouTubeResult {
    pub channel: Option<Channel>,
    pub videos: Vec<Video>,
    #[serde(rename = "_notice", skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MirrorChannel {
    author: Option<String>,
    #[serde(default)]
    author_thumbnails: Vec<MirrorThumbnail>,
    sub_count: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct MirrorThumbnail {
    url: String,
    #[serde(default)]
    width: u32,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct MirrorVideo {
    view_count: Option<u64>,
    like_count: Option<u64>,
    length_seconds: Option<u64>,
}

/// Adapter for a YouTube channel.
pub struct YouTubeAdapter {
    client: UpstreamClient,
    mirrors: Vec<String>,
    video_limit: usize,
    enrich_limit: usize,
}

impl YouTubeAdapter {
    pub fn new(
        client: UpstreamClient,
        mirrors: Vec<String>,
        video_limit: usize,
        enrich_limit: usize,
    ) -> Self {
        Self {
            client,
            mirrors: mirrors
                .into_iter()
                .map(|m| m.trim_end_matches('/').to_string())
                .collect(),
            video_limit,
            enrich_limit,
        }
    }

    /// Query mirrors starting at `start`, returning the first answer and the mirror index.
    async fn from_mirrors<T: DeserializeOwned>(
        &self,
        start: usize,
        path: &str,
    ) -> Option<(usize, T)> {
        let count = self.mirrors.len();
        for offset in 0..count {
            let index = (start + offset) % count;
            let url = format!("{}{}", self.mirrors[index], path);
            match self.client.get_json_lenient::<T>(&url).await {
                Ok(Some(value)) => return Some((index, value)),
                Ok(None) => debug!(url = %url, "Mirror returned a non-JSON body"),
                Err(e) => debug!(url = %url, error = %e, "Mirror request failed"),
            }
        }
        None
    }

    async fn enrich(&self, result: &mut YouTubeResult, channel_id: &str) {
        if self.mirrors.is_empty() {
            return;
        }

        let channel_path = format!(
            "/api/v1/channels/{}?fields=author,authorThumbnails,subCount",
            channel_id
        );
        let start = match self.from_mirrors::<MirrorChannel>(0, &channel_path).await {
            Some((index, info)) => {
                if let Some(channel) = result.channel.as_mut() {
                    apply_channel(channel, info);
                }
                index
            }
            None => {
                warn!(
                    platform = Self::PLATFORM,
                    channel_id,
                    "No mirror answered; serving feed data only"
                );
                return;
            }
        };

        let ids: Vec<String> = result
            .videos
            .iter()
            .take(self.enrich_limit)
            .map(|video| video.id.clone())
            .collect();
        let details = join_all(ids.iter().map(|id| {
            let path = format!(
                "/api/v1/videos/{}?fields=viewCount,likeCount,lengthSeconds",
                id
            );
            async move { self.from_mirrors::<MirrorVideo>(start, &path).await }
        }))
        .await;

        for (video, detail) in result.videos.iter_mut().zip(details) {
            if let Some((_, detail)) = detail {
                apply_video(video, detail);
            }
        }
    }
}

#[async_trait]
impl Adapter for YouTubeAdapter {
    type Query = YouTubeQuery;
    type Params = String;
    type Output = YouTubeResult;

    const PLATFORM: &'static str = "youtube";

    fn validate(query: YouTubeQuery) -> Result<String> {
        let channel_id = require(query.channel_id, "channelId")?;
        if !CHANNEL_ID.is_match(&channel_id) {
            return Err(PulseError::InvalidInput(format!(
                "Invalid channelId: expected 'UC' followed by 22 characters, got '{}'",
                channel_id
            )));
        }
        Ok(channel_id)
    }

    fn cache_key(channel_id: &String) -> String {
        cache_key(Self::PLATFORM, &[channel_id.as_str()])
    }

    async fn fetch(&self, channel_id: &String) -> Result<YouTubeResult> {
        let url = format!("{}?channel_id={}", FEED_BASE, channel_id);
        let feed = match self.client.get_text(&url).await {
            Ok(feed) => feed,
            Err(e) if e.is_not_found() => {
                return Err(PulseError::NotFound(format!(
                    "YouTube channel '{}' not found",
                    channel_id
                )));
            }
            Err(e) => {
                warn!(platform = Self::PLATFORM, channel_id = %channel_id, error = %e, "Feed fetch failed");
                return Ok(YouTubeResult {
                    channel: None,
                    videos: Vec::new(),
                    notice: Some("YouTube feed is temporarily unavailable".to_string()),
                });
            }
        };

        let mut result = parse_feed(&feed, channel_id, self.video_limit, Utc::now());
        self.enrich(&mut result, channel_id).await;
        Ok(result)
    }
}

fn apply_channel(channel: &mut Channel, info: MirrorChannel) {
    if let Some(author) = info.author.filter(|a| !a.is_empty()) {
        channel.name = author;
    }
    channel.avatar_url = info
        .author_thumbnails
        .into_iter()
        .max_by_key(|thumb| thumb.width)
        .map(|thumb| absolute_url(&thumb.url));
    if let Some(subs) = info.sub_count {
        channel.subscribers = Some(subs);
        channel.subscribers_display = Some(abbreviate(subs, Case::Upper));
    }
}

fn apply_video(video: &mut Video, detail: MirrorVideo) {
    if let Some(views) = detail.view_count {
        video.views = Some(views);
        video.views_display = Some(abbreviate(views, Case::Upper));
    }
    if detail.like_count.is_some() {
        video.likes = detail.like_count;
    }
    video.duration = detail
        .length_seconds
        .filter(|secs| *secs > 0)
        .map(format_duration);
}

fn absolute_url(url: &str) -> String {
    if url.starts_with("//") {
        format!("https:{}", url)
    } else {
        url.to_string()
    }
}

fn parse_entry(entry: &str, now: DateTime<Utc>) -> Option<Video> {
    let id = xml_text(entry, "yt:videoId")?;
    let title = xml_text(entry, "title").or_else(|| xml_text(entry, "media:title"))?;
    let published_at = xml_text(entry, "published")
        .and_then(|date| DateTime::parse_from_rfc3339(&date).ok())
        .map(|date| date.with_timezone(&Utc));
    let views = xml_attr(entry, "media:statistics", "views").and_then(|v| v.parse().ok());
    let likes = xml_attr(entry, "media:starRating", "count").and_then(|v| v.parse().ok());

    Some(Video {
        description: xml_text(entry, "media:description")
            .map(|d| truncate_chars(&d, DESCRIPTION_CHARS)),
        thumbnail_url: xml_attr(entry, "media:thumbnail", "url")
            .unwrap_or_else(|| format!("https://i.ytimg.com/vi/{}/hqdefault.jpg", id)),
        url: format!("https://www.youtube.com/watch?v={}", id),
        time_ago: published_at.map(|date| relative_time(date, now, TimeScale::YOUTUBE)),
        published_at,
        views_display: views.map(|v| abbreviate(v, Case::Upper)),
        views,
        likes,
        duration: None,
        id,
        title,
    })
}

/// Parse channel metadata and up to `limit` videos from the Atom feed.
fn parse_feed(feed: &str, channel_id: &str, limit: usize, now: DateTime<Utc>) -> YouTubeResult {
    let head = feed.split("<entry").next().unwrap_or(feed);
    let channel = xml_text(head, "title")
        .or_else(|| xml_blocks(head, "author").first().and_then(|a| xml_text(a, "name")))
        .map(|name| Channel {
            id: xml_text(head, "yt:channelId").unwrap_or_else(|| channel_id.to_string()),
            name,
            url: format!("https://www.youtube.com/channel/{}", channel_id),
            avatar_url: None,
            subscribers: None,
            subscribers_display: None,
        });

    let videos: Vec<Video> = xml_blocks(feed, "entry")
        .into_iter()
        .filter_map(|entry| parse_entry(entry, now))
        .take(limit)
        .collect();

    let notice = channel
        .is_none()
        .then(|| "YouTube feed did not contain channel metadata".to_string());
    YouTubeResult {
        channel,
        videos,
        notice,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CHANNEL: &str = "UCabcdefghijklmnopqrstuv";

    fn feed() -> String {
        format!(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<feed xmlns:yt="http://www.youtube.com/xml/schemas/2015" xmlns:media="http://search.yahoo.com/mrss/">
 <link rel="self" href="http://www.youtube.com/feeds/videos.xml?channel_id={c}"/>
 <id>yt:channel:{c}</id>
 <yt:channelId>{c}</yt:channelId>
 <title>Lathe &amp; Lore</title>
 <author><name>Lathe &amp; Lore</name></author>
 <entry>
  <id>yt:video:vid00000001</id>
  <yt:videoId>vid00000001</yt:videoId>
  <title>Turning a bowl</title>
  <published>2024-04-30T06:00:00+00:00</published>
  <media:group>
   <media:thumbnail url="https://i1.ytimg.com/vi/vid00000001/hqdefault.jpg" width="480" height="360"/>
   <media:description>{desc}</media:description>
   <media:community>
    <media:starRating count="321" average="5.00" min="1" max="5"/>
    <media:statistics views="15400"/>
   </media:community>
  </media:group>
 </entry>
 <entry>
  <yt:videoId>vid00000002</yt:videoId>
  <title>Sharpening</title>
  <published>2024-04-20T06:00:00+00:00</published>
 </entry>
</feed>"#,
            c = CHANNEL,
            desc = "d".repeat(200),
        )
    }

    fn now() -> DateTime<Utc> {
        "2024-05-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_validate_channel_id() {
        let validate = |id: &str| {
            YouTubeAdapter::validate(YouTubeQuery {
                channel_id: Some(id.into()),
            })
        };
        assert!(validate(CHANNEL).is_ok());
        assert!(matches!(validate("UCshort"), Err(PulseError::InvalidInput(_))));
        assert!(matches!(
            validate("XXabcdefghijklmnopqrstuv"),
            Err(PulseError::InvalidInput(_))
        ));
        assert!(matches!(
            validate("UCabcdefghijklmnopqrstuvw"),
            Err(PulseError::InvalidInput(_))
        ));
        assert!(YouTubeAdapter::validate(YouTubeQuery::default()).is_err());
    }

    #[test]
    fn test_parse_feed() {
        let result = parse_feed(&feed(), CHANNEL, 10, now());

        let channel = result.channel.unwrap();
        assert_eq!(channel.name, "Lathe & Lore");
        assert_eq!(channel.id, CHANNEL);
        assert!(result.notice.is_none());

        assert_eq!(result.videos.len(), 2);
        let first = &result.videos[0];
        assert_eq!(first.id, "vid00000001");
        assert_eq!(first.views, Some(15_400));
        assert_eq!(first.views_display.as_deref(), Some("15.4K"));
        assert_eq!(first.likes, Some(321));
        assert_eq!(first.time_ago.as_deref(), Some("1d"));
        assert_eq!(first.description.as_ref().unwrap().chars().count(), 153);
        assert_eq!(first.url, "https://www.youtube.com/watch?v=vid00000001");

        let second = &result.videos[1];
        assert_eq!(second.time_ago.as_deref(), Some("1w"));
        assert_eq!(
            second.thumbnail_url,
            "https://i.ytimg.com/vi/vid00000002/hqdefault.jpg"
        );
        assert!(second.views.is_none());
    }

    #[test]
    fn test_parse_feed_limit() {
        assert_eq!(parse_feed(&feed(), CHANNEL, 1, now()).videos.len(), 1);
    }

    #[test]
    fn test_parse_garbage_feed() {
        let result = parse_feed("<html>oops</html>", CHANNEL, 10, now());
        assert!(result.channel.is_none());
        assert!(result.videos.is_empty());
        assert!(result.notice.is_some());
    }

    #[test]
    fn test_apply_mirror_data() {
        let mut result = parse_feed(&feed(), CHANNEL, 10, now());
        let info: MirrorChannel = serde_json::from_str(
            r#"{"author": "Lathe and Lore", "subCount": 1500000, "authorThumbnails": [
                {"url": "//yt3.ggpht.com/small", "width": 48},
                {"url": "//yt3.ggpht.com/large", "width": 512}]}"#,
        )
        .unwrap();
        let channel = result.channel.as_mut().unwrap();
        apply_channel(channel, info);
        assert_eq!(channel.name, "Lathe and Lore");
        assert_eq!(channel.avatar_url.as_deref(), Some("https://yt3.ggpht.com/large"));
        assert_eq!(channel.subscribers_display.as_deref(), Some("1.5M"));

        let detail: MirrorVideo = serde_json::from_str(
            r#"{"viewCount": 999, "likeCount": 40, "lengthSeconds": 754}"#,
        )
        .unwrap();
        let video = &mut result.videos[0];
        apply_video(video, detail);
        assert_eq!(video.views_display.as_deref(), Some("999"));
        assert_eq!(video.likes, Some(40));
        assert_eq!(video.duration.as_deref(), Some("12:34"));
    }

    #[tokio::test]
    async fn test_enrich_without_mirrors_keeps_feed_data() {
        let client = UpstreamClient::new(&crate::config::UpstreamConfig::default()).unwrap();
        let adapter = YouTubeAdapter::new(client, Vec::new(), 10, 3);
        let mut result = parse_feed(&feed(), CHANNEL, 10, now());

        adapter.enrich(&mut result, CHANNEL).await;
        assert!(result.channel.unwrap().subscribers.is_none());
        assert_eq!(result.videos[0].views, Some(15_400));
    }
}

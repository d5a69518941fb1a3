// Discord adapter.
// Reshapes a server widget into presence stats, voice channel tallies and a member list.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::cache::cache_key;
use crate::error::{PulseError, Result};
use crate::upstream::UpstreamClient;

use super::{Adapter, lenient_list, require};

const CDN: &str = "https://cdn.discordapp.com";

/// Query parameters for `/api/discord`.
#[derive(Debug, Default, Deserialize)]
pub struct DiscordQuery {
    #[serde(rename = "serverId")]
    pub server_id: Option<String>,
}

/// `widget.json` as returned by Discord.
#[derive(Debug, Clone, Deserialize)]
pub struct Widget {
    pub id: String,
    pub name: String,
    pub instant_invite: Option<String>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub channels: Vec<WidgetChannel>,
    #[serde(default, deserialize_with = "lenient_list")]
    pub members: Vec<WidgetMember>,
    #[serde(default)]
    pub presence_count: u64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WidgetChannel {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub position: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WidgetMember {
    pub id: String,
    pub username: String,
    #[serde(default)]
    pub discriminator: String,
    pub avatar: Option<String>,
    pub avatar_url: Option<String>,
    #[serde(default)]
    pub status: String,
    pub channel_id: Option<String>,
    pub activity: Option<WidgetActivity>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct WidgetActivity {
    pub name: String,
}

/// Server identity.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Server {
    pub id: String,
    pub name: String,
    pub invite_url: Option<String>,
}

/// Aggregate presence counts.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServerStats {
    pub online: u64,
    pub in_voice: u64,
    pub voice_channels: u64,
}

/// A voice channel with the number of members connected to it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VoiceChannel {
    pub id: String,
    pub name: String,
    pub position: i64,
    pub member_count: u64,
}

/// A listed member.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Member {
    pub id: String,
    pub username: String,
    pub status: String,
    pub avatar_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channel_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub activity: Option<String>,
}

/// Response for the Discord endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiscordResult {
    pub server: Option<Server>,
    pub stats: ServerStats,
    pub voice_channels: Vec<VoiceChannel>,
    pub members: Vec<Member>,
    #[serde(rename = "_notice", skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

/// Adapter for a Discord server widget.
pub struct DiscordAdapter {
    client: UpstreamClient,
    member_limit: usize,
}

impl DiscordAdapter {
    pub fn new(client: UpstreamClient, member_limit: usize) -> Self {
        Self {
            client,
            member_limit,
        }
    }
}

#[async_trait]
impl Adapter for DiscordAdapter {
    type Query = DiscordQuery;
    type Params = String;
    type Output = DiscordResult;

    const PLATFORM: &'static str = "discord";

    fn validate(query: DiscordQuery) -> Result<String> {
        let server_id = require(query.server_id, "serverId")?;
        let is_snowflake = (17..=20).contains(&server_id.len())
            && server_id.chars().all(|c| c.is_ascii_digit());
        if !is_snowflake {
            return Err(PulseError::InvalidInput(format!(
                "Invalid serverId: expected 17-20 digits, got '{}'",
                server_id
            )));
        }
        Ok(server_id)
    }

    fn cache_key(server_id: &String) -> String {
        cache_key(Self::PLATFORM, &[server_id.as_str()])
    }

    async fn fetch(&self, server_id: &String) -> Result<DiscordResult> {
        let url = format!("https://discord.com/api/guilds/{}/widget.json", server_id);
        match self.client.get_json::<Widget>(&url).await {
            Ok(widget) => Ok(reshape(widget, self.member_limit)),
            Err(e) if widget_disabled(&e) => {
                info!(platform = Self::PLATFORM, server_id = %server_id, "Server widget is disabled");
                Err(PulseError::WidgetDisabled)
            }
            Err(e) => {
                warn!(platform = Self::PLATFORM, server_id = %server_id, error = %e, "Widget fetch failed");
                Ok(DiscordResult {
                    server: None,
                    stats: ServerStats {
                        online: 0,
                        in_voice: 0,
                        voice_channels: 0,
                    },
                    voice_channels: Vec::new(),
                    members: Vec::new(),
                    notice: Some("Discord widget is temporarily unavailable".to_string()),
                })
            }
        }
    }
}

/// 403 and 404 both mean the server exists without a public widget, or is unknown.
fn widget_disabled(error: &PulseError) -> bool {
    match error {
        PulseError::NotFound(_) => true,
        PulseError::Status { status, .. } => *status == 403,
        _ => false,
    }
}

/// Lower sorts first.
fn status_rank(status: &str) -> u8 {
    match status {
        "online" => 0,
        "idle" => 1,
        "dnd" => 2,
        _ => 3,
    }
}

/// Default avatar index for a user without a custom avatar.
///
/// Legacy accounts use `discriminator % 5`; migrated usernames (discriminator `0`)
/// use `(id >> 22) % 6`.
fn default_avatar_index(id: &str, discriminator: &str) -> u64 {
    match discriminator.parse::<u64>() {
        Ok(0) | Err(_) => id.parse::<u64>().map(|id| (id >> 22) % 6).unwrap_or(0),
        Ok(discriminator) => discriminator % 5,
    }
}

fn avatar_url(member: &WidgetMember) -> String {
    if let Some(url) = member.avatar_url.as_ref().filter(|u| !u.is_empty()) {
        return url.clone();
    }
    match member.avatar.as_deref().filter(|a| !a.is_empty()) {
        Some(hash) => format!("{}/avatars/{}/{}.png", CDN, member.id, hash),
        None => format!(
            "{}/embed/avatars/{}.png",
            CDN,
            default_avatar_index(&member.id, &member.discriminator)
        ),
    }
}

fn reshape(widget: Widget, member_limit: usize) -> DiscordResult {
    let mut tally: HashMap<&str, u64> = HashMap::new();
    for channel_id in widget.members.iter().filter_map(|m| m.channel_id.as_deref()) {
        *tally.entry(channel_id).or_default() += 1;
    }

    let mut voice_channels: Vec<VoiceChannel> = widget
        .channels
        .iter()
        .map(|channel| VoiceChannel {
            id: channel.id.clone(),
            name: channel.name.clone(),
            position: channel.position,
            member_count: tally.get(channel.id.as_str()).copied().unwrap_or(0),
        })
        .collect();
    voice_channels.sort_by_key(|channel| channel.position);

    let in_voice = voice_channels.iter().map(|c| c.member_count).sum();

    let mut members: Vec<&WidgetMember> = widget.members.iter().collect();
    members.sort_by_key(|member| status_rank(&member.status));
    let members = members
        .into_iter()
        .take(member_limit)
        .map(|member| Member {
            id: member.id.clone(),
            username: member.username.clone(),
            status: member.status.clone(),
            avatar_url: avatar_url(member),
            channel_id: member.channel_id.clone(),
            activity: member.activity.as_ref().map(|a| a.name.clone()),
        })
        .collect();

    DiscordResult {
        stats: ServerStats {
            online: widget.presence_count,
            in_voice,
            voice_channels: voice_channels.len() as u64,
        },
        server: Some(Server {
            id: widget.id,
            name: widget.name,
            invite_url: widget.instant_invite,
        }),
        voice_channels,
        members,
        notice: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WIDGET: &str = r#"{
        "id": "123456789012345678", "name": "Rustaceans",
        "instant_invite": "https://discord.com/invite/abc",
        "channels": [
            {"id": "c2", "name": "Pairing", "position": 2},
            {"id": "c1", "name": "Lounge", "position": 1}
        ],
        "members": [
            {"id": "0", "username": "busy", "discriminator": "0000", "avatar": null,
             "status": "dnd", "avatar_url": ""},
            {"id": "1", "username": "away", "discriminator": "0000", "avatar": null,
             "status": "idle", "avatar_url": "https://cdn.discordapp.com/widget-avatars/x/y", "channel_id": "c1"},
            {"id": "2", "username": "here", "discriminator": "0000", "avatar": null,
             "status": "online", "avatar_url": "https://cdn.discordapp.com/widget-avatars/a/b", "channel_id": "c1"},
            {"id": "3", "username": "also-here", "discriminator": "0000", "avatar": null,
             "status": "online", "channel_id": "c2", "activity": {"name": "Factorio"}}
        ],
        "presence_count": 4
    }"#;

    fn widget() -> Widget {
        serde_json::from_str(WIDGET).unwrap()
    }

    #[test]
    fn test_validate_server_id() {
        let validate = |id: &str| {
            DiscordAdapter::validate(DiscordQuery {
                server_id: Some(id.into()),
            })
        };
        assert!(validate("123456789012345678").is_ok());
        assert!(validate("12345678901234567").is_ok());
        assert!(matches!(validate("1234"), Err(PulseError::InvalidInput(_))));
        assert!(matches!(
            validate("12345678901234567x"),
            Err(PulseError::InvalidInput(_))
        ));
        assert!(validate("123456789012345678901").is_err());
        assert!(DiscordAdapter::validate(DiscordQuery::default()).is_err());
    }

    #[test]
    fn test_reshape_stats_and_channels() {
        let result = reshape(widget(), 20);
        assert_eq!(result.server.as_ref().unwrap().name, "Rustaceans");
        assert_eq!(result.stats.online, 4);
        assert_eq!(result.stats.in_voice, 3);
        assert_eq!(result.stats.voice_channels, 2);

        let channels: Vec<(&str, u64)> = result
            .voice_channels
            .iter()
            .map(|c| (c.name.as_str(), c.member_count))
            .collect();
        assert_eq!(channels, vec![("Lounge", 2), ("Pairing", 1)]);
    }

    #[test]
    fn test_members_sorted_by_status_and_capped() {
        let result = reshape(widget(), 3);
        let order: Vec<&str> = result.members.iter().map(|m| m.username.as_str()).collect();
        assert_eq!(order, vec!["here", "also-here", "away"]);
    }

    #[test]
    fn test_member_avatar_fallbacks() {
        let result = reshape(widget(), 20);
        let by_name = |name: &str| {
            result
                .members
                .iter()
                .find(|m| m.username == name)
                .unwrap()
                .avatar_url
                .clone()
        };
        assert_eq!(by_name("here"), "https://cdn.discordapp.com/widget-avatars/a/b");
        assert_eq!(by_name("busy"), "https://cdn.discordapp.com/embed/avatars/0.png");
    }

    #[test]
    fn test_default_avatar_index() {
        assert_eq!(default_avatar_index("1", "1337"), 2);
        assert_eq!(
            default_avatar_index("80351110224678912", "0"),
            (80351110224678912u64 >> 22) % 6
        );
        assert_eq!(default_avatar_index("x", "0"), 0);
    }

    #[test]
    fn test_widget_disabled_statuses() {
        assert!(widget_disabled(&PulseError::NotFound("x".into())));
        assert!(widget_disabled(&PulseError::Status {
            status: 403,
            url: "x".into()
        }));
        assert!(!widget_disabled(&PulseError::Status {
            status: 500,
            url: "x".into()
        }));
    }

    #[test]
    fn test_malformed_member_is_skipped() {
        let widget: Widget = serde_json::from_str(
            r#"{"id": "123456789012345678", "name": "Rustaceans",
                "channels": null,
                "members": [
                    {"id": "1", "status": "online"},
                    {"id": "2", "username": "here", "status": "online"}
                ],
                "presence_count": 2}"#,
        )
        .unwrap();
        assert!(widget.channels.is_empty());

        let result = reshape(widget, 20);
        assert_eq!(result.members.len(), 1);
        assert_eq!(result.members[0].username, "here");
    }

    #[test]
    fn test_output_shape() {
        let json = serde_json::to_value(reshape(widget(), 20)).unwrap();
        assert_eq!(json["stats"]["inVoice"], 3);
        assert_eq!(json["voiceChannels"][0]["memberCount"], 2);
        assert!(json.get("_notice").is_none());
        assert!(json["members"][0].get("channelId").is_some());
        assert!(json["members"][0].get("activity").is_none());
        assert_eq!(json["members"][1]["activity"], "Factorio");
    }
}

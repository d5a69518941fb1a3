// Runtime configuration.
// Layers defaults, an optional TOML file, environment variables and CLI flags.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use serde::Deserialize;

use crate::error::{PulseError, Result};

/// Complete service configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub upstream: UpstreamConfig,
    pub ttl: TtlConfig,
    pub limits: LimitsConfig,
    pub youtube: YouTubeConfig,
}

/// Listener settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8787,
        }
    }
}

/// Outbound HTTP settings shared by every adapter.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct UpstreamConfig {
    /// Hard deadline for a single upstream call.
    pub timeout_secs: u64,
    pub user_agent: String,
    /// Optional token sent to the GitHub REST API.
    pub github_token: Option<String>,
}

impl Default for UpstreamConfig {
    fn default() -> Self {
        Self {
            timeout_secs: 8,
            user_agent: concat!("socialpulse/", env!("CARGO_PKG_VERSION")).to_string(),
            github_token: None,
        }
    }
}

impl UpstreamConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Per-platform cache lifetimes, in seconds.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TtlConfig {
    pub github: u64,
    pub reddit: u64,
    pub substack: u64,
    pub youtube: u64,
    pub tiktok: u64,
    pub instagram: u64,
    pub discord: u64,
    /// How long a "widget disabled" answer is reused before probing again.
    pub discord_widget_disabled: u64,
}

impl Default for TtlConfig {
    fn default() -> Self {
        Self {
            github: 300,
            reddit: 300,
            substack: 600,
            youtube: 600,
            tiktok: 600,
            instagram: 600,
            discord: 300,
            discord_widget_disabled: 120,
        }
    }
}

/// Caps on item counts and upstream fan-out.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LimitsConfig {
    pub github_events: usize,
    pub org_repos: usize,
    pub reddit_items: usize,
    pub reddit_comment_chars: usize,
    pub substack_posts: usize,
    pub substack_stats: usize,
    pub youtube_videos: usize,
    pub youtube_enrich: usize,
    pub tiktok_videos: usize,
    pub instagram_posts: usize,
    pub discord_members: usize,
}

impl Default for LimitsConfig {
    fn default() -> Self {
        Self {
            github_events: 10,
            org_repos: 6,
            reddit_items: 10,
            reddit_comment_chars: 120,
            substack_posts: 5,
            substack_stats: 3,
            youtube_videos: 10,
            youtube_enrich: 3,
            tiktok_videos: 3,
            instagram_posts: 6,
            discord_members: 20,
        }
    }
}

/// YouTube enrichment mirrors, tried in order.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct YouTubeConfig {
    pub mirrors: Vec<String>,
}

impl Default for YouTubeConfig {
    fn default() -> Self {
        Self {
            mirrors: vec![
                "https://inv.nadeko.net".to_string(),
                "https://invidious.nerdvpn.de".to_string(),
                "https://yewtu.be".to_string(),
            ],
        }
    }
}

/// Default location of the config file (~/.config/socialpulse/config.toml on Linux).
pub fn default_config_path() -> Option<PathBuf> {
    ProjectDirs::from("", "", "socialpulse").map(|dirs| dirs.config_dir().join("config.toml"))
}

impl Config {
    /// Parse configuration from TOML text.
    pub fn from_toml(text: &str) -> Result<Self> {
        Ok(toml::from_str(text)?)
    }

    /// Load configuration from `path`, or the default location when `None`.
    ///
    /// A missing default file yields defaults; a missing explicit file is an error.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, explicit) = match path {
            Some(p) => (Some(p.to_path_buf()), true),
            None => (default_config_path(), false),
        };

        let mut config = match path {
            Some(p) if p.exists() => Self::from_toml(&fs::read_to_string(&p)?)?,
            Some(p) if explicit => {
                return Err(PulseError::Other(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            _ => Self::default(),
        };

        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Apply environment overrides using the given variable lookup.
    pub fn apply_env(&mut self, lookup: impl Fn(&str) -> Option<String>) {
        if let Some(host) = lookup("SOCIALPULSE_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("SOCIALPULSE_PORT").and_then(|v| v.parse().ok()) {
            self.server.port = port;
        }
        if let Some(secs) = lookup("SOCIALPULSE_UPSTREAM_TIMEOUT_SECS").and_then(|v| v.parse().ok())
        {
            self.upstream.timeout_secs = secs;
        }
        if let Some(token) = lookup("GITHUB_TOKEN").filter(|t| !t.is_empty()) {
            self.upstream.github_token = Some(token);
        }
    }
}

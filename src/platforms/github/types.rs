// GitHub API response types and normalized output shapes.
// Upstream structs deserialize REST responses; output structs are the served JSON contract.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::events::EventKind;

/// GitHub user profile.
#[derive(Debug, Clone, Deserialize)]
pub struct User {
    pub login: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub blog: Option<String>,
    #[serde(default)]
    pub public_repos: u64,
    #[serde(default)]
    pub followers: u64,
    #[serde(default)]
    pub following: u64,
    pub html_url: String,
    pub created_at: Option<DateTime<Utc>>,
}

/// GitHub organization profile.
#[derive(Debug, Clone, Deserialize)]
pub struct Organization {
    pub login: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub blog: Option<String>,
    pub location: Option<String>,
    #[serde(default)]
    pub public_repos: u64,
    #[serde(default)]
    pub followers: u64,
    pub html_url: String,
}

/// GitHub repository.
#[derive(Debug, Clone, Deserialize)]
pub struct Repository {
    pub name: String,
    pub full_name: String,
    pub html_url: String,
    pub description: Option<String>,
    pub language: Option<String>,
    #[serde(default)]
    pub stargazers_count: u64,
    #[serde(default)]
    pub forks_count: u64,
    #[serde(default)]
    pub archived: bool,
    pub updated_at: DateTime<Utc>,
    pub pushed_at: Option<DateTime<Utc>>,
}

impl Repository {
    /// Most recent activity timestamp.
    pub fn last_activity(&self) -> DateTime<Utc> {
        self.pushed_at.unwrap_or(self.updated_at).max(self.updated_at)
    }
}

/// Public activity event.
#[derive(Debug, Clone, Deserialize)]
pub struct Event {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: EventKind,
    pub repo: EventRepo,
    #[serde(default)]
    pub payload: EventPayload,
    pub created_at: DateTime<Utc>,
}

/// Repository an event refers to. `name` is the full `owner/repo` path.
#[derive(Debug, Clone, Deserialize)]
pub struct EventRepo {
    pub name: String,
}

/// The subset of event payload fields the message table reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct EventPayload {
    pub action: Option<String>,
    /// Commit count for push events.
    pub size: Option<u64>,
    #[serde(default)]
    pub commits: Vec<serde_json::Value>,
    #[serde(rename = "ref")]
    pub ref_name: Option<String>,
    pub ref_type: Option<String>,
    pub number: Option<u64>,
    pub pull_request: Option<PayloadItem>,
    pub issue: Option<PayloadItem>,
    pub release: Option<PayloadRelease>,
    pub member: Option<PayloadMember>,
}

/// Pull request or issue referenced by an event.
#[derive(Debug, Clone, Deserialize)]
pub struct PayloadItem {
    pub number: u64,
    pub title: Option<String>,
    pub html_url: Option<String>,
    pub merged: Option<bool>,
}

/// Release referenced by an event.
#[derive(Debug, Clone, Deserialize)]
pub struct PayloadRelease {
    pub tag_name: String,
    pub name: Option<String>,
    pub html_url: Option<String>,
}

/// Member added by an event.
#[derive(Debug, Clone, Deserialize)]
pub struct PayloadMember {
    pub login: String,
}

/// Contribution calendar from the third-party contributions API.
#[derive(Debug, Clone, Deserialize)]
pub struct ContributionsResponse {
    /// Totals keyed by year (or `lastYear`).
    #[serde(default)]
    pub total: std::collections::BTreeMap<String, u64>,
    #[serde(default)]
    pub contributions: Vec<ContributionDay>,
}

/// One day of the contribution graph.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContributionDay {
    pub date: String,
    pub count: u64,
    /// Upstream-bucketed intensity, 0 through 4.
    pub level: u8,
}

/// Normalized user profile.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserProfile {
    pub login: String,
    pub name: Option<String>,
    pub avatar_url: Option<String>,
    pub bio: Option<String>,
    pub location: Option<String>,
    pub blog: Option<String>,
    pub public_repos: u64,
    pub followers: u64,
    pub following: u64,
    pub html_url: String,
}

impl From<User> for UserProfile {
    fn from(user: User) -> Self {
        Self {
            login: user.login,
            name: user.name,
            avatar_url: user.avatar_url,
            bio: user.bio,
            location: user.location,
            blog: user.blog.filter(|b| !b.is_empty()),
            public_repos: user.public_repos,
            followers: user.followers,
            following: user.following,
            html_url: user.html_url,
        }
    }
}

/// Normalized organization profile.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OrgProfile {
    pub login: String,
    pub name: Option<String>,
    pub description: Option<String>,
    pub avatar_url: Option<String>,
    pub blog: Option<String>,
    pub location: Option<String>,
    pub public_repos: u64,
    pub followers: u64,
    pub html_url: String,
}

impl From<Organization> for OrgProfile {
    fn from(org: Organization) -> Self {
        Self {
            login: org.login,
            name: org.name,
            description: org.description,
            avatar_url: org.avatar_url,
            blog: org.blog.filter(|b| !b.is_empty()),
            location: org.location,
            public_repos: org.public_repos,
            followers: org.followers,
            html_url: org.html_url,
        }
    }
}

/// Normalized activity event.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActivityEvent {
    pub id: String,
    /// Short event kind, e.g. `push`.
    #[serde(rename = "type")]
    pub kind: &'static str,
    pub icon: &'static str,
    pub style: &'static str,
    pub message: String,
    /// Repository label shown in the message.
    pub repo: String,
    pub repo_url: String,
    /// Link to the specific PR, issue or release when there is one.
    pub url: Option<String>,
    pub time_ago: String,
    pub created_at: DateTime<Utc>,
}

/// Normalized repository summary.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RepoSummary {
    pub name: String,
    pub full_name: String,
    pub description: Option<String>,
    pub url: String,
    pub language: Option<String>,
    pub stars: u64,
    pub forks: u64,
    pub updated_ago: String,
}

/// Contribution graph with its summed total.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Contributions {
    pub days: Vec<ContributionDay>,
    pub total: u64,
}

impl From<ContributionsResponse> for Contributions {
    fn from(response: ContributionsResponse) -> Self {
        Self {
            total: response.total.values().sum(),
            days: response.contributions,
        }
    }
}

/// Response for the user endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct UserActivity {
    pub user: Option<UserProfile>,
    pub events: Vec<ActivityEvent>,
    pub contributions: Contributions,
    #[serde(rename = "_notice", skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

/// Response for the organization endpoint.
#[derive(Debug, Clone, Serialize)]
pub struct OrgActivity {
    pub org: Option<OrgProfile>,
    pub events: Vec<ActivityEvent>,
    pub repos: Vec<RepoSummary>,
    #[serde(rename = "_notice", skip_serializing_if = "Option::is_none")]
    pub notice: Option<String>,
}

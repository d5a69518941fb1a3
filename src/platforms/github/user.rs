// GitHub user adapter.
// Fetches profile, public events and contributions concurrently.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use crate::cache::cache_key;
use crate::error::{PulseError, Result};
use crate::platforms::{Adapter, degrade, require};

use super::endpoints::GitHubApi;
use super::events::describe_all;
use super::types::{Contributions, ContributionsResponse, Event, User, UserActivity, UserProfile};
use super::check_login;

/// Query parameters for `/api/github`.
#[derive(Debug, Default, Deserialize)]
pub struct UserQuery {
    pub username: Option<String>,
}

/// Adapter for a GitHub user's activity.
pub struct GitHubUserAdapter {
    api: GitHubApi,
    event_limit: usize,
}

impl GitHubUserAdapter {
    pub fn new(api: GitHubApi, event_limit: usize) -> Self {
        Self { api, event_limit }
    }
}

#[async_trait]
impl Adapter for GitHubUserAdapter {
    type Query = UserQuery;
    type Params = String;
    type Output = UserActivity;

    const PLATFORM: &'static str = "github";

    fn validate(query: UserQuery) -> Result<String> {
        let username = require(query.username, "username")?;
        check_login(&username, "username")?;
        Ok(username)
    }

    fn cache_key(username: &String) -> String {
        cache_key(Self::PLATFORM, &[username.to_lowercase().as_str()])
    }

    async fn fetch(&self, username: &String) -> Result<UserActivity> {
        let (user, events, contributions) = tokio::join!(
            self.api.get_user(username),
            self.api.get_user_events(username, self.event_limit.max(1) * 3),
            self.api.get_contributions(username),
        );

        let user = match user {
            Ok(user) => Some(user),
            Err(e) if e.is_not_found() => {
                return Err(PulseError::NotFound(format!(
                    "GitHub user '{}' not found",
                    username
                )));
            }
            Err(e) => {
                warn!(platform = Self::PLATFORM, username = %username, error = %e, "Profile fetch failed");
                None
            }
        };
        let events = degrade(Self::PLATFORM, "events", events).unwrap_or_default();
        let contributions = degrade(Self::PLATFORM, "contributions", contributions);

        Ok(assemble(user, &events, contributions, self.event_limit, Utc::now()))
    }
}

/// Build the normalized user payload from whatever upstream calls succeeded.
fn assemble(
    user: Option<User>,
    events: &[Event],
    contributions: Option<ContributionsResponse>,
    event_limit: usize,
    now: DateTime<Utc>,
) -> UserActivity {
    let notice = user
        .is_none()
        .then(|| "GitHub profile is temporarily unavailable".to_string());

    UserActivity {
        user: user.map(UserProfile::from),
        events: describe_all(events, event_limit, now),
        contributions: contributions.map(Contributions::from).unwrap_or_default(),
        notice,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user() -> User {
        serde_json::from_str(
            r#"{"login": "alice", "name": "Alice", "html_url": "https://github.com/alice",
                "avatar_url": "https://avatars.githubusercontent.com/u/1", "followers": 12,
                "following": 3, "public_repos": 8}"#,
        )
        .unwrap()
    }

    fn events() -> Vec<Event> {
        serde_json::from_str(
            r#"[
                {"id": "2", "type": "WatchEvent", "repo": {"name": "octocat/Hello-World"},
                 "payload": {"action": "started"}, "created_at": "2024-05-01T11:00:00Z"},
                {"id": "1", "type": "PushEvent", "repo": {"name": "alice/site"},
                 "payload": {"size": 2}, "created_at": "2024-05-01T10:00:00Z"}
            ]"#,
        )
        .unwrap()
    }

    fn now() -> DateTime<Utc> {
        "2024-05-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_validate() {
        assert_eq!(
            GitHubUserAdapter::validate(UserQuery {
                username: Some("alice".into())
            })
            .unwrap(),
            "alice"
        );
        assert!(matches!(
            GitHubUserAdapter::validate(UserQuery::default()),
            Err(PulseError::InvalidInput(_))
        ));
        assert!(matches!(
            GitHubUserAdapter::validate(UserQuery {
                username: Some("../etc".into())
            }),
            Err(PulseError::InvalidInput(_))
        ));
    }

    #[test]
    fn test_cache_key_ignores_case() {
        assert_eq!(
            GitHubUserAdapter::cache_key(&"Alice".to_string()),
            GitHubUserAdapter::cache_key(&"alice".to_string())
        );
    }

    #[test]
    fn test_assemble_full() {
        let contributions: ContributionsResponse = serde_json::from_str(
            r#"{"total": {"lastYear": 321},
                "contributions": [{"date": "2024-05-01", "count": 4, "level": 2}]}"#,
        )
        .unwrap();

        let activity = assemble(Some(user()), &events(), Some(contributions), 10, now());
        let json = serde_json::to_value(&activity).unwrap();

        assert_eq!(json["user"]["login"], "alice");
        assert_eq!(json["user"]["avatarUrl"], "https://avatars.githubusercontent.com/u/1");
        assert_eq!(json["events"][0]["message"], "Starred octocat/Hello-World");
        assert_eq!(json["events"][1]["message"], "Pushed 2 commits to site");
        assert_eq!(json["events"][0]["timeAgo"], "1h");
        assert_eq!(json["contributions"]["total"], 321);
        assert_eq!(json["contributions"]["days"][0]["level"], 2);
        assert!(json.get("_notice").is_none());
    }

    #[test]
    fn test_malformed_event_does_not_drop_the_rest() {
        let raw: Vec<serde_json::Value> = serde_json::from_str(
            r#"[
                {"id": "2", "type": "WatchEvent", "repo": {"name": "octocat/Hello-World"},
                 "payload": {"action": "started"}, "created_at": "2024-05-01T11:00:00Z"},
                {"id": "1", "type": "IssuesEvent", "repo": {"name": "alice/site"},
                 "payload": {"action": "opened", "issue": {"title": "no number"}},
                 "created_at": "2024-05-01T10:00:00Z"}
            ]"#,
        )
        .unwrap();
        let events: Vec<Event> = crate::platforms::parse_each(raw);
        assert_eq!(events.len(), 1);

        let activity = assemble(Some(user()), &events, None, 10, now());
        assert_eq!(activity.events.len(), 1);
        assert_eq!(activity.events[0].message, "Starred octocat/Hello-World");
    }

    #[test]
    fn test_assemble_degraded() {
        let activity = assemble(None, &[], None, 10, now());
        let json = serde_json::to_value(&activity).unwrap();

        assert!(json["user"].is_null());
        assert_eq!(json["events"].as_array().unwrap().len(), 0);
        assert_eq!(json["contributions"]["total"], 0);
        assert!(json["_notice"].as_str().is_some());
    }
}

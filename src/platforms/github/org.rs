// GitHub organization adapter.
// Fetches org profile, org events and recently pushed repositories concurrently.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::warn;

use crate::cache::cache_key;
use crate::error::{PulseError, Result};
use crate::format::{TimeScale, relative_time};
use crate::platforms::{Adapter, degrade, require};

use super::check_login;
use super::endpoints::GitHubApi;
use super::events::describe_all;
use super::types::{Event, OrgActivity, OrgProfile, Organization, RepoSummary, Repository};

/// Query parameters for `/api/github-org`.
#[derive(Debug, Default, Deserialize)]
pub struct OrgQuery {
    pub org: Option<String>,
}

/// Adapter for a GitHub organization's activity.
pub struct GitHubOrgAdapter {
    api: GitHubApi,
    event_limit: usize,
    repo_limit: usize,
}

impl GitHubOrgAdapter {
    pub fn new(api: GitHubApi, event_limit: usize, repo_limit: usize) -> Self {
        Self {
            api,
            event_limit,
            repo_limit,
        }
    }
}

#[async_trait]
impl Adapter for GitHubOrgAdapter {
    type Query = OrgQuery;
    type Params = String;
    type Output = OrgActivity;

    const PLATFORM: &'static str = "github-org";

    fn validate(query: OrgQuery) -> Result<String> {
        let org = require(query.org, "org")?;
        check_login(&org, "org")?;
        Ok(org)
    }

    fn cache_key(org: &String) -> String {
        cache_key(Self::PLATFORM, &[org.to_lowercase().as_str()])
    }

    async fn fetch(&self, org: &String) -> Result<OrgActivity> {
        let (profile, events, repos) = tokio::join!(
            self.api.get_org(org),
            self.api.get_org_events(org, self.event_limit.max(1) * 3),
            // Over-fetch so archived repositories can be dropped.
            self.api.get_org_repos(org, self.repo_limit.max(1) * 2),
        );

        let profile = match profile {
            Ok(profile) => Some(profile),
            Err(e) if e.is_not_found() => {
                return Err(PulseError::NotFound(format!(
                    "GitHub organization '{}' not found",
                    org
                )));
            }
            Err(e) => {
                warn!(platform = Self::PLATFORM, org = %org, error = %e, "Org profile fetch failed");
                None
            }
        };
        let events = degrade(Self::PLATFORM, "events", events).unwrap_or_default();
        let repos = degrade(Self::PLATFORM, "repos", repos).unwrap_or_default();

        Ok(assemble(
            profile,
            &events,
            repos,
            self.event_limit,
            self.repo_limit,
            Utc::now(),
        ))
    }
}

/// Most recently active, non-archived repositories, capped at `limit`.
fn recent_repos(mut repos: Vec<Repository>, limit: usize, now: DateTime<Utc>) -> Vec<RepoSummary> {
    repos.retain(|repo| !repo.archived);
    repos.sort_by_key(|repo| std::cmp::Reverse(repo.last_activity()));
    repos
        .into_iter()
        .take(limit)
        .map(|repo| RepoSummary {
            updated_ago: relative_time(repo.last_activity(), now, TimeScale::GITHUB),
            name: repo.name,
            full_name: repo.full_name,
            description: repo.description,
            url: repo.html_url,
            language: repo.language,
            stars: repo.stargazers_count,
            forks: repo.forks_count,
        })
        .collect()
}

fn assemble(
    profile: Option<Organization>,
    events: &[Event],
    repos: Vec<Repository>,
    event_limit: usize,
    repo_limit: usize,
    now: DateTime<Utc>,
) -> OrgActivity {
    let notice = profile
        .is_none()
        .then(|| "GitHub organization profile is temporarily unavailable".to_string());

    OrgActivity {
        org: profile.map(OrgProfile::from),
        events: describe_all(events, event_limit, now),
        repos: recent_repos(repos, repo_limit, now),
        notice,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn repo(name: &str, pushed_at: &str, archived: bool) -> Repository {
        serde_json::from_str(&format!(
            r#"{{"name": "{name}", "full_name": "acme/{name}",
                "html_url": "https://github.com/acme/{name}",
                "updated_at": "2024-01-01T00:00:00Z", "pushed_at": "{pushed_at}",
                "archived": {archived}, "stargazers_count": 5, "language": "Rust"}}"#
        ))
        .unwrap()
    }

    fn now() -> DateTime<Utc> {
        "2024-05-01T12:00:00Z".parse().unwrap()
    }

    #[test]
    fn test_validate() {
        assert!(GitHubOrgAdapter::validate(OrgQuery {
            org: Some("rust-lang".into())
        })
        .is_ok());
        assert!(matches!(
            GitHubOrgAdapter::validate(OrgQuery::default()),
            Err(PulseError::InvalidInput(msg)) if msg.contains("org")
        ));
    }

    #[test]
    fn test_recent_repos_sorted_and_capped() {
        let repos = vec![
            repo("old", "2024-02-01T00:00:00Z", false),
            repo("new", "2024-04-30T12:00:00Z", false),
            repo("dead", "2024-04-30T13:00:00Z", true),
            repo("mid", "2024-03-01T00:00:00Z", false),
        ];

        let summaries = recent_repos(repos, 2, now());
        let names: Vec<&str> = summaries.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["new", "mid"]);
        assert_eq!(summaries[0].updated_ago, "1d");
        assert_eq!(summaries[0].stars, 5);
    }

    #[test]
    fn test_malformed_repo_is_skipped() {
        let raw = vec![
            serde_json::json!({"name": "broken", "full_name": "acme/broken"}),
            serde_json::json!({
                "name": "tool", "full_name": "acme/tool",
                "html_url": "https://github.com/acme/tool",
                "updated_at": "2024-04-01T00:00:00Z"
            }),
        ];
        let repos: Vec<Repository> = crate::platforms::parse_each(raw);
        let summaries = recent_repos(repos, 6, now());
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].name, "tool");
    }

    #[test]
    fn test_assemble_includes_release_events() {
        let events: Vec<Event> = serde_json::from_str(
            r#"[{"id": "9", "type": "ReleaseEvent", "repo": {"name": "acme/tool"},
                 "payload": {"release": {"tag_name": "v2.0.0"}},
                 "created_at": "2024-05-01T11:30:00Z"}]"#,
        )
        .unwrap();
        let profile: Organization = serde_json::from_str(
            r#"{"login": "acme", "html_url": "https://github.com/acme", "public_repos": 40}"#,
        )
        .unwrap();

        let activity = assemble(Some(profile), &events, vec![], 10, 6, now());
        let json = serde_json::to_value(&activity).unwrap();
        assert_eq!(json["org"]["publicRepos"], 40);
        assert_eq!(json["events"][0]["message"], "Released v2.0.0 in tool");
        assert_eq!(json["events"][0]["timeAgo"], "30m");
        assert!(json.get("_notice").is_none());
    }
}

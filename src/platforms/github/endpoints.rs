// GitHub API endpoint functions.
// Typed calls for profiles, public events, repositories and the contribution graph.

use reqwest::header::{ACCEPT, AUTHORIZATION, HeaderMap, HeaderValue};
use serde_json::Value;

use crate::error::{PulseError, Result};
use crate::platforms::parse_each;
use crate::upstream::UpstreamClient;

use super::types::{ContributionsResponse, Event, Organization, Repository, User};

const GITHUB_API_BASE: &str = "https://api.github.com";
const GITHUB_API_VERSION: &str = "2022-11-28";
const CONTRIBUTIONS_API_BASE: &str = "https://github-contributions-api.jogruber.de/v4";

/// GitHub REST API access on top of the shared upstream client.
#[derive(Clone)]
pub struct GitHubApi {
    client: UpstreamClient,
    headers: HeaderMap,
}

impl GitHubApi {
    /// Create an API handle, optionally authenticated with a token.
    pub fn new(client: UpstreamClient, token: Option<&str>) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/vnd.github+json"),
        );
        headers.insert(
            "X-GitHub-Api-Version",
            HeaderValue::from_static(GITHUB_API_VERSION),
        );
        if let Some(token) = token {
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&format!("Bearer {}", token))
                    .map_err(|e| PulseError::Other(e.to_string()))?,
            );
        }

        Ok(Self { client, headers })
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, endpoint: &str) -> Result<T> {
        let url = format!("{}{}", GITHUB_API_BASE, endpoint);
        let response = self
            .client
            .get_with_headers(&url, self.headers.clone())
            .await?;
        Ok(response.json().await?)
    }

    /// Get a user profile.
    pub async fn get_user(&self, username: &str) -> Result<User> {
        self.get_json(&format!("/users/{}", username)).await
    }

    /// Get a user's recent public events.
    ///
    /// Events that do not match the expected shape are skipped.
    pub async fn get_user_events(&self, username: &str, per_page: usize) -> Result<Vec<Event>> {
        let events: Vec<Value> = self
            .get_json(&format!(
                "/users/{}/events/public?per_page={}",
                username, per_page
            ))
            .await?;
        Ok(parse_each(events))
    }

    /// Get an organization profile.
    pub async fn get_org(&self, org: &str) -> Result<Organization> {
        self.get_json(&format!("/orgs/{}", org)).await
    }

    /// Get an organization's recent public events.
    pub async fn get_org_events(&self, org: &str, per_page: usize) -> Result<Vec<Event>> {
        let events: Vec<Value> = self
            .get_json(&format!("/orgs/{}/events?per_page={}", org, per_page))
            .await?;
        Ok(parse_each(events))
    }

    /// Get an organization's repositories, most recently pushed first.
    pub async fn get_org_repos(&self, org: &str, per_page: usize) -> Result<Vec<Repository>> {
        let params = [
            ("sort", "pushed"),
            ("direction", "desc"),
            ("per_page", &per_page.to_string()),
        ];
        let response = self
            .client
            .get_with_params(
                &format!("{}/orgs/{}/repos", GITHUB_API_BASE, org),
                self.headers.clone(),
                &params,
            )
            .await?;
        let repos: Vec<Value> = response.json().await?;
        Ok(parse_each(repos))
    }

    /// Get the last year of a user's contribution graph.
    pub async fn get_contributions(&self, username: &str) -> Result<ContributionsResponse> {
        self.client
            .get_json(&format!("{}/{}?y=last", CONTRIBUTIONS_API_BASE, username))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::UpstreamConfig;

    #[test]
    fn test_token_header() {
        let client = UpstreamClient::new(&UpstreamConfig::default()).unwrap();
        let api = GitHubApi::new(client, Some("ghp_abc")).unwrap();
        assert_eq!(api.headers.get(AUTHORIZATION).unwrap(), "Bearer ghp_abc");
        assert_eq!(
            api.headers.get(ACCEPT).unwrap(),
            "application/vnd.github+json"
        );
    }

    #[test]
    fn test_anonymous_has_no_auth_header() {
        let client = UpstreamClient::new(&UpstreamConfig::default()).unwrap();
        let api = GitHubApi::new(client, None).unwrap();
        assert!(api.headers.get(AUTHORIZATION).is_none());
    }
}

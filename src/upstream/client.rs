// Upstream HTTP client.
// Applies the user agent and per-call timeout, and converts error statuses.

use reqwest::{
    Client, RequestBuilder, Response, StatusCode,
    header::{HeaderMap, HeaderValue, USER_AGENT},
};
use serde::{Serialize, de::DeserializeOwned};
use tracing::debug;

use crate::config::UpstreamConfig;
use crate::error::{PulseError, Result};

const GITHUB_API: &str = "https://api.github.com/";

/// HTTP client shared by all adapters.
///
/// Every request is bounded by the configured timeout; expiry surfaces as
/// [`PulseError::Http`] like any other network failure.
#[derive(Clone)]
pub struct UpstreamClient {
    client: Client,
}

impl UpstreamClient {
    /// Create a client from upstream settings.
    pub fn new(config: &UpstreamConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_str(&config.user_agent)
                .map_err(|e| PulseError::Other(e.to_string()))?,
        );

        let client = Client::builder()
            .default_headers(headers)
            .timeout(config.timeout())
            .build()
            .map_err(PulseError::Http)?;

        Ok(Self { client })
    }

    /// Make a GET request.
    pub async fn get(&self, url: &str) -> Result<Response> {
        self.send(self.client.get(url)).await
    }

    /// Make a GET request with extra headers.
    pub async fn get_with_headers(&self, url: &str, headers: HeaderMap) -> Result<Response> {
        self.send(self.client.get(url).headers(headers)).await
    }

    /// Make a GET request with extra headers and query parameters.
    pub async fn get_with_params<T: Serialize + ?Sized>(
        &self,
        url: &str,
        headers: HeaderMap,
        params: &T,
    ) -> Result<Response> {
        self.send(self.client.get(url).headers(headers).query(params))
            .await
    }

    /// GET and deserialize a JSON body.
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let response = self.get(url).await?;
        Ok(response.json().await?)
    }

    /// GET a text body (HTML, RSS).
    pub async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.get(url).await?;
        Ok(response.text().await?)
    }

    /// GET a body that should be JSON but may come back as an HTML error page.
    ///
    /// Returns `None` when the body is not JSON instead of failing to parse it.
    pub async fn get_json_lenient<T: DeserializeOwned>(&self, url: &str) -> Result<Option<T>> {
        let response = self.get(url).await?;
        lenient_json(response).await
    }

    /// Like [`get_json_lenient`](Self::get_json_lenient), with encoded query parameters.
    pub async fn get_json_lenient_with_params<T, P>(
        &self,
        url: &str,
        params: &P,
    ) -> Result<Option<T>>
    where
        T: DeserializeOwned,
        P: Serialize + ?Sized,
    {
        let response = self.get_with_params(url, HeaderMap::new(), params).await?;
        lenient_json(response).await
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await.map_err(PulseError::Http)?;
        debug!(url = %response.url(), status = response.status().as_u16(), "Upstream response");
        check_response(response)
    }
}

async fn lenient_json<T: DeserializeOwned>(response: Response) -> Result<Option<T>> {
    let url = response.url().to_string();
    let body = response.text().await?;
    if !looks_like_json(&body) {
        debug!(url = %url, "Upstream returned a non-JSON body");
        return Ok(None);
    }
    Ok(Some(serde_json::from_str(&body)?))
}

/// Check response status and convert errors.
fn check_response(response: Response) -> Result<Response> {
    let remaining = header_u64(&response, "x-ratelimit-remaining");
    let reset = header_u64(&response, "x-ratelimit-reset");
    check_status(response.status(), response.url().as_str(), remaining, reset)?;
    Ok(response)
}

/// Map an upstream status to an error, using rate-limit headers when present.
pub(crate) fn check_status(
    status: StatusCode,
    url: &str,
    rate_remaining: Option<u64>,
    rate_reset: Option<u64>,
) -> Result<()> {
    match status {
        s if s.is_success() => Ok(()),
        StatusCode::NOT_FOUND => Err(PulseError::NotFound(url.to_string())),
        StatusCode::TOO_MANY_REQUESTS if rate_remaining == Some(0) => Err(rate_limited(rate_reset)),
        // Only GitHub signals an exhausted quota with a 403.
        StatusCode::FORBIDDEN if rate_remaining == Some(0) && url.starts_with(GITHUB_API) => {
            Err(rate_limited(rate_reset))
        }
        status => Err(PulseError::Status {
            status: status.as_u16(),
            url: url.to_string(),
        }),
    }
}

fn rate_limited(rate_reset: Option<u64>) -> PulseError {
    let reset_at = rate_reset
        .and_then(|reset| chrono::DateTime::from_timestamp(reset as i64, 0))
        .map(|dt| dt.format("%H:%M:%S").to_string())
        .unwrap_or_else(|| "unknown".to_string());
    PulseError::RateLimited { reset_at }
}

fn header_u64(response: &Response, name: &str) -> Option<u64> {
    response
        .headers()
        .get(name)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
}

/// Cheap check that a body is a JSON document rather than markup.
pub fn looks_like_json(body: &str) -> bool {
    matches!(body.trim_start().chars().next(), Some('{') | Some('['))
}

// HTTP response helpers.
// JSON error bodies and the shared Cache-Control policy.

use std::time::Duration;

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header::CACHE_CONTROL},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::Value;
use tracing::error;

use crate::error::PulseError;

/// JSON error body: `{"error": "...", "widgetDisabled": true}`.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiError {
    #[serde(skip)]
    status: StatusCode,
    error: String,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    widget_disabled: bool,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            error: message.into(),
            widget_disabled: false,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }

    /// Body as a JSON value, for storing in the cache.
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

impl From<PulseError> for ApiError {
    fn from(err: PulseError) -> Self {
        let status = err.status_code();
        match err {
            PulseError::WidgetDisabled => Self {
                status,
                error: "Server widget is disabled. Enable it in Server Settings > Widget."
                    .to_string(),
                widget_disabled: true,
            },
            PulseError::InvalidInput(msg) | PulseError::NotFound(msg) => Self::new(status, msg),
            other if status.is_server_error() && status != StatusCode::SERVICE_UNAVAILABLE => {
                error!(error = %other, "Request failed");
                Self::new(status, "Internal server error")
            }
            other => Self::new(status, other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self)).into_response()
    }
}

/// `Cache-Control` value for a payload that stays fresh for `ttl`.
pub fn cache_control(ttl: Duration) -> HeaderValue {
    let secs = ttl.as_secs();
    let value = format!(
        "public, max-age={secs}, s-maxage={secs}, stale-while-revalidate={secs}"
    );
    HeaderValue::from_str(&value).unwrap_or_else(|_| HeaderValue::from_static("no-store"))
}

/// Attach the cache policy for `ttl` to `response`.
pub fn with_cache_control(mut response: Response, ttl: Duration) -> Response {
    response
        .headers_mut()
        .insert(CACHE_CONTROL, cache_control(ttl));
    response
}

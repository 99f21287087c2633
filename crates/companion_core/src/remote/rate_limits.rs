//! HTTP client for the push rate-limit endpoint.

use log::{error, info};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::time::{Duration, Instant};

/// Maximum response body characters kept in error messages.
const MAX_ERROR_BODY_CHARS: usize = 200;

/// Failure of a remote status fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RemoteError {
    /// No push identifier is stored, so there is nothing to ask for.
    MissingPushId,
    /// HTTP client could not be built.
    Client(String),
    /// Request never produced a response.
    Transport(String),
    /// Server answered with a non-success status.
    Status { status: u16, body: String },
    /// Response body did not match the expected shape.
    Decode(String),
}

impl RemoteError {
    /// Whether re-issuing the same request can succeed.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::MissingPushId | Self::Client(_))
    }
}

impl Display for RemoteError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingPushId => write!(f, "no push identifier registered"),
            Self::Client(message) => write!(f, "http client setup failed: {message}"),
            Self::Transport(message) => write!(f, "remote fetch failed: {message}"),
            Self::Status { status, body } => {
                write!(f, "remote fetch failed with status {status}: {body}")
            }
            Self::Decode(message) => write!(f, "remote fetch returned invalid data: {message}"),
        }
    }
}

impl Error for RemoteError {}

/// Rate-limit counters for the current window.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimits {
    pub attempts: u32,
    pub successful: u32,
    pub errors: u32,
    pub total: u32,
    pub maximum: u32,
    #[serde(default)]
    pub remaining: u32,
    /// Server-formatted timestamp of the next window reset.
    pub resets_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitsResponse {
    #[serde(default)]
    pub target: Option<String>,
    pub rate_limits: RateLimits,
}

#[derive(Serialize)]
struct RateLimitsRequest<'a> {
    push_token: &'a str,
}

/// Rate-limit endpoint client.
pub struct RateLimitsClient {
    client: reqwest::Client,
    endpoint: String,
}

impl RateLimitsClient {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|err| RemoteError::Client(err.to_string()))?;
        Ok(Self {
            client,
            endpoint: endpoint.trim().to_string(),
        })
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Fetches counters for `push_id`.
    pub async fn fetch(&self, push_id: &str) -> Result<RateLimitsResponse, RemoteError> {
        let started_at = Instant::now();
        let result = self.fetch_inner(push_id).await;
        match &result {
            Ok(_) => info!(
                "event=rate_limits_fetch module=remote status=ok duration_ms={}",
                started_at.elapsed().as_millis()
            ),
            Err(err) => error!(
                "event=rate_limits_fetch module=remote status=error duration_ms={} error={}",
                started_at.elapsed().as_millis(),
                err
            ),
        }
        result
    }

    async fn fetch_inner(&self, push_id: &str) -> Result<RateLimitsResponse, RemoteError> {
        let push_id = push_id.trim();
        if push_id.is_empty() {
            return Err(RemoteError::MissingPushId);
        }

        let response = self
            .client
            .post(&self.endpoint)
            .json(&RateLimitsRequest { push_token: push_id })
            .send()
            .await
            .map_err(|err| RemoteError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
            });
        }

        response
            .json::<RateLimitsResponse>()
            .await
            .map_err(|err| RemoteError::Decode(err.to_string()))
    }
}

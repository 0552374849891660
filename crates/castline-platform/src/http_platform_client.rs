//! JSON-over-HTTP platform client.
//!
//! Endpoints are relative to `api_base` and authenticated with a bearer
//! session token:
//!
//! | operation | request |
//! |---|---|
//! | create | `POST /live/create` |
//! | info | `GET /live/{id}/info` |
//! | start | `POST /live/{id}/start` |
//! | end | `POST /live/{id}/end_broadcast` |
//! | post-live | `POST /live/{id}/add_to_post_live` |
//! | comment | `POST /live/{id}/comment` |
//! | fetch comments | `GET /live/{id}/get_comment?last_comment_ts={since}` |
//! | live list | `GET /feed/reels_tray` |
//! | user broadcast | `GET /users/{username}/story` |

use std::time::Duration;

use async_trait::async_trait;
use castline_chat::{ChatTransportError, CommentBatch, PollTransport};
use castline_session::{
    BroadcastInfo, CreateBroadcastRequest, CreatedBroadcast, LiveBroadcastSummary,
    PlatformClient, PlatformError, StartedBroadcast,
};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::retry::{
    is_retryable_status, is_retryable_transport_error, parse_retry_after, truncate_for_error,
    RetryPolicy, RETRY_ATTEMPT_HEADER,
};

pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_RETRY_MAX_ATTEMPTS: usize = 3;
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 250;

#[derive(Debug, Clone, PartialEq, Eq)]
/// Public struct `HttpPlatformConfig` used across Castline components.
pub struct HttpPlatformConfig {
    pub api_base: String,
    pub session_token: String,
    pub request_timeout_ms: u64,
    pub retry_max_attempts: usize,
    pub retry_base_delay_ms: u64,
}

impl HttpPlatformConfig {
    pub fn new(api_base: impl Into<String>, session_token: impl Into<String>) -> Self {
        Self {
            api_base: api_base.into(),
            session_token: session_token.into(),
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
            retry_max_attempts: DEFAULT_RETRY_MAX_ATTEMPTS,
            retry_base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
        }
    }
}

#[derive(Debug, Serialize)]
struct CommentRequest<'a> {
    comment_text: &'a str,
}

#[derive(Debug, Deserialize)]
struct EmptyResponse {}

#[derive(Debug, Deserialize)]
struct ReelsTrayResponse {
    #[serde(default)]
    broadcasts: Vec<LiveBroadcastSummary>,
}

#[derive(Debug, Deserialize)]
struct UserStoryResponse {
    #[serde(default)]
    broadcast: Option<LiveBroadcastSummary>,
}

#[derive(Debug, Clone, Copy)]
enum Method {
    Get,
    Post,
}

#[derive(Clone)]
/// reqwest-backed `PlatformClient` and `PollTransport`.
pub struct HttpPlatformClient {
    http: reqwest::Client,
    api_base: reqwest::Url,
    session_token: String,
    retry_max_attempts: usize,
    retry_base_delay_ms: u64,
}

impl std::fmt::Debug for HttpPlatformClient {
    fn fmt(&self, formatter: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        formatter
            .debug_struct("HttpPlatformClient")
            .field("api_base", &self.api_base.as_str())
            .finish()
    }
}

impl HttpPlatformClient {
    pub fn new(config: HttpPlatformConfig) -> Result<Self, PlatformError> {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(
            reqwest::header::USER_AGENT,
            reqwest::header::HeaderValue::from_static("castline"),
        );
        headers.insert(
            reqwest::header::ACCEPT,
            reqwest::header::HeaderValue::from_static("application/json"),
        );
        let http = reqwest::Client::builder()
            .default_headers(headers)
            .timeout(Duration::from_millis(config.request_timeout_ms.max(1)))
            .build()
            .map_err(|error| PlatformError::Request {
                operation: "build_client",
                message: error.to_string(),
            })?;
        let api_base = reqwest::Url::parse(config.api_base.trim_end_matches('/')).map_err(
            |error| PlatformError::Request {
                operation: "build_client",
                message: format!("invalid api base '{}': {error}", config.api_base),
            },
        )?;
        if api_base.cannot_be_a_base() {
            return Err(PlatformError::Request {
                operation: "build_client",
                message: format!("api base '{}' cannot carry paths", config.api_base),
            });
        }

        Ok(Self {
            http,
            api_base,
            session_token: config.session_token.trim().to_string(),
            retry_max_attempts: config.retry_max_attempts.max(1),
            retry_base_delay_ms: config.retry_base_delay_ms.max(1),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> reqwest::Url {
        let mut url = self.api_base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().extend(segments);
        }
        url
    }

    fn request(&self, method: Method, url: reqwest::Url) -> reqwest::RequestBuilder {
        let builder = match method {
            Method::Get => self.http.get(url),
            Method::Post => self.http.post(url),
        };
        if self.session_token.is_empty() {
            builder
        } else {
            builder.bearer_auth(&self.session_token)
        }
    }

    async fn request_json<T, F>(
        &self,
        operation: &'static str,
        mut builder: F,
    ) -> Result<T, PlatformError>
    where
        T: DeserializeOwned,
        F: FnMut() -> reqwest::RequestBuilder,
    {
        let policy = RetryPolicy::new(self.retry_max_attempts, self.retry_base_delay_ms);
        let mut attempt = 0_usize;
        loop {
            attempt = attempt.saturating_add(1);
            let response = builder()
                .header(RETRY_ATTEMPT_HEADER, attempt.saturating_sub(1).to_string())
                .send()
                .await;
            match response {
                Ok(response) => {
                    let status = response.status();
                    if status.is_success() {
                        return response
                            .json::<T>()
                            .await
                            .map_err(|error| PlatformError::Decode {
                                operation,
                                message: error.to_string(),
                            });
                    }

                    let retry_after = parse_retry_after(response.headers());
                    let body = response.text().await.unwrap_or_default();
                    let delay = is_retryable_status(status.as_u16())
                        .then(|| policy.delay_after(attempt, retry_after))
                        .flatten();
                    if let Some(delay) = delay {
                        tracing::debug!(
                            operation,
                            status = status.as_u16(),
                            attempt,
                            delay_ms = delay.as_millis() as u64,
                            "retrying platform request"
                        );
                        tokio::time::sleep(delay).await;
                        continue;
                    }

                    return Err(PlatformError::Status {
                        operation,
                        status: status.as_u16(),
                        body: truncate_for_error(&body),
                    });
                }
                Err(error) => {
                    let delay = is_retryable_transport_error(&error)
                        .then(|| policy.delay_after(attempt, None))
                        .flatten();
                    if let Some(delay) = delay {
                        tracing::debug!(operation, attempt, error = %error, "retrying platform request");
                        tokio::time::sleep(delay).await;
                        continue;
                    }
                    return Err(PlatformError::Request {
                        operation,
                        message: error.to_string(),
                    });
                }
            }
        }
    }

    pub async fn fetch_comment_batch(
        &self,
        broadcast_id: &str,
        since_timestamp: u64,
    ) -> Result<CommentBatch, PlatformError> {
        let url = self.endpoint(&["live", broadcast_id, "get_comment"]);
        let since = since_timestamp.to_string();
        self.request_json("get_comment", || {
            self.request(Method::Get, url.clone())
                .query(&[("last_comment_ts", since.as_str())])
        })
        .await
    }
}

#[async_trait]
impl PlatformClient for HttpPlatformClient {
    async fn create_broadcast(
        &self,
        request: &CreateBroadcastRequest,
    ) -> Result<CreatedBroadcast, PlatformError> {
        let url = self.endpoint(&["live", "create"]);
        self.request_json("create", || self.request(Method::Post, url.clone()).json(request))
            .await
    }

    async fn broadcast_info(&self, broadcast_id: &str) -> Result<BroadcastInfo, PlatformError> {
        let url = self.endpoint(&["live", broadcast_id, "info"]);
        self.request_json("info", || self.request(Method::Get, url.clone()))
            .await
    }

    async fn start_broadcast(&self, broadcast_id: &str) -> Result<StartedBroadcast, PlatformError> {
        let url = self.endpoint(&["live", broadcast_id, "start"]);
        self.request_json("start", || self.request(Method::Post, url.clone()))
            .await
    }

    async fn end_broadcast(&self, broadcast_id: &str) -> Result<(), PlatformError> {
        let url = self.endpoint(&["live", broadcast_id, "end_broadcast"]);
        self.request_json::<EmptyResponse, _>("end_broadcast", || {
            self.request(Method::Post, url.clone())
        })
        .await
        .map(|_| ())
    }

    async fn add_to_post_live(&self, broadcast_id: &str) -> Result<(), PlatformError> {
        let url = self.endpoint(&["live", broadcast_id, "add_to_post_live"]);
        self.request_json::<EmptyResponse, _>("add_to_post_live", || {
            self.request(Method::Post, url.clone())
        })
        .await
        .map(|_| ())
    }

    async fn post_comment(&self, broadcast_id: &str, text: &str) -> Result<(), PlatformError> {
        let url = self.endpoint(&["live", broadcast_id, "comment"]);
        let body = CommentRequest { comment_text: text };
        self.request_json::<EmptyResponse, _>("comment", || {
            self.request(Method::Post, url.clone()).json(&body)
        })
        .await
        .map(|_| ())
    }

    async fn list_live_broadcasts(&self) -> Result<Vec<LiveBroadcastSummary>, PlatformError> {
        let url = self.endpoint(&["feed", "reels_tray"]);
        let response: ReelsTrayResponse = self
            .request_json("reels_tray", || self.request(Method::Get, url.clone()))
            .await?;
        Ok(response.broadcasts)
    }

    async fn find_user_broadcast(
        &self,
        username: &str,
    ) -> Result<Option<LiveBroadcastSummary>, PlatformError> {
        let url = self.endpoint(&["users", username, "story"]);
        let response: UserStoryResponse = self
            .request_json("user_story", || self.request(Method::Get, url.clone()))
            .await?;
        Ok(response.broadcast)
    }
}

#[async_trait]
impl PollTransport for HttpPlatformClient {
    async fn fetch_comments(
        &self,
        broadcast_id: &str,
        since_timestamp: u64,
    ) -> Result<CommentBatch, ChatTransportError> {
        self.fetch_comment_batch(broadcast_id, since_timestamp)
            .await
            .map_err(|error| ChatTransportError::Fetch(error.to_string()))
    }
}

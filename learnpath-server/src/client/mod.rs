//! HTTP clients for the downstream services, with bounded retry.
//!
//! Every call carries the caller's correlation id, tenant, user and idempotency key.
//! Network errors and 5xx responses are retried with exponential backoff; 4xx responses
//! are returned at once. The whole call, retries included, is bounded by the request
//! deadline.

mod planner;
mod quiz;
mod retrieval;

use std::time::Duration;

use learnpath_core::context::{IDEMPOTENCY_HEADER, REQUEST_ID_HEADER, TENANT_HEADER, USER_HEADER};
use learnpath_core::{ErrorBody, ErrorCode, RequestContext};
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

pub use planner::PlannerApi;
pub use quiz::QuizApi;
pub use retrieval::{IngestAccepted, IngestRequest, RetrievalApi};

const HEALTH_TIMEOUT: Duration = Duration::from_secs(2);

#[derive(Debug, Error)]
pub enum ClientError {
    /// Every attempt failed with a network error or a 5xx.
    #[error("{service} service unavailable after {attempts} attempts")]
    Unavailable {
        service: &'static str,
        attempts: u32,
        detail: String,
    },

    #[error("{service} service did not answer before the request deadline")]
    DeadlineExceeded { service: &'static str },

    /// The service answered with a 4xx. Never retried.
    #[error("{service} service rejected the request ({status}): {message}")]
    Rejected {
        service: &'static str,
        status: u16,
        code: ErrorCode,
        message: String,
    },

    #[error("{service} service sent an unreadable response: {detail}")]
    Decode {
        service: &'static str,
        detail: String,
    },
}

impl ClientError {
    pub fn code(&self) -> ErrorCode {
        match self {
            ClientError::Unavailable { .. } => ErrorCode::DownstreamUnavailable,
            ClientError::DeadlineExceeded { .. } => ErrorCode::DeadlineExceeded,
            ClientError::Rejected { code, .. } => *code,
            ClientError::Decode { .. } => ErrorCode::Internal,
        }
    }

    /// Message safe to show a client. Decode details stay in the logs.
    pub fn public_message(&self) -> String {
        match self {
            ClientError::Rejected { message, .. } => message.clone(),
            ClientError::Decode { service, .. } => format!("{service} service sent an unreadable response"),
            other => other.to_string(),
        }
    }
}

/// Retry schedule for downstream calls.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay_ms: u64,
    /// Timeout of a single attempt.
    pub attempt_timeout_secs: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 500,
            attempt_timeout_secs: 10,
        }
    }
}

impl RetryPolicy {
    /// Delay before retry `n` (1-based): base, 2x base, 4x base, ...
    pub fn backoff(&self, retry: u32) -> Duration {
        let factor = 2u64.saturating_pow(retry.saturating_sub(1));
        Duration::from_millis(self.base_delay_ms.saturating_mul(factor))
    }

    fn attempt_timeout(&self) -> Duration {
        Duration::from_secs(self.attempt_timeout_secs)
    }
}

/// Status-only fallback when a 4xx body is not the error envelope.
fn code_for_status(status: StatusCode) -> ErrorCode {
    match status {
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => ErrorCode::InvalidRequest,
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => ErrorCode::Unauthorized,
        StatusCode::NOT_FOUND => ErrorCode::NotFound,
        StatusCode::CONFLICT => ErrorCode::Conflict,
        _ => ErrorCode::InvalidRequest,
    }
}

/// One downstream service.
#[derive(Clone)]
pub struct DownstreamClient {
    service: &'static str,
    base_url: String,
    http: reqwest::Client,
    policy: RetryPolicy,
}

impl DownstreamClient {
    pub fn new(service: &'static str, base_url: impl Into<String>, policy: RetryPolicy) -> Self {
        let base_url: String = base_url.into();
        Self {
            service,
            base_url: base_url.trim_end_matches('/').to_string(),
            http: reqwest::Client::new(),
            policy,
        }
    }

    pub fn service(&self) -> &'static str {
        self.service
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub async fn get<T: DeserializeOwned>(&self, ctx: &RequestContext, path: &str) -> Result<T, ClientError> {
        self.send(ctx, Method::GET, path, None).await
    }

    pub async fn post<B, T>(&self, ctx: &RequestContext, path: &str, body: &B) -> Result<T, ClientError>
    where
        B: Serialize + ?Sized,
        T: DeserializeOwned,
    {
        // Serialised once so every retry replays identical bytes.
        let bytes = serde_json::to_vec(body).map_err(|e| ClientError::Decode {
            service: self.service,
            detail: format!("request body: {e}"),
        })?;
        self.send(ctx, Method::POST, path, Some(bytes)).await
    }

    /// Single-attempt `GET /health`.
    pub async fn is_reachable(&self) -> bool {
        match self
            .http
            .get(format!("{}/health", self.base_url))
            .timeout(HEALTH_TIMEOUT)
            .send()
            .await
        {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                debug!(downstream = self.service, error = %e, "health probe failed");
                false
            }
        }
    }

    fn request(&self, ctx: &RequestContext, method: Method, url: &str) -> reqwest::RequestBuilder {
        let mut request = self
            .http
            .request(method, url)
            .timeout(self.policy.attempt_timeout())
            .header(REQUEST_ID_HEADER, ctx.request_id.as_str())
            .header(TENANT_HEADER, ctx.tenant.as_str());
        if let Some(user) = &ctx.user_id {
            request = request.header(USER_HEADER, user.as_str());
        }
        if let Some(key) = &ctx.idempotency_key {
            request = request.header(IDEMPOTENCY_HEADER, key.as_str());
        }
        request
    }

    async fn send<T: DeserializeOwned>(
        &self,
        ctx: &RequestContext,
        method: Method,
        path: &str,
        body: Option<Vec<u8>>,
    ) -> Result<T, ClientError> {
        let url = format!("{}{}", self.base_url, path);
        let attempts = async {
            let mut last_failure = String::new();
            for attempt in 1..=self.policy.max_attempts {
                if attempt > 1 {
                    tokio::time::sleep(self.policy.backoff(attempt - 1)).await;
                }
                let mut request = self.request(ctx, method.clone(), &url);
                if let Some(bytes) = &body {
                    request = request
                        .header(CONTENT_TYPE, "application/json")
                        .body(bytes.clone());
                }

                match request.send().await {
                    Ok(response) if response.status().is_success() => {
                        debug!(downstream = self.service, attempt, %url, "downstream call succeeded");
                        return self.decode(response).await;
                    }
                    Ok(response) if response.status().is_server_error() => {
                        warn!(downstream = self.service, attempt, status = %response.status(), "downstream error");
                        last_failure = format!("status {}", response.status());
                    }
                    Ok(response) => return Err(self.rejected(response).await),
                    Err(e) => {
                        warn!(downstream = self.service, attempt, error = %e, "downstream unreachable");
                        last_failure = e.to_string();
                    }
                }
            }
            Err(ClientError::Unavailable {
                service: self.service,
                attempts: self.policy.max_attempts,
                detail: last_failure,
            })
        };

        match ctx.remaining() {
            Some(remaining) => tokio::time::timeout(remaining, attempts)
                .await
                .map_err(|_| ClientError::DeadlineExceeded {
                    service: self.service,
                })?,
            None => attempts.await,
        }
    }

    async fn decode<T: DeserializeOwned>(&self, response: reqwest::Response) -> Result<T, ClientError> {
        let bytes = response.bytes().await.map_err(|e| ClientError::Decode {
            service: self.service,
            detail: e.to_string(),
        })?;
        serde_json::from_slice(&bytes).map_err(|e| ClientError::Decode {
            service: self.service,
            detail: e.to_string(),
        })
    }

    /// Convert a 4xx into an error without passing the raw body through.
    async fn rejected(&self, response: reqwest::Response) -> ClientError {
        let status = response.status();
        let envelope = response
            .bytes()
            .await
            .ok()
            .and_then(|bytes| serde_json::from_slice::<ErrorBody>(&bytes).ok());
        let (code, message) = match envelope {
            Some(body) => (body.code, body.message),
            None => (
                code_for_status(status),
                format!("{} service rejected the request", self.service),
            ),
        };
        ClientError::Rejected {
            service: self.service,
            status: status.as_u16(),
            code,
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_from_base() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff(3), Duration::from_millis(2000));
    }

    #[test]
    fn unparsable_rejections_map_by_status() {
        assert_eq!(code_for_status(StatusCode::NOT_FOUND), ErrorCode::NotFound);
        assert_eq!(code_for_status(StatusCode::CONFLICT), ErrorCode::Conflict);
        assert_eq!(code_for_status(StatusCode::IM_A_TEAPOT), ErrorCode::InvalidRequest);
    }

    #[test]
    fn exhausted_retries_are_unavailable() {
        let err = ClientError::Unavailable {
            service: "planner",
            attempts: 3,
            detail: "status 500".into(),
        };
        assert_eq!(err.code(), ErrorCode::DownstreamUnavailable);
        assert_eq!(err.public_message(), "planner service unavailable after 3 attempts");
    }
}

//! Server errors and the HTTP error envelope.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use learnpath_core::{AuthError, ErrorBody, ErrorCode};
use learnpath_planner::PlanError;
use learnpath_quiz::QuizError;
use learnpath_retrieval::RetrievalError;
use thiserror::Error;

use crate::client::ClientError;
use crate::middleware::current_request_id;

/// Errors that stop a server from running.
#[derive(Debug, Error)]
pub enum ServerError {
    #[error("failed to bind to {addr}: {source}")]
    Bind {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

/// An error response: stable code, human message, and the correlation id.
#[derive(Debug, Clone, PartialEq)]
pub struct ApiError {
    pub code: ErrorCode,
    pub message: String,
    pub request_id: Option<String>,
}

impl ApiError {
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            request_id: None,
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidRequest, message)
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = Some(request_id.into());
        self
    }

    pub fn body(&self) -> ErrorBody {
        let body = ErrorBody::new(self.code, self.message.clone());
        match self.request_id.clone().or_else(current_request_id) {
            Some(id) => body.with_request_id(id),
            None => body,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status =
            StatusCode::from_u16(self.code.status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        if status.is_server_error() {
            tracing::error!(code = %self.code, message = %self.message, "request failed");
        } else {
            tracing::debug!(code = %self.code, message = %self.message, "request rejected");
        }
        (status, Json(self.body())).into_response()
    }
}

/// Parse an identifier taken from the URL path.
pub(crate) fn parse_id<T: std::str::FromStr>(raw: &str, kind: &str) -> Result<T, ApiError> {
    raw.parse()
        .map_err(|_| ApiError::invalid(format!("invalid {kind} id: {raw}")))
}

/// Internal details stay in the logs; clients get a generic message.
fn internal(detail: impl std::fmt::Display) -> ApiError {
    tracing::error!(error = %detail, "internal error");
    ApiError::new(ErrorCode::Internal, "internal error")
}

impl From<RetrievalError> for ApiError {
    fn from(err: RetrievalError) -> Self {
        match err.code() {
            ErrorCode::Internal => internal(err),
            code => ApiError::new(code, err.to_string()),
        }
    }
}

impl From<PlanError> for ApiError {
    fn from(err: PlanError) -> Self {
        match err.code() {
            ErrorCode::Internal => internal(err),
            code => ApiError::new(code, err.to_string()),
        }
    }
}

impl From<QuizError> for ApiError {
    fn from(err: QuizError) -> Self {
        match err.code() {
            ErrorCode::Internal => internal(err),
            code => ApiError::new(code, err.to_string()),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::JwksFetchError(_) | AuthError::Misconfigured(_) => internal(err),
            other => ApiError::new(ErrorCode::Unauthorized, other.to_string()),
        }
    }
}

impl From<ClientError> for ApiError {
    fn from(err: ClientError) -> Self {
        if let ClientError::Decode { .. } = err {
            tracing::error!(error = %err, "downstream response could not be decoded");
        }
        ApiError::new(err.code(), err.public_message())
    }
}

impl From<axum::extract::rejection::JsonRejection> for ApiError {
    fn from(rejection: axum::extract::rejection::JsonRejection) -> Self {
        ApiError::invalid(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use learnpath_core::store::StoreError;

    #[test]
    fn domain_errors_keep_their_codes() {
        let err: ApiError = PlanError::Conflict("cycle".into()).into();
        assert_eq!(err.code, ErrorCode::Conflict);

        let err: ApiError = QuizError::NoGroundableContent.into();
        assert_eq!(err.code, ErrorCode::NoGroundableContent);

        let err: ApiError = AuthError::Expired.into();
        assert_eq!(err.code, ErrorCode::Unauthorized);
    }

    #[test]
    fn internal_details_are_not_exposed() {
        let err: ApiError = PlanError::Store(StoreError::Backend("disk I/O at /var/db".into())).into();
        assert_eq!(err.code, ErrorCode::Internal);
        assert_eq!(err.message, "internal error");
    }

    #[test]
    fn bad_path_ids_are_invalid_requests() {
        let err = parse_id::<learnpath_core::PlanId>("not-a-uuid", "plan").unwrap_err();
        assert_eq!(err.code, ErrorCode::InvalidRequest);
        assert_eq!(err.message, "invalid plan id: not-a-uuid");
    }

    #[test]
    fn body_carries_explicit_request_id() {
        let body = ApiError::invalid("bad").with_request_id("r-1").body();
        assert_eq!(body.request_id.as_deref(), Some("r-1"));
        assert_eq!(body.code, ErrorCode::InvalidRequest);
    }
}

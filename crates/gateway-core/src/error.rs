//! Error taxonomy surfaced at the HTTP boundary (SPEC_FULL.md §7).

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::auth::AuthError;
use crate::registry::RegistryError;
use crate::resilience::ResilienceError;
use crate::transform::TransformError;

/// The categorized error surface the Executor and HTTP layer deal in.
///
/// Each variant keeps its originating cause via `#[source]` so operators can see the real
/// reason in logs even though callers only see the category.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("invalid params: {0}")]
    InvalidParams(String),

    #[error("connector not found: {0}")]
    ConnectorNotFound(String),

    #[error("endpoint not found: {0}")]
    EndpointNotFound(String),

    #[error("environment not found: {0}")]
    EnvironmentNotFound(String),

    #[error("failed to build authenticator: {0}")]
    AuthBuildError(AuthError),

    #[error("oauth2 token request failed: {0}")]
    OAuthFailed(String),

    #[error("rate limit exhausted")]
    RateLimitExhausted,

    #[error("circuit breaker open")]
    CircuitOpen,

    #[error("upstream returned status {status}: {body_excerpt}")]
    UpstreamError { status: u16, body_excerpt: String, retry_after_secs: Option<u64> },

    #[error("response transform failed: {0}")]
    TransformFailed(#[from] TransformError),

    #[error("request cancelled")]
    Cancelled,

    #[error("request timed out")]
    Timeout,
}

impl From<AuthError> for GatewayError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::OAuth2(e) => GatewayError::OAuthFailed(e.to_string()),
            other => GatewayError::AuthBuildError(other),
        }
    }
}

impl From<RegistryError> for GatewayError {
    fn from(err: RegistryError) -> Self {
        match err {
            RegistryError::ConnectorNotFound(id) => GatewayError::ConnectorNotFound(id),
            RegistryError::EndpointNotFound(name) => GatewayError::EndpointNotFound(name),
            RegistryError::EnvironmentNotFound(name) => GatewayError::EnvironmentNotFound(name),
            other => GatewayError::InvalidParams(other.to_string()),
        }
    }
}

impl From<ResilienceError> for GatewayError {
    fn from(err: ResilienceError) -> Self {
        match err {
            ResilienceError::RateLimitExhausted => GatewayError::RateLimitExhausted,
            ResilienceError::CircuitOpen => GatewayError::CircuitOpen,
            ResilienceError::Cancelled => GatewayError::Cancelled,
            ResilienceError::Timeout => GatewayError::Timeout,
            ResilienceError::Transport(e) => {
                GatewayError::UpstreamError { status: 0, body_excerpt: e, retry_after_secs: None }
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    duration: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "retryAfterSeconds")]
    retry_after_seconds: Option<u64>,
}

impl GatewayError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            GatewayError::InvalidParams(_) => StatusCode::BAD_REQUEST,
            GatewayError::ConnectorNotFound(_)
            | GatewayError::EndpointNotFound(_)
            | GatewayError::EnvironmentNotFound(_) => StatusCode::NOT_FOUND,
            GatewayError::AuthBuildError(_) => StatusCode::INTERNAL_SERVER_ERROR,
            GatewayError::OAuthFailed(_) => StatusCode::BAD_GATEWAY,
            GatewayError::RateLimitExhausted => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::CircuitOpen => StatusCode::SERVICE_UNAVAILABLE,
            GatewayError::UpstreamError { status, .. } => {
                StatusCode::from_u16(*status).filter(|s| s.as_u16() >= 400).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            GatewayError::TransformFailed(_) => StatusCode::BAD_GATEWAY,
            GatewayError::Cancelled | GatewayError::Timeout => StatusCode::GATEWAY_TIMEOUT,
        }
    }
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let retry_after_seconds = match &self {
            GatewayError::UpstreamError { retry_after_secs, .. } => *retry_after_secs,
            _ => None,
        };
        let body = ErrorBody { error: self.to_string(), duration: None, retry_after_seconds };
        (status, Json(body)).into_response()
    }
}

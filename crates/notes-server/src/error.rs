//! API error types with JSON responses.

use axum::{
    Json,
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use notes_auth::AuthError;
use notes_store::StoreError;
use serde::{Deserialize, Serialize};

/// Message sent in place of internal failure details.
pub const INTERNAL_MESSAGE: &str = "Internal server error";

/// API error that can be returned from handlers.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// Bad request (400).
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Wrong username or password (401).
    #[error("invalid username or password")]
    InvalidCredentials,

    /// Refresh token rejected (401).
    #[error("invalid refresh token")]
    InvalidRefresh,

    /// Unauthorized (401).
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Forbidden (403).
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// Not found (404).
    #[error("not found: {0}")]
    NotFound(String),

    /// Conflict (409).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Too many requests (429).
    #[error("rate limit exceeded, retry in {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    /// Internal server error (500).
    #[error("internal error: {0}")]
    Internal(String),

    /// Store error (500).
    #[error("storage error: {0}")]
    Store(#[from] StoreError),
}

impl ApiError {
    /// Get the error code string for this error.
    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "bad_request",
            Self::InvalidCredentials => "invalid_credentials",
            Self::InvalidRefresh => "invalid_refresh",
            Self::Unauthorized(_) => "unauthorized",
            Self::Forbidden(_) => "forbidden",
            Self::NotFound(_) => "not_found",
            Self::Conflict(_) => "conflict",
            Self::RateLimited { .. } => "rate_limited",
            Self::Internal(_) | Self::Store(_) => "internal_error",
        }
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::InvalidCredentials | Self::InvalidRefresh | Self::Unauthorized(_) => {
                StatusCode::UNAUTHORIZED
            }
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,
            Self::Internal(_) | Self::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    fn is_internal(&self) -> bool {
        matches!(self, Self::Internal(_) | Self::Store(_))
    }

    /// Client-facing message. Internal failures get a generic one.
    fn public_message(&self) -> String {
        match self {
            Self::BadRequest(m)
            | Self::Unauthorized(m)
            | Self::Forbidden(m)
            | Self::NotFound(m)
            | Self::Conflict(m) => m.clone(),
            Self::Internal(_) | Self::Store(_) => INTERNAL_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::Validation(m) => Self::BadRequest(m),
            AuthError::InvalidCredentials => Self::InvalidCredentials,
            AuthError::InvalidRefresh => Self::InvalidRefresh,
            AuthError::InvalidToken => Self::Unauthorized("invalid or expired token".to_string()),
            AuthError::UsernameTaken => Self::Conflict("username already taken".to_string()),
            AuthError::Store(e) => Self::Store(e),
            other => Self::Internal(other.to_string()),
        }
    }
}

/// JSON error response body.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "not_found", "bad_request").
    pub error: String,
    /// Human-readable error message.
    pub message: String,
}

/// Internal failure detail, attached to 500 responses as an extension.
///
/// Only the development-mode middleware reads it.
#[derive(Debug, Clone)]
pub struct ErrorDetail(pub String);

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.code().to_string(),
            message: self.public_message(),
        };

        let mut response = (status, Json(body)).into_response();

        if let Self::RateLimited { retry_after_secs } = &self {
            response
                .headers_mut()
                .insert(header::RETRY_AFTER, HeaderValue::from(*retry_after_secs));
        }

        if self.is_internal() {
            let detail = self.to_string();
            tracing::error!(error = %detail, "Request failed");
            response.extensions_mut().insert(ErrorDetail(detail));
        }

        response
    }
}

/// Result type for API handlers.
pub type ApiResult<T> = Result<T, ApiError>;

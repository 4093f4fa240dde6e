//! Error types for the token lifecycle.

use notes_store::StoreError;
use thiserror::Error;

/// Result type alias for auth operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Errors produced by token issuance, verification and the session lifecycle.
///
/// The client-facing variants carry no detail: login failures
/// do not say which half of the credentials was wrong, and refresh failures
/// do not say whether the signature, the expiry or the store rejected them.
#[derive(Debug, Error)]
pub enum AuthError {
    /// Missing or malformed input.
    #[error("validation failed: {0}")]
    Validation(String),

    /// Unknown username or wrong password.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// Refresh token failed verification or is no longer valid in the store.
    #[error("invalid refresh token")]
    InvalidRefresh,

    /// Access token failed verification.
    #[error("invalid token")]
    InvalidToken,

    /// Registration with a username that already exists.
    #[error("username already taken")]
    UsernameTaken,

    /// Invalid configuration, detected at startup.
    #[error("auth configuration error: {0}")]
    Config(String),

    /// A store call exceeded its time bound.
    #[error("store call timed out after {0:?}")]
    StoreTimeout(std::time::Duration),

    /// Store failure.
    #[error("storage error: {0}")]
    Store(#[from] StoreError),

    /// Signing or hashing failure.
    #[error("internal auth error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Whether this error is an infrastructure failure rather than a client error.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            Self::Config(_) | Self::StoreTimeout(_) | Self::Store(_) | Self::Internal(_)
        )
    }
}

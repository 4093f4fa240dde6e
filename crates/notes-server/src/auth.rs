//! Bearer authentication and role checks.

use axum::{
    extract::FromRequestParts,
    http::{header, request::Parts},
};
use notes_auth::AccessClaims;
use notes_core::{RoleSet, UserId};

use crate::error::ApiError;
use crate::state::AppState;

/// Authenticated user extracted from an access token.
#[derive(Debug, Clone)]
pub struct AuthenticatedUser {
    pub user_id: UserId,
    pub roles: RoleSet,
    /// Verified claims, including `iat`/`exp`.
    pub claims: AccessClaims,
}

impl AuthenticatedUser {
    /// Fail with 403 unless the user holds one of `allowed`.
    pub fn require_role(&self, allowed: &[&str]) -> Result<(), ApiError> {
        if self.roles.intersects(allowed) {
            Ok(())
        } else {
            tracing::debug!(user_id = %self.user_id, required = ?allowed, "Missing role");
            Err(ApiError::Forbidden(format!(
                "requires one of roles: {}",
                allowed.join(", ")
            )))
        }
    }
}

impl From<AccessClaims> for AuthenticatedUser {
    fn from(claims: AccessClaims) -> Self {
        Self {
            user_id: claims.sub,
            roles: claims.roles.clone(),
            claims,
        }
    }
}

/// Extract the token from an `Authorization: Bearer <token>` value.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

impl FromRequestParts<AppState> for AuthenticatedUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &AppState,
    ) -> Result<Self, Self::Rejection> {
        let auth_header = parts
            .headers
            .get(header::AUTHORIZATION)
            .and_then(|v| v.to_str().ok())
            .ok_or_else(|| ApiError::Unauthorized("Missing Authorization header".to_string()))?;

        let token = bearer_token(auth_header).ok_or_else(|| {
            ApiError::Unauthorized("Authorization header must be Bearer <token>".to_string())
        })?;

        let claims = state
            .sessions()
            .verify_access(token)
            .map_err(|_| ApiError::Unauthorized("invalid or expired token".to_string()))?;

        Ok(claims.into())
    }
}

//! JWT issuance and verification.
//!
//! Access and refresh tokens are signed with separate HMAC secrets, so a
//! key that can mint one kind can never mint or verify the other. The `typ`
//! claim is checked as well, but only as a second line.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use notes_core::{RoleSet, TokenId, UserId};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::time::Duration;

use crate::config::{MAX_TTL, ttl_in_range};
use crate::error::{AuthError, AuthResult};

/// Which signing context a token belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenKind {
    Access,
    Refresh,
}

/// Claims of an access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AccessClaims {
    /// User ID (subject).
    pub sub: UserId,
    pub roles: RoleSet,
    /// Unique per token, so two tokens minted in the same second differ.
    pub jti: TokenId,
    pub typ: TokenKind,
    /// Issued at (unix timestamp).
    pub iat: i64,
    /// Expiration time (unix timestamp).
    pub exp: i64,
}

/// Claims of a refresh token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefreshClaims {
    pub sub: UserId,
    pub roles: RoleSet,
    /// Store-side revocation key.
    pub jti: TokenId,
    pub typ: TokenKind,
    pub iat: i64,
    pub exp: i64,
}

trait Typed {
    fn kind(&self) -> TokenKind;
}

impl Typed for AccessClaims {
    fn kind(&self) -> TokenKind {
        self.typ
    }
}

impl Typed for RefreshClaims {
    fn kind(&self) -> TokenKind {
        self.typ
    }
}

/// One signing context: a secret and the lifetime of tokens it mints.
struct SigningContext {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl: Duration,
}

impl SigningContext {
    fn new(secret: &str, ttl: Duration) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
            ttl,
        }
    }

    fn expiry(&self, now: DateTime<Utc>) -> AuthResult<(i64, i64)> {
        let exp = chrono::Duration::from_std(self.ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| AuthError::Internal(format!("token ttl {:?} overflows expiry", self.ttl)))?;
        Ok((now.timestamp(), exp.timestamp()))
    }
}

/// Token issuer and verifier for both signing contexts.
pub struct TokenKeys {
    access: SigningContext,
    refresh: SigningContext,
    validation: Validation,
}

impl std::fmt::Debug for TokenKeys {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenKeys")
            .field("access_ttl", &self.access.ttl)
            .field("refresh_ttl", &self.refresh.ttl)
            .finish_non_exhaustive()
    }
}

impl TokenKeys {
    /// Build both signing contexts.
    ///
    /// Empty secrets and a shared access/refresh secret are rejected: both
    /// would let one kind of token pass as the other. Lifetimes must be
    /// non-zero and at most [`MAX_TTL`].
    pub fn new(
        access_secret: &str,
        refresh_secret: &str,
        access_ttl: Duration,
        refresh_ttl: Duration,
    ) -> AuthResult<Self> {
        if access_secret.is_empty() || refresh_secret.is_empty() {
            return Err(AuthError::Config("JWT secrets must not be empty".to_string()));
        }
        if access_secret == refresh_secret {
            return Err(AuthError::Config(
                "access and refresh tokens must use different secrets".to_string(),
            ));
        }

        for (kind, ttl) in [("access", access_ttl), ("refresh", refresh_ttl)] {
            if !ttl_in_range(ttl) {
                return Err(AuthError::Config(format!(
                    "{kind} token ttl must be between 1s and {}d, got {:?}",
                    MAX_TTL.as_secs() / 86_400,
                    ttl
                )));
            }
        }

        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp"]);

        Ok(Self {
            access: SigningContext::new(access_secret, access_ttl),
            refresh: SigningContext::new(refresh_secret, refresh_ttl),
            validation,
        })
    }

    /// Sign an access token for `subject`.
    pub fn issue_access(
        &self,
        subject: UserId,
        roles: &RoleSet,
        now: DateTime<Utc>,
    ) -> AuthResult<String> {
        let (iat, exp) = self.access.expiry(now)?;
        let claims = AccessClaims {
            sub: subject,
            roles: roles.clone(),
            jti: TokenId::generate(),
            typ: TokenKind::Access,
            iat,
            exp,
        };
        sign(&claims, &self.access.encoding)
    }

    /// Sign a refresh token for `subject` carrying `token_id`.
    pub fn issue_refresh(
        &self,
        subject: UserId,
        roles: &RoleSet,
        token_id: &TokenId,
        now: DateTime<Utc>,
    ) -> AuthResult<String> {
        let (iat, exp) = self.refresh.expiry(now)?;
        let claims = RefreshClaims {
            sub: subject,
            roles: roles.clone(),
            jti: token_id.clone(),
            typ: TokenKind::Refresh,
            iat,
            exp,
        };
        sign(&claims, &self.refresh.encoding)
    }

    /// Verify an access token's signature, expiry and kind.
    pub fn verify_access(&self, token: &str) -> AuthResult<AccessClaims> {
        self.verify(token, &self.access.decoding, TokenKind::Access)
    }

    /// Verify a refresh token's signature, expiry and kind.
    pub fn verify_refresh(&self, token: &str) -> AuthResult<RefreshClaims> {
        self.verify(token, &self.refresh.decoding, TokenKind::Refresh)
    }

    fn verify<C: DeserializeOwned + Typed>(
        &self,
        token: &str,
        key: &DecodingKey,
        expected: TokenKind,
    ) -> AuthResult<C> {
        let data = decode::<C>(token, key, &self.validation).map_err(|e| {
            tracing::debug!(error = %e, kind = ?expected, "token verification failed");
            AuthError::InvalidToken
        })?;

        if data.claims.kind() != expected {
            tracing::debug!(kind = ?expected, "token kind mismatch");
            return Err(AuthError::InvalidToken);
        }
        Ok(data.claims)
    }
}

fn sign<C: Serialize>(claims: &C, key: &EncodingKey) -> AuthResult<String> {
    encode(&Header::new(Algorithm::HS256), claims, key)
        .map_err(|e| AuthError::Internal(format!("Failed to create token: {}", e)))
}

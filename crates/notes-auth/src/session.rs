//! Refresh token lifecycle.
//!
//! A refresh record moves `Issued -> Consumed` when it is rotated and
//! `Issued -> Revoked` on logout or cap pruning; both are terminal. `Expired`
//! is never stored, it is the `expires_at` predicate evaluated at query time.

use std::future::Future;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use notes_core::{
    NewRefreshRecord, NewUser, RefreshStatus, RevocationReason, RoleSet, TokenId, User, UserId,
};
use notes_store::{CredentialStore, StoreError, StoreResult};

use crate::config::AuthConfig;
use crate::error::{AuthError, AuthResult};
use crate::password::PasswordHasher;
use crate::token::{AccessClaims, RefreshClaims, TokenKeys};

/// A freshly issued access/refresh pair.
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
    /// Roles carried by both tokens.
    pub roles: RoleSet,
}

/// Issues, rotates and revokes sessions on top of a [`CredentialStore`].
///
/// Every store call is bounded by [`AuthConfig::store_timeout`].
pub struct SessionManager {
    store: Arc<dyn CredentialStore>,
    keys: TokenKeys,
    hasher: PasswordHasher,
    /// Verified against when the username is unknown, so that a miss costs
    /// the same as a wrong password.
    dummy_hash: String,
    config: AuthConfig,
}

impl std::fmt::Debug for SessionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("keys", &self.keys)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SessionManager {
    /// Build a manager, validating the signing configuration.
    pub fn new(store: Arc<dyn CredentialStore>, config: AuthConfig) -> AuthResult<Self> {
        let keys = TokenKeys::new(
            &config.access_secret,
            &config.refresh_secret,
            config.access_ttl,
            config.refresh_ttl,
        )?;
        if config.refresh_cap == 0 {
            return Err(AuthError::Config("refresh token cap must be at least 1".to_string()));
        }
        let hasher = PasswordHasher::new(config.argon2_memory_kib, config.argon2_iterations)?;
        let dummy_hash = hasher.hash(TokenId::generate().as_str())?;

        Ok(Self {
            store,
            keys,
            hasher,
            dummy_hash,
            config,
        })
    }

    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    /// Verify a bearer access token.
    pub fn verify_access(&self, token: &str) -> AuthResult<AccessClaims> {
        self.keys.verify_access(token)
    }

    /// Create a user with the given roles.
    pub async fn register(&self, username: &str, password: &str, roles: RoleSet) -> AuthResult<User> {
        let username = username.trim();
        if username.is_empty() || password.is_empty() {
            return Err(AuthError::Validation(
                "username and password are required".to_string(),
            ));
        }

        let password_hash = self.hasher.hash(password)?;
        let user = self
            .timed(
                "create_user",
                self.store.create_user(NewUser {
                    username: username.to_string(),
                    password_hash,
                    roles,
                }),
            )
            .await
            .map_err(|e| match e {
                AuthError::Store(StoreError::DuplicateUsername(_)) => AuthError::UsernameTaken,
                other => other,
            })?;

        tracing::info!(user_id = %user.id, username = %user.username, "User registered");
        Ok(user)
    }

    /// Create the user unless the username already exists.
    ///
    /// Returns true if a user was created.
    pub async fn ensure_user(&self, username: &str, password: &str, roles: RoleSet) -> AuthResult<bool> {
        let existing = self
            .timed("find_user_by_username", self.store.find_user_by_username(username.trim()))
            .await?;
        if existing.is_some() {
            return Ok(false);
        }
        match self.register(username, password, roles).await {
            Ok(_) => Ok(true),
            // Lost a race with a concurrent seed.
            Err(AuthError::UsernameTaken) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Exchange credentials for a new token pair.
    pub async fn login(&self, username: &str, password: &str) -> AuthResult<TokenPair> {
        let user = self
            .timed("find_user_by_username", self.store.find_user_by_username(username.trim()))
            .await?;

        let Some(user) = user else {
            // Burn the same argon2 work as a real verification.
            let _ = self.hasher.verify(password, &self.dummy_hash);
            tracing::debug!("Login failed: unknown user");
            return Err(AuthError::InvalidCredentials);
        };

        if !self.hasher.verify(password, &user.password_hash)? {
            tracing::debug!(user_id = %user.id, "Login failed: wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        let pair = self.issue_pair(user.id, &user.roles, Utc::now()).await?;
        tracing::info!(user_id = %user.id, "User logged in");
        Ok(pair)
    }

    /// Rotate a refresh token: consume it and issue a new pair.
    ///
    /// The consume is a single compare-and-set in the store, so of several
    /// concurrent calls with the same token exactly one succeeds.
    pub async fn refresh(&self, refresh_token: &str) -> AuthResult<TokenPair> {
        let claims = self
            .keys
            .verify_refresh(refresh_token)
            .map_err(|_| AuthError::InvalidRefresh)?;
        let now = Utc::now();

        let consumed = self
            .timed("consume_refresh_record", self.store.consume_refresh_record(&claims.jti, now))
            .await?;

        let Some(record) = consumed else {
            self.inspect_rejected_refresh(&claims, now).await;
            return Err(AuthError::InvalidRefresh);
        };

        if record.user_id != claims.sub {
            tracing::warn!(
                token_user = %claims.sub,
                record_user = %record.user_id,
                "Refresh token subject does not match its record"
            );
            return Err(AuthError::InvalidRefresh);
        }

        let pair = self.issue_pair(claims.sub, &claims.roles, now).await?;
        tracing::debug!(user_id = %claims.sub, "Refresh token rotated");
        Ok(pair)
    }

    /// Revoke a refresh token. Idempotent: tokens that fail verification or
    /// are already revoked are treated as logged out.
    pub async fn logout(&self, refresh_token: &str) -> AuthResult<()> {
        let claims = match self.keys.verify_refresh(refresh_token) {
            Ok(claims) => claims,
            Err(_) => {
                tracing::debug!("Logout with unverifiable refresh token");
                return Ok(());
            }
        };

        let revoked = self
            .timed(
                "revoke_refresh_record",
                self.store.revoke_refresh_record(&claims.jti, Utc::now()),
            )
            .await?;

        tracing::info!(user_id = %claims.sub, revoked, "User logged out");
        Ok(())
    }

    async fn issue_pair(&self, user_id: UserId, roles: &RoleSet, now: DateTime<Utc>) -> AuthResult<TokenPair> {
        let token_id = TokenId::generate();
        let access_token = self.keys.issue_access(user_id, roles, now)?;
        let refresh_token = self.keys.issue_refresh(user_id, roles, &token_id, now)?;

        let expires_at = chrono::Duration::from_std(self.config.refresh_ttl)
            .ok()
            .and_then(|ttl| now.checked_add_signed(ttl))
            .ok_or_else(|| AuthError::Internal("refresh record expiry overflows".to_string()))?;
        self.timed(
            "save_refresh_record",
            self.store.save_refresh_record(NewRefreshRecord {
                user_id,
                token_id,
                created_at: now,
                expires_at,
            }),
        )
        .await?;

        self.enforce_cap(user_id, now).await?;

        Ok(TokenPair {
            access_token,
            refresh_token,
            roles: roles.clone(),
        })
    }

    /// Revoke all but the newest `refresh_cap` active records of a user.
    ///
    /// Two concurrent logins can each see the other's record missing, so the
    /// count may briefly exceed the cap by one.
    async fn enforce_cap(&self, user_id: UserId, now: DateTime<Utc>) -> AuthResult<()> {
        let active = self
            .timed(
                "list_active_refresh_records",
                self.store.list_active_refresh_records(user_id),
            )
            .await?;

        if active.len() <= self.config.refresh_cap {
            return Ok(());
        }

        let excess: Vec<i64> = active
            .iter()
            .skip(self.config.refresh_cap)
            .map(|record| record.id)
            .collect();
        let revoked = self
            .timed(
                "revoke_many",
                self.store.revoke_many(&excess, RevocationReason::Revoked, now),
            )
            .await?;

        tracing::debug!(user_id = %user_id, revoked, "Pruned refresh tokens over cap");
        Ok(())
    }

    /// Log why a verified refresh token was refused by the store.
    async fn inspect_rejected_refresh(&self, claims: &RefreshClaims, now: DateTime<Utc>) {
        let record = match self
            .timed("find_refresh_record", self.store.find_refresh_record(&claims.jti))
            .await
        {
            Ok(record) => record,
            Err(e) => {
                tracing::debug!(error = %e, "Could not inspect rejected refresh token");
                return;
            }
        };

        let Some(record) = record else {
            tracing::warn!(user_id = %claims.sub, "Refresh token has no record");
            return;
        };

        match record.status(now) {
            RefreshStatus::Consumed => tracing::warn!(
                user_id = %claims.sub,
                consumed_at = ?record.state.revoked_at(),
                "Refresh token reuse detected"
            ),
            RefreshStatus::Revoked => {
                tracing::debug!(user_id = %claims.sub, "Refresh with revoked token")
            }
            RefreshStatus::Expired => tracing::debug!(
                user_id = %claims.sub,
                expires_at = %record.expires_at,
                "Refresh with expired record"
            ),
            // Lost a race with a concurrent rotation or logout.
            RefreshStatus::Issued => {
                tracing::debug!(user_id = %claims.sub, "Refresh record changed concurrently")
            }
        }
    }

    async fn timed<T>(
        &self,
        operation: &'static str,
        call: impl Future<Output = StoreResult<T>>,
    ) -> AuthResult<T> {
        match tokio::time::timeout(self.config.store_timeout, call).await {
            Ok(result) => result.map_err(AuthError::from),
            Err(_) => {
                tracing::error!(
                    operation,
                    timeout_ms = self.config.store_timeout.as_millis() as u64,
                    "Store call timed out"
                );
                Err(AuthError::StoreTimeout(self.config.store_timeout))
            }
        }
    }
}

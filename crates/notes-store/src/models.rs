//! Database models for the storage layer.
//!
//! These types map directly to database rows and are used for
//! sqlx queries, with conversions into the `notes-core` domain types.

use chrono::{DateTime, Utc};
use notes_core::{
    Note, NoteId, RefreshRecord, RefreshState, RevocationReason, RoleSet, TokenId, User, UserId,
};
use sqlx::FromRow;

use crate::error::StoreError;

/// Database row for the `users` table.
#[derive(Debug, Clone, FromRow)]
pub struct UserRow {
    pub id: i64,
    pub username: String,
    pub password_hash: String,
    /// `TEXT[]` column.
    pub roles: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl From<UserRow> for User {
    fn from(row: UserRow) -> Self {
        Self {
            id: UserId(row.id),
            username: row.username,
            password_hash: row.password_hash,
            roles: RoleSet::from(row.roles),
            created_at: row.created_at,
        }
    }
}

/// Database row for the `refresh_tokens` table.
#[derive(Debug, Clone, FromRow)]
pub struct RefreshTokenRow {
    pub id: i64,
    pub user_id: i64,
    pub jti: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub revoked_at: Option<DateTime<Utc>>,
    pub revoke_reason: Option<String>,
}

impl TryFrom<RefreshTokenRow> for RefreshRecord {
    type Error = StoreError;

    fn try_from(row: RefreshTokenRow) -> Result<Self, Self::Error> {
        let state = match (row.revoked_at, row.revoke_reason.as_deref()) {
            (None, None) => RefreshState::Issued,
            (Some(at), Some(reason)) => reason
                .parse::<RevocationReason>()
                .map_err(|reason| StoreError::CorruptRow {
                    table: "refresh_tokens",
                    reason,
                })?
                .into_state(at),
            _ => {
                return Err(StoreError::CorruptRow {
                    table: "refresh_tokens",
                    reason: format!(
                        "revoked_at and revoke_reason disagree for jti {}",
                        row.jti
                    ),
                });
            }
        };

        Ok(Self {
            id: row.id,
            user_id: UserId(row.user_id),
            token_id: TokenId::from(row.jti),
            created_at: row.created_at,
            expires_at: row.expires_at,
            state,
        })
    }
}

/// Database row for the `notes` table.
#[derive(Debug, Clone, FromRow)]
pub struct NoteRow {
    pub id: i64,
    pub msg: String,
    pub created_at: DateTime<Utc>,
}

impl From<NoteRow> for Note {
    fn from(row: NoteRow) -> Self {
        Self {
            id: NoteId(row.id),
            msg: row.msg,
            created_at: row.created_at,
        }
    }
}

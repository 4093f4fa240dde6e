//! Core data types for the notes API.
//!
//! All types derive `Debug` and `Clone`; the ones that cross the HTTP or
//! token boundary also derive `Serialize`/`Deserialize`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

// ============================================================================
// ID Types
// ============================================================================

/// Unique identifier for a user.
///
/// Users are keyed by a database-assigned integer, which is also the `sub`
/// claim of every token issued to them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(pub i64);

impl UserId {
    /// Returns the inner integer.
    #[must_use]
    pub const fn get(self) -> i64 {
        self.0
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Unique identifier for a note.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NoteId(pub i64);

impl NoteId {
    /// Parses a path segment into a note id. Only positive integers are ids.
    pub fn parse_positive(s: &str) -> Option<Self> {
        s.trim()
            .parse::<i64>()
            .ok()
            .filter(|id| *id > 0)
            .map(Self)
    }
}

impl fmt::Display for NoteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifier of a refresh token (the `jti` claim).
///
/// Generated from a random UUID v4; the textual form is what gets signed
/// into the token and stored in the `refresh_tokens.jti` column.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TokenId(String);

impl TokenId {
    /// Creates a fresh random token id.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Returns the id as a string slice.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<String> for TokenId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TokenId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl fmt::Display for TokenId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

// ============================================================================
// Roles
// ============================================================================

/// Role granting full access, including note deletion.
pub const ROLE_ADMIN: &str = "admin";

/// Role granted to self-registered users.
pub const ROLE_USER: &str = "user";

/// A set of role names.
///
/// Ordered so that serialized tokens and responses are deterministic.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct RoleSet(BTreeSet<String>);

impl RoleSet {
    /// Creates an empty role set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the set contains `role`.
    pub fn contains(&self, role: &str) -> bool {
        self.0.contains(role)
    }

    /// Returns true if any of `allowed` is in the set.
    pub fn intersects(&self, allowed: &[&str]) -> bool {
        allowed.iter().any(|role| self.0.contains(*role))
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }

    /// Returns the roles as an owned vector (ordering is stable).
    #[must_use]
    pub fn to_vec(&self) -> Vec<String> {
        self.0.iter().cloned().collect()
    }
}

impl<S: Into<String>> FromIterator<S> for RoleSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self(
            iter.into_iter()
                .map(Into::into)
                .map(|r: String| r.trim().to_string())
                .filter(|r| !r.is_empty())
                .collect(),
        )
    }
}

impl From<Vec<String>> for RoleSet {
    fn from(roles: Vec<String>) -> Self {
        roles.into_iter().collect()
    }
}

impl FromStr for RoleSet {
    type Err = std::convert::Infallible;

    /// Parses a comma-separated role list ("admin, user").
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(s.split(',').collect())
    }
}

// ============================================================================
// Users
// ============================================================================

/// A registered user.
#[derive(Debug, Clone)]
pub struct User {
    pub id: UserId,
    pub username: String,
    /// PHC-formatted argon2 hash.
    pub password_hash: String,
    pub roles: RoleSet,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Refresh Records
// ============================================================================

/// Persisted lifecycle state of a refresh token.
///
/// `Expired` is not a stored state: it is derived at query time from
/// `expires_at`, see [`RefreshRecord::status`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    /// Persisted and not yet revoked.
    Issued,
    /// Exchanged for a new pair by a refresh call.
    Consumed { at: DateTime<Utc> },
    /// Revoked by logout or by the per-user cap.
    Revoked { at: DateTime<Utc> },
}

impl RefreshState {
    /// Returns the revocation timestamp, if the token left `Issued`.
    pub fn revoked_at(&self) -> Option<DateTime<Utc>> {
        match self {
            Self::Issued => None,
            Self::Consumed { at } | Self::Revoked { at } => Some(*at),
        }
    }

    pub fn is_issued(&self) -> bool {
        matches!(self, Self::Issued)
    }
}

/// Why a refresh token left the `Issued` state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RevocationReason {
    Consumed,
    Revoked,
}

impl RevocationReason {
    /// Returns the value stored in `refresh_tokens.revoke_reason`.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Consumed => "consumed",
            Self::Revoked => "revoked",
        }
    }

    /// Builds the state this reason produces at `at`.
    pub fn into_state(self, at: DateTime<Utc>) -> RefreshState {
        match self {
            Self::Consumed => RefreshState::Consumed { at },
            Self::Revoked => RefreshState::Revoked { at },
        }
    }
}

impl FromStr for RevocationReason {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "consumed" => Ok(Self::Consumed),
            "revoked" => Ok(Self::Revoked),
            other => Err(format!("unknown revoke reason: {other}")),
        }
    }
}

/// Lifecycle status of a refresh token as observed at a point in time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshStatus {
    Issued,
    Consumed,
    Revoked,
    Expired,
}

/// A persisted refresh token record.
#[derive(Debug, Clone)]
pub struct RefreshRecord {
    pub id: i64,
    pub user_id: UserId,
    pub token_id: TokenId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub state: RefreshState,
}

impl RefreshRecord {
    /// A record is valid iff it is still issued and not past its expiry.
    pub fn is_valid(&self, now: DateTime<Utc>) -> bool {
        self.state.is_issued() && self.expires_at > now
    }

    /// Status at `now`. Explicit revocation wins over expiry.
    pub fn status(&self, now: DateTime<Utc>) -> RefreshStatus {
        match self.state {
            RefreshState::Consumed { .. } => RefreshStatus::Consumed,
            RefreshState::Revoked { .. } => RefreshStatus::Revoked,
            RefreshState::Issued if self.expires_at <= now => RefreshStatus::Expired,
            RefreshState::Issued => RefreshStatus::Issued,
        }
    }
}

/// Input for persisting a new refresh record.
#[derive(Debug, Clone)]
pub struct NewRefreshRecord {
    pub user_id: UserId,
    pub token_id: TokenId,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

/// Input for creating a user. The password must already be hashed.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub password_hash: String,
    pub roles: RoleSet,
}

// ============================================================================
// Notes
// ============================================================================

/// Maximum note length in characters, after trimming.
pub const MAX_NOTE_LEN: usize = 500;

/// Default page size for note listings.
pub const DEFAULT_PAGE_LIMIT: u32 = 50;

/// Largest page size a client may request.
pub const MAX_PAGE_LIMIT: u32 = 100;

/// A single note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Note {
    pub id: NoteId,
    pub msg: String,
    pub created_at: DateTime<Utc>,
}

/// Validates and normalizes a note message.
///
/// Returns the trimmed message, or an error describing why it was rejected.
pub fn normalize_note_msg(msg: &str) -> Result<String, String> {
    let trimmed = msg.trim();
    if trimmed.is_empty() {
        return Err("msg must not be empty".to_string());
    }
    let len = trimmed.chars().count();
    if len > MAX_NOTE_LEN {
        return Err(format!(
            "msg must be at most {} characters, got {}",
            MAX_NOTE_LEN, len
        ));
    }
    Ok(trimmed.to_string())
}

/// One page of notes in descending id order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotePage {
    pub items: Vec<Note>,
    /// Cursor for the next page, present only when this page is full.
    #[serde(rename = "nextCursor")]
    pub next_cursor: Option<NoteId>,
}

impl NotePage {
    /// Builds a page from items fetched with `limit`.
    pub fn from_items(items: Vec<Note>, limit: u32) -> Self {
        let next_cursor = if !items.is_empty() && items.len() == limit as usize {
            items.last().map(|n| n.id)
        } else {
            None
        };
        Self { items, next_cursor }
    }
}

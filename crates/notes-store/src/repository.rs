//! Repository traits
//!
//! Async interfaces the rest of the workspace programs against. Both the
//! PostgreSQL [`Store`](crate::Store) and the in-memory
//! [`MemoryStore`](crate::MemoryStore) implement them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use notes_core::{
    NewRefreshRecord, NewUser, Note, NoteId, RefreshRecord, RevocationReason, TokenId, User,
    UserId,
};

use crate::error::StoreResult;

/// Persistence for users and refresh token records.
#[async_trait]
pub trait CredentialStore: Send + Sync {
    /// Find a user by username.
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>>;

    /// Create a user. Fails with `DuplicateUsername` if the name is taken.
    async fn create_user(&self, user: NewUser) -> StoreResult<User>;

    /// Persist a new refresh record in the `Issued` state.
    async fn save_refresh_record(&self, record: NewRefreshRecord) -> StoreResult<RefreshRecord>;

    /// Find a refresh record by token id, in whatever state it is.
    async fn find_refresh_record(&self, token_id: &TokenId) -> StoreResult<Option<RefreshRecord>>;

    /// Atomically move a valid record to `Consumed`.
    ///
    /// Applies only if the record is `Issued` and `expires_at > now`; returns
    /// the consumed record, or `None` if nothing was transitioned. Concurrent
    /// callers with the same token id see at most one `Some`.
    async fn consume_refresh_record(
        &self,
        token_id: &TokenId,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<RefreshRecord>>;

    /// Atomically move an `Issued` record to `Revoked`.
    ///
    /// Returns true if this call performed the transition.
    async fn revoke_refresh_record(
        &self,
        token_id: &TokenId,
        now: DateTime<Utc>,
    ) -> StoreResult<bool>;

    /// Whether the record exists, is `Issued`, and has not expired.
    async fn is_refresh_valid(&self, token_id: &TokenId, now: DateTime<Utc>) -> StoreResult<bool>;

    /// All `Issued` records of a user, newest first (`created_at` then `id`, descending).
    async fn list_active_refresh_records(&self, user_id: UserId) -> StoreResult<Vec<RefreshRecord>>;

    /// Revoke the given `Issued` records. Returns how many were transitioned.
    async fn revoke_many(
        &self,
        ids: &[i64],
        reason: RevocationReason,
        now: DateTime<Utc>,
    ) -> StoreResult<u64>;
}

/// Persistence for notes.
#[async_trait]
pub trait NoteStore: Send + Sync {
    /// Notes with id below `cursor` (all notes if `None`), newest first.
    async fn list_notes_page(&self, cursor: Option<NoteId>, limit: u32) -> StoreResult<Vec<Note>>;

    async fn get_note(&self, id: NoteId) -> StoreResult<Option<Note>>;

    async fn create_note(&self, msg: &str) -> StoreResult<Note>;

    /// Returns the updated note, or `None` if it does not exist.
    async fn update_note(&self, id: NoteId, msg: &str) -> StoreResult<Option<Note>>;

    /// Returns true if a note was deleted.
    async fn delete_note(&self, id: NoteId) -> StoreResult<bool>;
}

/// Everything the HTTP service needs from its storage backend.
#[async_trait]
pub trait Backend: CredentialStore + NoteStore {
    /// Round-trip to the backend, used by readiness checks.
    async fn ping(&self) -> StoreResult<()>;
}

//! In-memory store.
//!
//! Implements the same repository traits as the PostgreSQL store. All state
//! sits behind one async mutex, so every trait method is atomic with respect
//! to the others; in particular `consume_refresh_record` is a true
//! compare-and-set. Used by tests and by local runs without a database.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use notes_core::{
    NewRefreshRecord, NewUser, Note, NoteId, RefreshRecord, RefreshState, RevocationReason,
    TokenId, User, UserId,
};
use tokio::sync::Mutex;

use crate::error::{StoreError, StoreResult};
use crate::repository::{Backend, CredentialStore, NoteStore};

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<String, User>,
    next_user_id: i64,
    /// Keyed by token id.
    refresh: HashMap<String, RefreshRecord>,
    next_refresh_id: i64,
    notes: BTreeMap<i64, Note>,
    next_note_id: i64,
}

/// In-memory implementation of [`Backend`].
///
/// Cloning shares the underlying state.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    inner: Arc<Mutex<Inner>>,
    healthy: Arc<AtomicBool>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            inner: Arc::new(Mutex::new(Inner::default())),
            healthy: Arc::new(AtomicBool::new(true)),
        }
    }

    /// Make `ping` fail (or succeed again), for readiness tests.
    pub fn set_healthy(&self, healthy: bool) {
        self.healthy.store(healthy, Ordering::SeqCst);
    }

    /// Every refresh record of a user regardless of state, oldest first.
    pub async fn refresh_records_for(&self, user_id: UserId) -> Vec<RefreshRecord> {
        let inner = self.inner.lock().await;
        let mut records: Vec<_> = inner
            .refresh
            .values()
            .filter(|r| r.user_id == user_id)
            .cloned()
            .collect();
        records.sort_by_key(|r| (r.created_at, r.id));
        records
    }
}

fn revoke(record: &mut RefreshRecord, reason: RevocationReason, now: DateTime<Utc>) -> bool {
    if record.state.is_issued() {
        record.state = reason.into_state(now);
        true
    } else {
        false
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn find_user_by_username(&self, username: &str) -> StoreResult<Option<User>> {
        Ok(self.inner.lock().await.users.get(username).cloned())
    }

    async fn create_user(&self, user: NewUser) -> StoreResult<User> {
        let mut inner = self.inner.lock().await;
        if inner.users.contains_key(&user.username) {
            return Err(StoreError::DuplicateUsername(user.username));
        }

        inner.next_user_id += 1;
        let row = User {
            id: UserId(inner.next_user_id),
            username: user.username.clone(),
            password_hash: user.password_hash,
            roles: user.roles,
            created_at: Utc::now(),
        };
        inner.users.insert(user.username, row.clone());
        Ok(row)
    }

    async fn save_refresh_record(&self, record: NewRefreshRecord) -> StoreResult<RefreshRecord> {
        let mut inner = self.inner.lock().await;
        if inner.refresh.contains_key(record.token_id.as_str()) {
            return Err(StoreError::DuplicateTokenId(record.token_id.to_string()));
        }

        inner.next_refresh_id += 1;
        let row = RefreshRecord {
            id: inner.next_refresh_id,
            user_id: record.user_id,
            token_id: record.token_id,
            created_at: record.created_at,
            expires_at: record.expires_at,
            state: RefreshState::Issued,
        };
        inner
            .refresh
            .insert(row.token_id.as_str().to_string(), row.clone());
        Ok(row)
    }

    async fn find_refresh_record(&self, token_id: &TokenId) -> StoreResult<Option<RefreshRecord>> {
        Ok(self.inner.lock().await.refresh.get(token_id.as_str()).cloned())
    }

    async fn consume_refresh_record(
        &self,
        token_id: &TokenId,
        now: DateTime<Utc>,
    ) -> StoreResult<Option<RefreshRecord>> {
        let mut inner = self.inner.lock().await;
        let Some(record) = inner.refresh.get_mut(token_id.as_str()) else {
            return Ok(None);
        };
        if !record.is_valid(now) {
            return Ok(None);
        }
        revoke(record, RevocationReason::Consumed, now);
        Ok(Some(record.clone()))
    }

    async fn revoke_refresh_record(
        &self,
        token_id: &TokenId,
        now: DateTime<Utc>,
    ) -> StoreResult<bool> {
        let mut inner = self.inner.lock().await;
        Ok(inner
            .refresh
            .get_mut(token_id.as_str())
            .is_some_and(|record| revoke(record, RevocationReason::Revoked, now)))
    }

    async fn is_refresh_valid(&self, token_id: &TokenId, now: DateTime<Utc>) -> StoreResult<bool> {
        Ok(self
            .inner
            .lock()
            .await
            .refresh
            .get(token_id.as_str())
            .is_some_and(|r| r.is_valid(now)))
    }

    async fn list_active_refresh_records(&self, user_id: UserId) -> StoreResult<Vec<RefreshRecord>> {
        let inner = self.inner.lock().await;
        let mut records: Vec<_> = inner
            .refresh
            .values()
            .filter(|r| r.user_id == user_id && r.state.is_issued())
            .cloned()
            .collect();
        records.sort_by(|a, b| (b.created_at, b.id).cmp(&(a.created_at, a.id)));
        Ok(records)
    }

    async fn revoke_many(
        &self,
        ids: &[i64],
        reason: RevocationReason,
        now: DateTime<Utc>,
    ) -> StoreResult<u64> {
        let mut inner = self.inner.lock().await;
        let mut revoked = 0;
        for record in inner.refresh.values_mut() {
            if ids.contains(&record.id) && revoke(record, reason, now) {
                revoked += 1;
            }
        }
        Ok(revoked)
    }
}

#[async_trait]
impl NoteStore for MemoryStore {
    async fn list_notes_page(&self, cursor: Option<NoteId>, limit: u32) -> StoreResult<Vec<Note>> {
        let inner = self.inner.lock().await;
        let upper = cursor.map_or(i64::MAX, |c| c.0);
        Ok(inner
            .notes
            .range(..upper)
            .rev()
            .take(limit as usize)
            .map(|(_, note)| note.clone())
            .collect())
    }

    async fn get_note(&self, id: NoteId) -> StoreResult<Option<Note>> {
        Ok(self.inner.lock().await.notes.get(&id.0).cloned())
    }

    async fn create_note(&self, msg: &str) -> StoreResult<Note> {
        let mut inner = self.inner.lock().await;
        inner.next_note_id += 1;
        let note = Note {
            id: NoteId(inner.next_note_id),
            msg: msg.to_string(),
            created_at: Utc::now(),
        };
        inner.notes.insert(note.id.0, note.clone());
        Ok(note)
    }

    async fn update_note(&self, id: NoteId, msg: &str) -> StoreResult<Option<Note>> {
        let mut inner = self.inner.lock().await;
        Ok(inner.notes.get_mut(&id.0).map(|note| {
            note.msg = msg.to_string();
            note.clone()
        }))
    }

    async fn delete_note(&self, id: NoteId) -> StoreResult<bool> {
        Ok(self.inner.lock().await.notes.remove(&id.0).is_some())
    }
}

#[async_trait]
impl Backend for MemoryStore {
    async fn ping(&self) -> StoreResult<()> {
        if self.healthy.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StoreError::Database(sqlx::Error::PoolClosed))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use notes_core::RoleSet;

    async fn user(store: &MemoryStore, name: &str) -> User {
        store
            .create_user(NewUser {
                username: name.to_string(),
                password_hash: "hash".to_string(),
                roles: "user".parse::<RoleSet>().unwrap(),
            })
            .await
            .unwrap()
    }

    async fn issue(store: &MemoryStore, user_id: UserId, created_at: DateTime<Utc>) -> RefreshRecord {
        store
            .save_refresh_record(NewRefreshRecord {
                user_id,
                token_id: TokenId::generate(),
                created_at,
                expires_at: created_at + Duration::days(7),
            })
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_duplicate_username_rejected() {
        let store = MemoryStore::new();
        user(&store, "alice").await;
        let err = store
            .create_user(NewUser {
                username: "alice".to_string(),
                password_hash: "x".to_string(),
                roles: RoleSet::new(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::DuplicateUsername(name) if name == "alice"));
    }

    #[tokio::test]
    async fn test_consume_is_single_use() {
        let store = MemoryStore::new();
        let alice = user(&store, "alice").await;
        let now = Utc::now();
        let record = issue(&store, alice.id, now).await;

        let first = store.consume_refresh_record(&record.token_id, now).await.unwrap();
        assert!(matches!(first.map(|r| r.state), Some(RefreshState::Consumed { .. })));

        let second = store.consume_refresh_record(&record.token_id, now).await.unwrap();
        assert!(second.is_none());
        assert!(!store.is_refresh_valid(&record.token_id, now).await.unwrap());
    }

    #[tokio::test]
    async fn test_consume_rejects_expired_record() {
        let store = MemoryStore::new();
        let alice = user(&store, "alice").await;
        let now = Utc::now();
        let record = issue(&store, alice.id, now).await;

        let later = now + Duration::days(8);
        assert!(store.consume_refresh_record(&record.token_id, later).await.unwrap().is_none());
        // Still issued: expiry is a query-time predicate, not a transition.
        let stored = store.find_refresh_record(&record.token_id).await.unwrap().unwrap();
        assert_eq!(stored.state, RefreshState::Issued);
    }

    #[tokio::test]
    async fn test_revoke_is_idempotent() {
        let store = MemoryStore::new();
        let alice = user(&store, "alice").await;
        let now = Utc::now();
        let record = issue(&store, alice.id, now).await;

        assert!(store.revoke_refresh_record(&record.token_id, now).await.unwrap());
        assert!(!store.revoke_refresh_record(&record.token_id, now).await.unwrap());
        assert!(!store.revoke_refresh_record(&TokenId::from("missing"), now).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_active_orders_newest_first() {
        let store = MemoryStore::new();
        let alice = user(&store, "alice").await;
        let now = Utc::now();
        let old = issue(&store, alice.id, now - Duration::minutes(2)).await;
        let mid = issue(&store, alice.id, now - Duration::minutes(1)).await;
        let new = issue(&store, alice.id, now).await;
        store.revoke_refresh_record(&mid.token_id, now).await.unwrap();

        let active = store.list_active_refresh_records(alice.id).await.unwrap();
        let ids: Vec<_> = active.iter().map(|r| r.id).collect();
        assert_eq!(ids, vec![new.id, old.id]);
    }

    #[tokio::test]
    async fn test_revoke_many_skips_already_revoked() {
        let store = MemoryStore::new();
        let alice = user(&store, "alice").await;
        let now = Utc::now();
        let a = issue(&store, alice.id, now).await;
        let b = issue(&store, alice.id, now).await;
        store.revoke_refresh_record(&a.token_id, now).await.unwrap();

        let n = store
            .revoke_many(&[a.id, b.id], RevocationReason::Revoked, now)
            .await
            .unwrap();
        assert_eq!(n, 1);
    }

    #[tokio::test]
    async fn test_notes_pagination() {
        let store = MemoryStore::new();
        for i in 0..5 {
            store.create_note(&format!("note {i}")).await.unwrap();
        }

        let first = store.list_notes_page(None, 2).await.unwrap();
        let ids: Vec<_> = first.iter().map(|n| n.id.0).collect();
        assert_eq!(ids, vec![5, 4]);

        let second = store.list_notes_page(Some(NoteId(4)), 2).await.unwrap();
        let ids: Vec<_> = second.iter().map(|n| n.id.0).collect();
        assert_eq!(ids, vec![3, 2]);

        let last = store.list_notes_page(Some(NoteId(2)), 2).await.unwrap();
        assert_eq!(last.len(), 1);
    }

    #[tokio::test]
    async fn test_note_update_and_delete() {
        let store = MemoryStore::new();
        let note = store.create_note("first").await.unwrap();

        let updated = store.update_note(note.id, "second").await.unwrap().unwrap();
        assert_eq!(updated.msg, "second");
        assert!(store.update_note(NoteId(99), "x").await.unwrap().is_none());

        assert!(store.delete_note(note.id).await.unwrap());
        assert!(!store.delete_note(note.id).await.unwrap());
        assert!(store.get_note(note.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_ping_follows_health_flag() {
        let store = MemoryStore::new();
        assert!(store.ping().await.is_ok());
        store.set_healthy(false);
        assert!(store.ping().await.is_err());
    }
}

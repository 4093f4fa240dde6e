//! Error types for the storage layer.

use thiserror::Error;

/// Result type alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database connection or query error.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A user with this username already exists.
    #[error("username already taken: {0}")]
    DuplicateUsername(String),

    /// A refresh record with this token id already exists.
    #[error("duplicate refresh token id: {0}")]
    DuplicateTokenId(String),

    /// A stored row could not be mapped to a domain type.
    #[error("corrupt row in {table}: {reason}")]
    CorruptRow { table: &'static str, reason: String },

    /// Migration error.
    #[error("migration error: {0}")]
    MigrationError(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    ConfigError(String),
}

impl StoreError {
    /// Maps a unique-constraint violation to `on_unique`, anything else to `Database`.
    pub(crate) fn from_insert(err: sqlx::Error, on_unique: impl FnOnce() -> StoreError) -> Self {
        match &err {
            sqlx::Error::Database(db) if db.is_unique_violation() => on_unique(),
            _ => StoreError::Database(err),
        }
    }
}

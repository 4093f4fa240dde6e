//! notes-store: Storage layer for the notes API
//!
//! This crate provides:
//! - The `CredentialStore` and `NoteStore` repository traits
//! - A PostgreSQL implementation (`Store`) issuing parameterized SQL via sqlx
//! - An in-memory implementation (`MemoryStore`) for tests and local runs
//! - Embedded, idempotent migrations
//!
//! # Usage
//!
//! ```rust,ignore
//! use notes_store::{CredentialStore, Store, StoreConfig};
//!
//! let config = StoreConfig::from_env()?;
//! let store = Store::connect(config).await?;
//!
//! let user = store.find_user_by_username("admin").await?;
//! ```

pub mod error;
pub mod memory;
pub mod models;
pub mod repository;
pub mod schema;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use memory::MemoryStore;
pub use repository::{Backend, CredentialStore, NoteStore};
pub use store::{Store, StoreConfig};

// Re-export notes-core for downstream crates
pub use notes_core;

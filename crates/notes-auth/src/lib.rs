//! Authentication token lifecycle for the notes API.
//!
//! This crate provides:
//! - HS256 access and refresh tokens signed with separate secrets (`TokenKeys`)
//! - Argon2id password hashing (`PasswordHasher`)
//! - Login, refresh rotation, logout and the per-user refresh cap (`SessionManager`)

pub mod config;
pub mod error;
pub mod password;
pub mod session;
pub mod token;

pub use config::{AuthConfig, parse_ttl};
pub use error::{AuthError, AuthResult};
pub use password::PasswordHasher;
pub use session::{SessionManager, TokenPair};
pub use token::{AccessClaims, RefreshClaims, TokenKeys, TokenKind};

//! notes-core: domain types for the notes API.
//!
//! This crate provides:
//! - Identifier newtypes (`UserId`, `NoteId`, `TokenId`)
//! - The role model (`RoleSet`)
//! - The refresh token state machine (`RefreshState`, `RefreshRecord`)
//! - The notes resource (`Note`, `NotePage`)
//!
//! It has no I/O; storage and HTTP live in `notes-store` and `notes-server`.

pub mod types;

pub use types::*;

//! Schema definitions and migration utilities.
//!
//! This module provides embedded SQL schema definitions and utilities
//! for managing database migrations.

use sqlx::PgPool;

use crate::error::{StoreError, StoreResult};

/// Embedded migration SQL for users and refresh tokens (001_users.sql).
pub const USERS_MIGRATION: &str = include_str!("../../../migrations/001_users.sql");

/// Embedded migration SQL for the notes table (002_notes.sql).
pub const NOTES_MIGRATION: &str = include_str!("../../../migrations/002_notes.sql");

/// Run all migrations against the database.
///
/// This function is idempotent - it can be run multiple times safely.
/// Migrations check for existing objects before creating them.
pub async fn run_migrations(pool: &PgPool) -> StoreResult<()> {
    tracing::info!("Running database migrations...");

    tracing::debug!("Running users migration (001_users.sql)...");
    sqlx::raw_sql(USERS_MIGRATION)
        .execute(pool)
        .await
        .map_err(|e| StoreError::MigrationError(format!("Users migration failed: {}", e)))?;

    tracing::debug!("Running notes migration (002_notes.sql)...");
    sqlx::raw_sql(NOTES_MIGRATION)
        .execute(pool)
        .await
        .map_err(|e| StoreError::MigrationError(format!("Notes migration failed: {}", e)))?;

    tracing::info!("Migrations completed successfully");
    Ok(())
}

/// Get the current schema version by checking which tables exist.
///
/// Returns:
/// - 0: No tables exist
/// - 1: Users and refresh tokens exist (001_users.sql)
/// - 2: Notes table exists (002_notes.sql)
pub async fn get_schema_version(pool: &PgPool) -> StoreResult<u32> {
    let mut version = 0;
    for (table, at_least) in [("refresh_tokens", 1), ("notes", 2)] {
        let exists: (bool,) = sqlx::query_as(
            r#"
            SELECT EXISTS (
                SELECT FROM information_schema.tables
                WHERE table_schema = 'public'
                AND table_name = $1
            )
            "#,
        )
        .bind(table)
        .fetch_one(pool)
        .await?;

        if !exists.0 {
            break;
        }
        version = at_least;
    }
    Ok(version)
}

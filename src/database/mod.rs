// ABOUTME: SQLite credential store: connection pool, schema migration and shared row helpers
// ABOUTME: Holds clients, authorization codes, token pairs and consents
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Database Management
//!
//! Durable storage for the authorization server. Each table gets its own
//! `impl Database` block in a sibling module; [`repositories`] exposes the
//! whole surface behind the [`CredentialStore`] trait the engine depends on.
//!
//! Timestamps are stored as Unix seconds and user ids as UUID text.

mod oauth2_clients;
mod oauth2_codes;
mod oauth2_consents;
mod oauth2_tokens;

/// Repository trait and its `SQLite` implementation
pub mod repositories;
/// RAII transaction guard
pub mod transactions;

pub use repositories::{
    ClientAuthorizationRevocation, CredentialStore, OAuth2RepositoryImpl, TokenRotation,
};

use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::{Pool, Sqlite};
use std::str::FromStr;
use tracing::info;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use transactions::SqliteTransactionGuard;

/// Database manager for OAuth 2.0 server storage
#[derive(Clone)]
pub struct Database {
    pool: Pool<Sqlite>,
}

impl Database {
    /// Open (creating if missing) the database and run migrations
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid, the connection fails or a
    /// migration statement fails
    pub async fn new(database_url: &str, max_connections: u32) -> AppResult<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .map_err(|e| AppError::config(format!("Invalid DATABASE_URL: {e}")))?
            .create_if_missing(true)
            .foreign_keys(true);

        let mut pool_options = SqlitePoolOptions::new().max_connections(max_connections.max(1));
        if database_url.contains(":memory:") {
            // An in-memory database lives exactly as long as its connection
            pool_options = pool_options.idle_timeout(None).max_lifetime(None);
        }

        let pool = pool_options
            .connect_with(options)
            .await
            .map_err(|e| AppError::database(format!("Failed to connect to database: {e}")))?;

        let db = Self { pool };
        db.migrate().await?;

        info!(max_connections, "Credential store ready");
        Ok(db)
    }

    /// Get a reference to the database pool for advanced operations
    #[must_use]
    pub const fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }

    /// Run database migrations
    ///
    /// # Errors
    ///
    /// Returns an error if a schema statement fails
    pub async fn migrate(&self) -> AppResult<()> {
        self.migrate_oauth2_clients().await?;
        self.migrate_oauth2_codes().await?;
        self.migrate_oauth2_tokens().await?;
        self.migrate_oauth2_consents().await?;
        Ok(())
    }

    /// Begin a transaction wrapped in a rollback-on-drop guard
    pub(crate) async fn begin(&self) -> AppResult<SqliteTransactionGuard<'static>> {
        let tx = self
            .pool
            .begin()
            .await
            .map_err(|e| AppError::database(format!("Failed to begin transaction: {e}")))?;
        Ok(SqliteTransactionGuard::new(tx))
    }

    async fn execute_schema(&self, statements: &[&str]) -> AppResult<()> {
        for statement in statements {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .map_err(|e| AppError::database(format!("Migration failed: {e}")))?;
        }
        Ok(())
    }
}

/// Convert a stored Unix timestamp
pub(crate) fn from_unix(seconds: i64) -> AppResult<DateTime<Utc>> {
    DateTime::from_timestamp(seconds, 0)
        .ok_or_else(|| AppError::internal(format!("Invalid stored timestamp: {seconds}")))
}

/// Parse a stored user id
pub(crate) fn parse_user_id(value: &str) -> AppResult<Uuid> {
    Uuid::parse_str(value)
        .map_err(|e| AppError::internal(format!("Failed to parse user_id UUID: {e}")))
}

/// Fail a mutation when no row was touched
///
/// Ownership-checked writes return `false` instead; this is for writes where
/// zero rows means the store is inconsistent.
pub(crate) fn expect_rows(rows_affected: u64, operation: &str) -> AppResult<()> {
    if rows_affected == 0 {
        return Err(AppError::database(format!("{operation} affected no rows")));
    }
    Ok(())
}

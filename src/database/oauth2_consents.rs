// ABOUTME: Consent table: one row per (user, client) with upsert semantics
// ABOUTME: Re-approval overwrites the stored scope instead of appending
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::{DateTime, Utc};
use sqlx::{Executor, Row, Sqlite};
use uuid::Uuid;

use super::{from_unix, Database};
use crate::errors::{AppError, AppResult};
use crate::models::{OAuth2Consent, Scope};

impl Database {
    pub(super) async fn migrate_oauth2_consents(&self) -> AppResult<()> {
        self.execute_schema(&[r"
            CREATE TABLE IF NOT EXISTS oauth2_consents (
                user_id TEXT NOT NULL,
                client_id INTEGER NOT NULL REFERENCES oauth2_clients(id) ON DELETE CASCADE,
                scope TEXT NOT NULL,
                updated_at INTEGER NOT NULL,
                PRIMARY KEY (user_id, client_id)
            )
            "])
        .await
    }

    /// Create or overwrite the consent for a (user, client) pair
    ///
    /// # Errors
    ///
    /// Returns an error if the upsert fails
    pub async fn upsert_oauth2_consent(
        &self,
        user_id: Uuid,
        client_id: i64,
        scope: &Scope,
    ) -> AppResult<()> {
        upsert_consent_with(&self.pool, user_id, client_id, scope, Utc::now()).await
    }

    /// Get the consent for a (user, client) pair
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_oauth2_consent(
        &self,
        user_id: Uuid,
        client_id: i64,
    ) -> AppResult<Option<OAuth2Consent>> {
        let row = sqlx::query(
            "SELECT scope, updated_at FROM oauth2_consents WHERE user_id = ? AND client_id = ?",
        )
        .bind(user_id.to_string())
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get OAuth2 consent: {e}")))?;

        row.map(|row| {
            let scope: String = row.get("scope");
            Ok(OAuth2Consent {
                user_id,
                client_id,
                scope: Scope::from_storage(&scope),
                updated_at: from_unix(row.get("updated_at"))?,
            })
        })
        .transpose()
    }

    /// Delete the consent for a (user, client) pair
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails
    pub async fn delete_oauth2_consent(&self, user_id: Uuid, client_id: i64) -> AppResult<bool> {
        delete_consent_with(&self.pool, user_id, client_id).await
    }
}

pub(super) async fn upsert_consent_with<'e, E>(
    executor: E,
    user_id: Uuid,
    client_id: i64,
    scope: &Scope,
    now: DateTime<Utc>,
) -> AppResult<()>
where
    E: Executor<'e, Database = Sqlite>,
{
    sqlx::query(
        r"
        INSERT INTO oauth2_consents (user_id, client_id, scope, updated_at)
        VALUES (?, ?, ?, ?)
        ON CONFLICT(user_id, client_id) DO UPDATE SET
            scope = excluded.scope,
            updated_at = excluded.updated_at
        ",
    )
    .bind(user_id.to_string())
    .bind(client_id)
    .bind(scope.to_storage())
    .bind(now.timestamp())
    .execute(executor)
    .await
    .map_err(|e| AppError::database(format!("Failed to upsert OAuth2 consent: {e}")))?;

    Ok(())
}

pub(super) async fn delete_consent_with<'e, E>(
    executor: E,
    user_id: Uuid,
    client_id: i64,
) -> AppResult<bool>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query("DELETE FROM oauth2_consents WHERE user_id = ? AND client_id = ?")
        .bind(user_id.to_string())
        .bind(client_id)
        .execute(executor)
        .await
        .map_err(|e| AppError::database(format!("Failed to delete OAuth2 consent: {e}")))?;

    Ok(result.rows_affected() > 0)
}

// ABOUTME: Authorization code table: replace-live issuance, lookup, invalidation and redemption
// ABOUTME: A code whose expires_at is in the past is consumed, replaced or invalidated
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite};
use tracing::debug;
use uuid::Uuid;

use super::oauth2_consents::upsert_consent_with;
use super::oauth2_tokens::insert_token_pair_with;
use super::{from_unix, parse_user_id, Database};
use crate::errors::{AppError, AppResult};
use crate::models::{
    NewAuthorizationCode, OAuth2AuthorizationCode, OAuth2Token, Scope, TokenPairHashes,
};

impl Database {
    pub(super) async fn migrate_oauth2_codes(&self) -> AppResult<()> {
        self.execute_schema(&[
            r"
            CREATE TABLE IF NOT EXISTS oauth2_codes (
                code_hash TEXT PRIMARY KEY,
                client_id INTEGER NOT NULL REFERENCES oauth2_clients(id) ON DELETE CASCADE,
                user_id TEXT NOT NULL,
                scope TEXT NOT NULL,
                redirect_uri TEXT NOT NULL,
                expires_at INTEGER NOT NULL
            )
            ",
            "CREATE INDEX IF NOT EXISTS idx_oauth2_codes_client_user ON oauth2_codes(client_id, user_id)",
            "CREATE INDEX IF NOT EXISTS idx_oauth2_codes_expires_at ON oauth2_codes(expires_at)",
        ])
        .await
    }

    /// Record consent and replace any code for the (client, user) pair, atomically
    ///
    /// # Errors
    ///
    /// Returns an error if any statement or the commit fails; nothing is applied then
    pub async fn replace_live_authorization_code(
        &self,
        code: &NewAuthorizationCode,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut guard = self.begin().await?;

        upsert_consent_with(
            guard.executor()?,
            code.user_id,
            code.client_id,
            &code.scope,
            now,
        )
        .await?;

        let replaced = sqlx::query("DELETE FROM oauth2_codes WHERE client_id = ? AND user_id = ?")
            .bind(code.client_id)
            .bind(code.user_id.to_string())
            .execute(guard.executor()?)
            .await
            .map_err(|e| AppError::database(format!("Failed to replace authorization code: {e}")))?
            .rows_affected();

        sqlx::query(
            r"
            INSERT INTO oauth2_codes (code_hash, client_id, user_id, scope, redirect_uri, expires_at)
            VALUES (?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&code.code_hash)
        .bind(code.client_id)
        .bind(code.user_id.to_string())
        .bind(code.scope.to_storage())
        .bind(&code.redirect_uri)
        .bind(code.expires_at.timestamp())
        .execute(guard.executor()?)
        .await
        .map_err(|e| AppError::database(format!("Failed to store authorization code: {e}")))?;

        guard.commit().await?;

        debug!(
            client_id = code.client_id,
            user_id = %code.user_id,
            replaced,
            "Authorization code stored"
        );
        Ok(())
    }

    /// Look a code up by digest; expired rows only when `include_expired`
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_authorization_code(
        &self,
        code_hash: &str,
        include_expired: bool,
        now: DateTime<Utc>,
    ) -> AppResult<Option<OAuth2AuthorizationCode>> {
        find_code_with(&self.pool, code_hash, include_expired, now).await
    }

    /// Move a code's expiry into the past; idempotent
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails
    pub async fn invalidate_authorization_code(
        &self,
        code_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        sqlx::query("UPDATE oauth2_codes SET expires_at = MIN(expires_at, ?) WHERE code_hash = ?")
            .bind(now.timestamp() - 1)
            .bind(code_hash)
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::database(format!("Failed to invalidate authorization code: {e}"))
            })?;
        Ok(())
    }

    /// Consume a live code and insert the token pair it grants, atomically
    ///
    /// Returns `None` when the code is no longer live, including when a
    /// concurrent redemption consumed it first. Client, user and scope of the
    /// new pair come from the stored code.
    ///
    /// # Errors
    ///
    /// Returns an error if a statement or the commit fails; the code stays
    /// unconsumed and no token exists in that case
    pub async fn redeem_authorization_code(
        &self,
        code_hash: &str,
        pair: &TokenPairHashes,
        now: DateTime<Utc>,
    ) -> AppResult<Option<OAuth2Token>> {
        let mut guard = self.begin().await?;

        let consumed = sqlx::query(
            "UPDATE oauth2_codes SET expires_at = ? WHERE code_hash = ? AND expires_at > ?",
        )
        .bind(now.timestamp() - 1)
        .bind(code_hash)
        .bind(now.timestamp())
        .execute(guard.executor()?)
        .await
        .map_err(|e| AppError::database(format!("Failed to consume authorization code: {e}")))?
        .rows_affected();

        if consumed == 0 {
            guard.rollback().await?;
            return Ok(None);
        }

        let Some(code) = find_code_with(guard.executor()?, code_hash, true, now).await? else {
            guard.rollback().await?;
            return Ok(None);
        };

        let token = insert_token_pair_with(
            guard.executor()?,
            code.client_id,
            code.user_id,
            pair,
            &code.scope,
        )
        .await?;

        guard.commit().await?;
        Ok(Some(token))
    }

    /// Physically delete codes past their expiry
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails
    pub async fn purge_expired_authorization_codes(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM oauth2_codes WHERE expires_at <= ?")
            .bind(now.timestamp())
            .execute(&self.pool)
            .await
            .map_err(|e| {
                AppError::database(format!("Failed to purge expired authorization codes: {e}"))
            })?;

        Ok(result.rows_affected())
    }
}

/// Invalidate every live code for a (client, user) pair
pub(super) async fn invalidate_codes_for_pair_with<'e, E>(
    executor: E,
    client_id: i64,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> AppResult<u64>
where
    E: Executor<'e, Database = Sqlite>,
{
    let result = sqlx::query(
        "UPDATE oauth2_codes SET expires_at = ? WHERE client_id = ? AND user_id = ? AND expires_at > ?",
    )
    .bind(now.timestamp() - 1)
    .bind(client_id)
    .bind(user_id.to_string())
    .bind(now.timestamp())
    .execute(executor)
    .await
    .map_err(|e| AppError::database(format!("Failed to invalidate authorization codes: {e}")))?;

    Ok(result.rows_affected())
}

async fn find_code_with<'e, E>(
    executor: E,
    code_hash: &str,
    include_expired: bool,
    now: DateTime<Utc>,
) -> AppResult<Option<OAuth2AuthorizationCode>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(
        r"
        SELECT c.code_hash, c.client_id, cl.client_id AS client_public_id, c.user_id,
               c.scope, c.redirect_uri, c.expires_at
        FROM oauth2_codes c
        JOIN oauth2_clients cl ON cl.id = c.client_id
        WHERE c.code_hash = ? AND (? OR c.expires_at > ?)
        ",
    )
    .bind(code_hash)
    .bind(include_expired)
    .bind(now.timestamp())
    .fetch_optional(executor)
    .await
    .map_err(|e| AppError::database(format!("Failed to get authorization code: {e}")))?;

    row.as_ref().map(row_to_code).transpose()
}

fn row_to_code(row: &SqliteRow) -> AppResult<OAuth2AuthorizationCode> {
    let user_id: String = row.get("user_id");
    let scope: String = row.get("scope");

    Ok(OAuth2AuthorizationCode {
        code_hash: row.get("code_hash"),
        client_id: row.get("client_id"),
        client_public_id: row.get("client_public_id"),
        user_id: parse_user_id(&user_id)?,
        scope: Scope::from_storage(&scope),
        redirect_uri: row.get("redirect_uri"),
        expires_at: from_unix(row.get("expires_at"))?,
    })
}

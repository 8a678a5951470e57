// ABOUTME: Token pair table: issuance, lookup by digest, rotation, revocation and purging
// ABOUTME: Revocation flips an irreversible flag; lookups never return revoked rows
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::{DateTime, Utc};
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqliteConnection};
use tracing::{debug, info};
use uuid::Uuid;

use super::oauth2_codes::invalidate_codes_for_pair_with;
use super::oauth2_consents::delete_consent_with;
use super::repositories::{ClientAuthorizationRevocation, TokenRotation};
use super::{expect_rows, from_unix, parse_user_id, Database};
use crate::errors::{AppError, AppResult};
use crate::models::{OAuth2Token, Scope, TokenPairHashes};

const TOKEN_COLUMNS: &str = "t.id, t.access_token_hash, t.access_token_expires_at, \
     t.refresh_token_hash, t.scope, t.client_id, cl.client_id AS client_public_id, \
     t.user_id, t.revoked";

impl Database {
    pub(super) async fn migrate_oauth2_tokens(&self) -> AppResult<()> {
        self.execute_schema(&[
            r"
            CREATE TABLE IF NOT EXISTS oauth2_tokens (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                access_token_hash TEXT NOT NULL UNIQUE,
                access_token_expires_at INTEGER NOT NULL,
                refresh_token_hash TEXT NOT NULL UNIQUE,
                scope TEXT NOT NULL,
                client_id INTEGER NOT NULL REFERENCES oauth2_clients(id) ON DELETE CASCADE,
                user_id TEXT NOT NULL,
                revoked INTEGER NOT NULL DEFAULT 0
            )
            ",
            "CREATE INDEX IF NOT EXISTS idx_oauth2_tokens_client_user ON oauth2_tokens(client_id, user_id)",
            "CREATE INDEX IF NOT EXISTS idx_oauth2_tokens_revoked ON oauth2_tokens(revoked)",
            "CREATE INDEX IF NOT EXISTS idx_oauth2_tokens_expires_at ON oauth2_tokens(access_token_expires_at)",
        ])
        .await
    }

    /// Store a new access/refresh pair
    ///
    /// # Errors
    ///
    /// Returns an error if the client does not exist or the insert fails
    pub async fn insert_oauth2_token_pair(
        &self,
        client_id: i64,
        user_id: Uuid,
        pair: &TokenPairHashes,
        scope: &Scope,
    ) -> AppResult<OAuth2Token> {
        let mut guard = self.begin().await?;
        let token =
            insert_token_pair_with(guard.executor()?, client_id, user_id, pair, scope).await?;
        guard.commit().await?;
        Ok(token)
    }

    /// Unrevoked pair whose access token has this digest
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_oauth2_token_by_access_hash(
        &self,
        access_token_hash: &str,
    ) -> AppResult<Option<OAuth2Token>> {
        find_active_token_with(&self.pool, "access_token_hash", access_token_hash).await
    }

    /// Unrevoked pair whose refresh token has this digest
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_oauth2_token_by_refresh_hash(
        &self,
        refresh_token_hash: &str,
    ) -> AppResult<Option<OAuth2Token>> {
        find_active_token_with(&self.pool, "refresh_token_hash", refresh_token_hash).await
    }

    /// Revoke the pair holding `old_refresh_hash` and insert its successor, atomically
    ///
    /// The successor inherits client and user from the old pair. Returns
    /// `None` when the old pair is gone or was revoked concurrently.
    ///
    /// # Errors
    ///
    /// Returns an error if a statement or the commit fails; nothing is applied then
    pub async fn rotate_oauth2_token_pair(
        &self,
        old_refresh_hash: &str,
        pair: &TokenPairHashes,
        scope: &Scope,
    ) -> AppResult<Option<TokenRotation>> {
        let mut guard = self.begin().await?;

        // Writing first takes the write lock, so a concurrent rotation of the
        // same pair waits and then finds it already revoked
        let revoked_id: Option<i64> = sqlx::query_scalar(
            "UPDATE oauth2_tokens SET revoked = 1 \
             WHERE refresh_token_hash = ? AND revoked = 0 RETURNING id",
        )
        .bind(old_refresh_hash)
        .fetch_optional(guard.executor()?)
        .await
        .map_err(|e| AppError::database(format!("Failed to revoke rotated token pair: {e}")))?;

        let Some(revoked_id) = revoked_id else {
            guard.rollback().await?;
            return Ok(None);
        };
        let old = find_token_by_id_with(guard.executor()?, revoked_id).await?;

        let issued =
            insert_token_pair_with(guard.executor()?, old.client_id, old.user_id, pair, scope)
                .await?;
        guard.commit().await?;

        debug!(
            client_id = old.client_id,
            user_id = %old.user_id,
            "Token pair rotated"
        );
        Ok(Some(TokenRotation {
            revoked: old,
            issued,
        }))
    }

    /// Revoke every live pair of a client, optionally only for one user
    ///
    /// # Errors
    ///
    /// Returns an error if a statement or the commit fails
    pub async fn revoke_oauth2_tokens_for_client(
        &self,
        client_id: i64,
        user_id: Option<Uuid>,
    ) -> AppResult<Vec<OAuth2Token>> {
        let mut guard = self.begin().await?;
        let revoked = revoke_tokens_with(guard.executor()?, client_id, user_id).await?;
        guard.commit().await?;

        info!(
            client_id,
            user_id = ?user_id,
            count = revoked.len(),
            "OAuth2 tokens revoked for client"
        );
        Ok(revoked)
    }

    /// Withdraw a user's authorization of a client, atomically
    ///
    /// Revokes the pair's tokens, invalidates its live codes and deletes the
    /// consent row.
    ///
    /// # Errors
    ///
    /// Returns an error if a statement or the commit fails; nothing is applied then
    pub async fn revoke_oauth2_client_authorization(
        &self,
        client_id: i64,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<ClientAuthorizationRevocation> {
        let mut guard = self.begin().await?;

        let revoked_tokens = revoke_tokens_with(guard.executor()?, client_id, Some(user_id)).await?;
        let invalidated_codes =
            invalidate_codes_for_pair_with(guard.executor()?, client_id, user_id, now).await?;
        let consent_removed = delete_consent_with(guard.executor()?, user_id, client_id).await?;

        guard.commit().await?;

        info!(
            client_id,
            user_id = %user_id,
            tokens = revoked_tokens.len(),
            codes = invalidated_codes,
            consent_removed,
            "OAuth2 client authorization revoked"
        );
        Ok(ClientAuthorizationRevocation {
            revoked_tokens,
            invalidated_codes,
            consent_removed,
        })
    }

    /// Physically delete pairs whose access token has expired
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails
    pub async fn purge_expired_oauth2_tokens(&self, now: DateTime<Utc>) -> AppResult<u64> {
        let result = sqlx::query("DELETE FROM oauth2_tokens WHERE access_token_expires_at <= ?")
            .bind(now.timestamp())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to purge expired tokens: {e}")))?;

        Ok(result.rows_affected())
    }

    /// Access and refresh digests of every revoked pair still stored
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn list_revoked_oauth2_token_hashes(&self) -> AppResult<Vec<String>> {
        let rows = sqlx::query(
            "SELECT access_token_hash, refresh_token_hash FROM oauth2_tokens WHERE revoked = 1",
        )
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list revoked tokens: {e}")))?;

        Ok(rows
            .iter()
            .flat_map(|row| {
                [
                    row.get::<String, _>("access_token_hash"),
                    row.get::<String, _>("refresh_token_hash"),
                ]
            })
            .collect())
    }
}

/// Insert a pair on `conn` and read it back with its client's public id
pub(super) async fn insert_token_pair_with(
    conn: &mut SqliteConnection,
    client_id: i64,
    user_id: Uuid,
    pair: &TokenPairHashes,
    scope: &Scope,
) -> AppResult<OAuth2Token> {
    let result = sqlx::query(
        r"
        INSERT INTO oauth2_tokens (
            access_token_hash, access_token_expires_at, refresh_token_hash,
            scope, client_id, user_id, revoked
        ) VALUES (?, ?, ?, ?, ?, ?, 0)
        ",
    )
    .bind(&pair.access_token_hash)
    .bind(pair.access_token_expires_at.timestamp())
    .bind(&pair.refresh_token_hash)
    .bind(scope.to_storage())
    .bind(client_id)
    .bind(user_id.to_string())
    .execute(&mut *conn)
    .await
    .map_err(|e| AppError::database(format!("Failed to store token pair: {e}")))?;
    expect_rows(result.rows_affected(), "Insert token pair")?;

    find_token_by_id_with(conn, result.last_insert_rowid()).await
}

async fn find_token_by_id_with(conn: &mut SqliteConnection, id: i64) -> AppResult<OAuth2Token> {
    let row = sqlx::query(&format!(
        "SELECT {TOKEN_COLUMNS} FROM oauth2_tokens t \
         JOIN oauth2_clients cl ON cl.id = t.client_id WHERE t.id = ?"
    ))
    .bind(id)
    .fetch_one(&mut *conn)
    .await
    .map_err(|e| AppError::database(format!("Failed to read back token pair: {e}")))?;

    row_to_token(&row)
}

async fn find_active_token_with<'e, E>(
    executor: E,
    hash_column: &str,
    hash: &str,
) -> AppResult<Option<OAuth2Token>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row = sqlx::query(&format!(
        "SELECT {TOKEN_COLUMNS} FROM oauth2_tokens t \
         JOIN oauth2_clients cl ON cl.id = t.client_id \
         WHERE t.{hash_column} = ? AND t.revoked = 0"
    ))
    .bind(hash)
    .fetch_optional(executor)
    .await
    .map_err(|e| AppError::database(format!("Failed to get token pair: {e}")))?;

    row.as_ref().map(row_to_token).transpose()
}

async fn revoke_tokens_with(
    conn: &mut SqliteConnection,
    client_id: i64,
    user_id: Option<Uuid>,
) -> AppResult<Vec<OAuth2Token>> {
    let user = user_id.map(|id| id.to_string());

    let revoked_ids: Vec<i64> = sqlx::query_scalar(
        "UPDATE oauth2_tokens SET revoked = 1 \
         WHERE client_id = ? AND (? IS NULL OR user_id = ?) AND revoked = 0 RETURNING id",
    )
    .bind(client_id)
    .bind(&user)
    .bind(&user)
    .fetch_all(&mut *conn)
    .await
    .map_err(|e| AppError::database(format!("Failed to revoke tokens: {e}")))?;

    let mut revoked = Vec::with_capacity(revoked_ids.len());
    for id in revoked_ids {
        revoked.push(find_token_by_id_with(&mut *conn, id).await?);
    }
    Ok(revoked)
}

fn row_to_token(row: &SqliteRow) -> AppResult<OAuth2Token> {
    let scope: String = row.get("scope");
    let user_id: String = row.get("user_id");

    Ok(OAuth2Token {
        id: row.get("id"),
        access_token_hash: row.get("access_token_hash"),
        access_token_expires_at: from_unix(row.get("access_token_expires_at"))?,
        refresh_token_hash: row.get("refresh_token_hash"),
        scope: Scope::from_storage(&scope),
        client_id: row.get("client_id"),
        client_public_id: row.get("client_public_id"),
        user_id: parse_user_id(&user_id)?,
        revoked: row.get("revoked"),
    })
}

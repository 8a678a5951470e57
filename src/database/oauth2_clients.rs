// ABOUTME: OAuth 2.0 client table: registration, lookup, owner-checked updates and listing
// ABOUTME: Only the SHA-256 digest of a client secret is ever written
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::Utc;
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use uuid::Uuid;

use super::{expect_rows, from_unix, parse_user_id, Database};
use crate::errors::{AppError, AppResult};
use crate::models::{ClientListing, GrantType, NewOAuth2Client, OAuth2Client};

const CLIENT_COLUMNS: &str = "cl.id, cl.client_id, cl.name, cl.description, cl.logo_url, \
     cl.initial_authorization_url, cl.client_secret_hash, cl.redirect_uris, cl.grants, \
     cl.user_id, cl.is_public, cl.created_at";

impl Database {
    pub(super) async fn migrate_oauth2_clients(&self) -> AppResult<()> {
        self.execute_schema(&[
            r"
            CREATE TABLE IF NOT EXISTS oauth2_clients (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                client_id TEXT NOT NULL UNIQUE,
                name TEXT NOT NULL,
                description TEXT NOT NULL DEFAULT '',
                logo_url TEXT,
                initial_authorization_url TEXT,
                client_secret_hash TEXT NOT NULL,
                redirect_uris TEXT NOT NULL,
                grants TEXT NOT NULL,
                user_id TEXT NOT NULL,
                is_public INTEGER NOT NULL DEFAULT 0,
                created_at INTEGER NOT NULL
            )
            ",
            "CREATE INDEX IF NOT EXISTS idx_oauth2_clients_user_id ON oauth2_clients(user_id)",
        ])
        .await
    }

    /// Store a newly registered client
    ///
    /// # Errors
    ///
    /// Returns an error if the public id is already taken or the insert fails
    pub async fn insert_oauth2_client(&self, client: &NewOAuth2Client) -> AppResult<OAuth2Client> {
        let created_at = from_unix(Utc::now().timestamp())?;
        let redirect_uris = serde_json::to_string(&client.redirect_uris)?;

        let result = sqlx::query(
            r"
            INSERT INTO oauth2_clients (
                client_id, name, description, logo_url, initial_authorization_url,
                client_secret_hash, redirect_uris, grants, user_id, is_public, created_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ",
        )
        .bind(&client.client_id)
        .bind(&client.name)
        .bind(&client.description)
        .bind(&client.logo_url)
        .bind(&client.initial_authorization_url)
        .bind(&client.client_secret_hash)
        .bind(&redirect_uris)
        .bind(GrantType::join_list(&client.grants))
        .bind(client.user_id.to_string())
        .bind(client.is_public)
        .bind(created_at.timestamp())
        .execute(&self.pool)
        .await
        .map_err(AppError::from)?;
        expect_rows(result.rows_affected(), "Insert OAuth2 client")?;

        Ok(OAuth2Client {
            id: result.last_insert_rowid(),
            client_id: client.client_id.clone(),
            name: client.name.clone(),
            description: client.description.clone(),
            logo_url: client.logo_url.clone(),
            initial_authorization_url: client.initial_authorization_url.clone(),
            client_secret_hash: client.client_secret_hash.clone(),
            redirect_uris: client.redirect_uris.clone(),
            grants: client.grants.clone(),
            user_id: client.user_id,
            is_public: client.is_public,
            created_at,
        })
    }

    /// Look a client up by its public identifier
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_oauth2_client_by_public_id(
        &self,
        client_id: &str,
    ) -> AppResult<Option<OAuth2Client>> {
        let row = sqlx::query(&format!(
            "SELECT {CLIENT_COLUMNS} FROM oauth2_clients cl WHERE cl.client_id = ?"
        ))
        .bind(client_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get OAuth2 client: {e}")))?;

        row.as_ref().map(row_to_client).transpose()
    }

    /// Look a client up by public identifier and secret digest in one query
    ///
    /// Unknown client and wrong secret produce the same `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_oauth2_client_by_credentials(
        &self,
        client_id: &str,
        client_secret_hash: &str,
    ) -> AppResult<Option<OAuth2Client>> {
        let row = sqlx::query(&format!(
            "SELECT {CLIENT_COLUMNS} FROM oauth2_clients cl \
             WHERE cl.client_id = ? AND cl.client_secret_hash = ?"
        ))
        .bind(client_id)
        .bind(client_secret_hash)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to authenticate OAuth2 client: {e}")))?;

        row.as_ref().map(row_to_client).transpose()
    }

    /// Look a client up by its internal identity
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails
    pub async fn get_oauth2_client(&self, id: i64) -> AppResult<Option<OAuth2Client>> {
        let row = sqlx::query(&format!(
            "SELECT {CLIENT_COLUMNS} FROM oauth2_clients cl WHERE cl.id = ?"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to get OAuth2 client: {e}")))?;

        row.as_ref().map(row_to_client).transpose()
    }

    /// Replace the secret digest of a client owned by `owner`
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails
    pub async fn rotate_oauth2_client_secret(
        &self,
        id: i64,
        client_secret_hash: &str,
        owner: Uuid,
    ) -> AppResult<bool> {
        let result = sqlx::query(
            "UPDATE oauth2_clients SET client_secret_hash = ? WHERE id = ? AND user_id = ?",
        )
        .bind(client_secret_hash)
        .bind(id)
        .bind(owner.to_string())
        .execute(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to rotate OAuth2 client secret: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Delete a client owned by `owner`; codes, tokens and consents cascade
    ///
    /// # Errors
    ///
    /// Returns an error if the delete fails
    pub async fn delete_oauth2_client(&self, id: i64, owner: Uuid) -> AppResult<bool> {
        let result = sqlx::query("DELETE FROM oauth2_clients WHERE id = ? AND user_id = ?")
            .bind(id)
            .bind(owner.to_string())
            .execute(&self.pool)
            .await
            .map_err(|e| AppError::database(format!("Failed to delete OAuth2 client: {e}")))?;

        Ok(result.rows_affected() > 0)
    }

    /// Set the visibility flag of a client owned by `owner`
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails
    pub async fn set_oauth2_client_visibility(
        &self,
        id: i64,
        owner: Uuid,
        is_public: bool,
    ) -> AppResult<bool> {
        let result =
            sqlx::query("UPDATE oauth2_clients SET is_public = ? WHERE id = ? AND user_id = ?")
                .bind(is_public)
                .bind(id)
                .bind(owner.to_string())
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    AppError::database(format!("Failed to update OAuth2 client visibility: {e}"))
                })?;

        Ok(result.rows_affected() > 0)
    }

    /// Set or clear the logo of a client owned by `owner`
    ///
    /// # Errors
    ///
    /// Returns an error if the update fails
    pub async fn set_oauth2_client_logo(
        &self,
        id: i64,
        owner: Uuid,
        logo_url: Option<&str>,
    ) -> AppResult<bool> {
        let result =
            sqlx::query("UPDATE oauth2_clients SET logo_url = ? WHERE id = ? AND user_id = ?")
                .bind(logo_url)
                .bind(id)
                .bind(owner.to_string())
                .execute(&self.pool)
                .await
                .map_err(|e| {
                    AppError::database(format!("Failed to update OAuth2 client logo: {e}"))
                })?;

        Ok(result.rows_affected() > 0)
    }

    /// Clients that are public, owned by `user_id`, or consented to by `user_id`
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be decoded
    pub async fn list_oauth2_clients_visible_to(
        &self,
        user_id: Uuid,
    ) -> AppResult<Vec<ClientListing>> {
        let user = user_id.to_string();
        let rows = sqlx::query(&format!(
            r"
            SELECT {CLIENT_COLUMNS},
                   CASE WHEN cl.user_id = ? THEN 1 ELSE 0 END AS is_mine,
                   CASE WHEN co.user_id IS NULL THEN 0 ELSE 1 END AS is_authorized
            FROM oauth2_clients cl
            LEFT JOIN oauth2_consents co ON co.client_id = cl.id AND co.user_id = ?
            WHERE cl.is_public = 1 OR cl.user_id = ? OR co.user_id IS NOT NULL
            ORDER BY cl.created_at DESC, cl.id DESC
            "
        ))
        .bind(&user)
        .bind(&user)
        .bind(&user)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list OAuth2 clients: {e}")))?;

        rows.iter()
            .map(|row| {
                Ok(ClientListing {
                    client: row_to_client(row)?,
                    is_mine: row.get::<i64, _>("is_mine") != 0,
                    is_authorized: row.get::<i64, _>("is_authorized") != 0,
                })
            })
            .collect()
    }

    /// Every registered client, newest first
    ///
    /// # Errors
    ///
    /// Returns an error if the query fails or a row cannot be decoded
    pub async fn list_all_oauth2_clients(&self) -> AppResult<Vec<OAuth2Client>> {
        let rows = sqlx::query(&format!(
            "SELECT {CLIENT_COLUMNS} FROM oauth2_clients cl ORDER BY cl.created_at DESC, cl.id DESC"
        ))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| AppError::database(format!("Failed to list OAuth2 clients: {e}")))?;

        rows.iter().map(row_to_client).collect()
    }
}

fn row_to_client(row: &SqliteRow) -> AppResult<OAuth2Client> {
    let redirect_uris: String = row.get("redirect_uris");
    let grants: String = row.get("grants");
    let user_id: String = row.get("user_id");

    Ok(OAuth2Client {
        id: row.get("id"),
        client_id: row.get("client_id"),
        name: row.get("name"),
        description: row.get("description"),
        logo_url: row.get("logo_url"),
        initial_authorization_url: row.get("initial_authorization_url"),
        client_secret_hash: row.get("client_secret_hash"),
        redirect_uris: serde_json::from_str(&redirect_uris)?,
        grants: GrantType::parse_list(&grants),
        user_id: parse_user_id(&user_id)?,
        is_public: row.get("is_public"),
        created_at: from_unix(row.get("created_at"))?,
    })
}

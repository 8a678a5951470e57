// ABOUTME: SQLite implementation of the CredentialStore repository
// ABOUTME: Delegates each operation to the matching Database method
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::{ClientAuthorizationRevocation, CredentialStore, TokenRotation};
use crate::database::Database;
use crate::errors::AppResult;
use crate::models::{
    ClientListing, NewAuthorizationCode, NewOAuth2Client, OAuth2AuthorizationCode, OAuth2Client,
    OAuth2Consent, OAuth2Token, Scope, TokenPairHashes,
};

/// `SQLite` implementation of [`CredentialStore`]
#[derive(Clone)]
pub struct OAuth2RepositoryImpl {
    db: Database,
}

impl OAuth2RepositoryImpl {
    /// Create a new repository over the given database
    #[must_use]
    pub const fn new(db: Database) -> Self {
        Self { db }
    }

    /// The underlying database
    #[must_use]
    pub const fn database(&self) -> &Database {
        &self.db
    }
}

#[async_trait]
impl CredentialStore for OAuth2RepositoryImpl {
    async fn find_client_by_public_id(&self, client_id: &str) -> AppResult<Option<OAuth2Client>> {
        self.db.get_oauth2_client_by_public_id(client_id).await
    }

    async fn find_client_by_public_id_and_secret_hash(
        &self,
        client_id: &str,
        client_secret_hash: &str,
    ) -> AppResult<Option<OAuth2Client>> {
        self.db
            .get_oauth2_client_by_credentials(client_id, client_secret_hash)
            .await
    }

    async fn find_client_by_id(&self, id: i64) -> AppResult<Option<OAuth2Client>> {
        self.db.get_oauth2_client(id).await
    }

    async fn insert_client(&self, client: &NewOAuth2Client) -> AppResult<OAuth2Client> {
        self.db.insert_oauth2_client(client).await
    }

    async fn rotate_client_secret(
        &self,
        id: i64,
        client_secret_hash: &str,
        owner: Uuid,
    ) -> AppResult<bool> {
        self.db
            .rotate_oauth2_client_secret(id, client_secret_hash, owner)
            .await
    }

    async fn delete_client(&self, id: i64, owner: Uuid) -> AppResult<bool> {
        self.db.delete_oauth2_client(id, owner).await
    }

    async fn set_client_visibility(
        &self,
        id: i64,
        owner: Uuid,
        is_public: bool,
    ) -> AppResult<bool> {
        self.db
            .set_oauth2_client_visibility(id, owner, is_public)
            .await
    }

    async fn set_client_logo(
        &self,
        id: i64,
        owner: Uuid,
        logo_url: Option<&str>,
    ) -> AppResult<bool> {
        self.db.set_oauth2_client_logo(id, owner, logo_url).await
    }

    async fn list_clients_visible_to(&self, user_id: Uuid) -> AppResult<Vec<ClientListing>> {
        self.db.list_oauth2_clients_visible_to(user_id).await
    }

    async fn list_all_clients(&self) -> AppResult<Vec<OAuth2Client>> {
        self.db.list_all_oauth2_clients().await
    }

    async fn upsert_consent(&self, user_id: Uuid, client_id: i64, scope: &Scope) -> AppResult<()> {
        self.db.upsert_oauth2_consent(user_id, client_id, scope).await
    }

    async fn get_consent(&self, user_id: Uuid, client_id: i64) -> AppResult<Option<OAuth2Consent>> {
        self.db.get_oauth2_consent(user_id, client_id).await
    }

    async fn delete_consent(&self, user_id: Uuid, client_id: i64) -> AppResult<bool> {
        self.db.delete_oauth2_consent(user_id, client_id).await
    }

    async fn replace_live_authorization_code(
        &self,
        code: &NewAuthorizationCode,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        self.db.replace_live_authorization_code(code, now).await
    }

    async fn find_authorization_code_by_hash(
        &self,
        code_hash: &str,
        include_expired: bool,
        now: DateTime<Utc>,
    ) -> AppResult<Option<OAuth2AuthorizationCode>> {
        self.db
            .get_authorization_code(code_hash, include_expired, now)
            .await
    }

    async fn invalidate_authorization_code(
        &self,
        code_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        self.db.invalidate_authorization_code(code_hash, now).await
    }

    async fn redeem_authorization_code(
        &self,
        code_hash: &str,
        pair: &TokenPairHashes,
        now: DateTime<Utc>,
    ) -> AppResult<Option<OAuth2Token>> {
        self.db.redeem_authorization_code(code_hash, pair, now).await
    }

    async fn purge_expired_authorization_codes(&self, now: DateTime<Utc>) -> AppResult<u64> {
        self.db.purge_expired_authorization_codes(now).await
    }

    async fn insert_token_pair(
        &self,
        client_id: i64,
        user_id: Uuid,
        pair: &TokenPairHashes,
        scope: &Scope,
    ) -> AppResult<OAuth2Token> {
        self.db
            .insert_oauth2_token_pair(client_id, user_id, pair, scope)
            .await
    }

    async fn find_token_by_access_hash(
        &self,
        access_token_hash: &str,
    ) -> AppResult<Option<OAuth2Token>> {
        self.db
            .get_oauth2_token_by_access_hash(access_token_hash)
            .await
    }

    async fn find_token_by_refresh_hash(
        &self,
        refresh_token_hash: &str,
    ) -> AppResult<Option<OAuth2Token>> {
        self.db
            .get_oauth2_token_by_refresh_hash(refresh_token_hash)
            .await
    }

    async fn rotate_token_pair(
        &self,
        old_refresh_hash: &str,
        pair: &TokenPairHashes,
        scope: &Scope,
    ) -> AppResult<Option<TokenRotation>> {
        self.db
            .rotate_oauth2_token_pair(old_refresh_hash, pair, scope)
            .await
    }

    async fn revoke_tokens_for_client(
        &self,
        client_id: i64,
        user_id: Option<Uuid>,
    ) -> AppResult<Vec<OAuth2Token>> {
        self.db
            .revoke_oauth2_tokens_for_client(client_id, user_id)
            .await
    }

    async fn revoke_client_authorization(
        &self,
        client_id: i64,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<ClientAuthorizationRevocation> {
        self.db
            .revoke_oauth2_client_authorization(client_id, user_id, now)
            .await
    }

    async fn purge_expired_tokens(&self, now: DateTime<Utc>) -> AppResult<u64> {
        self.db.purge_expired_oauth2_tokens(now).await
    }

    async fn list_revoked_token_hashes(&self) -> AppResult<Vec<String>> {
        self.db.list_revoked_oauth2_token_hashes().await
    }
}

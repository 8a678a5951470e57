// ABOUTME: Integration tests for credential store failures seen through the authorization engine
// ABOUTME: A failed redemption surfaces as server_error and rolls back to a live code with no tokens
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use common::REDIRECT_URI;
use grantd::config::OAuth2ServerConfig;
use grantd::crypto::hash_secret;
use grantd::database::{
    ClientAuthorizationRevocation, CredentialStore, OAuth2RepositoryImpl, TokenRotation,
};
use grantd::errors::AppResult;
use grantd::models::{
    ClientListing, NewAuthorizationCode, NewOAuth2Client, OAuth2AuthorizationCode, OAuth2Client,
    OAuth2Consent, OAuth2Token, Scope, TokenPairHashes,
};
use grantd::oauth2_server::{OAuth2AuthorizationServer, RevocationCache};
use std::sync::Arc;
use uuid::Uuid;

/// Real store whose redemptions insert a pair colliding with an existing access digest
struct CollidingRedemptionStore {
    inner: Arc<OAuth2RepositoryImpl>,
    taken_access_hash: String,
}

#[async_trait]
impl CredentialStore for CollidingRedemptionStore {
    async fn find_client_by_public_id(&self, client_id: &str) -> AppResult<Option<OAuth2Client>> {
        self.inner.find_client_by_public_id(client_id).await
    }

    async fn find_client_by_public_id_and_secret_hash(
        &self,
        client_id: &str,
        client_secret_hash: &str,
    ) -> AppResult<Option<OAuth2Client>> {
        self.inner
            .find_client_by_public_id_and_secret_hash(client_id, client_secret_hash)
            .await
    }

    async fn find_client_by_id(&self, id: i64) -> AppResult<Option<OAuth2Client>> {
        self.inner.find_client_by_id(id).await
    }

    async fn insert_client(&self, client: &NewOAuth2Client) -> AppResult<OAuth2Client> {
        self.inner.insert_client(client).await
    }

    async fn rotate_client_secret(
        &self,
        id: i64,
        client_secret_hash: &str,
        owner: Uuid,
    ) -> AppResult<bool> {
        self.inner
            .rotate_client_secret(id, client_secret_hash, owner)
            .await
    }

    async fn delete_client(&self, id: i64, owner: Uuid) -> AppResult<bool> {
        self.inner.delete_client(id, owner).await
    }

    async fn set_client_visibility(
        &self,
        id: i64,
        owner: Uuid,
        is_public: bool,
    ) -> AppResult<bool> {
        self.inner.set_client_visibility(id, owner, is_public).await
    }

    async fn set_client_logo(
        &self,
        id: i64,
        owner: Uuid,
        logo_url: Option<&str>,
    ) -> AppResult<bool> {
        self.inner.set_client_logo(id, owner, logo_url).await
    }

    async fn list_clients_visible_to(&self, user_id: Uuid) -> AppResult<Vec<ClientListing>> {
        self.inner.list_clients_visible_to(user_id).await
    }

    async fn list_all_clients(&self) -> AppResult<Vec<OAuth2Client>> {
        self.inner.list_all_clients().await
    }

    async fn upsert_consent(&self, user_id: Uuid, client_id: i64, scope: &Scope) -> AppResult<()> {
        self.inner.upsert_consent(user_id, client_id, scope).await
    }

    async fn get_consent(&self, user_id: Uuid, client_id: i64) -> AppResult<Option<OAuth2Consent>> {
        self.inner.get_consent(user_id, client_id).await
    }

    async fn delete_consent(&self, user_id: Uuid, client_id: i64) -> AppResult<bool> {
        self.inner.delete_consent(user_id, client_id).await
    }

    async fn replace_live_authorization_code(
        &self,
        code: &NewAuthorizationCode,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        self.inner.replace_live_authorization_code(code, now).await
    }

    async fn find_authorization_code_by_hash(
        &self,
        code_hash: &str,
        include_expired: bool,
        now: DateTime<Utc>,
    ) -> AppResult<Option<OAuth2AuthorizationCode>> {
        self.inner
            .find_authorization_code_by_hash(code_hash, include_expired, now)
            .await
    }

    async fn invalidate_authorization_code(
        &self,
        code_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<()> {
        self.inner.invalidate_authorization_code(code_hash, now).await
    }

    async fn redeem_authorization_code(
        &self,
        code_hash: &str,
        pair: &TokenPairHashes,
        now: DateTime<Utc>,
    ) -> AppResult<Option<OAuth2Token>> {
        let colliding = TokenPairHashes {
            access_token_hash: self.taken_access_hash.clone(),
            ..pair.clone()
        };
        self.inner
            .redeem_authorization_code(code_hash, &colliding, now)
            .await
    }

    async fn purge_expired_authorization_codes(&self, now: DateTime<Utc>) -> AppResult<u64> {
        self.inner.purge_expired_authorization_codes(now).await
    }

    async fn insert_token_pair(
        &self,
        client_id: i64,
        user_id: Uuid,
        pair: &TokenPairHashes,
        scope: &Scope,
    ) -> AppResult<OAuth2Token> {
        self.inner
            .insert_token_pair(client_id, user_id, pair, scope)
            .await
    }

    async fn find_token_by_access_hash(
        &self,
        access_token_hash: &str,
    ) -> AppResult<Option<OAuth2Token>> {
        self.inner.find_token_by_access_hash(access_token_hash).await
    }

    async fn find_token_by_refresh_hash(
        &self,
        refresh_token_hash: &str,
    ) -> AppResult<Option<OAuth2Token>> {
        self.inner.find_token_by_refresh_hash(refresh_token_hash).await
    }

    async fn rotate_token_pair(
        &self,
        old_refresh_hash: &str,
        pair: &TokenPairHashes,
        scope: &Scope,
    ) -> AppResult<Option<TokenRotation>> {
        self.inner
            .rotate_token_pair(old_refresh_hash, pair, scope)
            .await
    }

    async fn revoke_tokens_for_client(
        &self,
        client_id: i64,
        user_id: Option<Uuid>,
    ) -> AppResult<Vec<OAuth2Token>> {
        self.inner.revoke_tokens_for_client(client_id, user_id).await
    }

    async fn revoke_client_authorization(
        &self,
        client_id: i64,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<ClientAuthorizationRevocation> {
        self.inner
            .revoke_client_authorization(client_id, user_id, now)
            .await
    }

    async fn purge_expired_tokens(&self, now: DateTime<Utc>) -> AppResult<u64> {
        self.inner.purge_expired_tokens(now).await
    }

    async fn list_revoked_token_hashes(&self) -> AppResult<Vec<String>> {
        self.inner.list_revoked_token_hashes().await
    }
}

async fn token_rows(test: &common::TestServer) -> i64 {
    sqlx::query_scalar("SELECT COUNT(*) FROM oauth2_tokens")
        .fetch_one(test.database.pool())
        .await
        .unwrap()
}

#[tokio::test]
async fn test_failed_redemption_is_server_error_and_rolls_back() {
    let test = common::create_test_server().await.unwrap();
    let user = Uuid::new_v4();
    let (client, _) = common::register_client(&test, Uuid::new_v4(), "app1").await.unwrap();
    let existing = common::issue_token_pair(&test, &client, Uuid::new_v4(), "feed")
        .await
        .unwrap();

    let failing = OAuth2AuthorizationServer::new(
        Arc::new(CollidingRedemptionStore {
            inner: test.store.clone(),
            taken_access_hash: hash_secret(&existing.access_token),
        }),
        Arc::new(RevocationCache::new()),
        OAuth2ServerConfig::default(),
    );

    let issued = failing
        .issue_authorization_code(&client, user, &Scope::parse("feed"), REDIRECT_URI)
        .await
        .unwrap();
    let err = failing
        .exchange_authorization_code(&issued.code, &client, REDIRECT_URI)
        .await
        .unwrap_err();
    assert!(err.is("server_error"), "{err}");

    // The consume step was rolled back with the failed insert
    assert!(test
        .store
        .find_authorization_code_by_hash(&hash_secret(&issued.code), false, Utc::now())
        .await
        .unwrap()
        .is_some());
    assert_eq!(token_rows(&test).await, 1);

    // A healthy engine over the same store can still redeem the code
    let pair = test
        .server
        .exchange_authorization_code(&issued.code, &client, REDIRECT_URI)
        .await
        .unwrap();
    assert_eq!(pair.user_id, user);
    assert_eq!(token_rows(&test).await, 2);
}

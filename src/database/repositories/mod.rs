// ABOUTME: Credential store contract the authorization engine and client registry depend on
// ABOUTME: Declares CredentialStore and the outcome types of its multi-step writes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Repository seam between the OAuth 2.0 server and durable storage
//!
//! Every operation is one round trip or one transaction. Failures surface as
//! [`AppError`](crate::errors::AppError) and are never retried here.

mod oauth2_server_repository;

pub use oauth2_server_repository::OAuth2RepositoryImpl;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::errors::AppResult;
use crate::models::{
    ClientListing, NewAuthorizationCode, NewOAuth2Client, OAuth2AuthorizationCode, OAuth2Client,
    OAuth2Consent, OAuth2Token, Scope, TokenPairHashes,
};

/// Result of a refresh-token rotation
#[derive(Debug, Clone)]
pub struct TokenRotation {
    /// The old pair, now revoked
    pub revoked: OAuth2Token,
    /// The pair that replaces it
    pub issued: OAuth2Token,
}

/// Result of withdrawing a user's authorization of a client
#[derive(Debug, Clone, Default)]
pub struct ClientAuthorizationRevocation {
    /// Pairs that were live and are now revoked
    pub revoked_tokens: Vec<OAuth2Token>,
    /// Live authorization codes that were invalidated
    pub invalidated_codes: u64,
    /// Whether a consent row existed and was deleted
    pub consent_removed: bool,
}

/// Durable storage operations for clients, codes, tokens and consents
#[async_trait]
pub trait CredentialStore: Send + Sync {
    // ================================
    // Clients
    // ================================

    /// Client by public identifier
    async fn find_client_by_public_id(&self, client_id: &str) -> AppResult<Option<OAuth2Client>>;

    /// Client by public identifier and secret digest
    async fn find_client_by_public_id_and_secret_hash(
        &self,
        client_id: &str,
        client_secret_hash: &str,
    ) -> AppResult<Option<OAuth2Client>>;

    /// Client by internal identity
    async fn find_client_by_id(&self, id: i64) -> AppResult<Option<OAuth2Client>>;

    /// Store a new client
    async fn insert_client(&self, client: &NewOAuth2Client) -> AppResult<OAuth2Client>;

    /// Replace the secret digest; `false` means not found or not the owner
    async fn rotate_client_secret(
        &self,
        id: i64,
        client_secret_hash: &str,
        owner: Uuid,
    ) -> AppResult<bool>;

    /// Delete a client; `false` means not found or not the owner
    async fn delete_client(&self, id: i64, owner: Uuid) -> AppResult<bool>;

    /// Set the visibility flag; `false` means not found or not the owner
    async fn set_client_visibility(&self, id: i64, owner: Uuid, is_public: bool)
        -> AppResult<bool>;

    /// Set or clear the logo; `false` means not found or not the owner
    async fn set_client_logo(&self, id: i64, owner: Uuid, logo_url: Option<&str>)
        -> AppResult<bool>;

    /// Public clients, clients owned by the user and clients the user consented to
    async fn list_clients_visible_to(&self, user_id: Uuid) -> AppResult<Vec<ClientListing>>;

    /// Every client regardless of visibility
    async fn list_all_clients(&self) -> AppResult<Vec<OAuth2Client>>;

    // ================================
    // Consents
    // ================================

    /// Create or overwrite a consent
    async fn upsert_consent(&self, user_id: Uuid, client_id: i64, scope: &Scope) -> AppResult<()>;

    /// Consent for a (user, client) pair
    async fn get_consent(&self, user_id: Uuid, client_id: i64) -> AppResult<Option<OAuth2Consent>>;

    /// Delete a consent; `false` means none existed
    async fn delete_consent(&self, user_id: Uuid, client_id: i64) -> AppResult<bool>;

    // ================================
    // Authorization codes
    // ================================

    /// Upsert the consent and replace any code for the pair in one transaction
    async fn replace_live_authorization_code(
        &self,
        code: &NewAuthorizationCode,
        now: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Code by digest
    async fn find_authorization_code_by_hash(
        &self,
        code_hash: &str,
        include_expired: bool,
        now: DateTime<Utc>,
    ) -> AppResult<Option<OAuth2AuthorizationCode>>;

    /// Move a code's expiry into the past; idempotent
    async fn invalidate_authorization_code(
        &self,
        code_hash: &str,
        now: DateTime<Utc>,
    ) -> AppResult<()>;

    /// Consume a live code and insert its token pair in one transaction
    async fn redeem_authorization_code(
        &self,
        code_hash: &str,
        pair: &TokenPairHashes,
        now: DateTime<Utc>,
    ) -> AppResult<Option<OAuth2Token>>;

    /// Delete expired codes
    async fn purge_expired_authorization_codes(&self, now: DateTime<Utc>) -> AppResult<u64>;

    // ================================
    // Tokens
    // ================================

    /// Store a new pair
    async fn insert_token_pair(
        &self,
        client_id: i64,
        user_id: Uuid,
        pair: &TokenPairHashes,
        scope: &Scope,
    ) -> AppResult<OAuth2Token>;

    /// Unrevoked pair by access digest
    async fn find_token_by_access_hash(&self, access_token_hash: &str)
        -> AppResult<Option<OAuth2Token>>;

    /// Unrevoked pair by refresh digest
    async fn find_token_by_refresh_hash(
        &self,
        refresh_token_hash: &str,
    ) -> AppResult<Option<OAuth2Token>>;

    /// Revoke the old pair and insert its successor in one transaction
    async fn rotate_token_pair(
        &self,
        old_refresh_hash: &str,
        pair: &TokenPairHashes,
        scope: &Scope,
    ) -> AppResult<Option<TokenRotation>>;

    /// Revoke live pairs of a client, for one user or all of them
    async fn revoke_tokens_for_client(
        &self,
        client_id: i64,
        user_id: Option<Uuid>,
    ) -> AppResult<Vec<OAuth2Token>>;

    /// Revoke tokens, invalidate codes and delete the consent of a pair in one transaction
    async fn revoke_client_authorization(
        &self,
        client_id: i64,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> AppResult<ClientAuthorizationRevocation>;

    /// Delete pairs whose access token expired
    async fn purge_expired_tokens(&self, now: DateTime<Utc>) -> AppResult<u64>;

    /// Digests of every stored revoked pair
    async fn list_revoked_token_hashes(&self) -> AppResult<Vec<String>>;
}

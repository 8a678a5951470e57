// ABOUTME: OAuth 2.0 authorization engine: code issuance and redemption, token rotation and resolution
// ABOUTME: Holds the credential store, the shared revocation cache and the token lifetimes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::{DateTime, Duration, SubsecRound, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use url::Url;
use uuid::Uuid;

use super::models::{
    AuthorizeRequest, AuthorizeResponse, IssuedAuthorizationCode, OAuth2Error, Principal,
    TokenGrant, TokenPair, TokenRequest, TokenResponse,
};
use super::redirect;
use super::revocation::RevocationCache;
use super::scopes;
use crate::config::OAuth2ServerConfig;
use crate::crypto::{fingerprint, generate_opaque_id, hash_secret, AUTHORIZATION_CODE_BYTES, TOKEN_BYTES};
use crate::database::CredentialStore;
use crate::errors::AppError;
use crate::models::{GrantType, NewAuthorizationCode, OAuth2Client, OAuth2Token, Scope, TokenPairHashes};

/// What the startup warm-up did
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WarmUpReport {
    /// Expired token pairs deleted
    pub purged_tokens: u64,
    /// Expired authorization codes deleted
    pub purged_codes: u64,
    /// Revoked digests loaded into the cache
    pub revoked_loaded: usize,
}

/// Plaintext pair plus the digests that get stored
struct GeneratedPair {
    access_token: String,
    refresh_token: String,
    hashes: TokenPairHashes,
}

/// OAuth 2.0 Authorization Server
///
/// Stateless per request apart from the shared [`RevocationCache`]. Storage
/// failures surface as `server_error`; grant failures are returned as-is and
/// only logged at debug or warn level.
pub struct OAuth2AuthorizationServer {
    store: Arc<dyn CredentialStore>,
    revocations: Arc<RevocationCache>,
    config: OAuth2ServerConfig,
}

impl OAuth2AuthorizationServer {
    /// Create a server over a store and a shared revocation cache
    #[must_use]
    pub fn new(
        store: Arc<dyn CredentialStore>,
        revocations: Arc<RevocationCache>,
        config: OAuth2ServerConfig,
    ) -> Self {
        Self {
            store,
            revocations,
            config,
        }
    }

    /// Construct with a fresh revocation cache and run the startup warm-up
    pub async fn bootstrap(store: Arc<dyn CredentialStore>, config: OAuth2ServerConfig) -> Self {
        let server = Self::new(store, Arc::new(RevocationCache::new()), config);
        server.warm_up().await;
        server
    }

    /// Purge expired rows, then load every revoked digest into the cache
    ///
    /// Every step is best-effort: failures are logged and the server keeps
    /// serving with the durable revoked flag as the authority.
    pub async fn warm_up(&self) -> WarmUpReport {
        let now = Utc::now();
        let purged_tokens = self
            .store
            .purge_expired_tokens(now)
            .await
            .unwrap_or_else(|e| {
                error!(operation = "purge_expired_tokens", error = %e, "Warm-up purge failed");
                0
            });
        let purged_codes = self
            .store
            .purge_expired_authorization_codes(now)
            .await
            .unwrap_or_else(|e| {
                error!(operation = "purge_expired_authorization_codes", error = %e, "Warm-up purge failed");
                0
            });
        let revoked_loaded = self.revocations.warm_up(self.store.as_ref()).await;

        info!(
            purged_tokens,
            purged_codes, revoked_loaded, "OAuth2 authorization server warmed up"
        );
        WarmUpReport {
            purged_tokens,
            purged_codes,
            revoked_loaded,
        }
    }

    /// The credential store
    #[must_use]
    pub fn store(&self) -> &Arc<dyn CredentialStore> {
        &self.store
    }

    /// The shared revocation cache
    #[must_use]
    pub fn revocations(&self) -> &Arc<RevocationCache> {
        &self.revocations
    }

    /// Lifetimes and policy
    #[must_use]
    pub const fn config(&self) -> &OAuth2ServerConfig {
        &self.config
    }

    /// Resolve the client presenting itself at the token endpoint
    ///
    /// With a secret the digest must match (confidential client); without one
    /// the public identifier alone is enough (public client).
    ///
    /// # Errors
    /// `invalid_client` when no client matches, `server_error` on storage failure
    pub async fn authorize_client(
        &self,
        client_id: &str,
        client_secret: Option<&str>,
    ) -> Result<OAuth2Client, OAuth2Error> {
        let found = match client_secret {
            Some(secret) => {
                self.store
                    .find_client_by_public_id_and_secret_hash(client_id, &hash_secret(secret))
                    .await
            }
            None => self.store.find_client_by_public_id(client_id).await,
        }
        .map_err(|e| storage_failure("authorize_client", &e))?;

        found.ok_or_else(|| {
            debug!(client_id, "Client authentication failed");
            OAuth2Error::invalid_client()
        })
    }

    /// Handle an approved authorization request
    ///
    /// # Errors
    /// Returns an error if the response type, client, redirect URI or scope is rejected
    pub async fn authorize(
        &self,
        request: &AuthorizeRequest,
        user_id: Uuid,
    ) -> Result<AuthorizeResponse, OAuth2Error> {
        if request.response_type != "code" {
            return Err(OAuth2Error::invalid_request(
                "Only 'code' response_type is supported",
            ));
        }

        let client = self
            .store
            .find_client_by_public_id(&request.client_id)
            .await
            .map_err(|e| storage_failure("authorize", &e))?
            .ok_or_else(OAuth2Error::invalid_client)?;

        // Parsed before issuing so a malformed URI never leaves a live code behind
        let mut redirect_to = Url::parse(&request.redirect_uri)
            .map_err(|_| OAuth2Error::invalid_request("Invalid redirect_uri"))?;

        let scope = request.scope.as_deref().map(Scope::parse).unwrap_or_default();
        let issued = self
            .issue_authorization_code(&client, user_id, &scope, &request.redirect_uri)
            .await?;

        {
            let mut query = redirect_to.query_pairs_mut();
            query.append_pair("code", &issued.code);
            if let Some(state) = &request.state {
                query.append_pair("state", state);
            }
        }

        Ok(AuthorizeResponse {
            code: issued.code,
            state: request.state.clone(),
            redirect_to: redirect_to.into(),
        })
    }

    /// Issue an authorization code, replacing any live one for the pair
    ///
    /// # Errors
    /// `invalid_request` for an unregistered redirect URI, `unauthorized_client`
    /// when the client may not use the code grant, `invalid_scope` for an empty
    /// or ungrantable scope, `server_error` when the transaction fails
    pub async fn issue_authorization_code(
        &self,
        client: &OAuth2Client,
        user_id: Uuid,
        scope: &Scope,
        redirect_uri: &str,
    ) -> Result<IssuedAuthorizationCode, OAuth2Error> {
        self.issue_authorization_code_at(client, user_id, scope, redirect_uri, Utc::now())
            .await
    }

    /// [`Self::issue_authorization_code`] at an explicit instant
    ///
    /// # Errors
    /// See [`Self::issue_authorization_code`]
    pub async fn issue_authorization_code_at(
        &self,
        client: &OAuth2Client,
        user_id: Uuid,
        scope: &Scope,
        redirect_uri: &str,
        now: DateTime<Utc>,
    ) -> Result<IssuedAuthorizationCode, OAuth2Error> {
        if !redirect::is_allowed(&client.redirect_uris, redirect_uri) {
            warn!(
                client_id = %client.client_id,
                redirect_uri, "Authorization requested with unregistered redirect_uri"
            );
            return Err(OAuth2Error::invalid_request("Invalid redirect_uri"));
        }
        if !client.allows_grant(GrantType::AuthorizationCode) {
            return Err(OAuth2Error::unauthorized_client(
                "Client is not allowed to use the authorization_code grant",
            ));
        }
        if scope.is_empty() {
            return Err(OAuth2Error::invalid_scope("No scope requested"));
        }
        let ungrantable = scopes::ungrantable(scope);
        if !ungrantable.is_empty() {
            debug!(client_id = %client.client_id, ?ungrantable, "Ungrantable scope requested");
            return Err(OAuth2Error::invalid_scope(&format!(
                "Scope not grantable: {}",
                ungrantable.join(" ")
            )));
        }

        let code = generate_opaque_id(AUTHORIZATION_CODE_BYTES);
        let expires_at = expiry_after(now, self.config.authorization_code_ttl)?;
        self.store
            .replace_live_authorization_code(
                &NewAuthorizationCode {
                    client_id: client.id,
                    user_id,
                    code_hash: hash_secret(&code),
                    expires_at,
                    redirect_uri: redirect_uri.to_owned(),
                    scope: scope.clone(),
                },
                now,
            )
            .await
            .map_err(|e| storage_failure("issue_authorization_code", &e))?;

        info!(
            client_id = %client.client_id,
            user_id = %user_id,
            code = %fingerprint(&code),
            scope = %scope,
            "Issued authorization code"
        );
        Ok(IssuedAuthorizationCode { code, expires_at })
    }

    /// Redeem an authorization code for a token pair
    ///
    /// # Errors
    /// `invalid_grant` when the code is unknown, expired, already consumed, or
    /// presented by another client or with another redirect URI
    pub async fn exchange_authorization_code(
        &self,
        code: &str,
        client: &OAuth2Client,
        redirect_uri: &str,
    ) -> Result<TokenPair, OAuth2Error> {
        self.exchange_authorization_code_at(code, client, redirect_uri, Utc::now())
            .await
    }

    /// [`Self::exchange_authorization_code`] at an explicit instant
    ///
    /// # Errors
    /// See [`Self::exchange_authorization_code`]
    pub async fn exchange_authorization_code_at(
        &self,
        code: &str,
        client: &OAuth2Client,
        redirect_uri: &str,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, OAuth2Error> {
        let code_hash = hash_secret(code);
        let stored = self
            .store
            .find_authorization_code_by_hash(&code_hash, false, now)
            .await
            .map_err(|e| storage_failure("exchange_authorization_code", &e))?
            .ok_or_else(|| {
                debug!(client_id = %client.client_id, code = %fingerprint(code), "Unknown or expired authorization code");
                OAuth2Error::invalid_grant("Invalid or expired authorization code")
            })?;

        // Fields bound at issuance win over whatever the request carries
        if stored.client_id != client.id || stored.redirect_uri != redirect_uri {
            warn!(
                client_id = %client.client_id,
                bound_client_id = %stored.client_public_id,
                code = %fingerprint(code),
                "Authorization code presented by another client or redirect_uri; burning it"
            );
            self.store
                .invalidate_authorization_code(&code_hash, now)
                .await
                .map_err(|e| storage_failure("invalidate_authorization_code", &e))?;
            return Err(OAuth2Error::invalid_grant(
                "Authorization code was not issued to this client and redirect_uri",
            ));
        }

        let pair = self.generate_token_pair(now)?;
        let token = self
            .store
            .redeem_authorization_code(&code_hash, &pair.hashes, now)
            .await
            .map_err(|e| storage_failure("redeem_authorization_code", &e))?
            .ok_or_else(|| {
                debug!(client_id = %client.client_id, code = %fingerprint(code), "Authorization code already consumed");
                OAuth2Error::invalid_grant("Authorization code already used")
            })?;

        info!(
            client_id = %client.client_id,
            user_id = %token.user_id,
            "Exchanged authorization code for token pair"
        );
        Ok(pair.into_token_pair(&token))
    }

    /// Dispatch a token endpoint grant for an authenticated client
    ///
    /// # Errors
    /// `unauthorized_client` when the client may not use the grant, otherwise
    /// the errors of the grant's own path
    pub async fn issue_or_refresh_token(
        &self,
        client: &OAuth2Client,
        grant: TokenGrant,
    ) -> Result<TokenPair, OAuth2Error> {
        self.issue_or_refresh_token_at(client, grant, Utc::now()).await
    }

    /// [`Self::issue_or_refresh_token`] at an explicit instant
    ///
    /// # Errors
    /// See [`Self::issue_or_refresh_token`]
    pub async fn issue_or_refresh_token_at(
        &self,
        client: &OAuth2Client,
        grant: TokenGrant,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, OAuth2Error> {
        let grant_type = grant.grant_type();
        if !client.allows_grant(grant_type) {
            return Err(OAuth2Error::unauthorized_client(&format!(
                "Client is not allowed to use the {grant_type} grant"
            )));
        }

        match grant {
            TokenGrant::AuthorizationCode { code, redirect_uri } => {
                self.exchange_authorization_code_at(&code, client, &redirect_uri, now)
                    .await
            }
            TokenGrant::RefreshToken {
                refresh_token,
                scope,
            } => self.refresh_token_at(client, &refresh_token, scope, now).await,
        }
    }

    /// Handle a token endpoint request end to end
    ///
    /// # Errors
    /// Returns the taxonomy error for the first failing step
    pub async fn token(&self, request: &TokenRequest) -> Result<TokenResponse, OAuth2Error> {
        let client = self
            .authorize_client(&request.client_id, request.client_secret.as_deref())
            .await?;
        let grant = TokenGrant::try_from(request)?;
        let now = Utc::now();
        let pair = self.issue_or_refresh_token_at(&client, grant, now).await?;
        Ok(TokenResponse::from_pair(pair, now))
    }

    /// Rotate a pair: the old one is revoked, a fresh one issued
    async fn refresh_token_at(
        &self,
        client: &OAuth2Client,
        refresh_token: &str,
        requested_scope: Option<Scope>,
        now: DateTime<Utc>,
    ) -> Result<TokenPair, OAuth2Error> {
        let refresh_hash = hash_secret(refresh_token);
        if self.revocations.is_revoked(&refresh_hash) {
            debug!(client_id = %client.client_id, refresh_token = %fingerprint(refresh_token), "Revoked refresh token presented");
            return Err(OAuth2Error::invalid_grant("Invalid refresh token"));
        }

        let current = self
            .store
            .find_token_by_refresh_hash(&refresh_hash)
            .await
            .map_err(|e| storage_failure("find_token_by_refresh_hash", &e))?
            .ok_or_else(|| OAuth2Error::invalid_grant("Invalid refresh token"))?;

        if current.client_id != client.id {
            warn!(
                client_id = %client.client_id,
                bound_client_id = %current.client_public_id,
                "Refresh token presented by another client"
            );
            return Err(OAuth2Error::invalid_grant("Invalid refresh token"));
        }

        let scope = match requested_scope {
            Some(requested) if !requested.is_empty() => {
                if !requested.is_subset(&current.scope) {
                    return Err(OAuth2Error::invalid_scope(
                        "Requested scope exceeds the original grant",
                    ));
                }
                requested
            }
            _ => current.scope.clone(),
        };

        let pair = self.generate_token_pair(now)?;
        let rotation = self
            .store
            .rotate_token_pair(&refresh_hash, &pair.hashes, &scope)
            .await
            .map_err(|e| storage_failure("rotate_token_pair", &e))?
            .ok_or_else(|| OAuth2Error::invalid_grant("Invalid refresh token"))?;

        self.revocations
            .revoke(rotation.revoked.access_token_hash.as_str());
        self.revocations
            .revoke(rotation.revoked.refresh_token_hash.as_str());

        info!(
            client_id = %client.client_id,
            user_id = %rotation.issued.user_id,
            "Rotated token pair"
        );
        Ok(pair.into_token_pair(&rotation.issued))
    }

    /// Resolve a bearer access token to its principal
    pub async fn resolve_access_token(&self, token: &str) -> Option<Principal> {
        self.resolve_access_token_at(token, Utc::now()).await
    }

    /// [`Self::resolve_access_token`] at an explicit instant
    ///
    /// The cache is checked first, then the store; the token must be live at `now`.
    pub async fn resolve_access_token_at(
        &self,
        token: &str,
        now: DateTime<Utc>,
    ) -> Option<Principal> {
        let access_hash = hash_secret(token);
        if self.revocations.is_revoked(&access_hash) {
            debug!(token = %fingerprint(token), "Access token is in the revocation cache");
            return None;
        }

        let record = match self.store.find_token_by_access_hash(&access_hash).await {
            Ok(Some(record)) => record,
            Ok(None) => {
                debug!(token = %fingerprint(token), "Unknown or revoked access token");
                return None;
            }
            Err(e) => {
                error!(operation = "resolve_access_token", error = %e, "Access token lookup failed");
                return None;
            }
        };

        if !record.is_active_at(now) {
            debug!(token = %fingerprint(token), client_id = %record.client_public_id, "Access token expired");
            return None;
        }

        Some(Principal {
            user_id: record.user_id,
            client_id: record.client_public_id,
            client_internal_id: record.client_id,
            scope: record.scope,
            expires_at: record.access_token_expires_at,
        })
    }

    /// Whether a principal holds at least one of `required`
    #[must_use]
    pub fn verify_scope(principal: &Principal, required: &[&str]) -> bool {
        scopes::verify_scope(&principal.scope, required)
    }

    /// Withdraw a user's authorization of a client
    ///
    /// Tokens are revoked, live codes invalidated and the consent deleted in
    /// one transaction; the cache is updated after commit. Returns whether a
    /// consent or a live token existed.
    ///
    /// # Errors
    /// `server_error` when the transaction fails; nothing changed in that case
    pub async fn revoke_client_for_user(
        &self,
        client_id: i64,
        user_id: Uuid,
    ) -> Result<bool, OAuth2Error> {
        let outcome = self
            .store
            .revoke_client_authorization(client_id, user_id, Utc::now())
            .await
            .map_err(|e| storage_failure("revoke_client_authorization", &e))?;

        self.cache_revoked(&outcome.revoked_tokens);
        info!(
            client = client_id,
            user_id = %user_id,
            revoked_tokens = outcome.revoked_tokens.len(),
            invalidated_codes = outcome.invalidated_codes,
            consent_removed = outcome.consent_removed,
            "Revoked client authorization"
        );
        Ok(outcome.consent_removed || !outcome.revoked_tokens.is_empty())
    }

    /// Revoke live pairs of a client, for one user or every user
    ///
    /// # Errors
    /// `server_error` when the store fails
    pub async fn revoke_client_tokens(
        &self,
        client_id: i64,
        user_id: Option<Uuid>,
    ) -> Result<usize, OAuth2Error> {
        let revoked = self
            .store
            .revoke_tokens_for_client(client_id, user_id)
            .await
            .map_err(|e| storage_failure("revoke_tokens_for_client", &e))?;
        self.cache_revoked(&revoked);
        Ok(revoked.len())
    }

    fn cache_revoked(&self, tokens: &[OAuth2Token]) {
        for token in tokens {
            self.revocations.revoke(token.access_token_hash.as_str());
            self.revocations.revoke(token.refresh_token_hash.as_str());
        }
    }

    fn generate_token_pair(&self, now: DateTime<Utc>) -> Result<GeneratedPair, OAuth2Error> {
        let access_token_expires_at = expiry_after(now, self.config.access_token_ttl)?;
        let access_token = generate_opaque_id(TOKEN_BYTES);
        let refresh_token = generate_opaque_id(TOKEN_BYTES);
        let hashes = TokenPairHashes {
            access_token_hash: hash_secret(&access_token),
            access_token_expires_at,
            refresh_token_hash: hash_secret(&refresh_token),
        };
        Ok(GeneratedPair {
            access_token,
            refresh_token,
            hashes,
        })
    }
}

impl GeneratedPair {
    fn into_token_pair(self, stored: &OAuth2Token) -> TokenPair {
        TokenPair {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at: stored.access_token_expires_at,
            scope: stored.scope.clone(),
            user_id: stored.user_id,
            client_id: stored.client_public_id.clone(),
        }
    }
}

/// Expiry instant `ttl` after `now`, truncated to whole seconds
fn expiry_after(now: DateTime<Utc>, ttl: Duration) -> Result<DateTime<Utc>, OAuth2Error> {
    now.trunc_subsecs(0).checked_add_signed(ttl).ok_or_else(|| {
        error!(ttl_seconds = ttl.num_seconds(), "Expiry is out of the representable range");
        OAuth2Error::server_error()
    })
}

/// Log a storage failure with its operation name and map it to `server_error`
pub(super) fn storage_failure(operation: &str, e: &AppError) -> OAuth2Error {
    error!(operation, error = %e, "Credential store operation failed");
    OAuth2Error::server_error()
}

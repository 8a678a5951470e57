// ABOUTME: OAuth 2.0 client registry with owner-enforced mutations
// ABOUTME: Registration, secret rotation, deletion with token revocation, logo and visibility changes
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use std::sync::Arc;
use tracing::warn;
use url::Url;
use uuid::Uuid;

use super::endpoints::{storage_failure, OAuth2AuthorizationServer};
use super::models::{
    ClientCredentials, ClientRegistrationRequest, ClientRegistrationResponse, OAuth2Error,
};
use super::redirect;
use crate::crypto::{generate_opaque_id, hash_secret, CLIENT_ID_BYTES, CLIENT_SECRET_BYTES};
use crate::database::CredentialStore;
use crate::logging::AppLogger;
use crate::models::{ClientListing, GrantType, NewOAuth2Client, OAuth2Client};

/// OAuth 2.0 Client Registration Manager
///
/// Mutations answer `access_denied` for both unknown clients and clients owned
/// by someone else, so non-owners learn nothing about existence.
pub struct ClientRegistrationManager {
    server: Arc<OAuth2AuthorizationServer>,
}

impl ClientRegistrationManager {
    /// Creates a new client registration manager
    #[must_use]
    pub const fn new(server: Arc<OAuth2AuthorizationServer>) -> Self {
        Self { server }
    }

    /// The authorization engine this registry revokes through
    #[must_use]
    pub const fn server(&self) -> &Arc<OAuth2AuthorizationServer> {
        &self.server
    }

    fn store(&self) -> &dyn CredentialStore {
        self.server.store().as_ref()
    }

    /// Register a new client owned by `owner`
    ///
    /// The plaintext secret is returned here and nowhere else.
    ///
    /// # Errors
    /// `invalid_request` when validation fails, `server_error` on storage failure
    pub async fn register_client(
        &self,
        owner: Uuid,
        request: ClientRegistrationRequest,
    ) -> Result<ClientRegistrationResponse, OAuth2Error> {
        Self::validate_registration_request(&request)?;

        let client_secret = generate_opaque_id(CLIENT_SECRET_BYTES);
        let mut grants = request.grants.unwrap_or_else(GrantType::defaults);
        grants.dedup();

        let client = self
            .store()
            .insert_client(&NewOAuth2Client {
                client_id: generate_opaque_id(CLIENT_ID_BYTES),
                name: request.name.trim().to_owned(),
                description: request.description,
                logo_url: request.logo_url,
                initial_authorization_url: request.initial_authorization_url,
                client_secret_hash: hash_secret(&client_secret),
                redirect_uris: request.redirect_uris,
                grants,
                user_id: owner,
                is_public: request.is_public,
            })
            .await
            .map_err(|e| storage_failure("insert_client", &e))?;

        AppLogger::log_client_event(&client.client_id, &owner.to_string(), "registered");
        Ok(ClientRegistrationResponse {
            client,
            client_secret,
        })
    }

    fn validate_registration_request(request: &ClientRegistrationRequest) -> Result<(), OAuth2Error> {
        if request.name.trim().is_empty() {
            return Err(OAuth2Error::invalid_request("Client name is required"));
        }
        if request.redirect_uris.is_empty() {
            return Err(OAuth2Error::invalid_request(
                "At least one redirect_uri is required",
            ));
        }
        for uri in &request.redirect_uris {
            redirect::validate_pattern(uri).map_err(|msg| OAuth2Error::invalid_request(&msg))?;
        }
        if request.grants.as_ref().is_some_and(Vec::is_empty) {
            return Err(OAuth2Error::invalid_request(
                "At least one grant type is required",
            ));
        }
        if let Some(logo_url) = &request.logo_url {
            validate_absolute_url("logo_url", logo_url)?;
        }
        if let Some(initial) = &request.initial_authorization_url {
            validate_absolute_url("initial_authorization_url", initial)?;
        }
        Ok(())
    }

    /// Client by public id, for the consent page
    ///
    /// # Errors
    /// `invalid_client` when the client does not exist
    pub async fn get_client(&self, client_id: &str) -> Result<OAuth2Client, OAuth2Error> {
        self.store()
            .find_client_by_public_id(client_id)
            .await
            .map_err(|e| storage_failure("find_client_by_public_id", &e))?
            .ok_or_else(OAuth2Error::invalid_client)
    }

    /// Clients `user_id` may see, flagged with ownership and consent
    ///
    /// # Errors
    /// `server_error` on storage failure
    pub async fn list_clients(&self, user_id: Uuid) -> Result<Vec<ClientListing>, OAuth2Error> {
        self.store()
            .list_clients_visible_to(user_id)
            .await
            .map_err(|e| storage_failure("list_clients_visible_to", &e))
    }

    /// Replace a client's secret and return the new one in plaintext, once
    ///
    /// # Errors
    /// `access_denied` when the client is unknown or not owned by `owner`
    pub async fn regenerate_client_secret(
        &self,
        client_id: &str,
        owner: Uuid,
    ) -> Result<ClientCredentials, OAuth2Error> {
        let client = self.owned_client(client_id, owner).await?;
        let client_secret = generate_opaque_id(CLIENT_SECRET_BYTES);

        let rotated = self
            .store()
            .rotate_client_secret(client.id, &hash_secret(&client_secret), owner)
            .await
            .map_err(|e| storage_failure("rotate_client_secret", &e))?;
        if !rotated {
            return Err(not_owned());
        }

        AppLogger::log_client_event(&client.client_id, &owner.to_string(), "secret_rotated");
        Ok(ClientCredentials {
            client_id: client.client_id,
            client_secret,
        })
    }

    /// Delete a client after revoking every token it holds
    ///
    /// A failed revocation is logged and the deletion goes ahead; stored pairs
    /// go away with the client row.
    ///
    /// # Errors
    /// `access_denied` when the client is unknown or not owned by `owner`
    pub async fn delete_client(&self, client_id: &str, owner: Uuid) -> Result<(), OAuth2Error> {
        let client = self.owned_client(client_id, owner).await?;

        match self.server.revoke_client_tokens(client.id, None).await {
            Ok(revoked) => {
                tracing::info!(client_id = %client.client_id, revoked, "Revoked tokens of deleted client");
            }
            Err(e) => {
                warn!(
                    client_id = %client.client_id,
                    error = %e,
                    "Token revocation failed before client deletion; deleting anyway"
                );
            }
        }

        let deleted = self
            .store()
            .delete_client(client.id, owner)
            .await
            .map_err(|e| storage_failure("delete_client", &e))?;
        if !deleted {
            return Err(not_owned());
        }

        AppLogger::log_client_event(&client.client_id, &owner.to_string(), "deleted");
        Ok(())
    }

    /// Set or clear a client's logo
    ///
    /// # Errors
    /// `invalid_request` for a malformed URL, `access_denied` when not the owner
    pub async fn update_logo(
        &self,
        client_id: &str,
        owner: Uuid,
        logo_url: Option<&str>,
    ) -> Result<(), OAuth2Error> {
        if let Some(url) = logo_url {
            validate_absolute_url("logo_url", url)?;
        }
        let client = self.owned_client(client_id, owner).await?;
        let updated = self
            .store()
            .set_client_logo(client.id, owner, logo_url)
            .await
            .map_err(|e| storage_failure("set_client_logo", &e))?;
        if updated {
            Ok(())
        } else {
            Err(not_owned())
        }
    }

    /// Flip a client between listed-to-everyone and private; returns the new state
    ///
    /// # Errors
    /// `access_denied` when the client is unknown or not owned by `owner`
    pub async fn change_visibility(&self, client_id: &str, owner: Uuid) -> Result<bool, OAuth2Error> {
        let client = self.owned_client(client_id, owner).await?;
        let is_public = !client.is_public;
        let updated = self
            .store()
            .set_client_visibility(client.id, owner, is_public)
            .await
            .map_err(|e| storage_failure("set_client_visibility", &e))?;
        if !updated {
            return Err(not_owned());
        }

        AppLogger::log_client_event(
            &client.client_id,
            &owner.to_string(),
            if is_public { "made_public" } else { "made_private" },
        );
        Ok(is_public)
    }

    async fn owned_client(&self, client_id: &str, owner: Uuid) -> Result<OAuth2Client, OAuth2Error> {
        self.store()
            .find_client_by_public_id(client_id)
            .await
            .map_err(|e| storage_failure("find_client_by_public_id", &e))?
            .filter(|client| client.is_owned_by(owner))
            .ok_or_else(not_owned)
    }
}

fn not_owned() -> OAuth2Error {
    OAuth2Error::access_denied("Client not found or not owned by user")
}

fn validate_absolute_url(field: &str, value: &str) -> Result<(), OAuth2Error> {
    match Url::parse(value) {
        Ok(url) if matches!(url.scheme(), "https" | "http") => Ok(()),
        _ => Err(OAuth2Error::invalid_request(&format!(
            "{field} must be an absolute http(s) URL"
        ))),
    }
}

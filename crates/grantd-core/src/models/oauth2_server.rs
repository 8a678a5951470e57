// ABOUTME: Persistence records for OAuth 2.0 clients, authorization codes, tokens and consents
// ABOUTME: Only hashes of secrets, codes and tokens appear in these types
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::{self, Display, Formatter};
use std::str::FromStr;
use uuid::Uuid;

use super::Scope;

/// OAuth 2.0 grant types a client may be allowed to use
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GrantType {
    /// `authorization_code`
    AuthorizationCode,
    /// `refresh_token`
    RefreshToken,
}

impl GrantType {
    /// Wire name of the grant
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::AuthorizationCode => "authorization_code",
            Self::RefreshToken => "refresh_token",
        }
    }

    /// Grants given to a newly registered client
    #[must_use]
    pub fn defaults() -> Vec<Self> {
        vec![Self::AuthorizationCode, Self::RefreshToken]
    }

    /// Parse a comma-separated storage list, skipping unknown names
    #[must_use]
    pub fn parse_list(value: &str) -> Vec<Self> {
        value
            .split(',')
            .filter_map(|part| part.trim().parse().ok())
            .collect()
    }

    /// Render a grant list in storage form
    #[must_use]
    pub fn join_list(grants: &[Self]) -> String {
        grants
            .iter()
            .map(|grant| grant.as_str())
            .collect::<Vec<_>>()
            .join(",")
    }
}

impl Display for GrantType {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GrantType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "authorization_code" => Ok(Self::AuthorizationCode),
            "refresh_token" => Ok(Self::RefreshToken),
            other => Err(format!("unsupported grant type: {other}")),
        }
    }
}

/// A registered OAuth 2.0 client application
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OAuth2Client {
    /// Storage-internal identity
    pub id: i64,
    /// Public client identifier
    pub client_id: String,
    /// Display name
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Logo shown on the consent page
    pub logo_url: Option<String>,
    /// Where the consent UI sends users to start the flow
    pub initial_authorization_url: Option<String>,
    /// SHA-256 digest of the client secret, never serialized
    #[serde(skip_serializing, default)]
    pub client_secret_hash: String,
    /// Allowed redirect URIs, exact or ending in `/*`
    pub redirect_uris: Vec<String>,
    /// Grant types the client may use
    pub grants: Vec<GrantType>,
    /// Owning user
    pub user_id: Uuid,
    /// Whether the client is listed to every user
    pub is_public: bool,
    /// Registration time
    pub created_at: DateTime<Utc>,
}

impl OAuth2Client {
    /// Whether `user_id` owns this client
    #[must_use]
    pub fn is_owned_by(&self, user_id: Uuid) -> bool {
        self.user_id == user_id
    }

    /// Whether the client may use `grant`
    #[must_use]
    pub fn allows_grant(&self, grant: GrantType) -> bool {
        self.grants.contains(&grant)
    }
}

/// A client as seen by a particular user in a listing
#[derive(Debug, Clone, Serialize)]
pub struct ClientListing {
    /// The client record
    #[serde(flatten)]
    pub client: OAuth2Client,
    /// The viewing user owns the client
    pub is_mine: bool,
    /// The viewing user has a consent row for the client
    pub is_authorized: bool,
}

/// Insert payload for a new client
#[derive(Debug, Clone)]
pub struct NewOAuth2Client {
    /// Public client identifier
    pub client_id: String,
    /// Display name
    pub name: String,
    /// Free-form description
    pub description: String,
    /// Logo URL
    pub logo_url: Option<String>,
    /// Consent entry point
    pub initial_authorization_url: Option<String>,
    /// SHA-256 digest of the client secret
    pub client_secret_hash: String,
    /// Allowed redirect URIs
    pub redirect_uris: Vec<String>,
    /// Grant types
    pub grants: Vec<GrantType>,
    /// Owning user
    pub user_id: Uuid,
    /// Visibility flag
    pub is_public: bool,
}

/// A stored authorization code
#[derive(Debug, Clone)]
pub struct OAuth2AuthorizationCode {
    /// SHA-256 digest of the code
    pub code_hash: String,
    /// Internal id of the client the code was issued to
    pub client_id: i64,
    /// Public id of the same client
    pub client_public_id: String,
    /// Authorizing user
    pub user_id: Uuid,
    /// Granted scope
    pub scope: Scope,
    /// Redirect URI the code was issued for
    pub redirect_uri: String,
    /// Expiry; a code in the past is consumed, replaced or invalidated
    pub expires_at: DateTime<Utc>,
}

/// Insert payload for an authorization code
#[derive(Debug, Clone)]
pub struct NewAuthorizationCode {
    /// Internal id of the client
    pub client_id: i64,
    /// Authorizing user
    pub user_id: Uuid,
    /// SHA-256 digest of the code
    pub code_hash: String,
    /// Expiry
    pub expires_at: DateTime<Utc>,
    /// Redirect URI the code is bound to
    pub redirect_uri: String,
    /// Granted scope
    pub scope: Scope,
}

/// Hashes and expiry of a freshly generated token pair
#[derive(Debug, Clone)]
pub struct TokenPairHashes {
    /// SHA-256 digest of the access token
    pub access_token_hash: String,
    /// Access token expiry
    pub access_token_expires_at: DateTime<Utc>,
    /// SHA-256 digest of the refresh token
    pub refresh_token_hash: String,
}

/// A stored access/refresh token pair
#[derive(Debug, Clone)]
pub struct OAuth2Token {
    /// Storage-internal identity
    pub id: i64,
    /// SHA-256 digest of the access token
    pub access_token_hash: String,
    /// Access token expiry
    pub access_token_expires_at: DateTime<Utc>,
    /// SHA-256 digest of the refresh token
    pub refresh_token_hash: String,
    /// Granted scope
    pub scope: Scope,
    /// Internal id of the owning client
    pub client_id: i64,
    /// Public id of the owning client
    pub client_public_id: String,
    /// Owning user
    pub user_id: Uuid,
    /// Irreversible revocation flag
    pub revoked: bool,
}

impl OAuth2Token {
    /// Whether the access token is usable at `now`
    #[must_use]
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        !self.revoked && now < self.access_token_expires_at
    }
}

/// A user's approval of a client
#[derive(Debug, Clone, Serialize)]
pub struct OAuth2Consent {
    /// Approving user
    pub user_id: Uuid,
    /// Internal id of the approved client
    pub client_id: i64,
    /// Last approved scope
    pub scope: Scope,
    /// Time of the last approval
    pub updated_at: DateTime<Utc>,
}

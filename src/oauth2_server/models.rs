// ABOUTME: OAuth 2.0 request/response types, grant variants, resolved principals and the error taxonomy
// ABOUTME: OAuth2Error renders as {error, error_description} with an HTTP status per error code
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::models::{GrantType, OAuth2Client, Scope};

/// Client registration request
#[derive(Debug, Clone, Deserialize)]
pub struct ClientRegistrationRequest {
    /// Display name
    pub name: String,
    /// Free-form description
    #[serde(default)]
    pub description: String,
    /// Logo shown on the consent page
    pub logo_url: Option<String>,
    /// Where the consent UI sends users to start the flow
    pub initial_authorization_url: Option<String>,
    /// Redirect URI patterns, exact or ending in `/*`
    pub redirect_uris: Vec<String>,
    /// Grant types; defaults to authorization code and refresh token
    pub grants: Option<Vec<GrantType>>,
    /// List the client to every user
    #[serde(default)]
    pub is_public: bool,
}

/// Client registration response; the only time the plaintext secret is shown
#[derive(Debug, Serialize)]
pub struct ClientRegistrationResponse {
    /// The stored client
    #[serde(flatten)]
    pub client: OAuth2Client,
    /// Plaintext client secret
    pub client_secret: String,
}

/// Newly generated client credentials, returned once
#[derive(Debug, Serialize)]
pub struct ClientCredentials {
    /// Public client identifier
    pub client_id: String,
    /// Plaintext client secret
    pub client_secret: String,
}

/// OAuth 2.0 Authorization Request
#[derive(Debug, Deserialize, Clone)]
pub struct AuthorizeRequest {
    /// Response type; only `code` is supported
    pub response_type: String,
    /// Client identifier
    pub client_id: String,
    /// Redirect URI for response
    pub redirect_uri: String,
    /// Space-delimited requested scopes
    pub scope: Option<String>,
    /// State parameter for CSRF protection
    pub state: Option<String>,
}

/// OAuth 2.0 Authorization Response
#[derive(Debug, Serialize)]
pub struct AuthorizeResponse {
    /// Authorization code
    pub code: String,
    /// State parameter (if provided in request)
    pub state: Option<String>,
    /// Redirect URI with `code` and `state` appended
    pub redirect_to: String,
}

/// A freshly issued authorization code
#[derive(Debug, Clone)]
pub struct IssuedAuthorizationCode {
    /// Plaintext code, handed to the client once
    pub code: String,
    /// Expiry
    pub expires_at: DateTime<Utc>,
}

/// OAuth 2.0 Token Request
#[derive(Debug, Deserialize)]
pub struct TokenRequest {
    /// `authorization_code` or `refresh_token`
    pub grant_type: String,
    /// Authorization code (for `authorization_code` grant)
    pub code: Option<String>,
    /// Redirect URI the code was issued for
    pub redirect_uri: Option<String>,
    /// Client ID
    pub client_id: String,
    /// Client secret; omitted by public clients
    pub client_secret: Option<String>,
    /// Narrowed scope (for `refresh_token` grant)
    pub scope: Option<String>,
    /// Refresh token (for `refresh_token` grant)
    pub refresh_token: Option<String>,
}

/// Grant presented at the token endpoint
#[derive(Debug, Clone)]
pub enum TokenGrant {
    /// Exchange an authorization code
    AuthorizationCode {
        /// Plaintext code
        code: String,
        /// Redirect URI presented with the code
        redirect_uri: String,
    },
    /// Rotate a token pair
    RefreshToken {
        /// Plaintext refresh token
        refresh_token: String,
        /// Optional narrower scope
        scope: Option<Scope>,
    },
}

impl TokenGrant {
    /// Grant type of this variant
    #[must_use]
    pub const fn grant_type(&self) -> GrantType {
        match self {
            Self::AuthorizationCode { .. } => GrantType::AuthorizationCode,
            Self::RefreshToken { .. } => GrantType::RefreshToken,
        }
    }
}

impl TryFrom<&TokenRequest> for TokenGrant {
    type Error = OAuth2Error;

    fn try_from(request: &TokenRequest) -> Result<Self, Self::Error> {
        let grant_type: GrantType = request
            .grant_type
            .parse()
            .map_err(|_| OAuth2Error::unsupported_grant_type())?;

        match grant_type {
            GrantType::AuthorizationCode => {
                let code = request
                    .code
                    .clone()
                    .ok_or_else(|| OAuth2Error::invalid_request("Missing code parameter"))?;
                let redirect_uri = request.redirect_uri.clone().ok_or_else(|| {
                    OAuth2Error::invalid_request("Missing redirect_uri parameter")
                })?;
                Ok(Self::AuthorizationCode { code, redirect_uri })
            }
            GrantType::RefreshToken => {
                let refresh_token = request.refresh_token.clone().ok_or_else(|| {
                    OAuth2Error::invalid_request("Missing refresh_token parameter")
                })?;
                Ok(Self::RefreshToken {
                    refresh_token,
                    scope: request.scope.as_deref().map(Scope::parse),
                })
            }
        }
    }
}

/// A freshly issued token pair
#[derive(Debug, Clone)]
pub struct TokenPair {
    /// Plaintext access token
    pub access_token: String,
    /// Plaintext refresh token
    pub refresh_token: String,
    /// Access token expiry
    pub expires_at: DateTime<Utc>,
    /// Granted scope
    pub scope: Scope,
    /// Owning user
    pub user_id: Uuid,
    /// Public id of the owning client
    pub client_id: String,
}

/// OAuth 2.0 Token Response
#[derive(Debug, Serialize)]
pub struct TokenResponse {
    /// Access token
    pub access_token: String,
    /// Token type (always "Bearer")
    pub token_type: String,
    /// Access token expiry as Unix seconds
    pub expires_at: i64,
    /// Seconds until expiry
    pub expires_in: i64,
    /// Space-delimited granted scope
    pub scope: String,
    /// Refresh token
    pub refresh_token: String,
}

impl TokenResponse {
    /// Render a pair as seen at `now`
    #[must_use]
    pub fn from_pair(pair: TokenPair, now: DateTime<Utc>) -> Self {
        Self {
            expires_in: (pair.expires_at - now).num_seconds().max(0),
            expires_at: pair.expires_at.timestamp(),
            scope: pair.scope.to_string(),
            access_token: pair.access_token,
            token_type: "Bearer".to_owned(),
            refresh_token: pair.refresh_token,
        }
    }
}

/// The user and client behind a resolved access token
#[derive(Debug, Clone)]
pub struct Principal {
    /// Authenticated user
    pub user_id: Uuid,
    /// Public id of the client acting for the user
    pub client_id: String,
    /// Internal id of that client
    pub client_internal_id: i64,
    /// Granted scope
    pub scope: Scope,
    /// Access token expiry
    pub expires_at: DateTime<Utc>,
}

/// OAuth 2.0 Error Response
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct OAuth2Error {
    /// Error code
    pub error: String,
    /// Human-readable error description
    pub error_description: Option<String>,
}

impl OAuth2Error {
    fn new(error: &str, description: &str) -> Self {
        Self {
            error: error.to_owned(),
            error_description: Some(description.to_owned()),
        }
    }

    /// Create an `invalid_request` error
    #[must_use]
    pub fn invalid_request(description: &str) -> Self {
        Self::new("invalid_request", description)
    }

    /// Create an `invalid_client` error
    #[must_use]
    pub fn invalid_client() -> Self {
        Self::new("invalid_client", "Client authentication failed")
    }

    /// Create an `invalid_grant` error
    #[must_use]
    pub fn invalid_grant(description: &str) -> Self {
        Self::new("invalid_grant", description)
    }

    /// Create an `invalid_scope` error
    #[must_use]
    pub fn invalid_scope(description: &str) -> Self {
        Self::new("invalid_scope", description)
    }

    /// Create an `unsupported_grant_type` error
    #[must_use]
    pub fn unsupported_grant_type() -> Self {
        Self::new("unsupported_grant_type", "Grant type not supported")
    }

    /// Create an `unauthorized_client` error
    /// Used when a client attempts a grant it was not registered for
    #[must_use]
    pub fn unauthorized_client(description: &str) -> Self {
        Self::new("unauthorized_client", description)
    }

    /// Create an `access_denied` error
    #[must_use]
    pub fn access_denied(description: &str) -> Self {
        Self::new("access_denied", description)
    }

    /// Create a `server_error` error
    #[must_use]
    pub fn server_error() -> Self {
        Self::new("server_error", "The authorization server encountered an error")
    }

    /// Whether this error carries the given code
    #[must_use]
    pub fn is(&self, error: &str) -> bool {
        self.error == error
    }

    /// HTTP status for this error
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self.error.as_str() {
            "invalid_client" => StatusCode::UNAUTHORIZED,
            "access_denied" => StatusCode::FORBIDDEN,
            "server_error" => StatusCode::INTERNAL_SERVER_ERROR,
            _ => StatusCode::BAD_REQUEST,
        }
    }
}

impl fmt::Display for OAuth2Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.error_description {
            Some(description) => write!(f, "{}: {description}", self.error),
            None => f.write_str(&self.error),
        }
    }
}

impl std::error::Error for OAuth2Error {}

impl IntoResponse for OAuth2Error {
    fn into_response(self) -> Response {
        (self.status_code(), Json(self)).into_response()
    }
}

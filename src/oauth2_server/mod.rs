// ABOUTME: OAuth 2.0 authorization server core: engine, client registry, scopes and revocation
// ABOUTME: Issues, rotates, resolves and revokes opaque credentials for third-party clients
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

/// Client registry with owner-enforced mutations
pub mod client_registration;
/// OAuth 2.0 authorization engine
pub mod endpoints;
/// OAuth 2.0 request, response and error types
pub mod models;
/// Redirect URI matching and validation
pub mod redirect;
/// Process-local revocation cache
pub mod revocation;
/// Endpoint scope declarations and scope verification
pub mod scopes;

pub use client_registration::ClientRegistrationManager;
pub use endpoints::{OAuth2AuthorizationServer, WarmUpReport};
pub use models::{
    AuthorizeRequest, AuthorizeResponse, ClientCredentials, ClientRegistrationRequest,
    ClientRegistrationResponse, IssuedAuthorizationCode, OAuth2Error, Principal, TokenGrant,
    TokenPair, TokenRequest, TokenResponse,
};
pub use revocation::RevocationCache;

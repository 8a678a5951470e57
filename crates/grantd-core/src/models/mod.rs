// ABOUTME: Core data models for the grantd authorization server
// ABOUTME: Re-exports OAuth 2.0 client, code, token, consent and scope types
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! # Data Models
//!
//! Persistence-level records shared by the credential store and the
//! authorization engine. None of them ever carries a plaintext secret, token
//! or authorization code: only one-way hashes are persisted.

mod oauth2_server;
mod scope;

pub use oauth2_server::{
    ClientListing, GrantType, NewAuthorizationCode, NewOAuth2Client, OAuth2AuthorizationCode,
    OAuth2Client, OAuth2Consent, OAuth2Token, TokenPairHashes,
};
pub use scope::Scope;

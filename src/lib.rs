// ABOUTME: Main library entry point for the grantd authorization server
// ABOUTME: Client registry, authorization codes, token lifecycle, revocation and bearer authentication
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![deny(unsafe_code)]

//! # grantd
//!
//! An OAuth 2.0 style authorization server meant to be embedded in a larger
//! application. Third-party clients obtain opaque access and refresh tokens
//! that act for a user without ever seeing the user's session credentials.
//!
//! ## Architecture
//!
//! - **crypto**: SHA-256 digests and random opaque identifiers
//! - **database**: the [`database::CredentialStore`] trait and its `SQLite` implementation
//! - **`oauth2_server`**: authorization engine, client registry, scopes and revocation cache
//! - **middleware**: axum gate resolving bearer tokens into principals
//! - **config** / **logging**: environment-driven settings and tracing setup
//!
//! ## Bootstrap
//!
//! ```rust,no_run
//! use grantd::config::ServerConfig;
//! use grantd::database::{Database, OAuth2RepositoryImpl};
//! use grantd::oauth2_server::OAuth2AuthorizationServer;
//! use std::sync::Arc;
//!
//! # async fn example() -> grantd::errors::AppResult<()> {
//! let config = ServerConfig::from_env();
//! let database = Database::new(
//!     &config.database.url.to_connection_string(),
//!     config.database.max_connections,
//! )
//! .await?;
//! let store = Arc::new(OAuth2RepositoryImpl::new(database));
//! let server = OAuth2AuthorizationServer::bootstrap(store, config.oauth2).await;
//! # let _ = server;
//! # Ok(())
//! # }
//! ```

/// Environment-driven configuration
pub mod config;

/// Secret and token codec
pub mod crypto;

/// Credential store
pub mod database;

/// Unified error handling
pub mod errors;

/// Structured logging setup
pub mod logging;

/// HTTP middleware
pub mod middleware;

/// Persistence models
pub mod models;

/// OAuth 2.0 authorization server
pub mod oauth2_server;

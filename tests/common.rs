// ABOUTME: Shared test utilities and setup functions for integration tests
// ABOUTME: In-memory credential store, engine and registry construction plus client helpers
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence
#![allow(
    dead_code,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::must_use_candidate
)]
//! Shared test utilities for `grantd`

use anyhow::Result;
use grantd::config::OAuth2ServerConfig;
use grantd::database::{Database, OAuth2RepositoryImpl};
use grantd::models::{OAuth2Client, Scope};
use grantd::oauth2_server::{
    ClientRegistrationManager, ClientRegistrationRequest, OAuth2AuthorizationServer,
    RevocationCache, TokenPair,
};
use std::sync::{Arc, Once};
use uuid::Uuid;

static INIT_LOGGER: Once = Once::new();

/// Redirect URI registered for test clients
pub const REDIRECT_URI: &str = "https://x/cb";

/// Initialize quiet logging for tests (call once per test process)
pub fn init_test_logging() {
    INIT_LOGGER.call_once(|| {
        let log_level = match std::env::var("TEST_LOG").as_deref() {
            Ok("TRACE") => tracing::Level::TRACE,
            Ok("DEBUG") => tracing::Level::DEBUG,
            Ok("INFO") => tracing::Level::INFO,
            _ => tracing::Level::WARN,
        };

        tracing_subscriber::fmt()
            .with_max_level(log_level)
            .with_test_writer()
            .init();
    });
}

/// Fresh in-memory credential store
pub async fn create_test_database() -> Result<Database> {
    init_test_logging();
    // One connection: every pooled connection would get its own in-memory database
    Ok(Database::new("sqlite::memory:", 1).await?)
}

/// Engine, registry and the concrete store behind them
pub struct TestServer {
    pub database: Database,
    pub store: Arc<OAuth2RepositoryImpl>,
    pub server: Arc<OAuth2AuthorizationServer>,
    pub registry: ClientRegistrationManager,
}

/// Engine over a fresh in-memory store with default lifetimes
pub async fn create_test_server() -> Result<TestServer> {
    create_test_server_with(OAuth2ServerConfig::default()).await
}

/// Engine over a fresh in-memory store with the given policy
pub async fn create_test_server_with(config: OAuth2ServerConfig) -> Result<TestServer> {
    let database = create_test_database().await?;
    Ok(server_over(database, config))
}

/// Engine over an existing database with an empty revocation cache
pub fn server_over(database: Database, config: OAuth2ServerConfig) -> TestServer {
    let store = Arc::new(OAuth2RepositoryImpl::new(database.clone()));
    let server = Arc::new(OAuth2AuthorizationServer::new(
        store.clone(),
        Arc::new(RevocationCache::new()),
        config,
    ));
    TestServer {
        database,
        store,
        registry: ClientRegistrationManager::new(server.clone()),
        server,
    }
}

/// Registration request with one redirect URI and default grants
pub fn registration_request(name: &str) -> ClientRegistrationRequest {
    ClientRegistrationRequest {
        name: name.to_owned(),
        description: format!("{name} test client"),
        logo_url: None,
        initial_authorization_url: None,
        redirect_uris: vec![REDIRECT_URI.to_owned()],
        grants: None,
        is_public: false,
    }
}

/// Register a client and return it with its plaintext secret
pub async fn register_client(
    test: &TestServer,
    owner: Uuid,
    name: &str,
) -> Result<(OAuth2Client, String)> {
    let registered = test
        .registry
        .register_client(owner, registration_request(name))
        .await?;
    Ok((registered.client, registered.client_secret))
}

/// Run the code flow for `user` and return the pair
pub async fn issue_token_pair(
    test: &TestServer,
    client: &OAuth2Client,
    user: Uuid,
    scope: &str,
) -> Result<TokenPair> {
    let issued = test
        .server
        .issue_authorization_code(client, user, &Scope::parse(scope), REDIRECT_URI)
        .await?;
    Ok(test
        .server
        .exchange_authorization_code(&issued.code, client, REDIRECT_URI)
        .await?)
}

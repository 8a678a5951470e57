// ABOUTME: Administrative command line for the grantd credential store
// ABOUTME: Registers and manages OAuth 2.0 clients and maintains token tables
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Usage:
//! ```bash
//! # Register a client owned by a user
//! grantd-admin client register --owner 6f1c... --name app1 --redirect-uri https://x/cb
//!
//! # List clients visible to a user, or every client
//! grantd-admin client list --owner 6f1c...
//! grantd-admin client list
//!
//! # Rotate a client secret (printed once)
//! grantd-admin client rotate-secret --client-id abc --owner 6f1c...
//!
//! # Withdraw a user's authorization of a client
//! grantd-admin tokens revoke --client-id abc --user 6f1c...
//!
//! # Delete expired rows
//! grantd-admin tokens purge
//! ```

use anyhow::{anyhow, Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use grantd::config::{DatabaseUrl, ServerConfig};
use grantd::database::{CredentialStore, Database, OAuth2RepositoryImpl};
use grantd::logging::{LogFormat, LoggingConfig};
use grantd::oauth2_server::{
    ClientRegistrationManager, ClientRegistrationRequest, OAuth2AuthorizationServer,
};
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

#[derive(Parser)]
#[command(
    name = "grantd-admin",
    about = "grantd OAuth 2.0 client and token administration",
    long_about = "Manage OAuth 2.0 clients and token tables of a grantd credential store."
)]
struct AdminArgs {
    #[command(subcommand)]
    command: AdminCommand,

    /// Database URL override
    #[arg(long)]
    database_url: Option<String>,

    /// Enable debug logging
    #[arg(long, short = 'v')]
    verbose: bool,
}

#[derive(Subcommand)]
enum AdminCommand {
    /// Client registry operations
    #[command(subcommand)]
    Client(ClientCommand),

    /// Token table maintenance
    #[command(subcommand)]
    Tokens(TokensCommand),
}

#[derive(Subcommand)]
enum ClientCommand {
    /// Register a new client and print its secret once
    Register {
        /// Owning user id
        #[arg(long)]
        owner: Uuid,

        /// Display name
        #[arg(long)]
        name: String,

        /// Redirect URI pattern (repeatable)
        #[arg(long = "redirect-uri", required = true)]
        redirect_uris: Vec<String>,

        /// Free-form description
        #[arg(long, default_value = "")]
        description: String,

        /// Logo URL
        #[arg(long)]
        logo_url: Option<String>,

        /// Where the consent UI starts the flow
        #[arg(long)]
        initial_authorization_url: Option<String>,

        /// List the client to every user
        #[arg(long)]
        public: bool,
    },

    /// List clients visible to a user, or all clients without --owner
    List {
        /// Viewing user id
        #[arg(long)]
        owner: Option<Uuid>,
    },

    /// Replace a client secret and print the new one once
    RotateSecret {
        /// Public client id
        #[arg(long)]
        client_id: String,

        /// Owning user id
        #[arg(long)]
        owner: Uuid,
    },

    /// Flip a client between public and private
    ToggleVisibility {
        /// Public client id
        #[arg(long)]
        client_id: String,

        /// Owning user id
        #[arg(long)]
        owner: Uuid,
    },

    /// Revoke a client's tokens and delete it
    Delete {
        /// Public client id
        #[arg(long)]
        client_id: String,

        /// Owning user id
        #[arg(long)]
        owner: Uuid,
    },
}

#[derive(Subcommand)]
enum TokensCommand {
    /// Delete expired token pairs and authorization codes
    Purge,

    /// Print how many revoked digests the store holds
    RevokedCount,

    /// Withdraw a user's authorization of a client
    Revoke {
        /// Public client id
        #[arg(long)]
        client_id: String,

        /// User id
        #[arg(long)]
        user: Uuid,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = AdminArgs::parse();

    let mut logging = LoggingConfig::from_env();
    if std::env::var("LOG_FORMAT").is_err() {
        logging.format = LogFormat::Compact;
    }
    if args.verbose {
        logging.level = "debug".into();
    }
    logging.init()?;

    let mut config = ServerConfig::from_env();
    if let Some(url) = args.database_url {
        config.database.url = DatabaseUrl::parse_url(&url);
    }

    let database = open_database(&config).await?;
    let store = Arc::new(OAuth2RepositoryImpl::new(database));

    match args.command {
        AdminCommand::Client(command) => {
            let server = Arc::new(OAuth2AuthorizationServer::bootstrap(store, config.oauth2).await);
            run_client_command(ClientRegistrationManager::new(server), command).await
        }
        AdminCommand::Tokens(command) => run_tokens_command(store, config, command).await,
    }
}

async fn open_database(config: &ServerConfig) -> Result<Database> {
    if let DatabaseUrl::SQLite { path } = &config.database.url {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }
    }

    info!("Connecting to database: {}", config.database.url);
    Ok(Database::new(
        &config.database.url.to_connection_string(),
        config.database.max_connections,
    )
    .await?)
}

async fn run_client_command(registry: ClientRegistrationManager, command: ClientCommand) -> Result<()> {
    match command {
        ClientCommand::Register {
            owner,
            name,
            redirect_uris,
            description,
            logo_url,
            initial_authorization_url,
            public,
        } => {
            let registered = registry
                .register_client(
                    owner,
                    ClientRegistrationRequest {
                        name,
                        description,
                        logo_url,
                        initial_authorization_url,
                        redirect_uris,
                        grants: None,
                        is_public: public,
                    },
                )
                .await?;
            println!("client_id:     {}", registered.client.client_id);
            println!("client_secret: {}", registered.client_secret);
            println!("The secret is shown only once; store it now.");
        }
        ClientCommand::List { owner: Some(owner) } => {
            for listing in registry.list_clients(owner).await? {
                println!(
                    "{}  {:<24} public={} mine={} authorized={}",
                    listing.client.client_id,
                    listing.client.name,
                    listing.client.is_public,
                    listing.is_mine,
                    listing.is_authorized
                );
            }
        }
        ClientCommand::List { owner: None } => {
            let clients = registry
                .server()
                .store()
                .list_all_clients()
                .await
                .map_err(|e| anyhow!("Failed to list clients: {e}"))?;
            for client in clients {
                println!(
                    "{}  {:<24} owner={} public={}",
                    client.client_id, client.name, client.user_id, client.is_public
                );
            }
        }
        ClientCommand::RotateSecret { client_id, owner } => {
            let credentials = registry.regenerate_client_secret(&client_id, owner).await?;
            println!("client_id:     {}", credentials.client_id);
            println!("client_secret: {}", credentials.client_secret);
        }
        ClientCommand::ToggleVisibility { client_id, owner } => {
            let is_public = registry.change_visibility(&client_id, owner).await?;
            println!("{client_id} is now {}", if is_public { "public" } else { "private" });
        }
        ClientCommand::Delete { client_id, owner } => {
            registry.delete_client(&client_id, owner).await?;
            println!("Deleted {client_id}");
        }
    }
    Ok(())
}

async fn run_tokens_command(
    store: Arc<OAuth2RepositoryImpl>,
    config: ServerConfig,
    command: TokensCommand,
) -> Result<()> {
    match command {
        TokensCommand::Purge => {
            let database = store.database();
            let now = Utc::now();
            let tokens = database.purge_expired_oauth2_tokens(now).await?;
            let codes = database.purge_expired_authorization_codes(now).await?;
            println!("Purged {tokens} token pairs and {codes} authorization codes");
        }
        TokensCommand::RevokedCount => {
            let hashes = store.database().list_revoked_oauth2_token_hashes().await?;
            println!("{} revoked token digests", hashes.len());
        }
        TokensCommand::Revoke { client_id, user } => {
            let server = OAuth2AuthorizationServer::bootstrap(store, config.oauth2).await;
            let client = server
                .store()
                .find_client_by_public_id(&client_id)
                .await?
                .ok_or_else(|| anyhow!("Unknown client {client_id}"))?;
            let changed = server.revoke_client_for_user(client.id, user).await?;
            println!(
                "{}",
                if changed {
                    "Authorization withdrawn"
                } else {
                    "Nothing to revoke"
                }
            );
        }
    }
    Ok(())
}

// ABOUTME: Authorization server policy: token and code lifetimes and the reserved user
// ABOUTME: Loaded from environment variables with logged fallbacks to defaults
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use chrono::Duration;
use tracing::warn;
use uuid::Uuid;

use super::environment::env_parsed_or;

/// Default access token lifetime: 7 days
pub const DEFAULT_ACCESS_TOKEN_TTL_SECS: i64 = 7 * 24 * 60 * 60;
/// Default authorization code lifetime: 10 minutes
pub const DEFAULT_AUTHORIZATION_CODE_TTL_SECS: i64 = 10 * 60;
/// Longest accepted lifetime for either: 10 years
pub const MAX_TTL_SECS: i64 = 10 * 365 * 24 * 60 * 60;

/// Lifetimes and policy for the authorization engine
#[derive(Debug, Clone)]
pub struct OAuth2ServerConfig {
    /// Access token lifetime
    pub access_token_ttl: Duration,
    /// Authorization code lifetime
    pub authorization_code_ttl: Duration,
    /// User that may never authenticate through a bearer token
    pub reserved_user_id: Option<Uuid>,
}

impl OAuth2ServerConfig {
    /// Load from `ACCESS_TOKEN_TTL_SECONDS`, `AUTHORIZATION_CODE_TTL_SECONDS`
    /// and `OAUTH2_RESERVED_USER_ID`
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            access_token_ttl: ttl_from_env("ACCESS_TOKEN_TTL_SECONDS", DEFAULT_ACCESS_TOKEN_TTL_SECS),
            authorization_code_ttl: ttl_from_env(
                "AUTHORIZATION_CODE_TTL_SECONDS",
                DEFAULT_AUTHORIZATION_CODE_TTL_SECS,
            ),
            reserved_user_id: std::env::var("OAUTH2_RESERVED_USER_ID")
                .ok()
                .and_then(|raw| parse_reserved_user(&raw)),
        }
    }
}

impl Default for OAuth2ServerConfig {
    fn default() -> Self {
        Self {
            access_token_ttl: Duration::seconds(DEFAULT_ACCESS_TOKEN_TTL_SECS),
            authorization_code_ttl: Duration::seconds(DEFAULT_AUTHORIZATION_CODE_TTL_SECS),
            reserved_user_id: None,
        }
    }
}

fn ttl_from_env(key: &str, default_secs: i64) -> Duration {
    ttl_or_default(key, env_parsed_or(key, default_secs), default_secs)
}

fn ttl_or_default(key: &str, secs: i64, default_secs: i64) -> Duration {
    if !(1..=MAX_TTL_SECS).contains(&secs) {
        warn!(
            "{} must be between 1 and {} seconds, using default {}",
            key, MAX_TTL_SECS, default_secs
        );
        return Duration::seconds(default_secs);
    }
    Duration::seconds(secs)
}

fn parse_reserved_user(raw: &str) -> Option<Uuid> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    match Uuid::parse_str(raw) {
        Ok(id) => Some(id),
        Err(e) => {
            warn!("Ignoring invalid OAUTH2_RESERVED_USER_ID: {}", e);
            None
        }
    }
}

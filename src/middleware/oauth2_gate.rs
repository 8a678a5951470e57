// ABOUTME: Axum middleware resolving `Authorization: Bearer` tokens into request principals
// ABOUTME: Fails open: a bad or missing token leaves the request unauthenticated, never rejected
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! OAuth2 Authentication Gate
//!
//! Resolves an inbound bearer token through the authorization engine and
//! injects [`ExtractedPrincipal`] into the request extensions. The gate never
//! rejects a request: without a header, or with a token that does not
//! resolve, the request carries `ExtractedPrincipal(None)` and the session
//! path (or the handler) decides what to do.
//!
//! A principal is attached only when the token resolves, its user is not the
//! reserved service user, and the path is either undeclared or declares a
//! scope the token holds.
//!
//! # Usage
//!
//! ```rust,no_run
//! use axum::{middleware, routing::get, Extension, Router};
//! use grantd::middleware::{oauth2_gate, ExtractedPrincipal};
//! use grantd::oauth2_server::OAuth2AuthorizationServer;
//! use std::sync::Arc;
//!
//! async fn handler(Extension(principal): Extension<ExtractedPrincipal>) -> String {
//!     principal
//!         .user_id()
//!         .map_or_else(|| "anonymous".to_owned(), |id| id.to_string())
//! }
//!
//! # fn example(server: Arc<OAuth2AuthorizationServer>) {
//! let app: Router = Router::new()
//!     .route("/feed/all", get(handler))
//!     .layer(middleware::from_fn_with_state(server, oauth2_gate));
//! # }
//! ```

use axum::{
    extract::{Request, State},
    http::{header, HeaderMap},
    middleware::Next,
    response::Response,
};
use std::sync::Arc;
use tracing::debug;
use uuid::Uuid;

use crate::crypto::fingerprint;
use crate::logging::AppLogger;
use crate::oauth2_server::{scopes, OAuth2AuthorizationServer, Principal};

/// Principal resolved from a bearer token, if any
#[derive(Debug, Clone)]
pub struct ExtractedPrincipal(pub Option<Principal>);

impl ExtractedPrincipal {
    /// The principal if the request authenticated through a bearer token
    #[must_use]
    pub const fn get(&self) -> Option<&Principal> {
        self.0.as_ref()
    }

    /// Authenticated user, if any
    #[must_use]
    pub fn user_id(&self) -> Option<Uuid> {
        self.0.as_ref().map(|principal| principal.user_id)
    }
}

/// Bearer token gate; install with `middleware::from_fn_with_state`
pub async fn oauth2_gate(
    State(server): State<Arc<OAuth2AuthorizationServer>>,
    mut req: Request,
    next: Next,
) -> Response {
    let principal = match bearer_token(req.headers()) {
        Some(token) => authenticate(&server, &token, req.uri().path()).await,
        None => {
            debug!("No bearer token, deferring to session authentication");
            None
        }
    };

    req.extensions_mut().insert(ExtractedPrincipal(principal));
    next.run(req).await
}

fn bearer_token(headers: &HeaderMap) -> Option<String> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then(|| token.to_owned())
}

async fn authenticate(
    server: &OAuth2AuthorizationServer,
    token: &str,
    path: &str,
) -> Option<Principal> {
    let Some(principal) = server.resolve_access_token(token).await else {
        debug!(token = %fingerprint(token), path, "Bearer token did not resolve");
        return None;
    };

    if server.config().reserved_user_id == Some(principal.user_id) {
        AppLogger::log_security_event(
            "reserved_user_bearer_token",
            &format!("client {} presented a token for the reserved user", principal.client_id),
            Some(&principal.user_id.to_string()),
        );
        return None;
    }

    if let Some(required) = scopes::required_scopes(path) {
        if !OAuth2AuthorizationServer::verify_scope(&principal, required) {
            debug!(
                client_id = %principal.client_id,
                user_id = %principal.user_id,
                path,
                granted = %principal.scope,
                "Bearer token lacks the scope this path requires"
            );
            return None;
        }
    }

    Some(principal)
}

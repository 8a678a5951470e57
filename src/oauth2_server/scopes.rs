// ABOUTME: Endpoint scope declarations, the grantable scope catalogue and scope verification
// ABOUTME: Verification is set intersection with an always-granted identity scope
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Scope declarations
//!
//! Each API path declares the scopes that unlock it; a token is accepted for a
//! path when its granted scope set shares at least one element with the
//! declaration. The union of all declarations is the set of scopes a client
//! may request at the authorize step.

use std::collections::BTreeSet;
use std::sync::OnceLock;

use crate::models::Scope;

/// Identity scope every token implicitly holds
pub const BASELINE_SCOPE: &str = "openid";

/// Scopes that unlock each API path
pub const ENDPOINT_SCOPES: &[(&str, &[&str])] = &[
    ("/feed/all", &["feed", "feed:all"]),
    ("/feed/subscriptions", &["feed", "feed:subscriptions"]),
    ("/feed/posts", &["feed", "feed:posts"]),
    ("/feed/watch", &["feed", "feed:watch"]),
    ("/feed/sorting", &["feed", "feed:sorting"]),
    ("/invite/check", &["invite", "invite:check"]),
    ("/invite/use", &["invite", "invite:use"]),
    ("/invite/list", &["invite", "invite:list"]),
    ("/invite/regenerate", &["invite", "invite:regenerate"]),
    ("/invite/create", &["invite", "invite:create"]),
    ("/invite/delete", &["invite:delete"]),
    ("/notifications/list", &["notifications", "notifications:list"]),
    ("/notifications/read", &["notifications", "notifications:read"]),
    ("/notifications/hide", &["notifications", "notifications:hide"]),
    (
        "/notifications/read/all",
        &["notifications", "notifications:read", "notifications:read:all"],
    ),
    (
        "/notifications/hide/all",
        &["notifications", "notifications:hide", "notifications:hide:all"],
    ),
    ("/notifications/subscribe", &["notifications", "notifications:subscribe"]),
    ("/oauth2/clients", &["oauth2", "oauth2:clients"]),
    ("/oauth2/client", &["oauth2", "oauth2:client"]),
    (
        "/oauth2/client/register",
        &["oauth2", "oauth2:client", "oauth2:client:register"],
    ),
    (
        "/oauth2/client/regenerate-secret",
        &["oauth2", "oauth2:client", "oauth2:client:regenerate-secret"],
    ),
    (
        "/oauth2/client/update-logo",
        &["oauth2", "oauth2:client", "oauth2:client:update-logo"],
    ),
    (
        "/oauth2/client/delete",
        &["oauth2", "oauth2:client", "oauth2:client:delete"],
    ),
    (
        "/oauth2/client/change-visibility",
        &["oauth2", "oauth2:client", "oauth2:client:change-visibility"],
    ),
    ("/oauth2/authorize", &["oauth2", "oauth2:authorize"]),
    ("/oauth2/unauthorize", &["oauth2", "oauth2:unauthorize"]),
    ("/oauth2/token", &["oauth2", "oauth2:token"]),
    ("/post/get", &["post", "post:get"]),
    ("/post/create", &["post", "post:create"]),
    ("/post/edit", &["post", "post:edit"]),
    ("/post/comment", &["post", "post:comment"]),
    ("/post/preview", &["post", "post:preview"]),
    ("/post/read", &["post", "post:read"]),
    ("/post/bookmark", &["post", "post:bookmark"]),
    ("/post/watch", &["post", "post:watch"]),
    ("/post/translate", &["post", "post:translate"]),
    ("/post/get-comment", &["post", "post:get-comment"]),
    ("/post/edit-comment", &["post", "post:edit-comment"]),
    ("/post/history", &["post", "post:history"]),
    ("/post/get-public-key", &["post", "post:get-public-key"]),
    ("/search", &["search"]),
    ("/site", &["site"]),
    ("/site/subscribe", &["site:subscribe"]),
    ("/site/subscriptions", &["site:subscriptions"]),
    ("/site/list", &["site:list"]),
    ("/site/create", &["site", "site:create"]),
    ("/status", &["status", BASELINE_SCOPE]),
    ("/user/profile", &["user", "user:profile"]),
    ("/user/posts", &["user", "user:posts"]),
    ("/user/comments", &["user", "user:comments"]),
    ("/user/karma", &["user", "user:karma"]),
    ("/user/clearCache", &["user", "user:clearCache"]),
    ("/user/restrictions", &["user", "user:restrictions"]),
    ("/user/savebio", &["user", "user:savebio"]),
    ("/user/savename", &["user", "user:savename"]),
    ("/user/savegender", &["user", "user:savegender"]),
    ("/user/suggest-username", &["user", "user:suggest-username"]),
    ("/user/save-public-key", &["user", "user:save-public-key"]),
    ("/vote/set", &["vote", "vote:set"]),
    ("/vote/list", &["vote", "vote:list"]),
];

/// Scopes declared for `path`, `None` when the path is not scope-guarded
#[must_use]
pub fn required_scopes(path: &str) -> Option<&'static [&'static str]> {
    let path = path.trim_end_matches('/');
    ENDPOINT_SCOPES
        .iter()
        .find(|(endpoint, _)| *endpoint == path)
        .map(|(_, scopes)| *scopes)
}

/// Every scope a client may request
pub fn grantable_scopes() -> &'static BTreeSet<&'static str> {
    static CATALOGUE: OnceLock<BTreeSet<&'static str>> = OnceLock::new();
    CATALOGUE.get_or_init(|| {
        ENDPOINT_SCOPES
            .iter()
            .flat_map(|(_, scopes)| scopes.iter().copied())
            .chain([BASELINE_SCOPE])
            .collect()
    })
}

/// Requested scopes that are not in the catalogue
#[must_use]
pub fn ungrantable<'a>(requested: &'a Scope) -> Vec<&'a str> {
    let catalogue = grantable_scopes();
    requested
        .iter()
        .filter(|scope| !catalogue.contains(*scope))
        .collect()
}

/// Whether `granted` (plus the baseline scope) intersects `required`
#[must_use]
pub fn verify_scope(granted: &Scope, required: &[&str]) -> bool {
    required.contains(&BASELINE_SCOPE) || granted.intersects(required.iter().copied())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_required_scopes_lookup() {
        assert_eq!(required_scopes("/feed/all"), Some(&["feed", "feed:all"][..]));
        assert_eq!(required_scopes("/feed/all/"), Some(&["feed", "feed:all"][..]));
        assert_eq!(required_scopes("/invite/delete"), Some(&["invite:delete"][..]));
        assert!(required_scopes("/unknown").is_none());
    }

    #[test]
    fn test_verify_scope_intersection() {
        let granted = Scope::parse("feed:all vote");
        assert!(verify_scope(&granted, &["feed", "feed:all"]));
        assert!(verify_scope(&granted, &["vote", "vote:set"]));
        assert!(!verify_scope(&granted, &["invite:delete"]));
    }

    #[test]
    fn test_baseline_scope_is_always_granted() {
        let granted = Scope::default();
        assert!(verify_scope(&granted, &[BASELINE_SCOPE]));
        assert!(verify_scope(&granted, required_scopes("/status").unwrap()));
        assert!(!verify_scope(&granted, &["search"]));
    }

    #[test]
    fn test_catalogue_is_union_of_declarations() {
        let catalogue = grantable_scopes();
        assert!(catalogue.contains("feed"));
        assert!(catalogue.contains("notifications:hide:all"));
        assert!(catalogue.contains(BASELINE_SCOPE));
        assert!(!catalogue.contains("admin"));

        let requested = Scope::parse("feed admin");
        assert_eq!(ungrantable(&requested), vec!["admin"]);
    }
}

// ABOUTME: Integration tests for the OAuth 2.0 client registry
// ABOUTME: Registration, secret rotation, ownership enforcement, deletion, visibility and logo updates
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use grantd::database::CredentialStore;
use grantd::models::GrantType;
use uuid::Uuid;

#[tokio::test]
async fn test_register_client_returns_secret_once() {
    let test = common::create_test_server().await.unwrap();
    let owner = Uuid::new_v4();

    let registered = test
        .registry
        .register_client(owner, common::registration_request("app1"))
        .await
        .unwrap();

    assert_eq!(registered.client.name, "app1");
    assert_eq!(registered.client.user_id, owner);
    assert_eq!(registered.client.grants, GrantType::defaults());
    assert!(!registered.client.client_id.is_empty());
    assert!(registered.client_secret.len() >= 32);

    let fetched = test.registry.get_client(&registered.client.client_id).await.unwrap();
    let json = serde_json::to_string(&fetched).unwrap();
    assert!(!json.contains(&registered.client_secret));
    assert!(!json.contains("client_secret_hash"));
}

#[tokio::test]
async fn test_register_client_generates_distinct_credentials() {
    let test = common::create_test_server().await.unwrap();
    let owner = Uuid::new_v4();
    let (first, first_secret) = common::register_client(&test, owner, "app1").await.unwrap();
    let (second, second_secret) = common::register_client(&test, owner, "app1").await.unwrap();

    assert_ne!(first.client_id, second.client_id);
    assert_ne!(first_secret, second_secret);
}

#[tokio::test]
async fn test_register_client_rejects_invalid_requests() {
    let test = common::create_test_server().await.unwrap();

    let mut no_redirect = common::registration_request("app1");
    no_redirect.redirect_uris.clear();
    let err = test
        .registry
        .register_client(Uuid::new_v4(), no_redirect)
        .await
        .unwrap_err();
    assert!(err.is("invalid_request"), "{err}");

    let mut starred = common::registration_request("app1");
    starred.redirect_uris = vec!["https://*.example/cb".to_owned()];
    let err = test
        .registry
        .register_client(Uuid::new_v4(), starred)
        .await
        .unwrap_err();
    assert!(err.is("invalid_request"), "{err}");

    assert!(test.store.list_all_clients().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_regenerate_secret_invalidates_old_secret() {
    let test = common::create_test_server().await.unwrap();
    let owner = Uuid::new_v4();
    let (client, old_secret) = common::register_client(&test, owner, "app1").await.unwrap();

    let credentials = test
        .registry
        .regenerate_client_secret(&client.client_id, owner)
        .await
        .unwrap();
    assert_eq!(credentials.client_id, client.client_id);
    assert_ne!(credentials.client_secret, old_secret);

    let err = test
        .server
        .authorize_client(&client.client_id, Some(&old_secret))
        .await
        .unwrap_err();
    assert!(err.is("invalid_client"));

    let authenticated = test
        .server
        .authorize_client(&client.client_id, Some(&credentials.client_secret))
        .await
        .unwrap();
    assert_eq!(authenticated.id, client.id);
}

#[tokio::test]
async fn test_non_owner_is_denied_everywhere() {
    let test = common::create_test_server().await.unwrap();
    let owner = Uuid::new_v4();
    let stranger = Uuid::new_v4();
    let (client, secret) = common::register_client(&test, owner, "app1").await.unwrap();

    let err = test
        .registry
        .regenerate_client_secret(&client.client_id, stranger)
        .await
        .unwrap_err();
    assert!(err.is("access_denied"));
    assert!(test
        .server
        .authorize_client(&client.client_id, Some(&secret))
        .await
        .is_ok());

    assert!(test
        .registry
        .delete_client(&client.client_id, stranger)
        .await
        .unwrap_err()
        .is("access_denied"));
    assert!(test
        .registry
        .change_visibility(&client.client_id, stranger)
        .await
        .unwrap_err()
        .is("access_denied"));
    assert!(test
        .registry
        .update_logo(&client.client_id, stranger, Some("https://x/logo.png"))
        .await
        .unwrap_err()
        .is("access_denied"));

    // Unknown clients answer the same way
    assert!(test
        .registry
        .regenerate_client_secret("does-not-exist", owner)
        .await
        .unwrap_err()
        .is("access_denied"));

    assert!(test.registry.get_client(&client.client_id).await.is_ok());
}

#[tokio::test]
async fn test_delete_client_revokes_tokens() {
    let test = common::create_test_server().await.unwrap();
    let owner = Uuid::new_v4();
    let user = Uuid::new_v4();
    let (client, _) = common::register_client(&test, owner, "app1").await.unwrap();
    let pair = common::issue_token_pair(&test, &client, user, "feed").await.unwrap();

    test.registry.delete_client(&client.client_id, owner).await.unwrap();

    assert!(test.server.resolve_access_token(&pair.access_token).await.is_none());
    assert!(test
        .server
        .revocations()
        .is_revoked(&grantd::crypto::hash_secret(&pair.refresh_token)));
    assert!(test
        .registry
        .get_client(&client.client_id)
        .await
        .unwrap_err()
        .is("invalid_client"));
}

#[tokio::test]
async fn test_change_visibility_toggles_listing() {
    let test = common::create_test_server().await.unwrap();
    let owner = Uuid::new_v4();
    let viewer = Uuid::new_v4();
    let (client, _) = common::register_client(&test, owner, "app1").await.unwrap();

    assert!(test.registry.list_clients(viewer).await.unwrap().is_empty());

    assert!(test.registry.change_visibility(&client.client_id, owner).await.unwrap());
    let listing = test.registry.list_clients(viewer).await.unwrap();
    assert_eq!(listing.len(), 1);
    assert!(!listing[0].is_mine);
    assert!(!listing[0].is_authorized);

    assert!(!test.registry.change_visibility(&client.client_id, owner).await.unwrap());
    assert!(test.registry.list_clients(viewer).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_list_clients_flags_owned_and_authorized() {
    let test = common::create_test_server().await.unwrap();
    let owner = Uuid::new_v4();
    let viewer = Uuid::new_v4();
    let (own, _) = common::register_client(&test, viewer, "mine").await.unwrap();
    let (authorized, _) = common::register_client(&test, owner, "theirs").await.unwrap();
    common::issue_token_pair(&test, &authorized, viewer, "feed").await.unwrap();

    let listing = test.registry.list_clients(viewer).await.unwrap();
    assert_eq!(listing.len(), 2);
    let mine = listing.iter().find(|l| l.client.id == own.id).unwrap();
    let theirs = listing.iter().find(|l| l.client.id == authorized.id).unwrap();
    assert!(mine.is_mine && !mine.is_authorized);
    assert!(!theirs.is_mine && theirs.is_authorized);

    test.server
        .revoke_client_for_user(authorized.id, viewer)
        .await
        .unwrap();
    let listing = test.registry.list_clients(viewer).await.unwrap();
    assert_eq!(listing.len(), 1);
}

#[tokio::test]
async fn test_update_logo() {
    let test = common::create_test_server().await.unwrap();
    let owner = Uuid::new_v4();
    let (client, _) = common::register_client(&test, owner, "app1").await.unwrap();

    test.registry
        .update_logo(&client.client_id, owner, Some("https://x/logo.png"))
        .await
        .unwrap();
    let updated = test.registry.get_client(&client.client_id).await.unwrap();
    assert_eq!(updated.logo_url.as_deref(), Some("https://x/logo.png"));

    let err = test
        .registry
        .update_logo(&client.client_id, owner, Some("not a url"))
        .await
        .unwrap_err();
    assert!(err.is("invalid_request"));

    test.registry
        .update_logo(&client.client_id, owner, None)
        .await
        .unwrap();
    let cleared = test.registry.get_client(&client.client_id).await.unwrap();
    assert!(cleared.logo_url.is_none());
}

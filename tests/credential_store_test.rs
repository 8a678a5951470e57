// ABOUTME: Integration tests for the SQLite credential store
// ABOUTME: Covers client lookups, code replacement and redemption, token rotation, revocation and purge
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
#![allow(missing_docs)]

mod common;

use chrono::{Duration, SubsecRound, Utc};
use grantd::crypto::hash_secret;
use grantd::database::{CredentialStore, Database, OAuth2RepositoryImpl};
use grantd::models::{
    GrantType, NewAuthorizationCode, NewOAuth2Client, OAuth2Client, Scope, TokenPairHashes,
};
use uuid::Uuid;

async fn setup() -> (Database, OAuth2RepositoryImpl) {
    let database = common::create_test_database().await.unwrap();
    let store = OAuth2RepositoryImpl::new(database.clone());
    (database, store)
}

async fn insert_client(
    store: &OAuth2RepositoryImpl,
    public_id: &str,
    secret: &str,
    owner: Uuid,
    is_public: bool,
) -> OAuth2Client {
    store
        .insert_client(&NewOAuth2Client {
            client_id: public_id.to_owned(),
            name: format!("{public_id} app"),
            description: String::new(),
            logo_url: None,
            initial_authorization_url: Some("https://x/start".to_owned()),
            client_secret_hash: hash_secret(secret),
            redirect_uris: vec![common::REDIRECT_URI.to_owned()],
            grants: GrantType::defaults(),
            user_id: owner,
            is_public,
        })
        .await
        .unwrap()
}

fn new_code(client: &OAuth2Client, user: Uuid, code: &str, expires_in: Duration) -> NewAuthorizationCode {
    NewAuthorizationCode {
        client_id: client.id,
        user_id: user,
        code_hash: hash_secret(code),
        expires_at: Utc::now().trunc_subsecs(0) + expires_in,
        redirect_uri: common::REDIRECT_URI.to_owned(),
        scope: Scope::parse("feed"),
    }
}

fn pair_hashes(tag: &str, expires_in: Duration) -> TokenPairHashes {
    TokenPairHashes {
        access_token_hash: hash_secret(&format!("access-{tag}")),
        access_token_expires_at: Utc::now().trunc_subsecs(0) + expires_in,
        refresh_token_hash: hash_secret(&format!("refresh-{tag}")),
    }
}

#[tokio::test]
async fn test_client_lookups_never_serialize_secret_hash() {
    let (_db, store) = setup().await;
    let owner = Uuid::new_v4();
    let inserted = insert_client(&store, "abc", "s1", owner, false).await;

    let found = store.find_client_by_public_id("abc").await.unwrap().unwrap();
    assert_eq!(found.id, inserted.id);
    assert_eq!(found.redirect_uris, vec![common::REDIRECT_URI.to_owned()]);
    assert_eq!(found.grants, GrantType::defaults());
    assert_eq!(found.initial_authorization_url.as_deref(), Some("https://x/start"));

    let json = serde_json::to_value(&found).unwrap();
    assert!(json.get("client_secret_hash").is_none());
    assert!(!json.to_string().contains(&hash_secret("s1")));

    assert!(store
        .find_client_by_public_id_and_secret_hash("abc", &hash_secret("s1"))
        .await
        .unwrap()
        .is_some());
    assert!(store
        .find_client_by_public_id_and_secret_hash("abc", &hash_secret("s2"))
        .await
        .unwrap()
        .is_none());
    assert!(store.find_client_by_public_id("missing").await.unwrap().is_none());
}

#[tokio::test]
async fn test_owner_checked_mutations() {
    let (_db, store) = setup().await;
    let owner = Uuid::new_v4();
    let stranger = Uuid::new_v4();
    let client = insert_client(&store, "abc", "s1", owner, false).await;

    assert!(!store
        .rotate_client_secret(client.id, &hash_secret("s2"), stranger)
        .await
        .unwrap());
    assert!(!store.set_client_visibility(client.id, stranger, true).await.unwrap());
    assert!(!store
        .set_client_logo(client.id, stranger, Some("https://x/logo.png"))
        .await
        .unwrap());
    assert!(!store.delete_client(client.id, stranger).await.unwrap());

    assert!(store
        .set_client_logo(client.id, owner, Some("https://x/logo.png"))
        .await
        .unwrap());
    assert!(store.set_client_visibility(client.id, owner, true).await.unwrap());
    let updated = store.find_client_by_id(client.id).await.unwrap().unwrap();
    assert_eq!(updated.logo_url.as_deref(), Some("https://x/logo.png"));
    assert!(updated.is_public);

    assert!(store.delete_client(client.id, owner).await.unwrap());
    assert!(store.find_client_by_id(client.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_replacing_code_invalidates_previous_and_records_consent() {
    let (_db, store) = setup().await;
    let user = Uuid::new_v4();
    let client = insert_client(&store, "abc", "s1", Uuid::new_v4(), false).await;
    let now = Utc::now();

    store
        .replace_live_authorization_code(&new_code(&client, user, "code1", Duration::minutes(10)), now)
        .await
        .unwrap();
    store
        .replace_live_authorization_code(&new_code(&client, user, "code2", Duration::minutes(10)), now)
        .await
        .unwrap();

    assert!(store
        .find_authorization_code_by_hash(&hash_secret("code1"), true, now)
        .await
        .unwrap()
        .is_none());
    let live = store
        .find_authorization_code_by_hash(&hash_secret("code2"), false, now)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(live.client_public_id, "abc");
    assert_eq!(live.user_id, user);

    let consent = store.get_consent(user, client.id).await.unwrap().unwrap();
    assert_eq!(consent.scope, Scope::parse("feed"));
}

#[tokio::test]
async fn test_code_redeems_exactly_once() {
    let (_db, store) = setup().await;
    let user = Uuid::new_v4();
    let client = insert_client(&store, "abc", "s1", Uuid::new_v4(), false).await;
    let now = Utc::now();
    store
        .replace_live_authorization_code(&new_code(&client, user, "code1", Duration::minutes(10)), now)
        .await
        .unwrap();

    let token = store
        .redeem_authorization_code(&hash_secret("code1"), &pair_hashes("a", Duration::days(7)), now)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(token.user_id, user);
    assert_eq!(token.client_id, client.id);
    assert_eq!(token.client_public_id, "abc");
    assert_eq!(token.scope, Scope::parse("feed"));

    let second = store
        .redeem_authorization_code(&hash_secret("code1"), &pair_hashes("b", Duration::days(7)), now)
        .await
        .unwrap();
    assert!(second.is_none());
    assert!(store
        .find_token_by_access_hash(&hash_secret("access-b"))
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_expired_code_cannot_be_redeemed() {
    let (_db, store) = setup().await;
    let client = insert_client(&store, "abc", "s1", Uuid::new_v4(), false).await;
    let now = Utc::now();
    store
        .replace_live_authorization_code(
            &new_code(&client, Uuid::new_v4(), "stale", Duration::seconds(-1)),
            now,
        )
        .await
        .unwrap();

    assert!(store
        .find_authorization_code_by_hash(&hash_secret("stale"), false, now)
        .await
        .unwrap()
        .is_none());
    assert!(store
        .redeem_authorization_code(&hash_secret("stale"), &pair_hashes("a", Duration::days(7)), now)
        .await
        .unwrap()
        .is_none());
}

#[tokio::test]
async fn test_rotation_revokes_old_pair() {
    let (_db, store) = setup().await;
    let user = Uuid::new_v4();
    let client = insert_client(&store, "abc", "s1", Uuid::new_v4(), false).await;
    store
        .insert_token_pair(client.id, user, &pair_hashes("old", Duration::days(7)), &Scope::parse("feed vote"))
        .await
        .unwrap();

    let rotation = store
        .rotate_token_pair(
            &hash_secret("refresh-old"),
            &pair_hashes("new", Duration::days(7)),
            &Scope::parse("feed"),
        )
        .await
        .unwrap()
        .unwrap();
    assert!(rotation.revoked.revoked);
    assert_eq!(rotation.issued.user_id, user);
    assert_eq!(rotation.issued.scope, Scope::parse("feed"));

    assert!(store
        .find_token_by_refresh_hash(&hash_secret("refresh-old"))
        .await
        .unwrap()
        .is_none());
    assert!(store
        .find_token_by_access_hash(&hash_secret("access-new"))
        .await
        .unwrap()
        .is_some());

    let again = store
        .rotate_token_pair(
            &hash_secret("refresh-old"),
            &pair_hashes("newer", Duration::days(7)),
            &Scope::parse("feed"),
        )
        .await
        .unwrap();
    assert!(again.is_none());

    let revoked = store.list_revoked_token_hashes().await.unwrap();
    assert_eq!(revoked.len(), 2);
    assert!(revoked.contains(&hash_secret("access-old")));
    assert!(revoked.contains(&hash_secret("refresh-old")));
}

#[tokio::test]
async fn test_revoke_client_authorization_is_scoped_to_pair() {
    let (_db, store) = setup().await;
    let user = Uuid::new_v4();
    let other_user = Uuid::new_v4();
    let client = insert_client(&store, "abc", "s1", Uuid::new_v4(), false).await;
    let now = Utc::now();

    store
        .replace_live_authorization_code(&new_code(&client, user, "code1", Duration::minutes(10)), now)
        .await
        .unwrap();
    store
        .insert_token_pair(client.id, user, &pair_hashes("u1", Duration::days(7)), &Scope::parse("feed"))
        .await
        .unwrap();
    store
        .insert_token_pair(client.id, other_user, &pair_hashes("u2", Duration::days(7)), &Scope::parse("feed"))
        .await
        .unwrap();

    let outcome = store
        .revoke_client_authorization(client.id, user, now)
        .await
        .unwrap();
    assert_eq!(outcome.revoked_tokens.len(), 1);
    assert_eq!(outcome.invalidated_codes, 1);
    assert!(outcome.consent_removed);

    assert!(store.get_consent(user, client.id).await.unwrap().is_none());
    assert!(store
        .find_authorization_code_by_hash(&hash_secret("code1"), false, now)
        .await
        .unwrap()
        .is_none());
    assert!(store
        .find_token_by_access_hash(&hash_secret("access-u1"))
        .await
        .unwrap()
        .is_none());
    assert!(store
        .find_token_by_access_hash(&hash_secret("access-u2"))
        .await
        .unwrap()
        .is_some());

    let repeat = store
        .revoke_client_authorization(client.id, user, now)
        .await
        .unwrap();
    assert!(repeat.revoked_tokens.is_empty());
    assert!(!repeat.consent_removed);
}

#[tokio::test]
async fn test_purge_removes_only_expired_rows() {
    let (_db, store) = setup().await;
    let user = Uuid::new_v4();
    let client = insert_client(&store, "abc", "s1", Uuid::new_v4(), false).await;
    let now = Utc::now();

    store
        .insert_token_pair(client.id, user, &pair_hashes("expired", Duration::seconds(-5)), &Scope::parse("feed"))
        .await
        .unwrap();
    store
        .insert_token_pair(client.id, user, &pair_hashes("live", Duration::days(1)), &Scope::parse("feed"))
        .await
        .unwrap();
    store
        .replace_live_authorization_code(&new_code(&client, user, "old", Duration::seconds(-5)), now)
        .await
        .unwrap();

    assert_eq!(store.purge_expired_tokens(now).await.unwrap(), 1);
    assert_eq!(store.purge_expired_authorization_codes(now).await.unwrap(), 1);
    assert!(store
        .find_token_by_access_hash(&hash_secret("access-live"))
        .await
        .unwrap()
        .is_some());
}

#[tokio::test]
async fn test_visible_client_listing_flags() {
    let (_db, store) = setup().await;
    let viewer = Uuid::new_v4();
    let someone = Uuid::new_v4();

    let mine = insert_client(&store, "mine", "s", viewer, false).await;
    let public = insert_client(&store, "public", "s", someone, true).await;
    let consented = insert_client(&store, "consented", "s", someone, false).await;
    insert_client(&store, "hidden", "s", someone, false).await;
    store
        .upsert_consent(viewer, consented.id, &Scope::parse("feed"))
        .await
        .unwrap();

    let listing = store.list_clients_visible_to(viewer).await.unwrap();
    let flags = |id: i64| {
        listing
            .iter()
            .find(|entry| entry.client.id == id)
            .map(|entry| (entry.is_mine, entry.is_authorized))
    };

    assert_eq!(listing.len(), 3);
    assert_eq!(flags(mine.id), Some((true, false)));
    assert_eq!(flags(public.id), Some((false, false)));
    assert_eq!(flags(consented.id), Some((false, true)));
    assert_eq!(store.list_all_clients().await.unwrap().len(), 4);
}

#[tokio::test]
async fn test_deleting_client_cascades() {
    let (_db, store) = setup().await;
    let owner = Uuid::new_v4();
    let user = Uuid::new_v4();
    let client = insert_client(&store, "abc", "s1", owner, false).await;
    store
        .replace_live_authorization_code(&new_code(&client, user, "code1", Duration::minutes(10)), Utc::now())
        .await
        .unwrap();
    store
        .insert_token_pair(client.id, user, &pair_hashes("a", Duration::days(7)), &Scope::parse("feed"))
        .await
        .unwrap();

    assert!(store.delete_client(client.id, owner).await.unwrap());
    assert!(store
        .find_token_by_access_hash(&hash_secret("access-a"))
        .await
        .unwrap()
        .is_none());
    assert!(store.get_consent(user, client.id).await.unwrap().is_none());
}

// ABOUTME: Secret and token codec: one-way hashing and random opaque identifiers
// ABOUTME: Every client secret, authorization code and token passes through here before storage
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

//! Cryptographic utilities for grantd
//!
//! Secrets handled by the authorization server are server-generated,
//! high-entropy random values, so a plain SHA-256 digest is enough to store
//! and compare them. Equality of digests is the only verification step.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Random bytes in a public client identifier
pub const CLIENT_ID_BYTES: usize = 16;

/// Random bytes in a client secret
pub const CLIENT_SECRET_BYTES: usize = 32;

/// Random bytes in an authorization code
pub const AUTHORIZATION_CODE_BYTES: usize = 32;

/// Random bytes in an access or refresh token
pub const TOKEN_BYTES: usize = 32;

/// Hash an opaque secret for storage (hex-encoded SHA-256)
#[must_use]
pub fn hash_secret(secret: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(secret.as_bytes());
    hex::encode(hasher.finalize())
}

/// Generate `byte_len` cryptographically random bytes, hex-encoded
#[must_use]
pub fn generate_opaque_id(byte_len: usize) -> String {
    let mut bytes = vec![0u8; byte_len];
    rand::thread_rng().fill_bytes(&mut bytes);
    hex::encode(bytes)
}

/// Short, non-reversible fingerprint of a secret suitable for log fields
#[must_use]
pub fn fingerprint(secret: &str) -> String {
    hash_secret(secret).chars().take(12).collect()
}

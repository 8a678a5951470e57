// ABOUTME: Process-local revocation cache of token digests, warmed once from the credential store
// ABOUTME: Consulted before any token lookup result is trusted
//
// SPDX-License-Identifier: MIT OR Apache-2.0
// Copyright (c) 2025 Pierre Fitness Intelligence

use dashmap::DashSet;
use tracing::{error, info};

use crate::database::CredentialStore;

/// Revoked access and refresh token digests
///
/// Mirrors the durable `revoked` flag so most rejected tokens never reach the
/// store. It is an accelerator: token lookups still exclude revoked rows, so a
/// failed warm-up weakens nothing but latency. Entries live until restart.
#[derive(Debug, Default)]
pub struct RevocationCache {
    /// `DashSet` shards its locks, so reads never wait on unrelated writes
    revoked: DashSet<String>,
}

impl RevocationCache {
    /// Create an empty cache
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Load every revoked digest from the store
    ///
    /// Best-effort: a store failure is logged and the cache stays as it was.
    /// Returns the number of digests loaded.
    pub async fn warm_up(&self, store: &dyn CredentialStore) -> usize {
        match store.list_revoked_token_hashes().await {
            Ok(hashes) => {
                let loaded = hashes.len();
                for hash in hashes {
                    self.revoked.insert(hash);
                }
                info!(loaded, "Revocation cache warmed up");
                loaded
            }
            Err(e) => {
                error!(
                    error = %e,
                    "Failed to warm up revocation cache; relying on store revoked flag"
                );
                0
            }
        }
    }

    /// Mark a digest revoked; idempotent
    pub fn revoke(&self, hash: impl Into<String>) {
        self.revoked.insert(hash.into());
    }

    /// Whether a digest has been revoked
    #[must_use]
    pub fn is_revoked(&self, hash: &str) -> bool {
        self.revoked.contains(hash)
    }

    /// Number of cached digests
    #[must_use]
    pub fn len(&self) -> usize {
        self.revoked.len()
    }

    /// Whether the cache holds no digests
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.revoked.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_revoke_is_idempotent() {
        let cache = RevocationCache::new();
        assert!(cache.is_empty());

        cache.revoke("abc");
        cache.revoke("abc".to_owned());
        assert!(cache.is_revoked("abc"));
        assert!(!cache.is_revoked("abd"));
        assert_eq!(cache.len(), 1);
    }

    #[tokio::test]
    async fn test_concurrent_revocations_are_visible_afterwards() {
        let cache = Arc::new(RevocationCache::new());
        let handles: Vec<_> = (0..16)
            .map(|i| {
                let cache = Arc::clone(&cache);
                tokio::spawn(async move { cache.revoke(format!("hash-{i}")) })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap();
        }

        assert_eq!(cache.len(), 16);
        assert!((0..16).all(|i| cache.is_revoked(&format!("hash-{i}"))));
    }
}

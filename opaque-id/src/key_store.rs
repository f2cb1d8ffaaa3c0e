//! The interface the Holder consumes to persist and retrieve key sets,
//! plus an in-process reference implementation.
//!
//! A durable, cross-replica store (Postgres, etc.) is an external
//! collaborator outside this crate's scope; [`MemoryKeyStore`] exists so the
//! Holder and its tests have something real to run against.

use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;
use chrono::Utc;
use uuid::Uuid;

use crate::config;
use crate::error::KeyStoreError;
use crate::key_set::KeySet;

/// Persistence boundary for key sets. All operations are async so that a
/// real implementation (Postgres, etc.) can perform network I/O; callers are
/// expected to apply their own cancellation/timeout around each call.
#[async_trait]
pub trait KeyStore: Send + Sync {
    /// Returns the most-recently-expiring unrevoked key whose expiry is
    /// still in the future, or [`KeyStoreError::NoActiveKeySet`] when none
    /// exists.
    async fn get_active_key_set(&self) -> Result<KeySet, KeyStoreError>;

    /// Returns the key sets matching the supplied ids; ids with no match are
    /// simply absent from the result, not an error.
    async fn get_key_sets(&self, ids: &[Uuid]) -> Result<Vec<KeySet>, KeyStoreError>;

    /// Registers a freshly generated key set, assigning it a new id and an
    /// expiry of `now + 7 days`.
    async fn register_key_set(
        &self,
        signing_key: String,
        public_key: String,
        encryption_key: String,
    ) -> Result<KeySet, KeyStoreError>;

    /// Marks a key set revoked. Idempotent.
    async fn revoke_key_set(&self, id: Uuid) -> Result<(), KeyStoreError>;
}

/// An in-process [`KeyStore`] backed by a `HashMap` guarded by an
/// `RwLock`, in the shape of `common-auth`'s `InMemoryKeyStore`.
#[derive(Default)]
pub struct MemoryKeyStore {
    inner: RwLock<HashMap<Uuid, KeySet>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl KeyStore for MemoryKeyStore {
    async fn get_active_key_set(&self) -> Result<KeySet, KeyStoreError> {
        let guard = self.inner.read().expect("rwlock poisoned");
        guard
            .values()
            .filter(|key_set| key_set.active())
            .max_by_key(|key_set| key_set.expiry)
            .cloned()
            .ok_or(KeyStoreError::NoActiveKeySet)
    }

    async fn get_key_sets(&self, ids: &[Uuid]) -> Result<Vec<KeySet>, KeyStoreError> {
        let guard = self.inner.read().expect("rwlock poisoned");
        Ok(ids
            .iter()
            .filter_map(|id| guard.get(id).cloned())
            .collect())
    }

    async fn register_key_set(
        &self,
        signing_key: String,
        public_key: String,
        encryption_key: String,
    ) -> Result<KeySet, KeyStoreError> {
        let key_set = KeySet {
            id: Uuid::new_v4(),
            encryption_key,
            signing_key,
            public_key,
            expiry: Utc::now() + config::key_set_ttl_from_env(),
            revoked: false,
        };
        let mut guard = self.inner.write().expect("rwlock poisoned");
        guard.insert(key_set.id, key_set.clone());
        Ok(key_set)
    }

    async fn revoke_key_set(&self, id: Uuid) -> Result<(), KeyStoreError> {
        let mut guard = self.inner.write().expect("rwlock poisoned");
        if let Some(key_set) = guard.get_mut(&id) {
            key_set.revoked = true;
        }
        Ok(())
    }
}

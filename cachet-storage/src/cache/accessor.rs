//! Typed, fail-soft access to a cache store.

use std::fmt;
use std::sync::Arc;

use cachet_core::CacheConfig;
use serde::{de::DeserializeOwned, Serialize};

use super::key::CacheKey;
use super::lookup::CacheLookup;
use super::policy::CachePolicy;
use super::traits::{CacheStore, StoredValue};

/// Typed view over an optional [`CacheStore`].
///
/// Nothing here fails the caller. A store error, a decode error or a
/// disabled cache all read as [`CacheLookup::Miss`] and write as "not
/// applied"; the cause is logged.
#[derive(Clone)]
pub struct CacheAccessor {
    store: Option<Arc<dyn CacheStore>>,
    config: CacheConfig,
}

impl CacheAccessor {
    /// Create an accessor over `store`. `None` disables caching regardless
    /// of `config.enabled`.
    pub fn new(store: Option<Arc<dyn CacheStore>>, config: CacheConfig) -> Self {
        Self { store, config }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    pub fn store(&self) -> Option<&Arc<dyn CacheStore>> {
        self.store.as_ref()
    }

    /// True when caching is enabled and a store is present.
    pub fn is_active(&self) -> bool {
        self.active_store().is_some()
    }

    /// Policy for a write made now, from the configured absolute expiration.
    pub fn default_policy(&self) -> CachePolicy {
        CachePolicy::expires_after(self.config.absolute_expiration)
    }

    fn active_store(&self) -> Option<&dyn CacheStore> {
        if !self.config.enabled {
            return None;
        }
        self.store.as_deref()
    }

    /// Look `key` up and decode it as `T`.
    pub fn try_get<T: DeserializeOwned>(&self, key: &CacheKey) -> CacheLookup<T> {
        let Some(store) = self.active_store() else {
            return CacheLookup::Miss;
        };

        let stored = match store.get(key.as_str()) {
            Ok(Some(stored)) => stored,
            Ok(None) => return CacheLookup::Miss,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache read failed, treating as miss");
                return CacheLookup::Miss;
            }
        };

        match stored {
            StoredValue::Null => CacheLookup::Hit(None),
            StoredValue::Value(json) => match serde_json::from_value(json) {
                Ok(value) => CacheLookup::Hit(Some(value)),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Cached value has an unexpected shape, treating as miss");
                    CacheLookup::Miss
                }
            },
        }
    }

    /// Store `value` under `key`. `None` stores the null sentinel.
    ///
    /// Returns true if the store accepted the write.
    pub fn try_set<T: Serialize + ?Sized>(
        &self,
        key: &CacheKey,
        value: Option<&T>,
        policy: CachePolicy,
    ) -> bool {
        let Some(store) = self.active_store() else {
            return false;
        };

        let stored = match value {
            None => StoredValue::Null,
            Some(value) => match serde_json::to_value(value) {
                Ok(json) => StoredValue::Value(json),
                Err(e) => {
                    tracing::warn!(key = %key, error = %e, "Failed to serialize value for cache");
                    return false;
                }
            },
        };

        match store.set(key.as_str(), stored, policy) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "Cache write failed");
                false
            }
        }
    }
}

impl fmt::Debug for CacheAccessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheAccessor")
            .field("has_store", &self.store.is_some())
            .field("config", &self.config)
            .finish()
    }
}

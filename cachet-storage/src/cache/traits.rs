//! Cache store traits and cacheable entity marker.
//!
//! This module defines the traits that must be implemented by cache stores
//! and entities that can be cached.

use cachet_core::{CachetResult, Client, EntityType, Policy, PolicyVersion};
use serde::{de::DeserializeOwned, Deserialize, Serialize};

use super::policy::CachePolicy;

/// Marker trait for entity types a repository can cache.
///
/// Implementations must be `Clone`, `Serialize` and `DeserializeOwned` since
/// stores keep a serialized copy, and `Send + Sync + 'static` so repositories
/// can be shared across threads.
pub trait CacheableEntity: Clone + Serialize + DeserializeOwned + Send + Sync + 'static {
    /// Get the entity type for this cacheable.
    fn entity_type() -> EntityType;
}

impl CacheableEntity for Client {
    fn entity_type() -> EntityType {
        EntityType::Client
    }
}

impl CacheableEntity for Policy {
    fn entity_type() -> EntityType {
        EntityType::Policy
    }
}

impl CacheableEntity for PolicyVersion {
    fn entity_type() -> EntityType {
        EntityType::PolicyVersion
    }
}

/// A value as held by a cache store.
///
/// `Null` is the stored-null sentinel: the key was looked up and confirmed to
/// have no result. It is distinct from the key being absent.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum StoredValue {
    Null,
    Value(serde_json::Value),
}

impl StoredValue {
    /// Returns true if this is the stored-null sentinel.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }
}

/// String-keyed cache store.
///
/// Each operation is atomic with respect to the store: a `get` observes a
/// complete entry or none, a `set` fully replaces or inserts. Nothing spans
/// two operations.
///
/// Expired entries are never returned by `get` or reported by `contains`.
/// Reads do not mutate entries; expired ones stay until they are overwritten
/// or purged.
pub trait CacheStore: Send + Sync {
    /// Returns true if a live entry exists for `key`.
    fn contains(&self, key: &str) -> CachetResult<bool>;

    /// Get the live entry for `key`, or None if absent or expired.
    fn get(&self, key: &str) -> CachetResult<Option<StoredValue>>;

    /// Insert or replace the entry for `key`.
    fn set(&self, key: &str, value: StoredValue, policy: CachePolicy) -> CachetResult<()>;

    /// Remove the entry for `key`. Returns true if an entry was removed.
    fn remove(&self, key: &str) -> CachetResult<bool>;

    /// Number of live entries.
    fn len(&self) -> CachetResult<u64>;

    /// Returns true if the store holds no live entries.
    fn is_empty(&self) -> CachetResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Drop every expired entry. Returns the number removed.
    fn purge_expired(&self) -> CachetResult<u64>;

    /// Get cache statistics.
    fn stats(&self) -> CachetResult<CacheStats>;
}

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of cache hits.
    pub hits: u64,
    /// Number of cache misses.
    pub misses: u64,
    /// Number of live entries currently in cache.
    pub entry_count: u64,
    /// Number of entries dropped by `purge_expired`.
    pub evictions: u64,
}

impl CacheStats {
    /// Calculate the hit rate (0.0 to 1.0).
    pub fn hit_rate(&self) -> f64 {
        let total = self.hits + self.misses;
        if total == 0 {
            0.0
        } else {
            self.hits as f64 / total as f64
        }
    }
}

//! In-process cache store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::RwLock;

use cachet_core::{CachetResult, StorageError};
use chrono::Utc;

use super::policy::CachePolicy;
use super::traits::{CacheStats, CacheStore, StoredValue};

#[derive(Debug, Clone)]
struct MemoryEntry {
    value: StoredValue,
    policy: CachePolicy,
}

/// Thread-safe in-memory store backed by a `RwLock<HashMap>`.
///
/// Expired entries stay in the map until overwritten, removed or purged;
/// lookups skip them.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<String, MemoryEntry>>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Live keys, sorted.
    pub fn keys(&self) -> CachetResult<Vec<String>> {
        let now = Utc::now();
        let entries = self.entries.read().map_err(|_| StorageError::LockPoisoned)?;
        let mut keys: Vec<String> = entries
            .iter()
            .filter(|(_, entry)| !entry.policy.is_expired_at(now))
            .map(|(key, _)| key.clone())
            .collect();
        keys.sort();
        Ok(keys)
    }

    /// Live keys starting with `prefix`, sorted.
    pub fn keys_with_prefix(&self, prefix: &str) -> CachetResult<Vec<String>> {
        Ok(self
            .keys()?
            .into_iter()
            .filter(|key| key.starts_with(prefix))
            .collect())
    }

    /// Drop every entry, live or expired.
    pub fn clear(&self) -> CachetResult<()> {
        self.entries
            .write()
            .map_err(|_| StorageError::LockPoisoned)?
            .clear();
        Ok(())
    }
}

impl CacheStore for MemoryCacheStore {
    fn contains(&self, key: &str) -> CachetResult<bool> {
        let entries = self.entries.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(entries
            .get(key)
            .is_some_and(|entry| !entry.policy.is_expired()))
    }

    fn get(&self, key: &str) -> CachetResult<Option<StoredValue>> {
        let entries = self.entries.read().map_err(|_| StorageError::LockPoisoned)?;
        match entries.get(key) {
            Some(entry) if !entry.policy.is_expired() => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(entry.value.clone()))
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    fn set(&self, key: &str, value: StoredValue, policy: CachePolicy) -> CachetResult<()> {
        let mut entries = self.entries.write().map_err(|_| StorageError::LockPoisoned)?;
        entries.insert(key.to_string(), MemoryEntry { value, policy });
        Ok(())
    }

    fn remove(&self, key: &str) -> CachetResult<bool> {
        let mut entries = self.entries.write().map_err(|_| StorageError::LockPoisoned)?;
        Ok(entries.remove(key).is_some())
    }

    fn len(&self) -> CachetResult<u64> {
        let now = Utc::now();
        let entries = self.entries.read().map_err(|_| StorageError::LockPoisoned)?;
        Ok(entries
            .values()
            .filter(|entry| !entry.policy.is_expired_at(now))
            .count() as u64)
    }

    fn purge_expired(&self) -> CachetResult<u64> {
        let now = Utc::now();
        let mut entries = self.entries.write().map_err(|_| StorageError::LockPoisoned)?;
        let before = entries.len();
        entries.retain(|_, entry| !entry.policy.is_expired_at(now));
        let purged = (before - entries.len()) as u64;
        self.evictions.fetch_add(purged, Ordering::Relaxed);
        Ok(purged)
    }

    fn stats(&self) -> CachetResult<CacheStats> {
        Ok(CacheStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            entry_count: self.len()?,
            evictions: self.evictions.load(Ordering::Relaxed),
        })
    }
}

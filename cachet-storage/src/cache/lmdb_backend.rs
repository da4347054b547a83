//! LMDB-backed cache store.
//!
//! Uses the heed crate (Rust bindings for LMDB) to keep cache entries in a
//! memory-mapped file, so cached results survive process restarts and can be
//! shared by processes on one host.
//!
//! # Record Format
//!
//! ```text
//! key:   the cache key's UTF-8 bytes, or 0xFF + SHA-256(key) when longer
//!        than LMDB's 511-byte key limit
//! value: [expires_at: i64 LE millis][tag: 0 = null, 1 = value][json]
//! ```
//!
//! 0xFF never occurs in UTF-8, so digested keys cannot collide with raw ones.

use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use cachet_core::{CachetError, CachetResult, StorageError};
use chrono::{DateTime, Utc};
use heed::types::Bytes;
use heed::{Database, Env, EnvOpenOptions};
use sha2::{Digest, Sha256};

use super::policy::CachePolicy;
use super::traits::{CacheStats, CacheStore, StoredValue};

/// LMDB's default maximum key size.
const MAX_RAW_KEY_LEN: usize = 511;

/// Prefix byte for digested keys.
const DIGEST_MARKER: u8 = 0xFF;

const TAG_NULL: u8 = 0;
const TAG_VALUE: u8 = 1;

/// Length of the fixed record header.
const HEADER_LEN: usize = 9;

/// Error type for LMDB cache operations.
#[derive(Debug, thiserror::Error)]
pub enum LmdbCacheError {
    /// Failed to open or create the LMDB environment.
    #[error("Failed to open LMDB environment: {0}")]
    EnvOpen(String),

    /// Failed to open the database within the environment.
    #[error("Failed to open database: {0}")]
    DbOpen(String),

    /// Transaction error.
    #[error("Transaction error: {0}")]
    Transaction(String),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Malformed record.
    #[error("Corrupt record: {0}")]
    Corrupt(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<LmdbCacheError> for CachetError {
    fn from(e: LmdbCacheError) -> Self {
        let reason = e.to_string();
        match e {
            LmdbCacheError::Serialization(_) | LmdbCacheError::Corrupt(_) => {
                CachetError::Storage(StorageError::Serialization { reason })
            }
            _ => CachetError::Storage(StorageError::TransactionFailed { reason }),
        }
    }
}

fn txn_error(e: heed::Error) -> LmdbCacheError {
    LmdbCacheError::Transaction(e.to_string())
}

/// Persistent cache store on a single unnamed LMDB database.
///
/// # Example
///
/// ```ignore
/// let store = LmdbCacheStore::new("/var/cache/cachet", 64)?;
/// let cache = CacheAccessor::new(Some(Arc::new(store)), CacheConfig::default());
/// ```
pub struct LmdbCacheStore {
    env: Env,
    db: Database<Bytes, Bytes>,
    hits: AtomicU64,
    misses: AtomicU64,
    evictions: AtomicU64,
}

impl LmdbCacheStore {
    /// Open or create a store under `path`.
    ///
    /// # Arguments
    ///
    /// * `path` - Directory where LMDB files will be stored
    /// * `max_size_mb` - Maximum size of the database in megabytes
    pub fn new<P: AsRef<Path>>(path: P, max_size_mb: usize) -> Result<Self, LmdbCacheError> {
        std::fs::create_dir_all(&path)?;

        let env = unsafe {
            EnvOpenOptions::new()
                .map_size(max_size_mb * 1024 * 1024)
                .max_dbs(1)
                .open(path.as_ref())
        }
        .map_err(|e| LmdbCacheError::EnvOpen(e.to_string()))?;

        let mut wtxn = env.write_txn().map_err(txn_error)?;
        let db: Database<Bytes, Bytes> = env
            .create_database(&mut wtxn, None)
            .map_err(|e| LmdbCacheError::DbOpen(e.to_string()))?;
        wtxn.commit().map_err(txn_error)?;

        tracing::debug!(path = %path.as_ref().display(), max_size_mb, "Opened LMDB cache store");

        Ok(Self {
            env,
            db,
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
            evictions: AtomicU64::new(0),
        })
    }

    /// Remove every record.
    pub fn clear(&self) -> CachetResult<()> {
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        self.db.clear(&mut wtxn).map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)?;
        Ok(())
    }

    /// Read the record for `key`, ignoring expiration.
    fn read_record(&self, key: &str) -> Result<Option<Record>, LmdbCacheError> {
        let rtxn = self.env.read_txn().map_err(txn_error)?;
        match self.db.get(&rtxn, &encode_key(key)).map_err(txn_error)? {
            Some(bytes) => decode_record(bytes).map(Some),
            None => Ok(None),
        }
    }
}

impl CacheStore for LmdbCacheStore {
    fn contains(&self, key: &str) -> CachetResult<bool> {
        Ok(self
            .read_record(key)?
            .is_some_and(|record| !record.policy.is_expired()))
    }

    fn get(&self, key: &str) -> CachetResult<Option<StoredValue>> {
        match self.read_record(key)? {
            Some(record) if !record.policy.is_expired() => {
                self.hits.fetch_add(1, Ordering::Relaxed);
                Ok(Some(record.value))
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                Ok(None)
            }
        }
    }

    fn set(&self, key: &str, value: StoredValue, policy: CachePolicy) -> CachetResult<()> {
        let bytes = encode_record(&value, policy)?;
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        self.db
            .put(&mut wtxn, &encode_key(key), &bytes)
            .map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)?;
        Ok(())
    }

    fn remove(&self, key: &str) -> CachetResult<bool> {
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        let deleted = self
            .db
            .delete(&mut wtxn, &encode_key(key))
            .map_err(txn_error)?;
        wtxn.commit().map_err(txn_error)?;
        Ok(deleted)
    }

    fn len(&self) -> CachetResult<u64> {
        let now = Utc::now();
        let rtxn = self.env.read_txn().map_err(txn_error)?;
        let mut live = 0u64;
        for result in self.db.iter(&rtxn).map_err(txn_error)? {
            let (_, bytes) = result.map_err(txn_error)?;
            if let Ok(record) = decode_record(bytes) {
                if !record.policy.is_expired_at(now) {
                    live += 1;
                }
            }
        }
        Ok(live)
    }

    fn purge_expired(&self) -> CachetResult<u64> {
        let now = Utc::now();
        // Scan and delete under one write txn so a concurrent `set` cannot
        // land between the two.
        let mut wtxn = self.env.write_txn().map_err(txn_error)?;
        let expired: Vec<Vec<u8>> = {
            let mut keys = Vec::new();
            for result in self.db.iter(&wtxn).map_err(txn_error)? {
                let (key, bytes) = result.map_err(txn_error)?;
                // Unreadable records are dropped along with expired ones.
                let dead = decode_record(bytes)
                    .map(|record| record.policy.is_expired_at(now))
                    .unwrap_or(true);
                if dead {
                    keys.push(key.to_vec());
                }
            }
            keys
        };

        let mut purged = 0u64;
        for key in &expired {
            if self.db.delete(&mut wtxn, key).map_err(txn_error)? {
                purged += 1;
            }
        }
        wtxn.commit().map_err(txn_error)?;

        self.evictions.fetch_add(purged, Ordering::Relaxed);
        if purged > 0 {
            tracing::debug!(purged, "Purged expired LMDB cache entries");
        }
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

struct Record {
    value: StoredValue,
    policy: CachePolicy,
}

fn encode_key(key: &str) -> Vec<u8> {
    if key.len() <= MAX_RAW_KEY_LEN {
        return key.as_bytes().to_vec();
    }
    let mut encoded = Vec::with_capacity(1 + 32);
    encoded.push(DIGEST_MARKER);
    encoded.extend_from_slice(&Sha256::digest(key.as_bytes()));
    encoded
}

fn encode_record(value: &StoredValue, policy: CachePolicy) -> Result<Vec<u8>, LmdbCacheError> {
    let expires_at = policy.absolute_expiration().timestamp_millis().to_le_bytes();
    let mut bytes = Vec::with_capacity(HEADER_LEN + 64);
    bytes.extend_from_slice(&expires_at);
    match value {
        StoredValue::Null => bytes.push(TAG_NULL),
        StoredValue::Value(json) => {
            bytes.push(TAG_VALUE);
            serde_json::to_writer(&mut bytes, json)
                .map_err(|e| LmdbCacheError::Serialization(e.to_string()))?;
        }
    }
    Ok(bytes)
}

fn decode_record(bytes: &[u8]) -> Result<Record, LmdbCacheError> {
    if bytes.len() < HEADER_LEN {
        return Err(LmdbCacheError::Corrupt(format!(
            "record is {} bytes, header needs {}",
            bytes.len(),
            HEADER_LEN
        )));
    }

    let millis_bytes: [u8; 8] = bytes[0..8]
        .try_into()
        .map_err(|_| LmdbCacheError::Corrupt("invalid expiration".into()))?;
    let millis = i64::from_le_bytes(millis_bytes);
    let expires_at = DateTime::from_timestamp_millis(millis).unwrap_or(DateTime::<Utc>::MAX_UTC);
    let policy = CachePolicy::absolute(expires_at);

    let value = match bytes[8] {
        TAG_NULL => StoredValue::Null,
        TAG_VALUE => StoredValue::Value(
            serde_json::from_slice(&bytes[HEADER_LEN..])
                .map_err(|e| LmdbCacheError::Corrupt(e.to_string()))?,
        ),
        tag => return Err(LmdbCacheError::Corrupt(format!("unknown tag {}", tag))),
    };

    Ok(Record { value, policy })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::time::Duration;
    use tempfile::TempDir;

    fn create_test_store() -> (LmdbCacheStore, TempDir) {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        let store = LmdbCacheStore::new(temp_dir.path(), 10).expect("store creation should succeed");
        (store, temp_dir)
    }

    fn live() -> CachePolicy {
        CachePolicy::expires_after(Duration::from_secs(60))
    }

    #[test]
    fn test_put_and_get() {
        let (store, _dir) = create_test_store();
        let value = StoredValue::Value(json!({"client_id": 1, "name": "1 name"}));
        store.set("k", value.clone(), live()).unwrap();

        assert!(store.contains("k").unwrap());
        assert_eq!(store.get("k").unwrap(), Some(value));
        assert_eq!(store.get("other").unwrap(), None);
    }

    #[test]
    fn test_null_sentinel_round_trip() {
        let (store, _dir) = create_test_store();
        store.set("n", StoredValue::Null, live()).unwrap();
        assert_eq!(store.get("n").unwrap(), Some(StoredValue::Null));
    }

    #[test]
    fn test_remove() {
        let (store, _dir) = create_test_store();
        store.set("k", StoredValue::Null, live()).unwrap();
        assert!(store.remove("k").unwrap());
        assert!(!store.remove("k").unwrap());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_expired_entries_hidden_then_purged() {
        let (store, _dir) = create_test_store();
        let past = CachePolicy::absolute(Utc::now() - chrono::Duration::seconds(1));
        store.set("old", StoredValue::Value(json!(1)), past).unwrap();
        store.set("new", StoredValue::Value(json!(2)), live()).unwrap();

        assert_eq!(store.get("old").unwrap(), None);
        assert!(!store.contains("old").unwrap());
        assert_eq!(store.len().unwrap(), 1);

        assert_eq!(store.purge_expired().unwrap(), 1);
        assert_eq!(store.stats().unwrap().evictions, 1);
    }

    #[test]
    fn test_purge_keeps_entries_rewritten_concurrently() {
        let (store, _dir) = create_test_store();
        let store = std::sync::Arc::new(store);
        let past = || CachePolicy::absolute(Utc::now() - chrono::Duration::seconds(1));
        let done = std::sync::Arc::new(std::sync::atomic::AtomicBool::new(false));

        let purger = {
            let store = store.clone();
            let done = done.clone();
            std::thread::spawn(move || {
                while !done.load(Ordering::SeqCst) {
                    store.purge_expired().unwrap();
                }
            })
        };

        for i in 0..200 {
            store.set("k", StoredValue::Value(json!(-1)), past()).unwrap();
            store.set("k", StoredValue::Value(json!(i)), live()).unwrap();
            assert_eq!(store.get("k").unwrap(), Some(StoredValue::Value(json!(i))));
        }

        done.store(true, Ordering::SeqCst);
        purger.join().unwrap();
        assert!(store.contains("k").unwrap());
    }

    #[test]
    fn test_long_keys_are_digested() {
        let (store, _dir) = create_test_store();
        let long_a = format!("Repo.op():v1.{}", "a".repeat(600));
        let long_b = format!("Repo.op():v1.{}", "b".repeat(600));
        store.set(&long_a, StoredValue::Value(json!("a")), live()).unwrap();
        store.set(&long_b, StoredValue::Value(json!("b")), live()).unwrap();

        assert_eq!(encode_key(&long_a).len(), 33);
        assert_eq!(store.get(&long_a).unwrap(), Some(StoredValue::Value(json!("a"))));
        assert_eq!(store.get(&long_b).unwrap(), Some(StoredValue::Value(json!("b"))));
    }

    #[test]
    fn test_entries_survive_reopen() {
        let temp_dir = TempDir::new().expect("TempDir creation should succeed");
        {
            let store = LmdbCacheStore::new(temp_dir.path(), 10).unwrap();
            store.set("k", StoredValue::Value(json!([1, 2])), live()).unwrap();
        }
        let store = LmdbCacheStore::new(temp_dir.path(), 10).unwrap();
        assert_eq!(store.get("k").unwrap(), Some(StoredValue::Value(json!([1, 2]))));
    }

    #[test]
    fn test_stats() {
        let (store, _dir) = create_test_store();
        store.set("k", StoredValue::Null, live()).unwrap();
        store.get("k").unwrap();
        store.get("missing").unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.hits, 1);
        assert_eq!(stats.misses, 1);
        assert_eq!(stats.entry_count, 1);
        store.clear().unwrap();
        assert_eq!(store.len().unwrap(), 0);
    }

    #[test]
    fn test_corrupt_record_is_rejected() {
        assert!(decode_record(&[1, 2, 3]).is_err());
        let mut bytes = Utc::now().timestamp_millis().to_le_bytes().to_vec();
        bytes.push(7);
        assert!(decode_record(&bytes).is_err());
    }
}

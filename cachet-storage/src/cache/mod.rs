//! Cache layer: keys, stores and typed access.
//!
//! Repositories never talk to a [`CacheStore`] directly. They build a
//! [`CacheKey`] from their operation signature and arguments, then go through
//! a [`CacheAccessor`], which turns every store or decode failure into a miss.
//!
//! # Example
//!
//! ```ignore
//! let store: Arc<dyn CacheStore> = Arc::new(MemoryCacheStore::new());
//! let cache = CacheAccessor::new(Some(store), CacheConfig::from_env());
//!
//! let key = CacheKey::builder(&FETCH_CLIENT).arg(client_id).build()?;
//! match cache.try_get::<Client>(&key) {
//!     CacheLookup::Hit(client) => client,
//!     CacheLookup::Miss => { /* load, then cache.try_set(...) */ }
//! }
//! ```

pub mod accessor;
pub mod key;
pub mod lmdb_backend;
pub mod lookup;
pub mod memory_backend;
pub mod policy;
pub mod traits;

pub use accessor::CacheAccessor;
pub use key::{
    build_key, CacheKey, CacheKeyBuilder, CacheKeyResult, KeyArg, OperationSignature, Parameter,
    ToKeyArg, KEY_ENCODING_VERSION, NULL_ARGS,
};
pub use lmdb_backend::{LmdbCacheError, LmdbCacheStore};
pub use lookup::CacheLookup;
pub use memory_backend::MemoryCacheStore;
pub use policy::CachePolicy;
pub use traits::{CacheStats, CacheStore, CacheableEntity, StoredValue};

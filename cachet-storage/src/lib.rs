//! Cachet Storage - Cache Stores and Cache-Aside Repositories
//!
//! Builds on the pure types in `cachet-core`:
//!
//! - [`cache`]: cache keys, the [`CacheStore`] trait with in-memory and LMDB
//!   stores, and the fail-soft [`CacheAccessor`]
//! - [`repository`]: the [`CachedRepository`] base and the client, policy and
//!   policy version repositories
//! - [`synthetic`]: a deterministic data source for demos and tests

pub mod cache;
pub mod repository;
pub mod synthetic;

pub use cache::{
    build_key, CacheAccessor, CacheKey, CacheKeyBuilder, CacheKeyResult, CacheLookup,
    CachePolicy, CacheStats, CacheStore, CacheableEntity, KeyArg, LmdbCacheError,
    LmdbCacheStore, MemoryCacheStore, OperationSignature, Parameter, StoredValue, ToKeyArg,
};
pub use repository::{
    ensure_supported, CachedRepository, ClientRepo, ClientRepository, ClientSource, PolicyRepo,
    PolicyRepository, PolicySource, PolicyVersionRepo, PolicyVersionRepository,
    PolicyVersionSource,
};
pub use synthetic::SyntheticSource;

use std::sync::Arc;

/// The three repositories wired to one cache and one data source.
#[derive(Clone)]
pub struct Repositories {
    pub clients: Arc<ClientRepository>,
    pub policies: Arc<PolicyRepository>,
    pub policy_versions: Arc<PolicyVersionRepository>,
}

impl Repositories {
    /// Wire client → policy → policy version repositories over `source`.
    pub fn new<S>(cache: CacheAccessor, source: Arc<S>) -> Self
    where
        S: ClientSource + PolicySource + PolicyVersionSource + 'static,
    {
        let policy_versions = Arc::new(PolicyVersionRepository::new(cache.clone(), source.clone()));
        let policies = Arc::new(PolicyRepository::new(
            cache.clone(),
            source.clone(),
            policy_versions.clone(),
        ));
        let clients = Arc::new(ClientRepository::new(cache, source, policies.clone()));

        Self {
            clients,
            policies,
            policy_versions,
        }
    }
}

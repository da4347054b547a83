//! Cache-aside repositories.
//!
//! Every public read follows the same sequence:
//!
//! ```text
//! START ─ refresh_cache? ─ yes ─────────────────────────┐
//!   │ no                                                 │
//! CHECK_CACHE ─ hit ─> return                            │
//!   │ miss                                               v
//!   └──────────────> FETCH_BASE_ENTITY ─> RESOLVE_INCLUDE_PATHS ─> STORE_CACHE ─> return
//! ```
//!
//! The base fetch is itself a cached read under its own signature, so the
//! plain entity is shared by every include-path variant of an operation.
//! An include path the operation does not support fails the call with
//! [`PathError::UnsupportedPath`] and nothing is cached. Supported paths are
//! checked on a cache miss before `FETCH_BASE_ENTITY`, so an unsupported path
//! fails even when the entity does not exist; such a call never returns or
//! stores a null.

pub mod client;
pub mod policy;
pub mod policy_version;

use cachet_core::{
    any_path_equals, CachetResult, Client, ClientId, IncludePath, PathError, Policy, PolicyId,
    PolicyVersion, PolicyVersionId,
};
use serde::{de::DeserializeOwned, Serialize};

use crate::cache::{
    CacheAccessor, CacheKeyResult, CacheLookup, CachePolicy, CacheableEntity, OperationSignature,
};

pub use client::ClientRepository;
pub use policy::PolicyRepository;
pub use policy_version::PolicyVersionRepository;

/// Base behaviour shared by repositories that cache their reads.
///
/// Implementors provide the accessor; everything else has a default.
/// Override [`CachedRepository::cache_policy`] to give one repository type a
/// different expiration.
pub trait CachedRepository {
    /// Entity type this repository serves.
    type Entity: CacheableEntity;

    fn cache(&self) -> &CacheAccessor;

    /// Expiration applied to a write made now.
    fn cache_policy(&self) -> CachePolicy {
        self.cache().default_policy()
    }

    /// Look up a cached result. `T` is the entity or a `Vec` of it.
    ///
    /// A key that could not be built reads as a miss.
    fn try_read_cached<T: DeserializeOwned>(&self, key: &CacheKeyResult) -> CacheLookup<T> {
        let entity_type = <Self::Entity as CacheableEntity>::entity_type();
        let key = match key {
            Ok(key) => key,
            Err(e) => {
                tracing::warn!(
                    entity_type = %entity_type,
                    error = %e,
                    "Cache key could not be built, bypassing cache"
                );
                return CacheLookup::Miss;
            }
        };

        let lookup = self.cache().try_get(key);
        if lookup.is_hit() {
            tracing::debug!(entity_type = %entity_type, key = %key, "Cache hit");
        } else {
            tracing::debug!(entity_type = %entity_type, key = %key, "Cache miss");
        }
        lookup
    }

    /// Cache a fully resolved result. `None` caches "found, no value".
    ///
    /// Returns true if the entry was stored.
    fn try_write_cached<T: Serialize + ?Sized>(&self, key: &CacheKeyResult, value: Option<&T>) -> bool {
        let entity_type = <Self::Entity as CacheableEntity>::entity_type();
        let Ok(key) = key else {
            tracing::debug!(entity_type = %entity_type, "No cache key, skipping store");
            return false;
        };

        let stored = self.cache().try_set(key, value, self.cache_policy());
        if stored {
            tracing::debug!(entity_type = %entity_type, key = %key, "Cached result");
        }
        stored
    }

    /// Run `load` behind the cache: return a hit unless `refresh_cache` is
    /// set, otherwise load and store the result. Errors from `load` skip the
    /// store and propagate.
    fn cache_aside<T, F>(&self, key: CacheKeyResult, refresh_cache: bool, load: F) -> CachetResult<Option<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> CachetResult<Option<T>>,
    {
        if !refresh_cache {
            if let CacheLookup::Hit(value) = self.try_read_cached(&key) {
                return Ok(value);
            }
        }

        let value = load()?;
        self.try_write_cached(&key, value.as_ref());
        Ok(value)
    }

    /// [`CachedRepository::cache_aside`] for collection results.
    fn cache_aside_many<T, F>(&self, key: CacheKeyResult, refresh_cache: bool, load: F) -> CachetResult<Vec<T>>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> CachetResult<Vec<T>>,
    {
        self.cache_aside(key, refresh_cache, || load().map(Some))
            .map(Option::unwrap_or_default)
    }
}

/// Fail with `UnsupportedPath` for the first path not in `supported`.
///
/// `InvalidSelector` from resolving either side propagates.
pub fn ensure_supported<T>(
    include_paths: &[IncludePath<T>],
    supported: &[IncludePath<T>],
    operation: &OperationSignature,
) -> Result<(), PathError> {
    for path in include_paths {
        if !any_path_equals(supported, path)? {
            return Err(PathError::UnsupportedPath {
                path: path.path_string()?,
                operation: operation.qualified_name(),
            });
        }
    }
    Ok(())
}

// =============================================================================
// DATA SOURCES
// =============================================================================

/// Backing store for clients.
///
/// "Not found" is `Ok(None)` or an empty `Vec`; `Err` is reserved for
/// `StorageError::SourceFailed`.
pub trait ClientSource: Send + Sync {
    fn fetch_clients(&self) -> CachetResult<Vec<Client>>;

    fn fetch_client(&self, client_id: ClientId) -> CachetResult<Option<Client>>;
}

/// Backing store for policies.
pub trait PolicySource: Send + Sync {
    fn fetch_policy(&self, policy_id: PolicyId) -> CachetResult<Option<Policy>>;

    fn fetch_policies_by_client(&self, client_id: ClientId) -> CachetResult<Vec<Policy>>;
}

/// Backing store for policy versions.
pub trait PolicyVersionSource: Send + Sync {
    fn fetch_policy_version(&self, policy_version_id: PolicyVersionId) -> CachetResult<Option<PolicyVersion>>;

    fn fetch_policy_versions_by_policy(&self, policy_id: PolicyId) -> CachetResult<Vec<PolicyVersion>>;

    fn fetch_policy_versions_by_client(&self, client_id: ClientId) -> CachetResult<Vec<PolicyVersion>>;
}

// =============================================================================
// REPOSITORIES
// =============================================================================

/// Client reads.
pub trait ClientRepo: Send + Sync {
    fn get_clients(
        &self,
        include_paths: Option<&[IncludePath<Client>]>,
        refresh_cache: bool,
    ) -> CachetResult<Vec<Client>>;

    fn get_client_by_client_id(
        &self,
        client_id: ClientId,
        include_paths: Option<&[IncludePath<Client>]>,
        refresh_cache: bool,
    ) -> CachetResult<Option<Client>>;
}

/// Policy reads.
pub trait PolicyRepo: Send + Sync {
    fn get_policy_by_policy_id(
        &self,
        policy_id: PolicyId,
        include_paths: Option<&[IncludePath<Policy>]>,
        refresh_cache: bool,
    ) -> CachetResult<Option<Policy>>;

    fn get_policies_by_client_id(
        &self,
        client_id: ClientId,
        include_paths: Option<&[IncludePath<Policy>]>,
        refresh_cache: bool,
    ) -> CachetResult<Vec<Policy>>;
}

/// Policy version reads.
pub trait PolicyVersionRepo: Send + Sync {
    fn get_policy_version_by_policy_version_id(
        &self,
        policy_version_id: PolicyVersionId,
        include_paths: Option<&[IncludePath<PolicyVersion>]>,
        refresh_cache: bool,
    ) -> CachetResult<Option<PolicyVersion>>;

    fn get_policy_versions_by_policy_id(
        &self,
        policy_id: PolicyId,
        include_paths: Option<&[IncludePath<PolicyVersion>]>,
        refresh_cache: bool,
    ) -> CachetResult<Vec<PolicyVersion>>;

    fn get_policy_versions_by_client_id(
        &self,
        client_id: ClientId,
        include_paths: Option<&[IncludePath<PolicyVersion>]>,
        refresh_cache: bool,
    ) -> CachetResult<Vec<PolicyVersion>>;
}

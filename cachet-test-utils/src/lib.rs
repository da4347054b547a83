//! Cachet Test Utilities
//!
//! Shared test infrastructure for the cachet workspace:
//! - A call-counting data source for asserting cache hits
//! - A failing data source for error paths
//! - Proptest generators for entities, include paths and key arguments
//! - Fixtures that wire repositories over a chosen cache store
//! - Assertions for cachet-specific errors

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

pub use cachet_core::{
    CacheConfig, CachetError, CachetResult, Client, ClientId, EntityType, IncludePath, PathError,
    Policy, PolicyId, PolicyVersion, PolicyVersionId, StorageError,
};
pub use cachet_storage::{
    CacheAccessor, CacheStore, ClientRepo, ClientSource, MemoryCacheStore, PolicyRepo,
    PolicySource, PolicyVersionRepo, PolicyVersionSource, Repositories, SyntheticSource,
};

// ============================================================================
// COUNTING SOURCE
// ============================================================================

/// Per-method call counts recorded by [`CountingSource`].
#[derive(Debug, Default)]
pub struct SourceCalls {
    pub fetch_clients: AtomicUsize,
    pub fetch_client: AtomicUsize,
    pub fetch_policy: AtomicUsize,
    pub fetch_policies_by_client: AtomicUsize,
    pub fetch_policy_version: AtomicUsize,
    pub fetch_policy_versions_by_policy: AtomicUsize,
    pub fetch_policy_versions_by_client: AtomicUsize,
}

impl SourceCalls {
    /// Sum of all recorded calls.
    pub fn total(&self) -> usize {
        [
            &self.fetch_clients,
            &self.fetch_client,
            &self.fetch_policy,
            &self.fetch_policies_by_client,
            &self.fetch_policy_version,
            &self.fetch_policy_versions_by_policy,
            &self.fetch_policy_versions_by_client,
        ]
        .iter()
        .map(|c| c.load(Ordering::SeqCst))
        .sum()
    }
}

/// Wraps [`SyntheticSource`] and counts every fetch.
#[derive(Debug, Default)]
pub struct CountingSource {
    inner: SyntheticSource,
    calls: SourceCalls,
}

impl CountingSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> &SourceCalls {
        &self.calls
    }

    fn record(counter: &AtomicUsize) {
        counter.fetch_add(1, Ordering::SeqCst);
    }
}

impl ClientSource for CountingSource {
    fn fetch_clients(&self) -> CachetResult<Vec<Client>> {
        Self::record(&self.calls.fetch_clients);
        self.inner.fetch_clients()
    }

    fn fetch_client(&self, client_id: ClientId) -> CachetResult<Option<Client>> {
        Self::record(&self.calls.fetch_client);
        self.inner.fetch_client(client_id)
    }
}

impl PolicySource for CountingSource {
    fn fetch_policy(&self, policy_id: PolicyId) -> CachetResult<Option<Policy>> {
        Self::record(&self.calls.fetch_policy);
        self.inner.fetch_policy(policy_id)
    }

    fn fetch_policies_by_client(&self, client_id: ClientId) -> CachetResult<Vec<Policy>> {
        Self::record(&self.calls.fetch_policies_by_client);
        self.inner.fetch_policies_by_client(client_id)
    }
}

impl PolicyVersionSource for CountingSource {
    fn fetch_policy_version(&self, policy_version_id: PolicyVersionId) -> CachetResult<Option<PolicyVersion>> {
        Self::record(&self.calls.fetch_policy_version);
        self.inner.fetch_policy_version(policy_version_id)
    }

    fn fetch_policy_versions_by_policy(&self, policy_id: PolicyId) -> CachetResult<Vec<PolicyVersion>> {
        Self::record(&self.calls.fetch_policy_versions_by_policy);
        self.inner.fetch_policy_versions_by_policy(policy_id)
    }

    fn fetch_policy_versions_by_client(&self, client_id: ClientId) -> CachetResult<Vec<PolicyVersion>> {
        Self::record(&self.calls.fetch_policy_versions_by_client);
        self.inner.fetch_policy_versions_by_client(client_id)
    }
}

// ============================================================================
// FAILING SOURCE
// ============================================================================

/// A data source whose every fetch fails with `SourceFailed`.
#[derive(Debug, Clone, Default)]
pub struct FailingSource {
    reason: String,
}

impl FailingSource {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }

    fn fail<T>(&self, entity_type: EntityType) -> CachetResult<T> {
        Err(StorageError::SourceFailed {
            entity_type,
            reason: self.reason.clone(),
        }
        .into())
    }
}

impl ClientSource for FailingSource {
    fn fetch_clients(&self) -> CachetResult<Vec<Client>> {
        self.fail(EntityType::Client)
    }

    fn fetch_client(&self, _client_id: ClientId) -> CachetResult<Option<Client>> {
        self.fail(EntityType::Client)
    }
}

impl PolicySource for FailingSource {
    fn fetch_policy(&self, _policy_id: PolicyId) -> CachetResult<Option<Policy>> {
        self.fail(EntityType::Policy)
    }

    fn fetch_policies_by_client(&self, _client_id: ClientId) -> CachetResult<Vec<Policy>> {
        self.fail(EntityType::Policy)
    }
}

impl PolicyVersionSource for FailingSource {
    fn fetch_policy_version(&self, _policy_version_id: PolicyVersionId) -> CachetResult<Option<PolicyVersion>> {
        self.fail(EntityType::PolicyVersion)
    }

    fn fetch_policy_versions_by_policy(&self, _policy_id: PolicyId) -> CachetResult<Vec<PolicyVersion>> {
        self.fail(EntityType::PolicyVersion)
    }

    fn fetch_policy_versions_by_client(&self, _client_id: ClientId) -> CachetResult<Vec<PolicyVersion>> {
        self.fail(EntityType::PolicyVersion)
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for cachet types.

    use super::*;
    use cachet_storage::KeyArg;
    use proptest::prelude::*;

    /// Generate a valid identifier.
    pub fn arb_identifier() -> impl Strategy<Value = String> {
        "[a-z_][a-z0-9_]{0,15}"
    }

    /// Generate a one- or two-level include path over any entity.
    pub fn arb_include_path<T: 'static>() -> impl Strategy<Value = IncludePath<T>> {
        prop_oneof![
            arb_identifier().prop_map(|name| IncludePath::<T>::member(name)),
            (arb_identifier(), arb_identifier())
                .prop_map(|(outer, inner)| IncludePath::<T>::through(outer, IncludePath::<()>::member(inner))),
        ]
    }

    /// Generate a Client without navigation data.
    pub fn arb_client() -> impl Strategy<Value = Client> {
        (any::<i32>(), ".{0,32}").prop_map(|(id, name)| Client::new(id, name))
    }

    /// Generate a PolicyVersion.
    pub fn arb_policy_version() -> impl Strategy<Value = PolicyVersion> {
        (any::<i32>(), any::<i32>()).prop_map(|(id, policy_id)| PolicyVersion::new(id, policy_id))
    }

    /// Generate a Policy, with or without versions attached.
    pub fn arb_policy() -> impl Strategy<Value = Policy> {
        (any::<i32>(), proptest::option::of(proptest::collection::vec(arb_policy_version(), 0..4)))
            .prop_map(|(policy_id, policy_versions)| Policy {
                policy_id,
                policy_versions,
            })
    }

    /// Generate a key argument that always encodes.
    pub fn arb_key_arg() -> impl Strategy<Value = KeyArg> {
        prop_oneof![
            Just(KeyArg::Null),
            any::<bool>().prop_map(KeyArg::Bool),
            any::<i64>().prop_map(KeyArg::Int),
            proptest::num::f64::NORMAL.prop_map(KeyArg::Float),
            ".{0,16}".prop_map(KeyArg::Str),
            proptest::collection::vec(arb_identifier(), 0..3).prop_map(KeyArg::Paths),
        ]
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Pre-wired repositories for scenario tests.

    use super::*;

    /// Repositories over a fresh in-memory store and a counting source.
    pub struct Harness {
        pub store: Arc<MemoryCacheStore>,
        pub source: Arc<CountingSource>,
        pub repositories: Repositories,
    }

    impl Harness {
        pub fn new() -> Self {
            Self::with_config(CacheConfig::default())
        }

        pub fn with_config(config: CacheConfig) -> Self {
            let store = Arc::new(MemoryCacheStore::new());
            let source = Arc::new(CountingSource::new());
            let cache = CacheAccessor::new(Some(store.clone()), config);
            let repositories = Repositories::new(cache, source.clone());
            Self {
                store,
                source,
                repositories,
            }
        }

        /// Live cache keys produced by `operation`.
        pub fn keys_for(&self, operation: &cachet_storage::OperationSignature) -> Vec<String> {
            self.store
                .keys_with_prefix(&format!("{}:", operation))
                .unwrap_or_default()
        }
    }

    impl Default for Harness {
        fn default() -> Self {
            Self::new()
        }
    }

    /// Repositories with no cache store at all.
    pub fn uncached(source: Arc<CountingSource>) -> Repositories {
        Repositories::new(CacheAccessor::new(None, CacheConfig::default()), source)
    }

    /// Repositories over `store` and a source that always fails.
    pub fn failing(store: Arc<dyn CacheStore>, reason: &str) -> Repositories {
        let cache = CacheAccessor::new(Some(store), CacheConfig::default());
        Repositories::new(cache, Arc::new(FailingSource::new(reason)))
    }

    /// The canonical client `n` from the synthetic data set.
    pub fn synthetic_client(client_id: ClientId) -> Client {
        Client::new(client_id, format!("{} name", client_id))
    }
}

// ============================================================================
// ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Custom assertion functions for cachet-specific validation.

    use super::*;

    /// Assert that a result is an `UnsupportedPath` error naming `path`.
    pub fn assert_unsupported_path<T: std::fmt::Debug>(result: &CachetResult<T>, path: &str) {
        match result {
            Err(CachetError::Path(PathError::UnsupportedPath { path: p, .. })) => {
                assert_eq!(p, path, "Wrong path in UnsupportedPath error");
            }
            other => panic!("Expected UnsupportedPath, got: {:?}", other),
        }
    }

    /// Assert that a result is an `InvalidSelector` error.
    pub fn assert_invalid_selector<T: std::fmt::Debug>(result: &CachetResult<T>) {
        assert!(
            matches!(result, Err(CachetError::Path(PathError::InvalidSelector { .. }))),
            "Expected InvalidSelector, got: {:?}",
            result
        );
    }

    /// Assert that a result is a `SourceFailed` storage error.
    pub fn assert_source_failed<T: std::fmt::Debug>(result: &CachetResult<T>) {
        assert!(
            matches!(result, Err(CachetError::Storage(StorageError::SourceFailed { .. }))),
            "Expected SourceFailed, got: {:?}",
            result
        );
    }

    /// Assert that a counter recorded exactly `expected` calls.
    pub fn assert_calls(counter: &AtomicUsize, expected: usize, what: &str) {
        assert_eq!(
            counter.load(Ordering::SeqCst),
            expected,
            "Unexpected number of {} calls",
            what
        );
    }
}

//! End-to-end repository scenarios over real cache stores.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use cachet_storage::repository::client::{GET_CLIENTS, GET_CLIENT_BY_CLIENT_ID};
use cachet_storage::{
    CacheKey, CacheLookup, CachedRepository, ClientRepository, LmdbCacheStore, OperationSignature,
    Parameter,
};
use cachet_test_utils::assertions::{
    assert_calls, assert_invalid_selector, assert_source_failed, assert_unsupported_path,
};
use cachet_test_utils::fixtures::{failing, synthetic_client, uncached, Harness};
use cachet_test_utils::generators::{arb_client, arb_include_path, arb_key_arg};
use cachet_test_utils::*;
use proptest::prelude::*;

#[test]
fn test_second_read_is_served_from_cache() {
    let h = Harness::new();
    let clients = &h.repositories.clients;

    let first = clients.get_client_by_client_id(1, None, false).unwrap();
    let second = clients.get_client_by_client_id(1, None, false).unwrap();

    assert_eq!(first, Some(synthetic_client(1)));
    assert_eq!(first, second);
    assert_calls(&h.source.calls().fetch_client, 1, "fetch_client");
}

#[test]
fn test_refresh_goes_back_to_the_source() {
    let h = Harness::new();
    let clients = &h.repositories.clients;

    clients.get_client_by_client_id(1, None, false).unwrap();
    clients.get_client_by_client_id(1, None, true).unwrap();
    assert_calls(&h.source.calls().fetch_client, 2, "fetch_client");

    // The refreshed value was written back.
    clients.get_client_by_client_id(1, None, false).unwrap();
    assert_calls(&h.source.calls().fetch_client, 2, "fetch_client");
}

#[test]
fn test_client_with_policies() {
    let h = Harness::new();
    let paths = [Client::include_policies()];
    let client = h
        .repositories
        .clients
        .get_client_by_client_id(1, Some(&paths[..]), false)
        .unwrap()
        .unwrap();

    let ids: Vec<_> = client.policies.unwrap().iter().map(|p| p.policy_id).collect();
    assert_eq!(ids, vec![1, 2, 3]);
}

#[test]
fn test_client_with_policy_versions_loads_each_layer_once() {
    let h = Harness::new();
    let paths = [Client::include_policy_versions()];
    let clients = &h.repositories.clients;

    let first = clients
        .get_client_by_client_id(1, Some(&paths[..]), false)
        .unwrap()
        .unwrap();
    let policies = first.policies.as_ref().unwrap();
    assert_eq!(policies.len(), 3);
    for policy in policies {
        let versions = policy.policy_versions.as_ref().unwrap();
        assert_eq!(versions.len(), 3);
        assert!(versions.iter().all(|v| v.policy_id == policy.policy_id));
    }

    let calls = h.source.calls();
    assert_calls(&calls.fetch_client, 1, "fetch_client");
    assert_calls(&calls.fetch_policies_by_client, 1, "fetch_policies_by_client");
    assert_calls(&calls.fetch_policy_versions_by_client, 1, "fetch_policy_versions_by_client");

    let again = clients
        .get_client_by_client_id(1, Some(&paths[..]), false)
        .unwrap()
        .unwrap();
    assert_eq!(first, again);
    assert_eq!(calls.total(), 3);
}

#[test]
fn test_structurally_equal_paths_share_a_cache_entry() {
    let h = Harness::new();
    let built = [Client::include_policies()];
    let parsed = [IncludePath::<Client>::parse("policies").unwrap()];
    let clients = &h.repositories.clients;

    clients.get_client_by_client_id(3, Some(&built[..]), false).unwrap();
    clients.get_client_by_client_id(3, Some(&parsed[..]), false).unwrap();

    assert_calls(&h.source.calls().fetch_policies_by_client, 1, "fetch_policies_by_client");
    assert_eq!(h.keys_for(&GET_CLIENT_BY_CLIENT_ID).len(), 1);
}

#[test]
fn test_unsupported_include_path() {
    let h = Harness::new();
    let paths = [IncludePath::<Client>::member("name")];
    let result = h
        .repositories
        .clients
        .get_client_by_client_id(1, Some(&paths[..]), false);

    assert_unsupported_path(&result, "name");
    assert!(h.keys_for(&GET_CLIENT_BY_CLIENT_ID).is_empty());
    assert_eq!(h.source.calls().total(), 0);
}

#[test]
fn test_three_level_path_is_an_invalid_selector() {
    let h = Harness::new();
    let deep = IncludePath::<Client>::from_selector(cachet_core::Selector::Projection(vec![
        cachet_core::Selector::Member("policies".into()),
        cachet_core::Selector::Projection(vec![
            cachet_core::Selector::Member("policy_versions".into()),
            cachet_core::Selector::Member("policy_id".into()),
        ]),
    ]));
    let paths = [deep];
    let result = h.repositories.clients.get_clients(Some(&paths[..]), false);
    assert_invalid_selector(&result);
}

#[test]
fn test_concurrent_cold_reads() {
    let h = Harness::new();
    let paths = [Client::include_policies()];
    let clients = h.repositories.clients.clone();

    let results: Vec<_> = std::thread::scope(|s| {
        let handles: Vec<_> = (0..2)
            .map(|_| {
                let clients = clients.clone();
                let paths = &paths;
                s.spawn(move || clients.get_client_by_client_id(2, Some(&paths[..]), false))
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| handle.join().expect("reader thread should not panic"))
            .collect()
    });

    let first = results[0].as_ref().unwrap();
    let second = results[1].as_ref().unwrap();
    assert_eq!(first, second);
    assert_eq!(first.as_ref().unwrap().client_id, 2);

    // Both readers may have fetched; the key still holds one entry.
    assert_eq!(h.keys_for(&GET_CLIENT_BY_CLIENT_ID).len(), 1);
}

#[test]
fn test_disabled_cache_always_fetches() {
    let h = Harness::with_config(CacheConfig::disabled());
    let clients = &h.repositories.clients;

    clients.get_client_by_client_id(1, None, false).unwrap();
    clients.get_client_by_client_id(1, None, false).unwrap();

    assert_calls(&h.source.calls().fetch_client, 2, "fetch_client");
    assert!(h.store.is_empty().unwrap());
}

#[test]
fn test_missing_store_always_fetches() {
    let source = Arc::new(CountingSource::new());
    let repositories = uncached(source.clone());

    repositories.clients.get_clients(None, false).unwrap();
    repositories.clients.get_clients(None, false).unwrap();

    assert_calls(&source.calls().fetch_clients, 2, "fetch_clients");
}

#[test]
fn test_missing_client_is_cached_as_null() {
    let h = Harness::new();
    let clients = &h.repositories.clients;

    assert_eq!(clients.get_client_by_client_id(-7, None, false).unwrap(), None);
    assert_eq!(clients.get_client_by_client_id(-7, None, false).unwrap(), None);
    assert_calls(&h.source.calls().fetch_client, 1, "fetch_client");

    let key = CacheKey::builder(&GET_CLIENT_BY_CLIENT_ID)
        .arg(-7)
        .arg(None::<&[IncludePath<Client>]>)
        .build();
    assert_eq!(
        clients.try_read_cached::<Client>(&key),
        CacheLookup::Hit(None)
    );
}

#[test]
fn test_source_failure_propagates_and_is_not_cached() {
    let store = Arc::new(MemoryCacheStore::new());
    let repositories = failing(store.clone(), "connection reset");

    let result = repositories.clients.get_clients(None, false);
    assert_source_failed(&result);
    assert!(store.is_empty().unwrap());
}

#[test]
fn test_expired_entries_are_refetched() {
    let h = Harness::with_config(CacheConfig::default().with_absolute_expiration(Duration::from_millis(20)));
    let clients = &h.repositories.clients;

    clients.get_clients(None, false).unwrap();
    std::thread::sleep(Duration::from_millis(40));
    clients.get_clients(None, false).unwrap();

    assert_calls(&h.source.calls().fetch_clients, 2, "fetch_clients");
    assert_eq!(h.keys_for(&GET_CLIENTS).len(), 1);
}

#[test]
fn test_lmdb_store_serves_a_second_process() {
    let dir = tempfile::TempDir::new().expect("TempDir creation should succeed");
    let paths = [Client::include_policy_versions()];

    let first = {
        let store = Arc::new(LmdbCacheStore::new(dir.path(), 10).unwrap());
        let repositories = Repositories::new(
            CacheAccessor::new(Some(store), CacheConfig::default()),
            Arc::new(CountingSource::new()),
        );
        repositories
            .clients
            .get_client_by_client_id(1, Some(&paths[..]), false)
            .unwrap()
    };

    // Reopen, as another process would.
    let store = Arc::new(LmdbCacheStore::new(dir.path(), 10).unwrap());
    let source = Arc::new(CountingSource::new());
    let repositories = Repositories::new(CacheAccessor::new(Some(store), CacheConfig::default()), source.clone());
    let second = repositories
        .clients
        .get_client_by_client_id(1, Some(&paths[..]), false)
        .unwrap();

    assert_eq!(first, second);
    assert_eq!(source.calls().total(), 0);
}

/// A client repository whose entries expire as soon as they are written.
struct ShortLivedClients {
    inner: ClientRepository,
}

impl CachedRepository for ShortLivedClients {
    type Entity = Client;

    fn cache(&self) -> &CacheAccessor {
        self.inner.cache()
    }

    fn cache_policy(&self) -> cachet_storage::CachePolicy {
        cachet_storage::CachePolicy::absolute(chrono::Utc::now())
    }
}

#[test]
fn test_cache_policy_override() {
    const OP: OperationSignature =
        OperationSignature::new("ShortLivedClients", "get", &[Parameter::new("i32", "client_id")]);

    let h = Harness::new();
    let repo = ShortLivedClients {
        inner: h.repositories.clients.as_ref().clone(),
    };
    let key = CacheKey::builder(&OP).arg(1).build();

    assert!(repo.try_write_cached(&key, Some(&synthetic_client(1))));
    assert!(repo.try_read_cached::<Client>(&key).is_miss());
    // Default policy on the wrapped repository keeps entries alive.
    assert!(h.repositories.clients.try_write_cached(&key, Some(&synthetic_client(1))));
    assert!(h.repositories.clients.try_read_cached::<Client>(&key).is_hit());
    assert_eq!(h.source.calls().fetch_client.load(Ordering::SeqCst), 0);
}

proptest! {
    /// Include-path keys depend only on the path strings.
    #[test]
    fn prop_include_path_keys_are_structural(path in arb_include_path::<Client>(), id in any::<i32>()) {
        let rebuilt = IncludePath::<Client>::parse(&path.path_string().unwrap()).unwrap();
        let a = CacheKey::builder(&GET_CLIENT_BY_CLIENT_ID).arg(id).arg(Some(std::slice::from_ref(&path))).build();
        let b = CacheKey::builder(&GET_CLIENT_BY_CLIENT_ID).arg(id).arg(Some(std::slice::from_ref(&rebuilt))).build();
        prop_assert_eq!(a.unwrap(), b.unwrap());
    }

    /// Every finite argument vector encodes, and does so deterministically.
    #[test]
    fn prop_finite_arguments_always_encode(args in proptest::collection::vec(arb_key_arg(), 0..6)) {
        let direct = cachet_storage::build_key(&GET_CLIENTS, Some(args.as_slice())).unwrap();
        let built = args
            .iter()
            .fold(CacheKey::builder(&GET_CLIENTS), |builder, arg| builder.arg(arg))
            .build()
            .unwrap();
        prop_assert_eq!(direct, built);
    }

    /// Whatever the stored client, it reads back unchanged.
    #[test]
    fn prop_cached_clients_round_trip(client in arb_client()) {
        let h = Harness::new();
        let key = CacheKey::builder(&GET_CLIENT_BY_CLIENT_ID).arg(client.client_id).build();
        prop_assert!(h.repositories.clients.try_write_cached(&key, Some(&client)));
        prop_assert_eq!(
            h.repositories.clients.try_read_cached::<Client>(&key),
            CacheLookup::Hit(Some(client))
        );
    }
}

#[test]
fn test_cache_stats_reflect_repository_traffic() {
    let h = Harness::new();
    let clients = &h.repositories.clients;
    clients.get_client_by_client_id(1, None, false).unwrap();
    clients.get_client_by_client_id(1, None, false).unwrap();

    let stats = h.store.stats().unwrap();
    // Cold read: public miss + base miss. Warm read: public hit.
    assert_eq!(stats.misses, 2);
    assert_eq!(stats.hits, 1);
    assert_eq!(stats.entry_count, 2);

    let json = serde_json::to_value(clients.get_client_by_client_id(1, None, false).unwrap()).unwrap();
    assert_eq!(json["name"], "1 name");
}

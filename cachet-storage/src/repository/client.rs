//! Client repository.
//!
//! Supports the `policies` and `policies.policy_versions` include paths.
//! Policies are loaded once per client through the [`PolicyRepo`]
//! collaborator, with `policy_versions` forwarded as a nested include when
//! the deeper path was requested.

use std::sync::Arc;

use cachet_core::{any_path_equals, CachetResult, Client, ClientId, IncludePath, Policy};

use super::{ensure_supported, CachedRepository, ClientRepo, ClientSource, PolicyRepo};
use crate::cache::{build_key, CacheAccessor, CacheKey, OperationSignature, Parameter};

const REPOSITORY: &str = "ClientRepository";
const INCLUDE_PATHS: &str = "Option<&[IncludePath<Client>]>";

pub const GET_CLIENTS: OperationSignature = OperationSignature::new(
    REPOSITORY,
    "get_clients",
    &[
        Parameter::new(INCLUDE_PATHS, "include_paths"),
        Parameter::new("bool", "refresh_cache"),
    ],
);

pub const GET_CLIENT_BY_CLIENT_ID: OperationSignature = OperationSignature::new(
    REPOSITORY,
    "get_client_by_client_id",
    &[
        Parameter::new("i32", "client_id"),
        Parameter::new(INCLUDE_PATHS, "include_paths"),
        Parameter::new("bool", "refresh_cache"),
    ],
);

const FETCH_CLIENTS: OperationSignature = OperationSignature::new(
    REPOSITORY,
    "fetch_clients",
    &[Parameter::new("bool", "refresh_cache")],
);

const FETCH_CLIENT_BY_CLIENT_ID: OperationSignature = OperationSignature::new(
    REPOSITORY,
    "fetch_client_by_client_id",
    &[Parameter::new("i32", "client_id"), Parameter::new("bool", "refresh_cache")],
);

/// Cached reads of clients.
///
/// # Example
///
/// ```ignore
/// let client = clients.get_client_by_client_id(
///     1,
///     Some(&[Client::include_policy_versions()]),
///     false,
/// )?;
/// ```
#[derive(Clone)]
pub struct ClientRepository {
    cache: CacheAccessor,
    source: Arc<dyn ClientSource>,
    policies: Arc<dyn PolicyRepo>,
}

impl ClientRepository {
    pub fn new(cache: CacheAccessor, source: Arc<dyn ClientSource>, policies: Arc<dyn PolicyRepo>) -> Self {
        Self {
            cache,
            source,
            policies,
        }
    }

    /// Include paths accepted by every client read.
    pub fn supported_include_paths() -> [IncludePath<Client>; 2] {
        [Client::include_policies(), Client::include_policy_versions()]
    }

    fn fetch_clients(&self, refresh_cache: bool) -> CachetResult<Vec<Client>> {
        // No key arguments besides the refresh flag.
        let key = build_key(&FETCH_CLIENTS, None);
        self.cache_aside_many(key, refresh_cache, || self.source.fetch_clients())
    }

    fn fetch_client_by_client_id(
        &self,
        client_id: ClientId,
        refresh_cache: bool,
    ) -> CachetResult<Option<Client>> {
        let key = CacheKey::builder(&FETCH_CLIENT_BY_CLIENT_ID)
            .arg(client_id)
            .build();
        self.cache_aside(key, refresh_cache, || self.source.fetch_client(client_id))
    }

    /// Policies to attach to `client_id`, or `None` when no path under
    /// `policies` was requested.
    fn resolve_policies(
        &self,
        client_id: ClientId,
        include_paths: &[IncludePath<Client>],
        refresh_cache: bool,
    ) -> CachetResult<Option<Vec<Policy>>> {
        let policies_path = Client::include_policies();
        let mut wants_policies = false;
        for path in include_paths {
            if path.path_starts_with(Some(&policies_path))? {
                wants_policies = true;
                break;
            }
        }
        if !wants_policies {
            return Ok(None);
        }

        let nested: Vec<IncludePath<Policy>> =
            if any_path_equals(include_paths, &Client::include_policy_versions())? {
                vec![Policy::include_policy_versions()]
            } else {
                Vec::new()
            };
        let nested = (!nested.is_empty()).then_some(nested.as_slice());

        self.policies
            .get_policies_by_client_id(client_id, nested, refresh_cache)
            .map(Some)
    }
}

impl CachedRepository for ClientRepository {
    type Entity = Client;

    fn cache(&self) -> &CacheAccessor {
        &self.cache
    }
}

impl ClientRepo for ClientRepository {
    fn get_clients(
        &self,
        include_paths: Option<&[IncludePath<Client>]>,
        refresh_cache: bool,
    ) -> CachetResult<Vec<Client>> {
        let key = CacheKey::builder(&GET_CLIENTS).arg(include_paths).build();

        self.cache_aside_many(key, refresh_cache, || {
            let paths = include_paths.unwrap_or_default();
            ensure_supported(paths, &Self::supported_include_paths(), &GET_CLIENTS)?;

            let mut clients = self.fetch_clients(refresh_cache)?;
            for client in &mut clients {
                if let Some(policies) = self.resolve_policies(client.client_id, paths, refresh_cache)? {
                    client.policies = Some(policies);
                }
            }
            Ok(clients)
        })
    }

    fn get_client_by_client_id(
        &self,
        client_id: ClientId,
        include_paths: Option<&[IncludePath<Client>]>,
        refresh_cache: bool,
    ) -> CachetResult<Option<Client>> {
        let key = CacheKey::builder(&GET_CLIENT_BY_CLIENT_ID)
            .arg(client_id)
            .arg(include_paths)
            .build();

        self.cache_aside(key, refresh_cache, || {
            let paths = include_paths.unwrap_or_default();
            ensure_supported(paths, &Self::supported_include_paths(), &GET_CLIENT_BY_CLIENT_ID)?;

            let Some(mut client) = self.fetch_client_by_client_id(client_id, refresh_cache)? else {
                return Ok(None);
            };
            if let Some(policies) = self.resolve_policies(client_id, paths, refresh_cache)? {
                client.policies = Some(policies);
            }
            Ok(Some(client))
        })
    }
}

//! Policy repository.
//!
//! Supports the `policy_versions` include path. Versions are loaded through
//! the [`PolicyVersionRepo`] collaborator and attached to their policy.

use std::sync::Arc;

use cachet_core::{any_path_equals, CachetResult, ClientId, IncludePath, Policy, PolicyId};

use super::{ensure_supported, CachedRepository, PolicyRepo, PolicySource, PolicyVersionRepo};
use crate::cache::{CacheAccessor, CacheKey, OperationSignature, Parameter};

const REPOSITORY: &str = "PolicyRepository";
const INCLUDE_PATHS: &str = "Option<&[IncludePath<Policy>]>";

pub const GET_POLICY_BY_POLICY_ID: OperationSignature = OperationSignature::new(
    REPOSITORY,
    "get_policy_by_policy_id",
    &[
        Parameter::new("i32", "policy_id"),
        Parameter::new(INCLUDE_PATHS, "include_paths"),
        Parameter::new("bool", "refresh_cache"),
    ],
);

pub const GET_POLICIES_BY_CLIENT_ID: OperationSignature = OperationSignature::new(
    REPOSITORY,
    "get_policies_by_client_id",
    &[
        Parameter::new("i32", "client_id"),
        Parameter::new(INCLUDE_PATHS, "include_paths"),
        Parameter::new("bool", "refresh_cache"),
    ],
);

const FETCH_POLICY_BY_POLICY_ID: OperationSignature = OperationSignature::new(
    REPOSITORY,
    "fetch_policy_by_policy_id",
    &[Parameter::new("i32", "policy_id"), Parameter::new("bool", "refresh_cache")],
);

const FETCH_POLICIES_BY_CLIENT_ID: OperationSignature = OperationSignature::new(
    REPOSITORY,
    "fetch_policies_by_client_id",
    &[Parameter::new("i32", "client_id"), Parameter::new("bool", "refresh_cache")],
);

/// Cached reads of policies.
#[derive(Clone)]
pub struct PolicyRepository {
    cache: CacheAccessor,
    source: Arc<dyn PolicySource>,
    policy_versions: Arc<dyn PolicyVersionRepo>,
}

impl PolicyRepository {
    pub fn new(
        cache: CacheAccessor,
        source: Arc<dyn PolicySource>,
        policy_versions: Arc<dyn PolicyVersionRepo>,
    ) -> Self {
        Self {
            cache,
            source,
            policy_versions,
        }
    }

    /// Include paths accepted by every policy read.
    pub fn supported_include_paths() -> [IncludePath<Policy>; 1] {
        [Policy::include_policy_versions()]
    }

    fn fetch_policy_by_policy_id(
        &self,
        policy_id: PolicyId,
        refresh_cache: bool,
    ) -> CachetResult<Option<Policy>> {
        let key = CacheKey::builder(&FETCH_POLICY_BY_POLICY_ID)
            .arg(policy_id)
            .build();
        self.cache_aside(key, refresh_cache, || self.source.fetch_policy(policy_id))
    }

    fn fetch_policies_by_client_id(
        &self,
        client_id: ClientId,
        refresh_cache: bool,
    ) -> CachetResult<Vec<Policy>> {
        let key = CacheKey::builder(&FETCH_POLICIES_BY_CLIENT_ID)
            .arg(client_id)
            .build();
        self.cache_aside_many(key, refresh_cache, || {
            self.source.fetch_policies_by_client(client_id)
        })
    }
}

impl CachedRepository for PolicyRepository {
    type Entity = Policy;

    fn cache(&self) -> &CacheAccessor {
        &self.cache
    }
}

impl PolicyRepo for PolicyRepository {
    fn get_policy_by_policy_id(
        &self,
        policy_id: PolicyId,
        include_paths: Option<&[IncludePath<Policy>]>,
        refresh_cache: bool,
    ) -> CachetResult<Option<Policy>> {
        let key = CacheKey::builder(&GET_POLICY_BY_POLICY_ID)
            .arg(policy_id)
            .arg(include_paths)
            .build();

        self.cache_aside(key, refresh_cache, || {
            let paths = include_paths.unwrap_or_default();
            ensure_supported(paths, &Self::supported_include_paths(), &GET_POLICY_BY_POLICY_ID)?;

            let Some(mut policy) = self.fetch_policy_by_policy_id(policy_id, refresh_cache)? else {
                return Ok(None);
            };

            if any_path_equals(paths, &Policy::include_policy_versions())?
                && policy.policy_versions.is_none()
            {
                let versions = self
                    .policy_versions
                    .get_policy_versions_by_policy_id(policy_id, None, refresh_cache)?;
                policy.policy_versions = Some(versions);
            }

            Ok(Some(policy))
        })
    }

    fn get_policies_by_client_id(
        &self,
        client_id: ClientId,
        include_paths: Option<&[IncludePath<Policy>]>,
        refresh_cache: bool,
    ) -> CachetResult<Vec<Policy>> {
        let key = CacheKey::builder(&GET_POLICIES_BY_CLIENT_ID)
            .arg(client_id)
            .arg(include_paths)
            .build();

        self.cache_aside_many(key, refresh_cache, || {
            let paths = include_paths.unwrap_or_default();
            ensure_supported(paths, &Self::supported_include_paths(), &GET_POLICIES_BY_CLIENT_ID)?;

            let mut policies = self.fetch_policies_by_client_id(client_id, refresh_cache)?;

            if any_path_equals(paths, &Policy::include_policy_versions())? {
                // One load for the whole client, then grouped per policy.
                let versions = self
                    .policy_versions
                    .get_policy_versions_by_client_id(client_id, None, refresh_cache)?;
                for policy in &mut policies {
                    policy.policy_versions = Some(
                        versions
                            .iter()
                            .filter(|v| v.policy_id == policy.policy_id)
                            .cloned()
                            .collect(),
                    );
                }
            }

            Ok(policies)
        })
    }
}

//! Policy version repository. Policy versions have no navigation properties,
//! so every non-empty include path is rejected.

use std::sync::Arc;

use cachet_core::{CachetResult, ClientId, IncludePath, PolicyId, PolicyVersion, PolicyVersionId};

use super::{ensure_supported, CachedRepository, PolicyVersionRepo, PolicyVersionSource};
use crate::cache::{CacheAccessor, CacheKey, OperationSignature, Parameter};

const REPOSITORY: &str = "PolicyVersionRepository";
const INCLUDE_PATHS: &str = "Option<&[IncludePath<PolicyVersion>]>";

pub const GET_POLICY_VERSION_BY_POLICY_VERSION_ID: OperationSignature = OperationSignature::new(
    REPOSITORY,
    "get_policy_version_by_policy_version_id",
    &[
        Parameter::new("i32", "policy_version_id"),
        Parameter::new(INCLUDE_PATHS, "include_paths"),
        Parameter::new("bool", "refresh_cache"),
    ],
);

pub const GET_POLICY_VERSIONS_BY_POLICY_ID: OperationSignature = OperationSignature::new(
    REPOSITORY,
    "get_policy_versions_by_policy_id",
    &[
        Parameter::new("i32", "policy_id"),
        Parameter::new(INCLUDE_PATHS, "include_paths"),
        Parameter::new("bool", "refresh_cache"),
    ],
);

pub const GET_POLICY_VERSIONS_BY_CLIENT_ID: OperationSignature = OperationSignature::new(
    REPOSITORY,
    "get_policy_versions_by_client_id",
    &[
        Parameter::new("i32", "client_id"),
        Parameter::new(INCLUDE_PATHS, "include_paths"),
        Parameter::new("bool", "refresh_cache"),
    ],
);

const FETCH_POLICY_VERSION_BY_POLICY_VERSION_ID: OperationSignature = OperationSignature::new(
    REPOSITORY,
    "fetch_policy_version_by_policy_version_id",
    &[
        Parameter::new("i32", "policy_version_id"),
        Parameter::new("bool", "refresh_cache"),
    ],
);

const FETCH_POLICY_VERSIONS_BY_POLICY_ID: OperationSignature = OperationSignature::new(
    REPOSITORY,
    "fetch_policy_versions_by_policy_id",
    &[Parameter::new("i32", "policy_id"), Parameter::new("bool", "refresh_cache")],
);

const FETCH_POLICY_VERSIONS_BY_CLIENT_ID: OperationSignature = OperationSignature::new(
    REPOSITORY,
    "fetch_policy_versions_by_client_id",
    &[Parameter::new("i32", "client_id"), Parameter::new("bool", "refresh_cache")],
);

/// Cached reads of policy versions.
#[derive(Clone)]
pub struct PolicyVersionRepository {
    cache: CacheAccessor,
    source: Arc<dyn PolicyVersionSource>,
}

impl PolicyVersionRepository {
    pub fn new(cache: CacheAccessor, source: Arc<dyn PolicyVersionSource>) -> Self {
        Self { cache, source }
    }

    fn fetch_policy_version_by_policy_version_id(
        &self,
        policy_version_id: PolicyVersionId,
        refresh_cache: bool,
    ) -> CachetResult<Option<PolicyVersion>> {
        let key = CacheKey::builder(&FETCH_POLICY_VERSION_BY_POLICY_VERSION_ID)
            .arg(policy_version_id)
            .build();
        self.cache_aside(key, refresh_cache, || {
            self.source.fetch_policy_version(policy_version_id)
        })
    }

    fn fetch_policy_versions_by_policy_id(
        &self,
        policy_id: PolicyId,
        refresh_cache: bool,
    ) -> CachetResult<Vec<PolicyVersion>> {
        let key = CacheKey::builder(&FETCH_POLICY_VERSIONS_BY_POLICY_ID)
            .arg(policy_id)
            .build();
        self.cache_aside_many(key, refresh_cache, || {
            self.source.fetch_policy_versions_by_policy(policy_id)
        })
    }

    fn fetch_policy_versions_by_client_id(
        &self,
        client_id: ClientId,
        refresh_cache: bool,
    ) -> CachetResult<Vec<PolicyVersion>> {
        let key = CacheKey::builder(&FETCH_POLICY_VERSIONS_BY_CLIENT_ID)
            .arg(client_id)
            .build();
        self.cache_aside_many(key, refresh_cache, || {
            self.source.fetch_policy_versions_by_client(client_id)
        })
    }
}

impl CachedRepository for PolicyVersionRepository {
    type Entity = PolicyVersion;

    fn cache(&self) -> &CacheAccessor {
        &self.cache
    }
}

impl PolicyVersionRepo for PolicyVersionRepository {
    fn get_policy_version_by_policy_version_id(
        &self,
        policy_version_id: PolicyVersionId,
        include_paths: Option<&[IncludePath<PolicyVersion>]>,
        refresh_cache: bool,
    ) -> CachetResult<Option<PolicyVersion>> {
        let key = CacheKey::builder(&GET_POLICY_VERSION_BY_POLICY_VERSION_ID)
            .arg(policy_version_id)
            .arg(include_paths)
            .build();
        self.cache_aside(key, refresh_cache, || {
            ensure_supported(
                include_paths.unwrap_or_default(),
                &[],
                &GET_POLICY_VERSION_BY_POLICY_VERSION_ID,
            )?;
            self.fetch_policy_version_by_policy_version_id(policy_version_id, refresh_cache)
        })
    }

    fn get_policy_versions_by_policy_id(
        &self,
        policy_id: PolicyId,
        include_paths: Option<&[IncludePath<PolicyVersion>]>,
        refresh_cache: bool,
    ) -> CachetResult<Vec<PolicyVersion>> {
        let key = CacheKey::builder(&GET_POLICY_VERSIONS_BY_POLICY_ID)
            .arg(policy_id)
            .arg(include_paths)
            .build();
        self.cache_aside_many(key, refresh_cache, || {
            ensure_supported(
                include_paths.unwrap_or_default(),
                &[],
                &GET_POLICY_VERSIONS_BY_POLICY_ID,
            )?;
            self.fetch_policy_versions_by_policy_id(policy_id, refresh_cache)
        })
    }

    fn get_policy_versions_by_client_id(
        &self,
        client_id: ClientId,
        include_paths: Option<&[IncludePath<PolicyVersion>]>,
        refresh_cache: bool,
    ) -> CachetResult<Vec<PolicyVersion>> {
        let key = CacheKey::builder(&GET_POLICY_VERSIONS_BY_CLIENT_ID)
            .arg(client_id)
            .arg(include_paths)
            .build();
        self.cache_aside_many(key, refresh_cache, || {
            ensure_supported(
                include_paths.unwrap_or_default(),
                &[],
                &GET_POLICY_VERSIONS_BY_CLIENT_ID,
            )?;
            self.fetch_policy_versions_by_client_id(client_id, refresh_cache)
        })
    }
}

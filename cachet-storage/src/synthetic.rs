//! Deterministic in-process data source.
//!
//! Stands in for a database in the demo binary and in tests:
//!
//! - clients `1..=3`, client `n` named `"n name"`
//! - every client holds policies `1..=3`
//! - policy `p` has versions `3(p-1)+1 ..= 3(p-1)+3`

use cachet_core::{
    CachetResult, Client, ClientId, Policy, PolicyId, PolicyVersion, PolicyVersionId,
};

use crate::repository::{ClientSource, PolicySource, PolicyVersionSource};

/// Number of clients, policies per client and versions per policy.
pub const SYNTHETIC_FAN_OUT: i32 = 3;

/// Synthetic data for clients, policies and policy versions.
#[derive(Debug, Clone, Copy, Default)]
pub struct SyntheticSource;

impl SyntheticSource {
    pub fn new() -> Self {
        Self
    }

    fn client(client_id: ClientId) -> Client {
        Client::new(client_id, format!("{} name", client_id))
    }

    /// Versions of `policy_id`; empty when the ids would not fit in an `i32`.
    fn versions_of(policy_id: PolicyId) -> impl Iterator<Item = PolicyVersion> {
        let first = policy_id
            .checked_sub(1)
            .and_then(|n| n.checked_mul(SYNTHETIC_FAN_OUT))
            .and_then(|n| n.checked_add(1))
            .filter(|first| first.checked_add(SYNTHETIC_FAN_OUT - 1).is_some());
        first
            .into_iter()
            .flat_map(|first| first..first + SYNTHETIC_FAN_OUT)
            .map(move |id| PolicyVersion::new(id, policy_id))
    }
}

impl ClientSource for SyntheticSource {
    fn fetch_clients(&self) -> CachetResult<Vec<Client>> {
        Ok((1..=SYNTHETIC_FAN_OUT).map(Self::client).collect())
    }

    fn fetch_client(&self, client_id: ClientId) -> CachetResult<Option<Client>> {
        Ok((client_id > 0).then(|| Self::client(client_id)))
    }
}

impl PolicySource for SyntheticSource {
    fn fetch_policy(&self, policy_id: PolicyId) -> CachetResult<Option<Policy>> {
        Ok((policy_id > 0).then(|| Policy::new(policy_id)))
    }

    fn fetch_policies_by_client(&self, _client_id: ClientId) -> CachetResult<Vec<Policy>> {
        Ok((1..=SYNTHETIC_FAN_OUT).map(Policy::new).collect())
    }
}

impl PolicyVersionSource for SyntheticSource {
    fn fetch_policy_version(&self, policy_version_id: PolicyVersionId) -> CachetResult<Option<PolicyVersion>> {
        if policy_version_id <= 0 {
            return Ok(None);
        }
        let policy_id = (policy_version_id - 1) / SYNTHETIC_FAN_OUT + 1;
        Ok(Some(PolicyVersion::new(policy_version_id, policy_id)))
    }

    fn fetch_policy_versions_by_policy(&self, policy_id: PolicyId) -> CachetResult<Vec<PolicyVersion>> {
        if policy_id <= 0 {
            return Ok(Vec::new());
        }
        Ok(Self::versions_of(policy_id).collect())
    }

    fn fetch_policy_versions_by_client(&self, _client_id: ClientId) -> CachetResult<Vec<PolicyVersion>> {
        Ok((1..=SYNTHETIC_FAN_OUT).flat_map(Self::versions_of).collect())
    }
}

//! Core entity structures

use crate::IncludePath;
use serde::{Deserialize, Serialize};

/// Client identifier.
pub type ClientId = i32;

/// Policy identifier.
pub type PolicyId = i32;

/// Policy version identifier.
pub type PolicyVersionId = i32;

/// Client - top-level owner of policies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Client {
    pub client_id: ClientId,
    pub name: String,
    /// Populated only when the `policies` include path is requested.
    pub policies: Option<Vec<Policy>>,
}

impl Client {
    pub fn new(client_id: ClientId, name: impl Into<String>) -> Self {
        Self {
            client_id,
            name: name.into(),
            policies: None,
        }
    }

    /// Include path `policies`.
    pub fn include_policies() -> IncludePath<Client> {
        IncludePath::member("policies")
    }

    /// Include path `policies.policy_versions`.
    pub fn include_policy_versions() -> IncludePath<Client> {
        IncludePath::through("policies", Policy::include_policy_versions())
    }
}

/// Policy held by a client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    pub policy_id: PolicyId,
    /// Populated only when the `policy_versions` include path is requested.
    pub policy_versions: Option<Vec<PolicyVersion>>,
}

impl Policy {
    pub fn new(policy_id: PolicyId) -> Self {
        Self {
            policy_id,
            policy_versions: None,
        }
    }

    /// Include path `policy_versions`.
    pub fn include_policy_versions() -> IncludePath<Policy> {
        IncludePath::member("policy_versions")
    }
}

/// A version of a policy. Has no navigation properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PolicyVersion {
    pub policy_version_id: PolicyVersionId,
    pub policy_id: PolicyId,
}

impl PolicyVersion {
    pub fn new(policy_version_id: PolicyVersionId, policy_id: PolicyId) -> Self {
        Self {
            policy_version_id,
            policy_id,
        }
    }
}

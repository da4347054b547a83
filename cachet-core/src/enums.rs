//! Enum types

use serde::{Deserialize, Serialize};

/// Entity type discriminator, used in errors and log fields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EntityType {
    Client,
    Policy,
    PolicyVersion,
}

impl EntityType {
    /// Name of the entity type, as shown by `Display`.
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Client => "Client",
            EntityType::Policy => "Policy",
            EntityType::PolicyVersion => "PolicyVersion",
        }
    }
}

impl std::fmt::Display for EntityType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

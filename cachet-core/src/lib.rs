//! Cachet Core - Entity Types, Include Paths and Errors
//!
//! Pure data structures and pure functions. All other crates depend on this.
//! Nothing here touches a cache store or a data source.

pub mod config;
pub mod entities;
pub mod enums;
pub mod error;
pub mod path;

pub use config::{CacheConfig, ENV_CACHE_ABSOLUTE_EXPIRATION_SECS, ENV_CACHE_ENABLED};
pub use entities::{Client, ClientId, Policy, PolicyId, PolicyVersion, PolicyVersionId};
pub use enums::EntityType;
pub use error::{
    CachetError, CachetResult, ConfigError, KeyEncodingError, PathError, StorageError,
};
pub use path::{any_path_equals, IncludePath, Selector};

//! Error types for cachet operations

use crate::EntityType;
use thiserror::Error;

/// Include path errors.
///
/// Both variants are fatal to the call that raised them and propagate to the
/// external caller unchanged.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PathError {
    #[error("Invalid selector {selector}: {reason}")]
    InvalidSelector { selector: String, reason: String },

    #[error("The include path {path} is not supported by {operation}")]
    UnsupportedPath { path: String, operation: String },
}

/// Cache key encoding errors.
///
/// Repositories treat these as "caching unavailable for this call".
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum KeyEncodingError {
    #[error("Argument {position} is a non-finite float ({value}) and has no canonical encoding")]
    NonFiniteFloat { position: usize, value: String },

    #[error("Argument {position} holds an include path that cannot be resolved: {reason}")]
    UnresolvablePath { position: usize, reason: String },

    #[error("Argument serialization failed: {reason}")]
    Serialization { reason: String },
}

/// Storage layer errors, covering both data sources and cache stores.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("Data source failed for {entity_type:?}: {reason}")]
    SourceFailed { entity_type: EntityType, reason: String },

    #[error("Transaction failed: {reason}")]
    TransactionFailed { reason: String },

    #[error("Serialization failed: {reason}")]
    Serialization { reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

/// Master error type for all cachet errors.
#[derive(Debug, Clone, Error)]
pub enum CachetError {
    #[error("Path error: {0}")]
    Path(#[from] PathError),

    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

impl CachetError {
    /// Returns true if this is an `UnsupportedPath` error.
    pub fn is_unsupported_path(&self) -> bool {
        matches!(self, Self::Path(PathError::UnsupportedPath { .. }))
    }

    /// Returns true if this is an `InvalidSelector` error.
    pub fn is_invalid_selector(&self) -> bool {
        matches!(self, Self::Path(PathError::InvalidSelector { .. }))
    }
}

/// Result type alias for cachet operations.
pub type CachetResult<T> = Result<T, CachetError>;

// =============================================================================
// TESTS
// =============================================================================

//! Configuration types

use crate::{CachetError, CachetResult, ConfigError};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Environment variable toggling the cache on or off.
pub const ENV_CACHE_ENABLED: &str = "CACHET_CACHE_ENABLED";

/// Environment variable holding the absolute expiration in seconds.
pub const ENV_CACHE_ABSOLUTE_EXPIRATION_SECS: &str = "CACHET_CACHE_ABSOLUTE_EXPIRATION_SECS";

/// Repository cache configuration.
///
/// The cache store handle itself is passed separately when a repository is
/// built; a repository without a store behaves as if `enabled` were false.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Global switch. When false every read misses and every write is a no-op.
    pub enabled: bool,
    /// Lifetime of an entry, fixed at write time and never extended by reads.
    pub absolute_expiration: Duration,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            absolute_expiration: Duration::from_secs(3600), // 1 hour
        }
    }
}

impl CacheConfig {
    /// Create a new cache config with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// A config with caching switched off.
    pub fn disabled() -> Self {
        Self::default().with_enabled(false)
    }

    /// Enable or disable caching.
    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }

    /// Set the absolute expiration.
    pub fn with_absolute_expiration(mut self, duration: Duration) -> Self {
        self.absolute_expiration = duration;
        self
    }

    /// Create from environment variables with fallback to defaults.
    ///
    /// Environment variables:
    /// - `CACHET_CACHE_ENABLED`: `true`/`1` or `false`/`0` (default: true)
    /// - `CACHET_CACHE_ABSOLUTE_EXPIRATION_SECS`: entry lifetime (default: 3600)
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Same as [`CacheConfig::from_env`] with an explicit variable lookup.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        Self {
            enabled: lookup(ENV_CACHE_ENABLED)
                .and_then(|s| parse_flag(&s))
                .unwrap_or(defaults.enabled),
            absolute_expiration: lookup(ENV_CACHE_ABSOLUTE_EXPIRATION_SECS)
                .and_then(|s| s.trim().parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.absolute_expiration),
        }
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - absolute_expiration > 0 when caching is enabled
    pub fn validate(&self) -> CachetResult<()> {
        if self.enabled && self.absolute_expiration.is_zero() {
            return Err(CachetError::Config(ConfigError::InvalidValue {
                field: "absolute_expiration".to_string(),
                value: format!("{:?}", self.absolute_expiration),
                reason: "absolute_expiration must be positive".to_string(),
            }));
        }
        Ok(())
    }
}

fn parse_flag(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "true" | "1" | "yes" | "on" => Some(true),
        "false" | "0" | "no" | "off" => Some(false),
        _ => None,
    }
}

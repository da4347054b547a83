//! Outcome of a cache read.

/// Result of looking a key up in the cache.
///
/// `Hit(None)` means the stored-null sentinel was found: the operation ran
/// before and produced no value. `Miss` means nothing usable is cached, which
/// also covers a disabled cache or a missing store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheLookup<T> {
    Miss,
    Hit(Option<T>),
}

impl<T> CacheLookup<T> {
    /// Check if this was a cache hit.
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::Hit(_))
    }

    /// Check if this was a cache miss.
    pub fn is_miss(&self) -> bool {
        matches!(self, Self::Miss)
    }

}

impl<T> Default for CacheLookup<T> {
    fn default() -> Self {
        Self::Miss
    }
}

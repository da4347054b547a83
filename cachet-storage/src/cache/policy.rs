//! Expiration policy attached to every cache write.

use chrono::{DateTime, Utc};
use std::time::Duration;

/// Absolute expiration, fixed when the entry is written.
///
/// Reads never extend an entry's lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CachePolicy {
    absolute_expiration: DateTime<Utc>,
}

impl CachePolicy {
    /// Expire at the given instant.
    pub fn absolute(at: DateTime<Utc>) -> Self {
        Self {
            absolute_expiration: at,
        }
    }

    /// Expire `duration` from now. Saturates at the maximum representable time.
    pub fn expires_after(duration: Duration) -> Self {
        let at = chrono::Duration::from_std(duration)
            .ok()
            .and_then(|d| Utc::now().checked_add_signed(d))
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self::absolute(at)
    }

    /// The instant this entry stops being served.
    pub fn absolute_expiration(&self) -> DateTime<Utc> {
        self.absolute_expiration
    }

    /// True once `now` has reached the expiration instant.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.absolute_expiration
    }

    /// True if the entry has expired as of now.
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

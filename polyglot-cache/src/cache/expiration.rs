//! Expiration bookkeeping for cache entries.
//!
//! An entry's bookkeeping is replaced wholesale when it is refreshed, so
//! readers always see a consistent load time and expiration pair.

use chrono::Duration;
use polyglot_core::{MaterializeError, TimeToLive, Timestamp};

/// When an entry stops being trusted without a reload check.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Expiration {
    /// Handed out once, never stored.
    DontCache,
    /// Valid until explicitly expired or evicted.
    #[default]
    Never,
    /// Needs a reload check at or after this instant.
    At(Timestamp),
}

impl Expiration {
    /// Expiration for an entry loaded at `now` under `ttl`.
    pub fn from_ttl(ttl: TimeToLive, now: Timestamp) -> Self {
        match ttl {
            TimeToLive::DontCache => Self::DontCache,
            TimeToLive::NoExpiration => Self::Never,
            TimeToLive::Millis(ms) => {
                let ms = i64::try_from(ms).unwrap_or(i64::MAX);
                match now.checked_add_signed(Duration::milliseconds(ms)) {
                    Some(at) => Self::At(at),
                    None => Self::Never,
                }
            }
        }
    }

    /// Whether the TTL has run out as of `now`.
    pub fn is_elapsed(&self, now: Timestamp) -> bool {
        match self {
            Self::At(at) => *at <= now,
            Self::Never | Self::DontCache => false,
        }
    }

    pub fn is_cacheable(&self) -> bool {
        !matches!(self, Self::DontCache)
    }
}

/// Mutable per-entry state, swapped atomically as a unit.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Bookkeeping {
    pub load_time: Option<Timestamp>,
    pub expiration: Expiration,
    /// Format that produced the bundle; unset for tombstones.
    pub format: Option<String>,
    /// Last materializer failure recorded while producing this entry.
    pub cause: Option<MaterializeError>,
}

impl Bookkeeping {
    pub fn stamped(ttl: TimeToLive, now: Timestamp) -> Self {
        Self {
            load_time: Some(now),
            expiration: Expiration::from_ttl(ttl, now),
            format: None,
            cause: None,
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    pub fn with_cause(mut self, cause: Option<MaterializeError>) -> Self {
        self.cause = cause;
        self
    }

    /// Same entry, reloaded at `now` under a fresh TTL.
    pub fn refreshed(&self, ttl: TimeToLive, now: Timestamp) -> Self {
        Self {
            load_time: Some(now),
            expiration: Expiration::from_ttl(ttl, now),
            format: self.format.clone(),
            cause: self.cause.clone(),
        }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_expiration_from_ttl() {
        let now = Utc::now();
        assert_eq!(Expiration::from_ttl(TimeToLive::DontCache, now), Expiration::DontCache);
        assert_eq!(Expiration::from_ttl(TimeToLive::NoExpiration, now), Expiration::Never);
        assert_eq!(
            Expiration::from_ttl(TimeToLive::Millis(1_000), now),
            Expiration::At(now + Duration::milliseconds(1_000))
        );
    }

    #[test]
    fn test_zero_ttl_elapses_immediately() {
        let now = Utc::now();
        let expiration = Expiration::from_ttl(TimeToLive::Millis(0), now);
        assert!(expiration.is_elapsed(now));
    }

    #[test]
    fn test_never_and_dont_cache_do_not_elapse() {
        let later = Utc::now() + Duration::days(365);
        assert!(!Expiration::Never.is_elapsed(later));
        assert!(!Expiration::DontCache.is_elapsed(later));
        assert!(!Expiration::DontCache.is_cacheable());
    }

    #[test]
    fn test_huge_ttl_saturates_to_never() {
        let now = Utc::now();
        let expiration = Expiration::from_ttl(TimeToLive::Millis(u64::MAX), now);
        assert!(!expiration.is_elapsed(now + Duration::days(365 * 100)));
    }

    #[test]
    fn test_refresh_keeps_format_and_cause() {
        let now = Utc::now();
        let cause = MaterializeError::Other {
            reason: "flaky".to_string(),
        };
        let original = Bookkeeping::stamped(TimeToLive::Millis(10), now)
            .with_format("properties")
            .with_cause(Some(cause.clone()));
        let later = now + Duration::seconds(5);
        let refreshed = original.refreshed(TimeToLive::Millis(10), later);

        assert_eq!(refreshed.load_time, Some(later));
        assert_eq!(refreshed.format.as_deref(), Some("properties"));
        assert_eq!(refreshed.cause, Some(cause));
        assert!(!refreshed.expiration.is_elapsed(later));
    }
}

//! Cache entries.
//!
//! An entry is either a materialized bundle linked to its parent entry or
//! a tombstone recording that nothing could be materialized for its key.
//! The payload and parent link are fixed at construction. Load time,
//! expiration and the recorded cause live in a separately swappable
//! [`Bookkeeping`] record.

use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use arc_swap::ArcSwap;
use parking_lot::{Mutex, MutexGuard};
use polyglot_core::{MaterializeError, TimeToLive, Timestamp};

use super::expiration::Bookkeeping;
use super::key::CacheKey;

pub(crate) enum Payload<B> {
    Bundle {
        value: Arc<B>,
        parent: Option<Arc<CacheEntry<B>>>,
    },
    Tombstone,
}

pub(crate) struct CacheEntry<B> {
    key: CacheKey,
    payload: Payload<B>,
    bookkeeping: ArcSwap<Bookkeeping>,
    expired: AtomicBool,
    /// Serializes reload decisions for this entry.
    reload_gate: Mutex<()>,
}

impl<B> CacheEntry<B> {
    pub(crate) fn bundle(
        key: CacheKey,
        value: Arc<B>,
        parent: Option<Arc<CacheEntry<B>>>,
        bookkeeping: Bookkeeping,
    ) -> Arc<Self> {
        Arc::new(Self::with_payload(
            key,
            Payload::Bundle { value, parent },
            bookkeeping,
        ))
    }

    pub(crate) fn tombstone(key: CacheKey, bookkeeping: Bookkeeping) -> Arc<Self> {
        Arc::new(Self::with_payload(key, Payload::Tombstone, bookkeeping))
    }

    fn with_payload(key: CacheKey, payload: Payload<B>, bookkeeping: Bookkeeping) -> Self {
        Self {
            key,
            payload,
            bookkeeping: ArcSwap::from_pointee(bookkeeping),
            expired: AtomicBool::new(false),
            reload_gate: Mutex::new(()),
        }
    }

    pub(crate) fn key(&self) -> &CacheKey {
        &self.key
    }

    pub(crate) fn value(&self) -> Option<&Arc<B>> {
        match &self.payload {
            Payload::Bundle { value, .. } => Some(value),
            Payload::Tombstone => None,
        }
    }

    pub(crate) fn parent(&self) -> Option<&Arc<CacheEntry<B>>> {
        match &self.payload {
            Payload::Bundle { parent, .. } => parent.as_ref(),
            Payload::Tombstone => None,
        }
    }

    pub(crate) fn is_tombstone(&self) -> bool {
        matches!(self.payload, Payload::Tombstone)
    }

    /// Whether this entry's parent link points at exactly `parent`.
    pub(crate) fn has_parent(&self, parent: Option<&Arc<CacheEntry<B>>>) -> bool {
        match (self.parent(), parent) {
            (None, None) => true,
            (Some(mine), Some(theirs)) => Arc::ptr_eq(mine, theirs),
            _ => false,
        }
    }

    pub(crate) fn bookkeeping(&self) -> Arc<Bookkeeping> {
        self.bookkeeping.load_full()
    }

    pub(crate) fn load_time(&self) -> Option<Timestamp> {
        self.bookkeeping.load().load_time
    }

    pub(crate) fn format(&self) -> Option<String> {
        self.bookkeeping.load().format.clone()
    }

    pub(crate) fn cause(&self) -> Option<MaterializeError> {
        self.bookkeeping.load().cause.clone()
    }

    /// Flag the entry as expired. Sticky for the entry's lifetime.
    pub(crate) fn mark_expired(&self) {
        self.expired.store(true, Ordering::Release);
    }

    pub(crate) fn is_expired(&self) -> bool {
        self.expired.load(Ordering::Acquire)
    }

    /// Whether the entry's TTL has run out as of `now`.
    pub(crate) fn is_elapsed(&self, now: Timestamp) -> bool {
        self.bookkeeping.load().expiration.is_elapsed(now)
    }

    /// Usable as-is: not flagged and not past its TTL.
    pub(crate) fn is_valid_at(&self, now: Timestamp) -> bool {
        !self.is_expired() && !self.is_elapsed(now)
    }

    /// Every entry from this one up to the root is valid at `now`.
    pub(crate) fn has_valid_chain(&self, now: Timestamp) -> bool {
        let mut current = Some(self);
        while let Some(entry) = current {
            if !entry.is_valid_at(now) {
                return false;
            }
            current = entry.parent().map(Arc::as_ref);
        }
        true
    }

    /// Restart the TTL after a reload check decided to keep the entry.
    pub(crate) fn refresh(&self, ttl: TimeToLive, now: Timestamp) {
        let next = self.bookkeeping.load().refreshed(ttl, now);
        self.bookkeeping.store(Arc::new(next));
    }

    pub(crate) fn reload_gate(&self) -> MutexGuard<'_, ()> {
        self.reload_gate.lock()
    }
}

impl<B> fmt::Debug for CacheEntry<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheEntry")
            .field("key", &self.key)
            .field("tombstone", &self.is_tombstone())
            .field("parent", &self.parent().map(|p| p.key().locale().to_tag()))
            .field("expired", &self.is_expired())
            .field("bookkeeping", &*self.bookkeeping.load())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================

//! Bundle cache layer.
//!
//! Bindings are keyed by [`CacheKey`] (name, locale, weakly held owner) and
//! map to entries that are either a materialized bundle linked to its
//! parent or a tombstone. Tombstones make repeated misses cheap and obey
//! the same expiration rules as real bundles.
//!
//! Expiration is explicit: each entry carries a load time and an
//! [`Expiration`], plus a sticky expired flag. A bundle is only handed out
//! from the fast path when every entry in its parent chain is still valid.

pub mod expiration;
pub mod key;
pub mod store;

pub(crate) mod entry;

pub use expiration::{Bookkeeping, Expiration};
pub use key::CacheKey;
pub use store::{CacheStats, CacheStore};

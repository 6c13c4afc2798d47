//! Owner scopes.
//!
//! An [`OwnerScope`] partitions the cache the way a loader or plugin
//! boundary would: the same bundle name resolved under two owners yields
//! two independent cache entries. Cache keys only hold a [`WeakOwner`], so
//! caching never extends an owner's lifetime.
//!
//! When the last [`OwnerScope`] handle is dropped, every store that has
//! seen the owner receives a death notification and purges the owner's
//! entries on its next reclamation sweep.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Weak};

use crossbeam_channel::Sender;
use parking_lot::Mutex;
use uuid::Uuid;

/// Stable identity of an owner scope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OwnerId(Uuid);

impl OwnerId {
    pub fn as_uuid(&self) -> Uuid {
        self.0
    }
}

impl fmt::Display for OwnerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of a store subscribed to owner death notifications.
pub(crate) type StoreId = Uuid;

struct OwnerInner {
    id: OwnerId,
    label: String,
    watchers: Mutex<HashMap<StoreId, Sender<OwnerId>>>,
}

impl Drop for OwnerInner {
    fn drop(&mut self) {
        for (_, watcher) in self.watchers.get_mut().drain() {
            // A store that has already been dropped has nothing to purge.
            let _ = watcher.send(self.id);
        }
    }
}

/// Strong handle to an owner scope. Cloning shares the same scope.
#[derive(Clone)]
pub struct OwnerScope {
    inner: Arc<OwnerInner>,
}

impl OwnerScope {
    /// Create a new owner scope with a diagnostic label.
    pub fn new(label: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(OwnerInner {
                id: OwnerId(Uuid::now_v7()),
                label: label.into(),
                watchers: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn id(&self) -> OwnerId {
        self.inner.id
    }

    pub fn label(&self) -> &str {
        &self.inner.label
    }

    /// Non-owning handle for use in cache keys.
    pub fn downgrade(&self) -> WeakOwner {
        WeakOwner {
            id: self.inner.id,
            handle: Arc::downgrade(&self.inner),
        }
    }

    /// Register a store's notification channel; idempotent per store.
    pub(crate) fn watch(&self, store: StoreId, sender: &Sender<OwnerId>) {
        self.inner
            .watchers
            .lock()
            .entry(store)
            .or_insert_with(|| sender.clone());
    }

    /// Remove a store's notification channel.
    pub(crate) fn unwatch(&self, store: StoreId) {
        self.inner.watchers.lock().remove(&store);
    }

    #[cfg(test)]
    pub(crate) fn watcher_count(&self) -> usize {
        self.inner.watchers.lock().len()
    }
}

impl PartialEq for OwnerScope {
    fn eq(&self, other: &Self) -> bool {
        self.inner.id == other.inner.id
    }
}

impl Eq for OwnerScope {}

impl fmt::Debug for OwnerScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OwnerScope")
            .field("id", &self.inner.id)
            .field("label", &self.inner.label)
            .finish()
    }
}

/// Non-owning owner handle stored in cache keys.
///
/// Equality and hashing use the owner id, so a key's identity does not
/// change when its owner is dropped.
#[derive(Clone)]
pub struct WeakOwner {
    id: OwnerId,
    handle: Weak<OwnerInner>,
}

impl WeakOwner {
    pub fn id(&self) -> OwnerId {
        self.id
    }

    /// Whether the owner scope still has a live handle.
    pub fn is_alive(&self) -> bool {
        self.handle.strong_count() > 0
    }

    pub fn upgrade(&self) -> Option<OwnerScope> {
        self.handle.upgrade().map(|inner| OwnerScope { inner })
    }
}

impl fmt::Debug for WeakOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WeakOwner")
            .field("id", &self.id)
            .field("alive", &self.is_alive())
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================

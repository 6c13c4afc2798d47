//! Cache keys.
//!
//! A binding is identified by bundle name, locale and owner scope. The
//! owner is held weakly so a cached binding never keeps its owner alive.

use std::fmt;
use std::hash::{Hash, Hasher};
use std::sync::Arc;

use polyglot_core::Locale;

use crate::owner::{OwnerId, OwnerScope, WeakOwner};

/// Immutable identity of a cache binding.
#[derive(Clone)]
pub struct CacheKey {
    name: Arc<str>,
    locale: Locale,
    owner: Option<WeakOwner>,
}

impl CacheKey {
    pub fn new(name: &str, locale: Locale, owner: Option<&OwnerScope>) -> Self {
        Self {
            name: Arc::from(name),
            locale,
            owner: owner.map(OwnerScope::downgrade),
        }
    }

    /// Same name and owner, different locale.
    pub fn with_locale(&self, locale: Locale) -> Self {
        Self {
            name: Arc::clone(&self.name),
            locale,
            owner: self.owner.clone(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn locale(&self) -> &Locale {
        &self.locale
    }

    pub fn owner_id(&self) -> Option<OwnerId> {
        self.owner.as_ref().map(WeakOwner::id)
    }

    pub fn owner(&self) -> Option<OwnerScope> {
        self.owner.as_ref().and_then(WeakOwner::upgrade)
    }

    /// True when the key was scoped to an owner that has since been dropped.
    pub fn is_orphaned(&self) -> bool {
        self.owner.as_ref().is_some_and(|owner| !owner.is_alive())
    }
}

impl PartialEq for CacheKey {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.locale == other.locale
            && self.owner_id() == other.owner_id()
    }
}

impl Eq for CacheKey {}

impl Hash for CacheKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.name.hash(state);
        self.locale.hash(state);
        self.owner_id().hash(state);
    }
}

impl fmt::Debug for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CacheKey")
            .field("name", &&*self.name)
            .field("locale", &self.locale.to_tag())
            .field("owner", &self.owner_id())
            .finish()
    }
}

//! Resolved bundle handles.

use std::fmt;
use std::iter;
use std::ops::Deref;
use std::sync::Arc;

use chrono::Utc;
use polyglot_core::{Locale, Timestamp};

use crate::cache::entry::CacheEntry;

/// A resolved bundle together with its parent chain.
///
/// Cloning is cheap and yields a handle to the same instance. Two handles
/// refer to the same cached bundle exactly when [`Bundle::ptr_eq`] holds.
pub struct Bundle<B> {
    entry: Arc<CacheEntry<B>>,
    value: Arc<B>,
}

impl<B> Bundle<B> {
    /// `None` for tombstones.
    pub(crate) fn from_entry(entry: Arc<CacheEntry<B>>) -> Option<Self> {
        let value = Arc::clone(entry.value()?);
        Some(Self { entry, value })
    }

    pub(crate) fn entry(&self) -> &Arc<CacheEntry<B>> {
        &self.entry
    }

    pub fn value(&self) -> &B {
        &self.value
    }

    pub fn shared_value(&self) -> Arc<B> {
        Arc::clone(&self.value)
    }

    pub fn name(&self) -> &str {
        self.entry.key().name()
    }

    /// The candidate locale this bundle was materialized for. May be less
    /// specific than the locale that was requested.
    pub fn locale(&self) -> &Locale {
        self.entry.key().locale()
    }

    /// Format that produced the bundle.
    pub fn format(&self) -> Option<String> {
        self.entry.format()
    }

    pub fn load_time(&self) -> Option<Timestamp> {
        self.entry.load_time()
    }

    pub fn parent(&self) -> Option<Bundle<B>> {
        self.entry
            .parent()
            .and_then(|parent| Bundle::from_entry(Arc::clone(parent)))
    }

    /// This bundle followed by each ancestor, ending at the base bundle.
    pub fn chain(&self) -> impl Iterator<Item = Bundle<B>> {
        iter::successors(Some(self.clone()), Bundle::parent)
    }

    /// First `Some` produced by `find` walking from this bundle to the root.
    pub fn lookup<T>(&self, mut find: impl FnMut(&B) -> Option<T>) -> Option<T> {
        self.chain().find_map(|bundle| find(bundle.value()))
    }

    pub fn ptr_eq(&self, other: &Self) -> bool {
        Arc::ptr_eq(&self.entry, &other.entry)
    }

    /// Whether this bundle was flagged for reload.
    pub fn is_expired(&self) -> bool {
        self.entry.is_expired()
    }

    /// Whether this bundle and all its ancestors are still valid.
    pub fn has_valid_chain(&self) -> bool {
        self.entry.has_valid_chain(Utc::now())
    }
}

impl<B> Clone for Bundle<B> {
    fn clone(&self) -> Self {
        Self {
            entry: Arc::clone(&self.entry),
            value: Arc::clone(&self.value),
        }
    }
}

impl<B> Deref for Bundle<B> {
    type Target = B;

    fn deref(&self) -> &B {
        &self.value
    }
}

impl<B: fmt::Debug> fmt::Debug for Bundle<B> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Bundle")
            .field("name", &self.name())
            .field("locale", &self.locale().to_tag())
            .field("value", &self.value)
            .field(
                "parent",
                &self.entry.parent().map(|p| p.key().locale().to_tag()),
            )
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::{Bookkeeping, CacheKey};
    use polyglot_core::TimeToLive;
    use std::collections::HashMap;

    type Table = HashMap<&'static str, &'static str>;

    fn entry(tag: &str, table: Table, parent: Option<&Bundle<Table>>) -> Bundle<Table> {
        let entry = CacheEntry::bundle(
            CacheKey::new("Messages", Locale::parse(tag).unwrap(), None),
            Arc::new(table),
            parent.map(|p| Arc::clone(p.entry())),
            Bookkeeping::stamped(TimeToLive::NoExpiration, Utc::now()).with_format("properties"),
        );
        Bundle::from_entry(entry).unwrap()
    }

    #[test]
    fn test_chain_and_lookup() {
        let root = entry("und", HashMap::from([("greeting", "Hello"), ("bye", "Bye")]), None);
        let fr = entry("fr", HashMap::from([("greeting", "Bonjour")]), Some(&root));
        let fr_ch = entry("fr-CH", HashMap::from([("greeting", "Grüezi")]), Some(&fr));

        let locales: Vec<String> = fr_ch.chain().map(|b| b.locale().to_tag()).collect();
        assert_eq!(locales, vec!["fr-CH", "fr", "und"]);

        assert_eq!(fr_ch.lookup(|t| t.get("greeting").copied()), Some("Grüezi"));
        assert_eq!(fr_ch.lookup(|t| t.get("bye").copied()), Some("Bye"));
        assert_eq!(fr_ch.lookup(|t| t.get("missing").copied()), None);
    }

    #[test]
    fn test_parent_is_same_instance() {
        let root = entry("und", HashMap::new(), None);
        let fr = entry("fr", HashMap::new(), Some(&root));
        let parent = fr.parent().unwrap();
        assert!(parent.ptr_eq(&root));
        assert!(!parent.ptr_eq(&fr));
        assert!(root.parent().is_none());
    }

    #[test]
    fn test_metadata_accessors() {
        let root = entry("und", HashMap::new(), None);
        assert_eq!(root.name(), "Messages");
        assert!(root.locale().is_root());
        assert_eq!(root.format().as_deref(), Some("properties"));
        assert!(root.load_time().is_some());
        assert!(root.has_valid_chain());
        assert!(!root.is_expired());
    }

    #[test]
    fn test_tombstone_is_not_a_bundle() {
        let tombstone: Arc<CacheEntry<Table>> = CacheEntry::tombstone(
            CacheKey::new("Messages", Locale::root(), None),
            Bookkeeping::default(),
        );
        assert!(Bundle::from_entry(tombstone).is_none());
    }
}

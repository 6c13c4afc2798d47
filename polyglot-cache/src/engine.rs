//! Bundle resolution engine.
//!
//! [`BundleResolver::get_bundle`] maps a bundle name, a requested locale and
//! an optional owner scope to a [`Bundle`] whose parent chain follows the
//! control's candidate locales.
//!
//! # Fast path
//!
//! If the store holds a bundle for the exact key and every entry in its
//! parent chain is still valid, it is returned without consulting the
//! control.
//!
//! # Slow path
//!
//! For the requested locale, then for each fallback locale the control
//! supplies, the chain is built bottom-up: the root-most candidate is
//! resolved first and becomes the parent of the next. Each candidate is
//! looked up in the store, re-checked if its TTL ran out, and materialized
//! format by format when missing. Candidates with nothing to offer are
//! recorded as tombstones and pass their parent through.
//!
//! A result that is only the root bundle is held back while fallback
//! locales remain, so a more specific bundle under the default locale can
//! win. When the fallback sequence is exhausted the held root bundle is
//! returned, or [`ResolveError::BundleNotFound`] if there was none.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::Utc;
use polyglot_core::{Locale, MaterializeError, ResolveError, ResolverConfig};

use crate::bundle::Bundle;
use crate::cache::entry::CacheEntry;
use crate::cache::store::Counter;
use crate::cache::{Bookkeeping, CacheKey, CacheStats, CacheStore};
use crate::control::Control;
use crate::owner::{OwnerId, OwnerScope};

/// Resolves bundles through a shared [`CacheStore`].
///
/// Cloning shares the store.
pub struct BundleResolver<B> {
    store: Arc<CacheStore<B>>,
}

/// State threaded through one slow-path resolution.
struct Resolution<'a> {
    name: &'a str,
    owner: Option<&'a OwnerScope>,
    /// Most informative materializer failure seen so far.
    cause: Option<MaterializeError>,
}

impl Resolution<'_> {
    fn key(&self, locale: &Locale) -> CacheKey {
        CacheKey::new(self.name, locale.clone(), self.owner)
    }
}

/// Outcome of consulting the store for one candidate.
enum Lookup<B> {
    Miss,
    Tombstone(Arc<CacheEntry<B>>),
    Cached(Arc<CacheEntry<B>>),
    /// A cached bundle was found stale and must be re-materialized.
    Expired,
}

/// Keep the more specific of two failures.
///
/// A generic "nothing there" error never displaces a failure that says
/// why something could not be loaded.
fn record_cause(slot: &mut Option<MaterializeError>, cause: MaterializeError) {
    let keep_previous =
        cause.is_absent() && slot.as_ref().is_some_and(|prev| !prev.is_absent());
    if !keep_previous {
        *slot = Some(cause);
    }
}

impl<B> BundleResolver<B> {
    /// Create a resolver with its own unbounded store.
    pub fn new() -> Self {
        Self::with_store(Arc::new(CacheStore::new()))
    }

    pub fn with_store(store: Arc<CacheStore<B>>) -> Self {
        Self { store }
    }

    /// Create a resolver whose store honors `config.max_entries`.
    pub fn from_config(config: &ResolverConfig) -> Self {
        let store = match config.max_entries {
            Some(capacity) => CacheStore::with_capacity(capacity),
            None => CacheStore::new(),
        };
        Self::with_store(Arc::new(store))
    }

    pub fn store(&self) -> &Arc<CacheStore<B>> {
        &self.store
    }

    /// Resolve `name` for `locale` under `owner`.
    ///
    /// # Errors
    ///
    /// - [`ResolveError::InvalidControl`] if the control returns no formats
    ///   or no candidate locales.
    /// - [`ResolveError::BundleNotFound`] if no candidate of the requested
    ///   or any fallback locale produced a bundle.
    pub fn get_bundle<C>(
        &self,
        name: &str,
        locale: &Locale,
        owner: Option<&OwnerScope>,
        control: &C,
    ) -> Result<Bundle<B>, ResolveError>
    where
        C: Control<B> + ?Sized,
    {
        let key = CacheKey::new(name, locale.clone(), owner);
        if let Some(entry) = self.store.get(&key) {
            if entry.has_valid_chain(Utc::now()) {
                if let Some(bundle) = Bundle::from_entry(entry) {
                    self.store.record(Counter::Hit);
                    tracing::trace!(name, locale = %locale, "Bundle served from cache");
                    return Ok(bundle);
                }
            }
        }
        self.store.record(Counter::Miss);

        self.store.reclaim_dead_owners();
        if let Some(owner) = owner {
            self.store.watch_owner(owner);
        }

        let mut ctx = Resolution {
            name,
            owner,
            cause: None,
        };
        let mut target = locale.clone();
        let mut base: Option<Bundle<B>> = None;
        let mut visited = HashSet::new();

        loop {
            let formats = control.formats(name);
            if formats.is_empty() {
                return Err(ResolveError::invalid_control(format!(
                    "no formats for bundle {name}"
                )));
            }
            let candidates = control.candidate_locales(name, &target);
            if candidates.is_empty() {
                return Err(ResolveError::invalid_control(format!(
                    "no candidate locales for bundle {name}, locale {target}"
                )));
            }
            visited.insert(target.clone());

            let found = self
                .find_bundle(&mut ctx, &candidates, &formats, base.as_ref(), control)
                .and_then(Bundle::from_entry);

            if let Some(bundle) = found {
                let is_base = bundle.locale().is_root();
                let only_candidate = candidates.len() == 1 && candidates[0] == *bundle.locale();
                if !is_base || bundle.locale() == locale || only_candidate {
                    return Ok(bundle);
                }
                if base.is_none() {
                    base = Some(bundle);
                }
            }

            match control.fallback_locale(name, &target) {
                Some(next) if visited.contains(&next) => {
                    tracing::warn!(
                        name,
                        locale = %locale,
                        fallback = %next,
                        "Fallback locale already searched, stopping"
                    );
                    break;
                }
                Some(next) => {
                    tracing::debug!(name, from = %target, to = %next, "Trying fallback locale");
                    target = next;
                }
                None => break,
            }
        }

        match base {
            Some(bundle) => Ok(bundle),
            None => Err(ResolveError::not_found(name, locale.clone(), ctx.cause)),
        }
    }

    /// Build the chain for `candidates`, root-most first, and return the
    /// entry standing for the most specific candidate.
    fn find_bundle<C>(
        &self,
        ctx: &mut Resolution<'_>,
        candidates: &[Locale],
        formats: &[String],
        base: Option<&Bundle<B>>,
        control: &C,
    ) -> Option<Arc<CacheEntry<B>>>
    where
        C: Control<B> + ?Sized,
    {
        let last = candidates.len().saturating_sub(1);
        let mut parent: Option<Arc<CacheEntry<B>>> = None;

        for (index, candidate) in candidates.iter().enumerate().rev() {
            if index == last && candidate.is_root() {
                if let Some(base) = base {
                    parent = Some(Arc::clone(base.entry()));
                    continue;
                }
            }
            parent = self.resolve_candidate(ctx, candidate, parent, formats, control);
        }
        parent
    }

    fn resolve_candidate<C>(
        &self,
        ctx: &mut Resolution<'_>,
        candidate: &Locale,
        parent: Option<Arc<CacheEntry<B>>>,
        formats: &[String],
        control: &C,
    ) -> Option<Arc<CacheEntry<B>>>
    where
        C: Control<B> + ?Sized,
    {
        let key = ctx.key(candidate);
        let mut reload = false;

        match self.lookup(ctx, &key, control) {
            Lookup::Tombstone(tombstone) => {
                if let Some(cause) = tombstone.cause() {
                    record_cause(&mut ctx.cause, cause);
                }
                return parent;
            }
            Lookup::Cached(entry) => {
                if entry.has_parent(parent.as_ref()) {
                    return Some(entry);
                }
                // A binding can only have one parent.
                tracing::debug!(
                    name = ctx.name,
                    locale = %candidate,
                    "Cached bundle has a different parent, rebinding"
                );
                self.store.remove_if_same(&entry);
            }
            Lookup::Expired => reload = true,
            Lookup::Miss => {}
        }

        match self.materialize(ctx, key, parent.as_ref(), formats, reload, control) {
            Some(entry) => Some(entry),
            None => parent,
        }
    }

    /// Consult the store for `key`, applying expiration rules.
    fn lookup<C>(&self, ctx: &mut Resolution<'_>, key: &CacheKey, control: &C) -> Lookup<B>
    where
        C: Control<B> + ?Sized,
    {
        let Some(entry) = self.store.get(key) else {
            return Lookup::Miss;
        };

        // Expiration propagates one level per lookup, from parent to child.
        if entry.parent().is_some_and(|parent| parent.is_expired()) {
            entry.mark_expired();
            self.store.remove_if_same(&entry);
            return Lookup::Miss;
        }

        if !entry.is_expired() && entry.is_elapsed(Utc::now()) {
            if entry.is_tombstone() {
                self.store.remove_if_same(&entry);
                return Lookup::Miss;
            }
            self.recheck(ctx, &entry, control);
        }

        if entry.is_tombstone() {
            Lookup::Tombstone(entry)
        } else if entry.is_expired() {
            Lookup::Expired
        } else {
            Lookup::Cached(entry)
        }
    }

    /// Decide whether an elapsed bundle is reloaded or kept. One decision
    /// per entry at a time.
    fn recheck<C>(&self, ctx: &mut Resolution<'_>, entry: &Arc<CacheEntry<B>>, control: &C)
    where
        C: Control<B> + ?Sized,
    {
        let _gate = entry.reload_gate();
        if entry.is_expired() || !entry.is_elapsed(Utc::now()) {
            return;
        }
        let Some(value) = entry.value() else {
            return;
        };

        let key = entry.key();
        let bookkeeping = entry.bookkeeping();
        let reload = key.is_orphaned()
            || match control.needs_reload(
                key.name(),
                key.locale(),
                bookkeeping.format.as_deref().unwrap_or_default(),
                ctx.owner,
                value,
                bookkeeping.load_time,
            ) {
                Ok(reload) => reload,
                Err(err) => {
                    tracing::debug!(
                        name = key.name(),
                        locale = %key.locale(),
                        error = %err,
                        "Reload check failed, keeping cached bundle"
                    );
                    record_cause(&mut ctx.cause, err);
                    false
                }
            };

        if reload {
            entry.mark_expired();
            self.store.remove_if_same(entry);
            self.store.record(Counter::Reload);
            tracing::debug!(name = key.name(), locale = %key.locale(), "Bundle needs reload");
        } else {
            entry.refresh(control.time_to_live(key.name(), key.locale()), Utc::now());
            tracing::trace!(name = key.name(), locale = %key.locale(), "Bundle still current");
        }
    }

    /// Try each format in order. Stores the result, or a tombstone when
    /// every format came up empty, and returns the bundle entry if any.
    fn materialize<C>(
        &self,
        ctx: &mut Resolution<'_>,
        key: CacheKey,
        parent: Option<&Arc<CacheEntry<B>>>,
        formats: &[String],
        reload: bool,
        control: &C,
    ) -> Option<Arc<CacheEntry<B>>>
    where
        C: Control<B> + ?Sized,
    {
        let name = ctx.name;
        let locale = key.locale().clone();
        let mut candidate_cause = None;

        for format in formats {
            match control.new_bundle(name, &locale, format, ctx.owner, reload) {
                Ok(Some(value)) => {
                    let now = Utc::now();
                    let ttl = control.time_to_live(name, &locale);
                    let bookkeeping = Bookkeeping::stamped(ttl, now)
                        .with_format(format.as_str())
                        .with_cause(candidate_cause);
                    let entry =
                        CacheEntry::bundle(key, Arc::new(value), parent.cloned(), bookkeeping);
                    self.store.record(Counter::Materialization);
                    tracing::debug!(
                        name,
                        locale = %locale,
                        format = %format,
                        reload,
                        "Materialized bundle"
                    );

                    if !ttl.is_cacheable() {
                        return Some(entry);
                    }
                    return Some(self.store.put_if_absent(entry, now));
                }
                Ok(None) => {}
                Err(err) => {
                    tracing::debug!(
                        name,
                        locale = %locale,
                        format = %format,
                        error = %err,
                        "Materializer failed"
                    );
                    record_cause(&mut candidate_cause, err.clone());
                    record_cause(&mut ctx.cause, err);
                }
            }
        }

        let now = Utc::now();
        let ttl = control.time_to_live(name, &locale);
        if !ttl.is_cacheable() {
            return None;
        }
        let bookkeeping = Bookkeeping::stamped(ttl, now).with_cause(candidate_cause);
        let tombstone = CacheEntry::tombstone(key, bookkeeping);
        self.store.record(Counter::Tombstone);
        tracing::debug!(name, locale = %locale, "No bundle in any format, caching tombstone");

        let installed = self.store.put_if_absent(tombstone, now);
        // A concurrent resolution may have materialized the bundle first.
        (!installed.is_tombstone()).then_some(installed)
    }

    /// Drop every binding scoped to `owner`, or every unscoped binding when
    /// `owner` is `None`. Returns the number removed.
    pub fn clear_cache(&self, owner: Option<&OwnerScope>) -> usize {
        self.store.clear_owner(owner.map(OwnerScope::id))
    }

    /// Drop every binding scoped to the owner with this id.
    pub fn release_owner(&self, owner: OwnerId) -> usize {
        self.store.clear_owner(Some(owner))
    }

    pub fn clear_all(&self) {
        self.store.clear();
    }

    /// Purge bindings of owners that have been dropped.
    pub fn reclaim(&self) -> usize {
        self.store.reclaim_dead_owners()
    }

    pub fn stats(&self) -> CacheStats {
        self.store.stats()
    }
}

impl<B> Clone for BundleResolver<B> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
        }
    }
}

impl<B> Default for BundleResolver<B> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B> std::fmt::Debug for BundleResolver<B> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BundleResolver")
            .field("store", &self.store)
            .finish()
    }
}

// =============================================================================
// TESTS
// =============================================================================

//! Polyglot Test Utilities
//!
//! Shared test infrastructure for the polyglot workspace:
//! - An in-memory materializer with failure injection and call counters
//! - A scripted control for driving edge cases through the resolver
//! - Proptest generators for locales and TTLs
//! - Fixtures, assertions and a tracing bootstrap for tests

use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use parking_lot::{Mutex, RwLock};

// Re-export the types tests reach for most
pub use polyglot_cache::{
    to_bundle_name, to_resource_name, format_suffix, Bundle, BundleResolver, CacheStats, Control,
    DefaultControl, MaterializeRequest, Materializer, OwnerScope,
};
pub use polyglot_core::{
    Locale, MaterializeError, ResolveError, ResolverConfig, TimeToLive, Timestamp,
    FORMAT_COMPILED, FORMAT_PROPERTIES,
};

// ============================================================================
// TRACING
// ============================================================================

/// Install a test-friendly tracing subscriber once per process.
///
/// Honors `RUST_LOG`; defaults to warnings only.
pub fn init_tracing() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

// ============================================================================
// MOCK MATERIALIZER
// ============================================================================

/// Bundle value produced by [`MapMaterializer`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestBundle {
    pub name: String,
    pub locale: Locale,
    pub format: String,
    pub entries: BTreeMap<String, String>,
    /// Process-unique materialization counter; differs on every load.
    pub generation: u64,
}

impl TestBundle {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }
}

#[derive(Debug, Clone)]
struct Stored {
    format: String,
    entries: BTreeMap<String, String>,
}

type BundleId = (String, Locale);

/// In-memory materializer keyed by (bundle name, locale).
///
/// Each stored bundle answers for exactly one format; other formats see
/// nothing. Failures can be injected per key and take precedence over
/// stored bundles.
#[derive(Debug, Default)]
pub struct MapMaterializer {
    bundles: RwLock<HashMap<BundleId, Stored>>,
    failures: RwLock<HashMap<BundleId, MaterializeError>>,
    modified: RwLock<HashMap<String, Timestamp>>,
    requested: Mutex<Vec<String>>,
    calls: AtomicUsize,
    reloads: AtomicUsize,
    generation: AtomicU64,
}

impl MapMaterializer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder: add a properties-format bundle.
    pub fn with_bundle(self, name: &str, tag: &str, entries: &[(&str, &str)]) -> Self {
        self.insert(name, &fixtures::locale(tag), FORMAT_PROPERTIES, entries);
        self
    }

    /// Builder: add a bundle answering only for `format`.
    pub fn with_bundle_in(
        self,
        name: &str,
        tag: &str,
        format: &str,
        entries: &[(&str, &str)],
    ) -> Self {
        self.insert(name, &fixtures::locale(tag), format, entries);
        self
    }

    pub fn insert(&self, name: &str, locale: &Locale, format: &str, entries: &[(&str, &str)]) {
        let entries = entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        self.bundles.write().insert(
            (name.to_string(), locale.clone()),
            Stored {
                format: format.to_string(),
                entries,
            },
        );
    }

    pub fn remove(&self, name: &str, locale: &Locale) {
        self.bundles
            .write()
            .remove(&(name.to_string(), locale.clone()));
    }

    /// Make every load of (name, locale) fail with `err`.
    pub fn fail(&self, name: &str, locale: &Locale, err: MaterializeError) {
        self.failures
            .write()
            .insert((name.to_string(), locale.clone()), err);
    }

    pub fn clear_failures(&self) {
        self.failures.write().clear();
    }

    /// Record a modification time for a resource name.
    pub fn touch(&self, resource_name: &str, at: Timestamp) {
        self.modified.write().insert(resource_name.to_string(), at);
    }

    /// Number of materialize calls so far.
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    /// Number of materialize calls made with the reload flag set.
    pub fn reload_calls(&self) -> usize {
        self.reloads.load(Ordering::SeqCst)
    }

    /// Resource names requested so far, in call order.
    pub fn requested(&self) -> Vec<String> {
        self.requested.lock().clone()
    }

    pub fn reset_counters(&self) {
        self.calls.store(0, Ordering::SeqCst);
        self.reloads.store(0, Ordering::SeqCst);
        self.requested.lock().clear();
    }
}

impl Materializer<TestBundle> for MapMaterializer {
    fn materialize(
        &self,
        request: &MaterializeRequest<'_>,
    ) -> Result<Option<TestBundle>, MaterializeError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if request.reload {
            self.reloads.fetch_add(1, Ordering::SeqCst);
        }
        self.requested.lock().push(request.resource_name.to_string());

        let id = (request.name.to_string(), request.locale.clone());
        if let Some(err) = self.failures.read().get(&id) {
            return Err(err.clone());
        }

        let bundles = self.bundles.read();
        let Some(stored) = bundles.get(&id).filter(|s| s.format == request.format) else {
            return Ok(None);
        };
        Ok(Some(TestBundle {
            name: request.name.to_string(),
            locale: request.locale.clone(),
            format: stored.format.clone(),
            entries: stored.entries.clone(),
            generation: self.generation.fetch_add(1, Ordering::SeqCst) + 1,
        }))
    }

    fn last_modified(
        &self,
        resource_name: &str,
        _owner: Option<&OwnerScope>,
    ) -> Option<Timestamp> {
        self.modified.read().get(resource_name).copied()
    }
}

// ============================================================================
// SCRIPTED CONTROL
// ============================================================================

/// Outcome a [`ScriptedControl`] reports from its reload check.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ReloadDecision {
    #[default]
    Keep,
    Reload,
    Fail(MaterializeError),
}

/// A control whose every policy answer is set up front.
///
/// Bundles come from a shared [`MapMaterializer`] so tests can inspect
/// call counts while the control is borrowed by a resolver.
#[derive(Debug)]
pub struct ScriptedControl {
    materializer: Arc<MapMaterializer>,
    formats: Vec<String>,
    candidates: Option<Vec<Locale>>,
    fallbacks: HashMap<Locale, Locale>,
    ttl: TimeToLive,
    reload: ReloadDecision,
    reload_checks: AtomicUsize,
}

impl ScriptedControl {
    pub fn new(materializer: Arc<MapMaterializer>) -> Self {
        Self {
            materializer,
            formats: vec![FORMAT_COMPILED.to_string(), FORMAT_PROPERTIES.to_string()],
            candidates: None,
            fallbacks: HashMap::new(),
            ttl: TimeToLive::NoExpiration,
            reload: ReloadDecision::Keep,
            reload_checks: AtomicUsize::new(0),
        }
    }

    pub fn with_formats(mut self, formats: &[&str]) -> Self {
        self.formats = formats.iter().map(|f| f.to_string()).collect();
        self
    }

    /// Use a fixed candidate list for every locale instead of the default.
    pub fn with_candidates(mut self, candidates: Vec<Locale>) -> Self {
        self.candidates = Some(candidates);
        self
    }

    /// Fall back from `from` to `to`.
    pub fn with_fallback(mut self, from: &str, to: &str) -> Self {
        self.fallbacks
            .insert(fixtures::locale(from), fixtures::locale(to));
        self
    }

    pub fn with_ttl(mut self, ttl: TimeToLive) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_reload(mut self, decision: ReloadDecision) -> Self {
        self.reload = decision;
        self
    }

    pub fn materializer(&self) -> &MapMaterializer {
        &self.materializer
    }

    /// Number of reload checks the resolver asked for.
    pub fn reload_checks(&self) -> usize {
        self.reload_checks.load(Ordering::SeqCst)
    }
}

impl Control<TestBundle> for ScriptedControl {
    fn formats(&self, _name: &str) -> Vec<String> {
        self.formats.clone()
    }

    fn candidate_locales(&self, _name: &str, locale: &Locale) -> Vec<Locale> {
        match &self.candidates {
            Some(candidates) => candidates.clone(),
            None => polyglot_cache::default_candidates(locale).to_vec(),
        }
    }

    fn fallback_locale(&self, _name: &str, locale: &Locale) -> Option<Locale> {
        self.fallbacks.get(locale).cloned()
    }

    fn new_bundle(
        &self,
        name: &str,
        locale: &Locale,
        format: &str,
        owner: Option<&OwnerScope>,
        reload: bool,
    ) -> Result<Option<TestBundle>, MaterializeError> {
        let bundle_name = to_bundle_name(name, locale);
        let resource_name = to_resource_name(&bundle_name, format_suffix(format));
        self.materializer.materialize(&MaterializeRequest {
            name,
            locale,
            format,
            bundle_name: &bundle_name,
            resource_name: &resource_name,
            owner,
            reload,
        })
    }

    fn time_to_live(&self, _name: &str, _locale: &Locale) -> TimeToLive {
        self.ttl
    }

    fn needs_reload(
        &self,
        _name: &str,
        _locale: &Locale,
        _format: &str,
        _owner: Option<&OwnerScope>,
        _bundle: &TestBundle,
        _load_time: Option<Timestamp>,
    ) -> Result<bool, MaterializeError> {
        self.reload_checks.fetch_add(1, Ordering::SeqCst);
        match &self.reload {
            ReloadDecision::Keep => Ok(false),
            ReloadDecision::Reload => Ok(true),
            ReloadDecision::Fail(err) => Err(err.clone()),
        }
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for locales and policies.

    use super::*;
    use proptest::prelude::*;

    /// Generate a language subtag, biased toward the ones with special
    /// candidate rules.
    pub fn arb_language() -> impl Strategy<Value = String> {
        prop_oneof![
            prop::sample::select(vec!["zh", "nb", "nn", "no", "sr", "en", "fr", "ja"])
                .prop_map(str::to_string),
            "[a-z]{2,3}",
        ]
    }

    /// Generate a script subtag or none.
    pub fn arb_script() -> impl Strategy<Value = String> {
        prop::sample::select(vec!["", "", "Hans", "Hant", "Latn", "Cyrl"]).prop_map(str::to_string)
    }

    /// Generate a region subtag or none.
    pub fn arb_region() -> impl Strategy<Value = String> {
        prop_oneof![
            prop::sample::select(vec!["", "CN", "TW", "HK", "MO", "SG", "NO", "US", "CH", "RS"])
                .prop_map(str::to_string),
            "[A-Z]{2}",
            "[0-9]{3}",
        ]
    }

    /// Generate a variant of zero to three `_`-joined subtags.
    pub fn arb_variant() -> impl Strategy<Value = String> {
        prop::collection::vec(prop_oneof![Just("NY".to_string()), "[A-Z0-9]{1,5}"], 0..=3)
            .prop_map(|parts| parts.join("_"))
    }

    /// Generate a non-root locale.
    pub fn arb_locale() -> impl Strategy<Value = Locale> {
        (arb_language(), arb_script(), arb_region(), arb_variant())
            .prop_map(|(l, s, r, v)| Locale::with_script(&l, &s, &r, &v))
    }

    /// Generate any locale, root included.
    pub fn arb_any_locale() -> impl Strategy<Value = Locale> {
        prop_oneof![1 => Just(Locale::root()), 9 => arb_locale()]
    }

    /// Generate a TTL.
    pub fn arb_ttl() -> impl Strategy<Value = TimeToLive> {
        prop_oneof![
            Just(TimeToLive::DontCache),
            Just(TimeToLive::NoExpiration),
            (0u64..86_400_000).prop_map(TimeToLive::Millis),
        ]
    }
}

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! Common resolver setups.

    use super::*;

    /// Bundle name used by the fixtures.
    pub const MESSAGES: &str = "app.Messages";

    /// Parse a locale tag, panicking on malformed fixture input.
    pub fn locale(tag: &str) -> Locale {
        Locale::parse(tag).unwrap_or_else(|e| panic!("bad fixture locale {tag:?}: {e}"))
    }

    /// Bundles at root, `fr` and `fr-CH`.
    pub fn french_materializer() -> MapMaterializer {
        MapMaterializer::new()
            .with_bundle(MESSAGES, "und", &[("greeting", "Hello"), ("farewell", "Goodbye")])
            .with_bundle(MESSAGES, "fr", &[("greeting", "Bonjour"), ("farewell", "Au revoir")])
            .with_bundle(MESSAGES, "fr-CH", &[("greeting", "Grüezi")])
    }

    /// Bundles at root and `en` only.
    pub fn english_materializer() -> MapMaterializer {
        MapMaterializer::new()
            .with_bundle(MESSAGES, "und", &[("greeting", "Hello")])
            .with_bundle(MESSAGES, "en", &[("greeting", "Hi")])
    }

    /// A default control with `default_tag` as the fallback locale.
    pub fn default_control(
        materializer: Arc<MapMaterializer>,
        default_tag: &str,
    ) -> DefaultControl<Arc<MapMaterializer>> {
        DefaultControl::new(materializer, ResolverConfig::new(locale(default_tag)))
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertions for resolver results.

    use super::*;

    /// Assert the bundle's chain visits exactly these locales.
    pub fn assert_chain(bundle: &Bundle<TestBundle>, expected: &[&str]) {
        let actual: Vec<String> = bundle.chain().map(|b| b.locale().to_tag()).collect();
        assert_eq!(actual, expected, "unexpected parent chain");
    }

    pub fn assert_not_found<T: std::fmt::Debug>(result: &Result<T, ResolveError>) {
        match result {
            Err(ResolveError::BundleNotFound { .. }) => {}
            other => panic!("expected BundleNotFound, got {:?}", other),
        }
    }

    pub fn assert_invalid_control<T: std::fmt::Debug>(result: &Result<T, ResolveError>) {
        match result {
            Err(ResolveError::InvalidControl { .. }) => {}
            other => panic!("expected InvalidControl, got {:?}", other),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

//! Property-Based Tests for Bundle Resolution
//!
//! **Property: Chains Mirror Candidates**
//!
//! For any requested locale, when every candidate has a bundle the resolved
//! chain visits exactly the candidate locales in order. When only root has
//! one, every locale resolves to that single root instance.

use std::sync::Arc;

use polyglot_cache::{default_candidates, BundleResolver};
use polyglot_test_utils::fixtures::MESSAGES;
use polyglot_test_utils::generators::{arb_any_locale, arb_ttl};
use polyglot_test_utils::{
    init_tracing, Locale, MapMaterializer, ScriptedControl, TestBundle, FORMAT_PROPERTIES,
};
use proptest::prelude::*;

fn fresh_resolver() -> BundleResolver<TestBundle> {
    init_tracing();
    BundleResolver::new()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// **Property: Full Coverage Yields The Candidate Chain**
    #[test]
    fn prop_chain_matches_candidates(locale in arb_any_locale()) {
        let resolver = fresh_resolver();
        let materializer = Arc::new(MapMaterializer::new());
        let candidates = default_candidates(&locale);
        for candidate in candidates.iter() {
            let tag = candidate.to_tag();
            materializer.insert(MESSAGES, candidate, FORMAT_PROPERTIES, &[("tag", tag.as_str())]);
        }
        let control = ScriptedControl::new(materializer);

        let bundle = resolver.get_bundle(MESSAGES, &locale, None, &control).unwrap();
        let chain: Vec<Locale> = bundle.chain().map(|b| b.locale().clone()).collect();

        prop_assert_eq!(&chain[..], &candidates[..]);
        let first_tag = candidates[0].to_tag();
        prop_assert_eq!(bundle.get("tag"), Some(first_tag.as_str()));
    }

    /// **Property: Root-Only Sources Share One Instance**
    ///
    /// Repeating the resolution returns the identical bundle and makes no
    /// further materializer calls.
    #[test]
    fn prop_root_only_resolves_to_shared_root(locale in arb_any_locale()) {
        let resolver = fresh_resolver();
        let materializer = Arc::new(
            MapMaterializer::new().with_bundle(MESSAGES, "und", &[("greeting", "Hello")]),
        );
        let control = ScriptedControl::new(Arc::clone(&materializer));

        let first = resolver.get_bundle(MESSAGES, &locale, None, &control).unwrap();
        let calls = materializer.calls();
        let second = resolver.get_bundle(MESSAGES, &locale, None, &control).unwrap();

        prop_assert!(first.locale().is_root());
        prop_assert!(first.ptr_eq(&second));
        prop_assert_eq!(materializer.calls(), calls);
    }

    /// **Property: Caching Follows The TTL**
    ///
    /// With reload checks declining, a bundle is reused exactly when its
    /// TTL allows caching at all.
    #[test]
    fn prop_reuse_iff_cacheable(ttl in arb_ttl()) {
        let resolver = fresh_resolver();
        let materializer = Arc::new(
            MapMaterializer::new().with_bundle(MESSAGES, "und", &[("greeting", "Hello")]),
        );
        let control = ScriptedControl::new(materializer).with_ttl(ttl);
        let root = Locale::root();

        let first = resolver.get_bundle(MESSAGES, &root, None, &control).unwrap();
        let second = resolver.get_bundle(MESSAGES, &root, None, &control).unwrap();

        prop_assert_eq!(first.ptr_eq(&second), ttl.is_cacheable());
    }
}

//! Candidate locale generation.
//!
//! Maps a requested locale to the ordered list of locales whose bundles are
//! consulted for it, most specific first and always ending in root.
//!
//! # Algorithm
//!
//! For `language L, script S, region R, variant V`:
//!
//! ```text
//! L-S-R-V*  (each variant prefix, longest first)
//! L-S-R     (if R)
//! L-S       (if S), then again without script:
//!   L-R-V*
//!   L-R     (if R)
//! L         (if L)
//! root
//! ```
//!
//! Chinese infers the missing script from the region (or the missing region
//! from the script for the script-less restart). Norwegian Bokmål lists
//! every `nb` candidate followed by its legacy `no` twin; Nynorsk appends
//! `no-NO-NY, no-NO, no` before root.

use std::sync::Arc;

use dashmap::DashMap;
use once_cell::sync::Lazy;
use polyglot_core::Locale;

/// Bound on memoized lists in the process-wide cache.
const DEFAULT_CAPACITY: usize = 1024;

static DEFAULT_CANDIDATES: Lazy<CandidateCache> =
    Lazy::new(|| CandidateCache::new(DEFAULT_CAPACITY));

/// Candidate list for `locale`, memoized process-wide.
pub fn default_candidates(locale: &Locale) -> Arc<[Locale]> {
    DEFAULT_CANDIDATES.candidates(locale)
}

/// Compute the candidate list for `locale` without memoization.
pub fn compute_candidates(locale: &Locale) -> Vec<Locale> {
    if locale.is_root() {
        return vec![Locale::root()];
    }

    let language = locale.language();
    let mut script = locale.script();
    let region = locale.region();
    let mut variant = locale.variant();

    let mut bokmal = false;
    let mut nynorsk = false;
    if language == "no" {
        if region == "NO" && variant == "NY" {
            variant = "";
            nynorsk = true;
        } else {
            bokmal = true;
        }
    }

    if language == "nb" || bokmal {
        let base = default_list("nb", script, region, variant);
        let mut list = Vec::with_capacity(base.len() * 2);
        for candidate in base {
            let twin = (candidate.language() == "nb").then(|| {
                Locale::with_script(
                    "no",
                    candidate.script(),
                    candidate.region(),
                    candidate.variant(),
                )
            });
            list.push(candidate);
            list.extend(twin);
        }
        return list;
    }

    if language == "nn" || nynorsk {
        let mut list = default_list("nn", script, region, variant);
        let root_at = list.len() - 1;
        list.splice(
            root_at..root_at,
            [
                Locale::new("no", "NO", "NY"),
                Locale::new("no", "NO", ""),
                Locale::language_only("no"),
            ],
        );
        return list;
    }

    if language == "zh" && script.is_empty() && !region.is_empty() {
        match region {
            "TW" | "HK" | "MO" => script = "Hant",
            "CN" | "SG" => script = "Hans",
            _ => {}
        }
    }

    default_list(language, script, region, variant)
}

fn default_list(language: &str, script: &str, region: &str, variant: &str) -> Vec<Locale> {
    let variants = variant_prefixes(variant);
    let mut list = Vec::with_capacity(2 * variants.len() + 5);

    for v in &variants {
        list.push(Locale::with_script(language, script, region, v));
    }
    if !region.is_empty() {
        list.push(Locale::with_script(language, script, region, ""));
    }
    if !script.is_empty() {
        list.push(Locale::with_script(language, script, "", ""));

        // Bundles packaged under the old region-only Chinese names still
        // need a region for the script-less pass.
        let region = if language == "zh" && region.is_empty() {
            match script {
                "Hans" => "CN",
                "Hant" => "TW",
                _ => region,
            }
        } else {
            region
        };

        for v in &variants {
            list.push(Locale::new(language, region, v));
        }
        if !region.is_empty() {
            list.push(Locale::new(language, region, ""));
        }
    }
    if !language.is_empty() {
        list.push(Locale::language_only(language));
    }
    list.push(Locale::root());
    list
}

/// `"A_B_C"` → `["A_B_C", "A_B", "A"]`.
fn variant_prefixes(variant: &str) -> Vec<&str> {
    let mut prefixes = Vec::new();
    if variant.is_empty() {
        return prefixes;
    }
    let mut end = variant.len();
    loop {
        prefixes.push(&variant[..end]);
        match variant[..end].rfind('_') {
            Some(idx) => end = idx,
            None => break,
        }
    }
    prefixes
}

// ============================================================================
// MEMOIZATION
// ============================================================================

/// Memoized candidate lists keyed by locale.
///
/// Lists are pure functions of the locale, so the cache can be dropped
/// wholesale when it outgrows its bound.
#[derive(Debug)]
pub struct CandidateCache {
    lists: DashMap<Locale, Arc<[Locale]>>,
    capacity: usize,
}

impl CandidateCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            lists: DashMap::new(),
            capacity: capacity.max(1),
        }
    }

    /// Candidate list for `locale`, computing and memoizing on first use.
    pub fn candidates(&self, locale: &Locale) -> Arc<[Locale]> {
        if let Some(hit) = self.lists.get(locale) {
            return Arc::clone(hit.value());
        }

        let computed: Arc<[Locale]> = compute_candidates(locale).into();
        if self.lists.len() >= self.capacity {
            self.lists.clear();
        }
        let entry = self.lists.entry(locale.clone()).or_insert(computed);
        Arc::clone(entry.value())
    }

    pub fn len(&self) -> usize {
        self.lists.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lists.is_empty()
    }
}

impl Default for CandidateCache {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// =============================================================================
// TESTS
// =============================================================================


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(200))]

        /// Property: variant prefixes shrink one subtag at a time
        #[test]
        fn prop_variant_prefixes_truncate(parts in prop::collection::vec("[A-Z0-9]{1,8}", 0..5)) {
            let variant = parts.join("_");
            let prefixes = variant_prefixes(&variant);

            prop_assert_eq!(prefixes.len(), parts.len());
            if let Some(first) = prefixes.first() {
                prop_assert_eq!(*first, variant.as_str());
            }
            for pair in prefixes.windows(2) {
                prop_assert!(pair[0].starts_with(pair[1]));
                prop_assert_eq!(pair[0].as_bytes()[pair[1].len()], b'_');
            }
        }

        /// Property: a bounded cache never exceeds its capacity
        #[test]
        fn prop_cache_respects_bound(
            languages in prop::collection::vec("[a-z]{2,3}", 1..40),
            capacity in 1usize..8,
        ) {
            let cache = CandidateCache::new(capacity);
            for language in &languages {
                let list = cache.candidates(&Locale::language_only(language));
                prop_assert_eq!(list.len(), 2);
                prop_assert!(cache.len() <= capacity);
            }
        }
    }
}

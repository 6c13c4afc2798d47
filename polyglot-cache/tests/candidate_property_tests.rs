//! Property-Based Tests for Candidate Locales
//!
//! **Property: Candidate Lists Are Well-Formed**
//!
//! For any requested locale, the candidate list is non-empty, ends with the
//! root locale, lists every locale at most once and is the same on every
//! call, memoized or not.

use std::collections::HashSet;

use polyglot_cache::{compute_candidates, default_candidates, CandidateCache};
use polyglot_test_utils::generators::{arb_any_locale, arb_locale};
use polyglot_test_utils::Locale;
use proptest::prelude::*;

const SPECIAL_LANGUAGES: [&str; 4] = ["zh", "nb", "nn", "no"];

proptest! {
    #![proptest_config(ProptestConfig::with_cases(256))]

    /// **Property: Root Terminates Every List**
    ///
    /// The last candidate is root and root appears nowhere else.
    #[test]
    fn prop_root_is_last_and_unique(locale in arb_any_locale()) {
        let candidates = compute_candidates(&locale);

        prop_assert!(!candidates.is_empty());
        prop_assert!(candidates.last().is_some_and(Locale::is_root));
        prop_assert_eq!(candidates.iter().filter(|c| c.is_root()).count(), 1);
    }

    /// **Property: No Duplicates**
    #[test]
    fn prop_candidates_are_distinct(locale in arb_locale()) {
        let candidates = compute_candidates(&locale);
        let distinct: HashSet<&Locale> = candidates.iter().collect();

        prop_assert_eq!(distinct.len(), candidates.len(), "duplicates in {:?}", candidates);
    }

    /// **Property: Memoization Is Transparent**
    ///
    /// The process-wide cache, a private cache and direct computation all
    /// agree, and repeated calls share one list.
    #[test]
    fn prop_memoized_matches_computed(locale in arb_any_locale()) {
        let computed = compute_candidates(&locale);
        let first = default_candidates(&locale);
        let second = default_candidates(&locale);
        let private = CandidateCache::new(4).candidates(&locale);

        prop_assert_eq!(&first[..], &computed[..]);
        prop_assert_eq!(&private[..], &computed[..]);
        prop_assert_eq!(&first[..], &second[..]);
    }

    /// **Property: Plain Languages Start With The Request**
    ///
    /// Outside the Chinese and Norwegian rules, the requested locale is the
    /// first candidate and every other non-root candidate keeps its
    /// language.
    #[test]
    fn prop_plain_language_starts_with_request(locale in arb_locale()) {
        prop_assume!(!SPECIAL_LANGUAGES.contains(&locale.language()));
        let candidates = compute_candidates(&locale);

        prop_assert_eq!(&candidates[0], &locale);
        for candidate in candidates.iter().filter(|c| !c.is_root()) {
            prop_assert_eq!(candidate.language(), locale.language());
        }
    }

    /// **Property: Bokmål Lists Pair With Legacy Norwegian**
    ///
    /// Every `nb` candidate is immediately followed by its `no` twin.
    #[test]
    fn prop_bokmal_candidates_have_twins(locale in arb_locale()) {
        prop_assume!(locale.language() == "nb");
        let candidates = compute_candidates(&locale);

        for pair in candidates.windows(2).filter(|w| w[0].language() == "nb") {
            prop_assert_eq!(pair[1].language(), "no");
            prop_assert_eq!(pair[1].script(), pair[0].script());
            prop_assert_eq!(pair[1].region(), pair[0].region());
            prop_assert_eq!(pair[1].variant(), pair[0].variant());
        }
    }
}

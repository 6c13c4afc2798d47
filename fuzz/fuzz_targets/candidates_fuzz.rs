//! Fuzz test for locale parsing and candidate generation
//!
//! Feeds arbitrary tags through `Locale::parse` and checks that every
//! accepted locale yields a root-terminated candidate list and a bundle
//! name without panicking.
//!
//! Run with: cargo +nightly fuzz run candidates_fuzz -- -max_total_time=60

#![no_main]

use libfuzzer_sys::fuzz_target;
use polyglot_cache::{compute_candidates, default_candidates, to_bundle_name};
use polyglot_core::Locale;

fuzz_target!(|data: &[u8]| {
    let Ok(tag) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(locale) = Locale::parse(tag) else {
        return;
    };

    let candidates = compute_candidates(&locale);
    assert!(
        candidates.last().is_some_and(Locale::is_root),
        "candidate list must end with root"
    );
    assert_eq!(&default_candidates(&locale)[..], &candidates[..]);

    for candidate in &candidates {
        let bundle_name = to_bundle_name("fuzz.Messages", candidate);
        assert!(bundle_name.starts_with("fuzz.Messages"));
    }
});

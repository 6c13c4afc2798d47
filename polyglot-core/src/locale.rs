//! Four-part locale identity.
//!
//! A [`Locale`] is the `(language, script, region, variant)` tuple the
//! resolver keys its cache and candidate lists on. The parser here is
//! deliberately small: it splits `_`/`-` separated tags into the four parts
//! and applies canonical casing. It is not a BCP47 grammar.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::LocaleParseError;

/// Locale identity used as part of every cache key.
///
/// Casing is canonicalized on construction: language lowercase, script
/// title case, region uppercase. Variants are kept as given and may hold
/// several `_`-joined subtags (`"POSIX"`, `"Traditional_WIN"`).
///
/// The root locale is the all-empty locale; it is the last candidate of
/// every fallback list.
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Locale {
    language: String,
    script: String,
    region: String,
    variant: String,
}

impl Locale {
    /// The root locale (all parts empty).
    pub fn root() -> Self {
        Self::default()
    }

    /// Create a locale without a script.
    pub fn new(language: &str, region: &str, variant: &str) -> Self {
        Self::with_script(language, "", region, variant)
    }

    /// Create a locale from all four parts.
    pub fn with_script(language: &str, script: &str, region: &str, variant: &str) -> Self {
        Self {
            language: language.to_ascii_lowercase(),
            script: title_case(script),
            region: region.to_ascii_uppercase(),
            variant: variant.to_string(),
        }
    }

    /// Create a language-only locale.
    pub fn language_only(language: &str) -> Self {
        Self::new(language, "", "")
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn script(&self) -> &str {
        &self.script
    }

    pub fn region(&self) -> &str {
        &self.region
    }

    pub fn variant(&self) -> &str {
        &self.variant
    }

    /// Returns true for the root locale.
    pub fn is_root(&self) -> bool {
        self.language.is_empty()
            && self.script.is_empty()
            && self.region.is_empty()
            && self.variant.is_empty()
    }

    /// Parse a `_` or `-` separated tag such as `"fr_CH"`, `"zh-Hans-CN"`
    /// or `"nb_NO_POSIX"`.
    ///
    /// `""`, `"und"` and `"root"` parse to the root locale. An empty region
    /// slot (`"nb__POSIX"`) is accepted so variant-only locales can be
    /// written the way bundle names spell them.
    pub fn parse(tag: &str) -> Result<Self, LocaleParseError> {
        let trimmed = tag.trim();
        if trimmed.is_empty()
            || trimmed.eq_ignore_ascii_case("und")
            || trimmed.eq_ignore_ascii_case("root")
        {
            return Ok(Self::root());
        }

        let mut parts = trimmed.split(['-', '_']).peekable();
        let language = parts.next().unwrap_or_default();
        if !language.is_empty() && !is_language(language) {
            return Err(LocaleParseError::new(tag, "language must be 2-8 ASCII letters"));
        }

        let mut script = "";
        if let Some(part) = parts.peek() {
            if is_script(part) {
                script = part;
                parts.next();
            }
        }

        let mut region = "";
        if let Some(part) = parts.peek() {
            if part.is_empty() || is_region(part) {
                region = part;
                parts.next();
            }
        }

        let rest: Vec<&str> = parts.collect();
        if rest
            .iter()
            .any(|s| s.is_empty() || !s.chars().all(|c| c.is_ascii_alphanumeric()))
        {
            return Err(LocaleParseError::new(tag, "malformed variant subtag"));
        }

        Ok(Self::with_script(language, script, region, &rest.join("_")))
    }

    /// Hyphenated tag form, `"und"` for root.
    pub fn to_tag(&self) -> String {
        if self.is_root() {
            return "und".to_string();
        }
        let mut parts: Vec<&str> = Vec::with_capacity(4);
        parts.push(&self.language);
        if !self.script.is_empty() {
            parts.push(&self.script);
        }
        if !self.region.is_empty() || !self.variant.is_empty() {
            parts.push(&self.region);
        }
        let variant = self.variant.replace('_', "-");
        if !variant.is_empty() {
            parts.push(&variant);
        }
        parts.join("-")
    }
}

impl fmt::Display for Locale {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_tag())
    }
}

impl FromStr for Locale {
    type Err = LocaleParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Locale {
    type Error = LocaleParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<Locale> for String {
    fn from(locale: Locale) -> Self {
        locale.to_tag()
    }
}

fn title_case(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => {
            let mut out = first.to_ascii_uppercase().to_string();
            out.push_str(&chars.as_str().to_ascii_lowercase());
            out
        }
        None => String::new(),
    }
}

fn is_language(s: &str) -> bool {
    (2..=8).contains(&s.len()) && s.chars().all(|c| c.is_ascii_alphabetic())
}

fn is_script(s: &str) -> bool {
    s.len() == 4 && s.chars().all(|c| c.is_ascii_alphabetic())
}

fn is_region(s: &str) -> bool {
    (s.len() == 2 && s.chars().all(|c| c.is_ascii_alphabetic()))
        || (s.len() == 3 && s.chars().all(|c| c.is_ascii_digit()))
}

// =============================================================================
// TESTS
// =============================================================================


#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;

    fn part(len: std::ops::RangeInclusive<usize>) -> impl Strategy<Value = String> {
        proptest::collection::vec(proptest::char::range('a', 'z'), len)
            .prop_map(|chars| chars.into_iter().collect())
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(256))]

        /// Property: tag formatting then parsing preserves the locale.
        #[test]
        fn prop_tag_roundtrip(
            language in part(2..=3),
            script in prop_oneof![Just(String::new()), part(4..=4)],
            region in prop_oneof![Just(String::new()), part(2..=2)],
            variant in prop_oneof![Just(String::new()), part(5..=8)],
        ) {
            let locale = Locale::with_script(&language, &script, &region, &variant);
            let parsed = Locale::parse(&locale.to_tag());
            prop_assert_eq!(parsed, Ok(locale));
        }
    }
}

//! Configuration types

use crate::{ConfigError, DurationMs, Locale};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Format name for bundles produced by code (compiled tables, generated types).
pub const FORMAT_COMPILED: &str = "compiled";

/// Format name for bundles parsed from key/value property files.
pub const FORMAT_PROPERTIES: &str = "properties";

/// Default format search order: compiled bundles win over property files.
pub const FORMAT_DEFAULT: [&str; 2] = [FORMAT_COMPILED, FORMAT_PROPERTIES];

// ============================================================================
// TIME TO LIVE
// ============================================================================

/// How long a cached entry stays valid before a reload check is required.
///
/// The wire form is the integer millisecond value, with `-1` meaning
/// "don't cache" and `-2` meaning "never expires".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(try_from = "i64", into = "i64")]
pub enum TimeToLive {
    /// The entry is handed out but never stored.
    DontCache,
    /// The entry never needs a reload check.
    #[default]
    NoExpiration,
    /// The entry needs a reload check once this many milliseconds pass.
    Millis(u64),
}

impl TimeToLive {
    pub const DONT_CACHE_MS: DurationMs = -1;
    pub const NO_EXPIRATION_MS: DurationMs = -2;

    /// Parse the integer wire value.
    pub fn from_millis(ms: DurationMs) -> Result<Self, ConfigError> {
        match ms {
            Self::DONT_CACHE_MS => Ok(Self::DontCache),
            Self::NO_EXPIRATION_MS => Ok(Self::NoExpiration),
            ms if ms >= 0 => Ok(Self::Millis(ms as u64)),
            other => Err(ConfigError::InvalidValue {
                field: "time_to_live_ms".to_string(),
                value: other.to_string(),
                reason: "must be >= 0, -1 (don't cache) or -2 (no expiration)".to_string(),
            }),
        }
    }

    /// The integer wire value.
    pub fn as_millis(&self) -> DurationMs {
        match self {
            Self::DontCache => Self::DONT_CACHE_MS,
            Self::NoExpiration => Self::NO_EXPIRATION_MS,
            Self::Millis(ms) => i64::try_from(*ms).unwrap_or(i64::MAX),
        }
    }

    pub fn from_duration(duration: Duration) -> Self {
        Self::Millis(u64::try_from(duration.as_millis()).unwrap_or(u64::MAX))
    }

    pub fn is_cacheable(&self) -> bool {
        !matches!(self, Self::DontCache)
    }
}

impl TryFrom<i64> for TimeToLive {
    type Error = ConfigError;

    fn try_from(value: i64) -> Result<Self, Self::Error> {
        Self::from_millis(value)
    }
}

impl From<TimeToLive> for i64 {
    fn from(ttl: TimeToLive) -> Self {
        ttl.as_millis()
    }
}

// ============================================================================
// RESOLVER CONFIG
// ============================================================================

/// Resolver configuration.
///
/// Loadable from TOML:
///
/// ```toml
/// default_locale = "en-US"
/// time_to_live_ms = 60000
/// formats = ["compiled", "properties"]
/// max_entries = 4096
/// fallback = true
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolverConfig {
    /// Locale searched after the requested one fails to produce a
    /// specific bundle.
    pub default_locale: Locale,
    /// Time-to-live applied to every cached entry.
    #[serde(rename = "time_to_live_ms", default)]
    pub time_to_live: TimeToLive,
    /// Format search order for materialization.
    #[serde(default = "default_formats")]
    pub formats: Vec<String>,
    /// Upper bound on cached bindings; unbounded when absent.
    #[serde(default)]
    pub max_entries: Option<usize>,
    /// Whether to continue with the default locale after the requested
    /// locale's candidates are exhausted.
    #[serde(default = "default_fallback")]
    pub fallback: bool,
}

fn default_formats() -> Vec<String> {
    FORMAT_DEFAULT.iter().map(|f| f.to_string()).collect()
}

fn default_fallback() -> bool {
    true
}

impl ResolverConfig {
    /// Build a configuration with the standard defaults around a default
    /// locale.
    pub fn new(default_locale: Locale) -> Self {
        Self {
            default_locale,
            time_to_live: TimeToLive::NoExpiration,
            formats: default_formats(),
            max_entries: None,
            fallback: true,
        }
    }

    /// Set the time-to-live.
    pub fn with_time_to_live(mut self, ttl: TimeToLive) -> Self {
        self.time_to_live = ttl;
        self
    }

    /// Replace the format search order.
    pub fn with_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.formats = formats.into_iter().map(Into::into).collect();
        self
    }

    /// Bound the number of cached bindings.
    pub fn with_max_entries(mut self, max: usize) -> Self {
        self.max_entries = Some(max);
        self
    }

    /// Enable or disable default-locale fallback.
    pub fn with_fallback(mut self, enabled: bool) -> Self {
        self.fallback = enabled;
        self
    }

    /// Validate the configuration.
    ///
    /// Validates:
    /// - formats is non-empty and has no blank names
    /// - max_entries, when set, is > 0
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.formats.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "formats".to_string(),
                value: "[]".to_string(),
                reason: "at least one format is required".to_string(),
            });
        }
        if let Some(blank) = self.formats.iter().find(|f| f.trim().is_empty()) {
            return Err(ConfigError::InvalidValue {
                field: "formats".to_string(),
                value: format!("{:?}", blank),
                reason: "format names must not be blank".to_string(),
            });
        }
        if self.max_entries == Some(0) {
            return Err(ConfigError::InvalidValue {
                field: "max_entries".to_string(),
                value: "0".to_string(),
                reason: "must be positive when set".to_string(),
            });
        }
        Ok(())
    }

    /// Parse and validate a TOML document.
    pub fn from_toml_str(input: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(input).map_err(|e| ConfigError::Parse {
            reason: e.to_string(),
        })?;
        config.validate()?;
        Ok(config)
    }
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self::new(Locale::root())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ttl_wire_values() {
        assert_eq!(TimeToLive::from_millis(-1), Ok(TimeToLive::DontCache));
        assert_eq!(TimeToLive::from_millis(-2), Ok(TimeToLive::NoExpiration));
        assert_eq!(TimeToLive::from_millis(0), Ok(TimeToLive::Millis(0)));
        assert_eq!(TimeToLive::from_millis(1500), Ok(TimeToLive::Millis(1500)));
        assert!(TimeToLive::from_millis(-3).is_err());

        assert_eq!(TimeToLive::DontCache.as_millis(), -1);
        assert_eq!(TimeToLive::NoExpiration.as_millis(), -2);
        assert_eq!(TimeToLive::Millis(42).as_millis(), 42);
    }

    #[test]
    fn test_ttl_from_duration() {
        let ttl = TimeToLive::from_duration(Duration::from_secs(2));
        assert_eq!(ttl, TimeToLive::Millis(2000));
        assert!(ttl.is_cacheable());
        assert!(!TimeToLive::DontCache.is_cacheable());
    }

    #[test]
    fn test_default_config_is_valid() {
        let config = ResolverConfig::new(Locale::new("en", "US", ""));
        assert!(config.validate().is_ok());
        assert_eq!(config.formats, vec!["compiled", "properties"]);
        assert!(config.fallback);
    }

    #[test]
    fn test_validate_rejects_empty_formats() {
        let config = ResolverConfig::default().with_formats(Vec::<String>::new());
        assert!(config.validate().is_err());

        let blank = ResolverConfig::default().with_formats(["compiled", " "]);
        assert!(blank.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_capacity() {
        let config = ResolverConfig::default().with_max_entries(0);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_from_toml_full() {
        let config = ResolverConfig::from_toml_str(
            r#"
            default_locale = "fr-FR"
            time_to_live_ms = 60000
            formats = ["properties"]
            max_entries = 128
            fallback = false
            "#,
        )
        .unwrap();

        assert_eq!(config.default_locale, Locale::new("fr", "FR", ""));
        assert_eq!(config.time_to_live, TimeToLive::Millis(60_000));
        assert_eq!(config.formats, vec!["properties"]);
        assert_eq!(config.max_entries, Some(128));
        assert!(!config.fallback);
    }

    #[test]
    fn test_from_toml_defaults() {
        let config = ResolverConfig::from_toml_str("default_locale = \"en\"").unwrap();
        assert_eq!(config.time_to_live, TimeToLive::NoExpiration);
        assert_eq!(config.formats.len(), 2);
        assert_eq!(config.max_entries, None);
        assert!(config.fallback);
    }

    #[test]
    fn test_from_toml_rejects_bad_ttl() {
        let err = ResolverConfig::from_toml_str(
            "default_locale = \"en\"\ntime_to_live_ms = -9",
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }

    #[test]
    fn test_from_toml_rejects_bad_locale() {
        let err = ResolverConfig::from_toml_str("default_locale = \"e\"").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }));
    }
}

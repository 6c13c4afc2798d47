//! Polyglot Core - Data Types
//!
//! Pure data structures shared by the resolver crates: locale identity,
//! time-to-live policy, resolver configuration and the error taxonomy.
//! This crate contains no caching or resolution logic.

pub mod config;
pub mod error;
pub mod locale;

use chrono::{DateTime, Utc};

pub use config::{ResolverConfig, TimeToLive, FORMAT_COMPILED, FORMAT_DEFAULT, FORMAT_PROPERTIES};
pub use error::{
    ConfigError, LocaleParseError, MaterializeError, PolyglotError, PolyglotResult, ResolveError,
};
pub use locale::Locale;

// ============================================================================
// IDENTITY TYPES
// ============================================================================

/// Timestamp type using UTC timezone.
pub type Timestamp = DateTime<Utc>;

/// Duration in milliseconds for TTL values.
pub type DurationMs = i64;

//! Polyglot Cache - Bundle Resolution Engine
//!
//! Resolves a bundle name and a requested locale into a bundle linked to
//! its less specific parents, caching each link with expiration, reload
//! checks and negative caching.
//!
//! ```ignore
//! let resolver = BundleResolver::new();
//! let control = DefaultControl::new(materializer, ResolverConfig::new(en_us));
//! let bundle = resolver.get_bundle("app.Messages", &fr_ch, None, &control)?;
//! let greeting = bundle.lookup(|table| table.get("greeting").cloned());
//! ```

pub mod bundle;
pub mod cache;
pub mod candidates;
pub mod control;
pub mod engine;
pub mod owner;

pub use bundle::Bundle;
pub use cache::{CacheKey, CacheStats, CacheStore, Expiration};
pub use candidates::{compute_candidates, default_candidates, CandidateCache};
pub use control::{
    format_suffix, to_bundle_name, to_resource_name, Control, DefaultControl, MaterializeRequest,
    Materializer,
};
pub use engine::BundleResolver;
pub use owner::{OwnerId, OwnerScope, WeakOwner};

// Re-export core types so callers only need this crate
pub use polyglot_core::{
    ConfigError, Locale, MaterializeError, PolyglotError, PolyglotResult, ResolveError,
    ResolverConfig, TimeToLive, Timestamp, FORMAT_COMPILED, FORMAT_DEFAULT, FORMAT_PROPERTIES,
};

//! Error types for polyglot operations

use crate::Locale;
use thiserror::Error;

/// Errors raised by a materializer while producing a bundle.
///
/// These never abort a resolution on their own: the engine records them as
/// the resolution's cause and moves on to the next format or candidate.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum MaterializeError {
    #[error("Resource not found: {resource}")]
    ResourceAbsent { resource: String },

    #[error("Can't find bundle for base name {name}, locale {locale}")]
    MissingBundle { name: String, locale: Locale },

    #[error("I/O failure reading {resource}: {reason}")]
    Io { resource: String, reason: String },

    #[error("Malformed bundle {resource}: {reason}")]
    Malformed { resource: String, reason: String },

    #[error("Materializer failed: {reason}")]
    Other { reason: String },
}

impl MaterializeError {
    /// Generic "nothing there" failures, as opposed to a resource that
    /// exists but could not be turned into a bundle.
    pub fn is_absent(&self) -> bool {
        matches!(self, Self::ResourceAbsent { .. } | Self::MissingBundle { .. })
    }

    /// True when the failure is itself a bundle-not-found error.
    pub fn is_missing_bundle(&self) -> bool {
        matches!(self, Self::MissingBundle { .. })
    }
}

/// Errors surfaced to callers of the resolver.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ResolveError {
    #[error("Can't find bundle for base name {name}, locale {locale}")]
    BundleNotFound {
        name: String,
        locale: Locale,
        #[source]
        cause: Option<MaterializeError>,
    },

    #[error("Invalid control: {reason}")]
    InvalidControl { reason: String },
}

impl ResolveError {
    /// Build a not-found error.
    ///
    /// A cause that is itself a missing-bundle error is dropped so callers
    /// never see a not-found chained onto another not-found.
    pub fn not_found(
        name: impl Into<String>,
        locale: Locale,
        cause: Option<MaterializeError>,
    ) -> Self {
        Self::BundleNotFound {
            name: name.into(),
            locale,
            cause: cause.filter(|c| !c.is_missing_bundle()),
        }
    }

    pub fn invalid_control(reason: impl Into<String>) -> Self {
        Self::InvalidControl {
            reason: reason.into(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::BundleNotFound { .. })
    }

    /// The recorded materializer failure, if any.
    pub fn cause(&self) -> Option<&MaterializeError> {
        match self {
            Self::BundleNotFound { cause, .. } => cause.as_ref(),
            Self::InvalidControl { .. } => None,
        }
    }
}

impl From<ResolveError> for MaterializeError {
    /// Lets a materializer that performs its own lookup propagate the
    /// failure with `?`.
    fn from(err: ResolveError) -> Self {
        match err {
            ResolveError::BundleNotFound { name, locale, .. } => {
                Self::MissingBundle { name, locale }
            }
            ResolveError::InvalidControl { reason } => Self::Other { reason },
        }
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },

    #[error("Failed to parse configuration: {reason}")]
    Parse { reason: String },
}

/// Error when parsing an invalid locale tag.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("Invalid locale tag '{tag}': {reason}")]
pub struct LocaleParseError {
    pub tag: String,
    pub reason: String,
}

impl LocaleParseError {
    pub fn new(tag: impl Into<String>, reason: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            reason: reason.into(),
        }
    }
}

/// Master error type for all polyglot errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PolyglotError {
    #[error("Resolve error: {0}")]
    Resolve(#[from] ResolveError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),

    #[error("Locale error: {0}")]
    Locale(#[from] LocaleParseError),
}

/// Result type alias for polyglot operations.
pub type PolyglotResult<T> = Result<T, PolyglotError>;

// =============================================================================
// TESTS
// =============================================================================

//! Resolution policy.
//!
//! A [`Control`] tells the engine which formats to try, which candidate
//! locales to search, where to fall back to, how long entries stay valid
//! and how to materialize a bundle. Every method except
//! [`Control::new_bundle`] has a default.
//!
//! [`DefaultControl`] covers the common case: bundles come from a
//! [`Materializer`], and policy comes from a [`ResolverConfig`].

use std::sync::Arc;

use polyglot_core::{
    Locale, MaterializeError, ResolverConfig, TimeToLive, Timestamp, FORMAT_DEFAULT,
};

use crate::candidates::default_candidates;
use crate::owner::OwnerScope;

// ============================================================================
// CONTROL
// ============================================================================

/// Policy consulted by the resolver on every slow-path resolution.
///
/// Implementations must be thread-safe: the same control may drive
/// concurrent resolutions.
pub trait Control<B>: Send + Sync {
    /// Formats to try, in order. Must not be empty.
    fn formats(&self, _name: &str) -> Vec<String> {
        FORMAT_DEFAULT.iter().map(|f| f.to_string()).collect()
    }

    /// Locales to search for `locale`, most specific first. Must not be
    /// empty.
    fn candidate_locales(&self, _name: &str, locale: &Locale) -> Vec<Locale> {
        default_candidates(locale).to_vec()
    }

    /// Locale to search next when `locale` only produced a base bundle.
    fn fallback_locale(&self, _name: &str, _locale: &Locale) -> Option<Locale> {
        None
    }

    /// Produce the bundle for one candidate locale in one format.
    ///
    /// `Ok(None)` means there is nothing in this format. Errors are recorded
    /// and the next format is tried.
    fn new_bundle(
        &self,
        name: &str,
        locale: &Locale,
        format: &str,
        owner: Option<&OwnerScope>,
        reload: bool,
    ) -> Result<Option<B>, MaterializeError>;

    fn time_to_live(&self, _name: &str, _locale: &Locale) -> TimeToLive {
        TimeToLive::NoExpiration
    }

    /// Decide whether an entry whose TTL ran out must be re-materialized.
    fn needs_reload(
        &self,
        _name: &str,
        _locale: &Locale,
        _format: &str,
        _owner: Option<&OwnerScope>,
        _bundle: &B,
        _load_time: Option<Timestamp>,
    ) -> Result<bool, MaterializeError> {
        Ok(false)
    }

    fn to_bundle_name(&self, name: &str, locale: &Locale) -> String {
        to_bundle_name(name, locale)
    }

    fn to_resource_name(&self, bundle_name: &str, suffix: &str) -> String {
        to_resource_name(bundle_name, suffix)
    }
}

/// Locale-qualified bundle name: `Messages_zh_Hans_CN`, `Messages_nb__POSIX`.
///
/// Unqualified when the locale has no language, region or variant.
pub fn to_bundle_name(name: &str, locale: &Locale) -> String {
    let (language, script, region, variant) = (
        locale.language(),
        locale.script(),
        locale.region(),
        locale.variant(),
    );
    if language.is_empty() && region.is_empty() && variant.is_empty() {
        return name.to_string();
    }

    let mut parts = vec![name, language];
    if !script.is_empty() {
        parts.push(script);
    }
    if !variant.is_empty() {
        parts.push(region);
        parts.push(variant);
    } else if !region.is_empty() {
        parts.push(region);
    }
    parts.join("_")
}

/// Path-style resource name: `com.acme.Messages_fr` + `properties` →
/// `com/acme/Messages_fr.properties`.
pub fn to_resource_name(bundle_name: &str, suffix: &str) -> String {
    format!("{}.{}", bundle_name.replace('.', "/"), suffix)
}

/// File suffix for a format: the part after the last `.`, or the whole
/// format name.
pub fn format_suffix(format: &str) -> &str {
    format.rsplit_once('.').map_or(format, |(_, suffix)| suffix)
}

// ============================================================================
// MATERIALIZER
// ============================================================================

/// Everything a materializer needs to know about one load attempt.
#[derive(Debug, Clone, Copy)]
pub struct MaterializeRequest<'a> {
    pub name: &'a str,
    pub locale: &'a Locale,
    pub format: &'a str,
    pub bundle_name: &'a str,
    pub resource_name: &'a str,
    pub owner: Option<&'a OwnerScope>,
    /// Set when a cached instance was found stale and is being replaced.
    pub reload: bool,
}

/// Source of bundle values for [`DefaultControl`].
pub trait Materializer<B>: Send + Sync {
    fn materialize(
        &self,
        request: &MaterializeRequest<'_>,
    ) -> Result<Option<B>, MaterializeError>;

    /// When the resource was last changed, if the source tracks it.
    fn last_modified(
        &self,
        _resource_name: &str,
        _owner: Option<&OwnerScope>,
    ) -> Option<Timestamp> {
        None
    }
}

impl<B, M> Materializer<B> for Arc<M>
where
    M: Materializer<B> + ?Sized,
{
    fn materialize(
        &self,
        request: &MaterializeRequest<'_>,
    ) -> Result<Option<B>, MaterializeError> {
        (**self).materialize(request)
    }

    fn last_modified(&self, resource_name: &str, owner: Option<&OwnerScope>) -> Option<Timestamp> {
        (**self).last_modified(resource_name, owner)
    }
}

// ============================================================================
// DEFAULT CONTROL
// ============================================================================

/// A [`Control`] driven by a [`Materializer`] and a [`ResolverConfig`].
#[derive(Debug, Clone)]
pub struct DefaultControl<M> {
    materializer: M,
    config: ResolverConfig,
}

impl<M> DefaultControl<M> {
    pub fn new(materializer: M, config: ResolverConfig) -> Self {
        Self {
            materializer,
            config,
        }
    }

    /// A control that never falls back to the default locale.
    pub fn no_fallback(materializer: M, config: ResolverConfig) -> Self {
        Self::new(materializer, config.with_fallback(false))
    }

    /// Restrict the format search order.
    pub fn with_formats<I, S>(mut self, formats: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.config = self.config.with_formats(formats);
        self
    }

    pub fn materializer(&self) -> &M {
        &self.materializer
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }
}

impl<B, M> Control<B> for DefaultControl<M>
where
    M: Materializer<B>,
{
    fn formats(&self, _name: &str) -> Vec<String> {
        self.config.formats.clone()
    }

    fn fallback_locale(&self, _name: &str, locale: &Locale) -> Option<Locale> {
        if !self.config.fallback || *locale == self.config.default_locale {
            None
        } else {
            Some(self.config.default_locale.clone())
        }
    }

    fn new_bundle(
        &self,
        name: &str,
        locale: &Locale,
        format: &str,
        owner: Option<&OwnerScope>,
        reload: bool,
    ) -> Result<Option<B>, MaterializeError> {
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
        self.config.time_to_live
    }

    /// Reload when the resource changed at or after the entry was loaded.
    fn needs_reload(
        &self,
        name: &str,
        locale: &Locale,
        format: &str,
        owner: Option<&OwnerScope>,
        _bundle: &B,
        load_time: Option<Timestamp>,
    ) -> Result<bool, MaterializeError> {
        let Some(load_time) = load_time else {
            return Ok(false);
        };
        let resource_name =
            to_resource_name(&to_bundle_name(name, locale), format_suffix(format));
        Ok(self
            .materializer
            .last_modified(&resource_name, owner)
            .is_some_and(|modified| modified >= load_time))
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use parking_lot::Mutex;
    use polyglot_core::FORMAT_PROPERTIES;

    #[derive(Default)]
    struct Recording {
        requests: Mutex<Vec<(String, String, bool)>>,
        modified: Mutex<Option<Timestamp>>,
    }

    impl Materializer<String> for Recording {
        fn materialize(
            &self,
            request: &MaterializeRequest<'_>,
        ) -> Result<Option<String>, MaterializeError> {
            self.requests.lock().push((
                request.bundle_name.to_string(),
                request.resource_name.to_string(),
                request.reload,
            ));
            Ok(Some(request.bundle_name.to_string()))
        }

        fn last_modified(&self, _resource: &str, _owner: Option<&OwnerScope>) -> Option<Timestamp> {
            *self.modified.lock()
        }
    }

    struct Minimal;

    impl Control<u32> for Minimal {
        fn new_bundle(
            &self,
            _name: &str,
            _locale: &Locale,
            _format: &str,
            _owner: Option<&OwnerScope>,
            _reload: bool,
        ) -> Result<Option<u32>, MaterializeError> {
            Ok(None)
        }
    }

    fn locale(tag: &str) -> Locale {
        Locale::parse(tag).unwrap()
    }

    #[test]
    fn test_bundle_names() {
        assert_eq!(to_bundle_name("Messages", &Locale::root()), "Messages");
        assert_eq!(to_bundle_name("Messages", &locale("fr")), "Messages_fr");
        assert_eq!(to_bundle_name("Messages", &locale("fr-CH")), "Messages_fr_CH");
        assert_eq!(
            to_bundle_name("Messages", &locale("zh-Hans-CN")),
            "Messages_zh_Hans_CN"
        );
        assert_eq!(to_bundle_name("Messages", &locale("zh-Hant")), "Messages_zh_Hant");
        assert_eq!(
            to_bundle_name("Messages", &Locale::new("nb", "", "POSIX")),
            "Messages_nb__POSIX"
        );
        assert_eq!(
            to_bundle_name("Messages", &Locale::new("ja", "JP", "JP")),
            "Messages_ja_JP_JP"
        );
    }

    #[test]
    fn test_resource_names() {
        assert_eq!(
            to_resource_name("com.acme.Messages_fr", "properties"),
            "com/acme/Messages_fr.properties"
        );
        assert_eq!(format_suffix("java.properties"), "properties");
        assert_eq!(format_suffix("compiled"), "compiled");
    }

    #[test]
    fn test_trait_defaults() {
        let control = Minimal;
        assert_eq!(control.formats("Messages"), vec!["compiled", "properties"]);
        assert_eq!(
            control.candidate_locales("Messages", &locale("fr-CH")),
            vec![locale("fr-CH"), locale("fr"), Locale::root()]
        );
        assert_eq!(control.fallback_locale("Messages", &locale("fr")), None);
        assert_eq!(control.time_to_live("Messages", &locale("fr")), TimeToLive::NoExpiration);
        assert_eq!(
            control.needs_reload("Messages", &locale("fr"), "compiled", None, &7, None),
            Ok(false)
        );
    }

    #[test]
    fn test_default_control_fallback() {
        let config = ResolverConfig::new(locale("en-US"));
        let control = DefaultControl::new(Recording::default(), config.clone());
        let fallback = <DefaultControl<Recording> as Control<String>>::fallback_locale(
            &control,
            "Messages",
            &locale("it-IT"),
        );
        assert_eq!(fallback, Some(locale("en-US")));

        let at_default = <DefaultControl<Recording> as Control<String>>::fallback_locale(
            &control,
            "Messages",
            &locale("en-US"),
        );
        assert_eq!(at_default, None);

        let disabled = DefaultControl::no_fallback(Recording::default(), config);
        let none = <DefaultControl<Recording> as Control<String>>::fallback_locale(
            &disabled,
            "Messages",
            &locale("it-IT"),
        );
        assert_eq!(none, None);
    }

    #[test]
    fn test_default_control_builds_request() {
        let control = DefaultControl::new(Recording::default(), ResolverConfig::default())
            .with_formats([FORMAT_PROPERTIES]);
        let formats =
            <DefaultControl<Recording> as Control<String>>::formats(&control, "app.Messages");
        assert_eq!(formats, vec!["properties"]);

        let bundle = <DefaultControl<Recording> as Control<String>>::new_bundle(
            &control,
            "app.Messages",
            &locale("fr-CH"),
            "properties",
            None,
            true,
        )
        .unwrap();
        assert_eq!(bundle.as_deref(), Some("app.Messages_fr_CH"));
        assert_eq!(
            control.materializer().requests.lock().as_slice(),
            &[(
                "app.Messages_fr_CH".to_string(),
                "app/Messages_fr_CH.properties".to_string(),
                true
            )]
        );
    }

    #[test]
    fn test_default_control_needs_reload_compares_times() {
        let control = DefaultControl::new(Recording::default(), ResolverConfig::default());
        let loaded = Utc::now();
        let bundle = String::new();
        let check = |control: &DefaultControl<Recording>, load_time| {
            control
                .needs_reload("Messages", &locale("fr"), "properties", None, &bundle, load_time)
                .unwrap()
        };

        assert!(!check(&control, Some(loaded)));

        *control.materializer().modified.lock() = Some(loaded - Duration::seconds(1));
        assert!(!check(&control, Some(loaded)));

        *control.materializer().modified.lock() = Some(loaded);
        assert!(check(&control, Some(loaded)));

        *control.materializer().modified.lock() = Some(loaded + Duration::seconds(1));
        assert!(check(&control, Some(loaded)));
        assert!(!check(&control, None));
    }
}

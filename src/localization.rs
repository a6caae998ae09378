//! # Localization Module
//!
//! Fluent-based UI strings. Ukrainian is the default language, English is
//! used for Telegram users whose client reports an English locale.

use anyhow::{anyhow, Result};
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use std::collections::HashMap;
use unic_langid::LanguageIdentifier;

/// Languages with a bundled `.ftl` resource
pub const SUPPORTED_LANGUAGES: &[&str] = &["uk", "en"];

/// Language used when the user's language is unknown or unsupported
pub const DEFAULT_LANGUAGE: &str = "uk";

const UK_RESOURCE: &str = include_str!("../locales/uk/main.ftl");
const EN_RESOURCE: &str = include_str!("../locales/en/main.ftl");

/// Localization manager holding one bundle per supported language
pub struct LocalizationManager {
    bundles: HashMap<&'static str, FluentBundle<FluentResource>>,
}

impl LocalizationManager {
    /// Create a localization manager from the bundled resources
    pub fn new() -> Result<Self> {
        let mut bundles = HashMap::new();
        bundles.insert("uk", Self::create_bundle("uk", UK_RESOURCE)?);
        bundles.insert("en", Self::create_bundle("en", EN_RESOURCE)?);
        Ok(Self { bundles })
    }

    /// Create a fluent bundle for a specific locale
    fn create_bundle(locale: &str, source: &str) -> Result<FluentBundle<FluentResource>> {
        let langid: LanguageIdentifier = locale.parse()?;
        let mut bundle = FluentBundle::new_concurrent(vec![langid]);
        // Isolation marks would end up verbatim in Telegram messages
        bundle.set_use_isolating(false);

        let resource = FluentResource::try_new(source.to_string())
            .map_err(|(_, errors)| anyhow!("invalid {locale} resource: {errors:?}"))?;
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow!("duplicate {locale} messages: {errors:?}"))?;

        Ok(bundle)
    }

    /// Get a localized message in the given language, falling back to the default
    pub fn get_message_in_language(
        &self,
        key: &str,
        language: &str,
        args: Option<&HashMap<&str, &str>>,
    ) -> String {
        let bundle = match self
            .bundles
            .get(language)
            .or_else(|| self.bundles.get(DEFAULT_LANGUAGE))
        {
            Some(bundle) => bundle,
            None => return format!("Missing translation: {key}"),
        };

        let msg = match bundle.get_message(key) {
            Some(msg) => msg,
            None => return format!("Missing translation: {key}"),
        };

        let pattern = match msg.value() {
            Some(pattern) => pattern,
            None => return format!("Missing value for key: {key}"),
        };

        let fluent_args = args.map(|args| {
            let mut fluent_args = FluentArgs::new();
            for (k, v) in args {
                fluent_args.set(*k, FluentValue::from(*v));
            }
            fluent_args
        });

        let mut errors = vec![];
        bundle
            .format_pattern(pattern, fluent_args.as_ref(), &mut errors)
            .into_owned()
    }

    /// Bind the manager to the language of one Telegram user
    pub fn for_language(&self, language_code: Option<&str>) -> Translator<'_> {
        Translator {
            manager: self,
            language: detect_language(language_code),
        }
    }
}

/// Map a Telegram `language_code` (e.g. "en-US") to a supported language
pub fn detect_language(language_code: Option<&str>) -> &'static str {
    let Some(code) = language_code else {
        return DEFAULT_LANGUAGE;
    };
    let primary = code
        .split(['-', '_'])
        .next()
        .unwrap_or_default()
        .to_lowercase();

    SUPPORTED_LANGUAGES
        .iter()
        .copied()
        .find(|lang| *lang == primary)
        .unwrap_or(DEFAULT_LANGUAGE)
}

/// Message lookup bound to one language
#[derive(Clone, Copy)]
pub struct Translator<'a> {
    manager: &'a LocalizationManager,
    language: &'static str,
}

impl Translator<'_> {
    pub fn language(&self) -> &'static str {
        self.language
    }

    /// Get a localized message
    pub fn t(&self, key: &str) -> String {
        self.manager.get_message_in_language(key, self.language, None)
    }

    /// Get a localized message with simple string arguments
    pub fn t_args(&self, key: &str, args: &[(&str, &str)]) -> String {
        let args_map: HashMap<&str, &str> = args.iter().cloned().collect();
        self.manager
            .get_message_in_language(key, self.language, Some(&args_map))
    }
}

use anyhow::{anyhow, Result};
use fluent_bundle::concurrent::FluentBundle;
use fluent_bundle::{FluentArgs, FluentResource, FluentValue};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock};
use tracing::{error, warn};
use unic_langid::LanguageIdentifier;

pub const DEFAULT_LANGUAGE: &str = "en";

/// Fluent sources compiled into the binary, one per supported language
const RESOURCES: &[(&str, &str)] = &[
    ("en", include_str!("../locales/en/main.ftl")),
    ("ru", include_str!("../locales/ru/main.ftl")),
];

/// Localization manager for the Tarot Bot
pub struct LocalizationManager {
    bundles: HashMap<String, Arc<FluentBundle<FluentResource>>>,
}

impl LocalizationManager {
    /// Create a new localization manager with all bundled languages
    pub fn new() -> Result<Self> {
        let mut bundles = HashMap::new();

        for (lang, source) in RESOURCES {
            let locale: LanguageIdentifier = lang.parse()?;
            let bundle = Self::create_bundle(&locale, source)?;
            bundles.insert(lang.to_string(), Arc::new(bundle));
        }

        Ok(Self { bundles })
    }

    /// Create a fluent bundle for a specific locale
    fn create_bundle(
        locale: &LanguageIdentifier,
        source: &str,
    ) -> Result<FluentBundle<FluentResource>> {
        let mut bundle = FluentBundle::new_concurrent(vec![locale.clone()]);
        bundle.set_use_isolating(false);

        let resource = FluentResource::try_new(source.to_string())
            .map_err(|(_, errors)| anyhow!("Invalid fluent resource for {locale}: {errors:?}"))?;
        bundle
            .add_resource(resource)
            .map_err(|errors| anyhow!("Duplicate fluent messages for {locale}: {errors:?}"))?;

        Ok(bundle)
    }

    /// Get a localized message in a language, falling back to English
    pub fn get_message_in_language(
        &self,
        key: &str,
        lang: &str,
        args: Option<&HashMap<&str, &str>>,
    ) -> String {
        let bundle = match self
            .bundles
            .get(lang)
            .or_else(|| self.bundles.get(DEFAULT_LANGUAGE))
        {
            Some(bundle) => bundle,
            None => return format!("Missing translation: {}", key),
        };

        let msg = match bundle.get_message(key) {
            Some(msg) => msg,
            None if lang != DEFAULT_LANGUAGE => {
                return self.get_message_in_language(key, DEFAULT_LANGUAGE, args)
            }
            None => return format!("Missing translation: {}", key),
        };

        let pattern = match msg.value() {
            Some(pattern) => pattern,
            None => return format!("Missing value for key: {}", key),
        };

        let mut value = String::new();
        let mut errors = vec![];

        if let Some(args) = args {
            let fluent_args = FluentArgs::from_iter(
                args.iter().map(|(k, v)| (*k, FluentValue::from(*v))),
            );
            let _ = bundle.write_pattern(&mut value, pattern, Some(&fluent_args), &mut errors);
        } else {
            let _ = bundle.write_pattern(&mut value, pattern, None, &mut errors);
        }

        if !errors.is_empty() {
            warn!(key, lang, errors = ?errors, "Fluent formatting errors");
        }

        value
    }

    /// Get a localized message with simple string arguments
    pub fn get_message_with_args(&self, key: &str, lang: &str, args: &[(&str, &str)]) -> String {
        let args_map: HashMap<&str, &str> = args.iter().cloned().collect();
        self.get_message_in_language(key, lang, Some(&args_map))
    }
}

/// Global localization instance
static LOCALIZATION_MANAGER: OnceLock<LocalizationManager> = OnceLock::new();

/// Initialize the global localization manager
pub fn init_localization() -> Result<()> {
    if LOCALIZATION_MANAGER.get().is_some() {
        return Ok(());
    }
    let manager = LocalizationManager::new()?;
    let _ = LOCALIZATION_MANAGER.set(manager);
    Ok(())
}

/// Get the global localization manager, initializing it on first use
pub fn get_localization_manager() -> &'static LocalizationManager {
    LOCALIZATION_MANAGER.get_or_init(|| {
        LocalizationManager::new().unwrap_or_else(|e| {
            error!(error = %e, "Failed to load localization resources");
            LocalizationManager {
                bundles: HashMap::new(),
            }
        })
    })
}

/// Map a Telegram language code to a supported language
pub fn detect_language(language_code: Option<&str>) -> &'static str {
    let primary = language_code
        .and_then(|code| code.split(['-', '_']).next())
        .map(|code| code.to_lowercase());

    match primary.as_deref() {
        Some("ru") => "ru",
        _ => DEFAULT_LANGUAGE,
    }
}

/// Convenience function to get a localized message
pub fn t_lang(key: &str, language_code: Option<&str>) -> String {
    get_localization_manager().get_message_in_language(key, detect_language(language_code), None)
}

/// Convenience function to get a localized message with arguments
pub fn t_args_lang(key: &str, args: &[(&str, &str)], language_code: Option<&str>) -> String {
    get_localization_manager().get_message_with_args(key, detect_language(language_code), args)
}

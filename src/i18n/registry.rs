//! Locale registry: the set of locales the host application recognizes.
//!
//! The content-group engine only needs to turn a locale descriptor into its
//! code; the registry backs the typed [`Locale`](crate::i18n::Locale) value
//! so callers can pass validated locales instead of raw strings.

use std::sync::OnceLock;

/// Configuration for a supported locale.
#[derive(Debug, Clone)]
pub struct LocaleConfig {
    /// Normalized locale code (e.g., "en", "es", "pt-BR")
    pub code: &'static str,

    /// English name of the locale (e.g., "English", "Catalan")
    pub name: &'static str,

    /// Native name of the locale (e.g., "English", "Català")
    pub native_name: &'static str,

    /// Whether this is the fallback locale of the application (only one should be true)
    pub is_default: bool,

    /// Whether this locale is enabled for use
    pub enabled: bool,
}

/// Global locale registry singleton.
pub struct LocaleRegistry {
    locales: Vec<LocaleConfig>,
}

/// Global registry instance (initialized lazily)
static REGISTRY: OnceLock<LocaleRegistry> = OnceLock::new();

impl LocaleRegistry {
    /// Get the global locale registry instance.
    pub fn get() -> &'static LocaleRegistry {
        REGISTRY.get_or_init(|| LocaleRegistry {
            locales: default_locales(),
        })
    }

    /// Get a locale configuration by its code.
    pub fn get_by_code(&self, code: &str) -> Option<&LocaleConfig> {
        self.locales.iter().find(|locale| locale.code == code)
    }

    /// Get all enabled locales.
    pub fn list_enabled(&self) -> Vec<&LocaleConfig> {
        self.locales.iter().filter(|locale| locale.enabled).collect()
    }
}

fn default_locales() -> Vec<LocaleConfig> {
    vec![
        LocaleConfig {
            code: "en",
            name: "English",
            native_name: "English",
            is_default: true,
            enabled: true,
        },
        LocaleConfig {
            code: "es",
            name: "Spanish",
            native_name: "Español",
            is_default: false,
            enabled: true,
        },
        LocaleConfig {
            code: "ca",
            name: "Catalan",
            native_name: "Català",
            is_default: false,
            enabled: true,
        },
        LocaleConfig {
            code: "fr",
            name: "French",
            native_name: "Français",
            is_default: false,
            enabled: true,
        },
        LocaleConfig {
            code: "pt-BR",
            name: "Brazilian Portuguese",
            native_name: "Português (Brasil)",
            is_default: false,
            enabled: false,
        },
    ]
}

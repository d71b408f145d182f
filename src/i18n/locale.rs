//! Locale values and descriptor normalization.
//!
//! Locales may reach the engine as raw code strings or as richer values; in
//! both cases what gets persisted is the normalized code string produced by
//! [`LocaleDescriptor::locale_code`].

use crate::error::{Error, Result};
use crate::i18n::{LocaleConfig, LocaleRegistry};
use regex::Regex;
use std::sync::OnceLock;

static CODE_REGEX: OnceLock<Regex> = OnceLock::new();

/// Anything that can be resolved to a canonical locale code.
pub trait LocaleDescriptor {
    /// Return the normalized code this descriptor stands for.
    fn locale_code(&self) -> Result<String>;
}

impl LocaleDescriptor for str {
    fn locale_code(&self) -> Result<String> {
        normalize_code(self)
    }
}

impl LocaleDescriptor for String {
    fn locale_code(&self) -> Result<String> {
        normalize_code(self)
    }
}

impl LocaleDescriptor for Locale {
    fn locale_code(&self) -> Result<String> {
        Ok(self.code.to_string())
    }
}

impl<T: LocaleDescriptor + ?Sized> LocaleDescriptor for &T {
    fn locale_code(&self) -> Result<String> {
        (**self).locale_code()
    }
}

/// Normalize a raw locale code.
///
/// Accepts `lang`, `lang-REGION` and `lang-Script-REGION` with either `-` or
/// `_` as separator. The language subtag is lower-cased, the script subtag
/// title-cased and the region subtag upper-cased: `"pt_br"` becomes `"pt-BR"`.
pub fn normalize_code(raw: &str) -> Result<String> {
    let regex = CODE_REGEX.get_or_init(|| {
        Regex::new(r"^([A-Za-z]{2,3})(?:[-_]([A-Za-z]{4}))?(?:[-_]([A-Za-z]{2}|[0-9]{3}))?$")
            .unwrap()
    });

    let trimmed = raw.trim();
    let caps = regex
        .captures(trimmed)
        .ok_or_else(|| Error::InvalidLocale(raw.to_string()))?;

    let mut code = caps[1].to_ascii_lowercase();
    if let Some(script) = caps.get(2) {
        let script = script.as_str();
        code.push('-');
        code.push_str(&script[..1].to_ascii_uppercase());
        code.push_str(&script[1..].to_ascii_lowercase());
    }
    if let Some(region) = caps.get(3) {
        code.push('-');
        code.push_str(&region.as_str().to_ascii_uppercase());
    }
    Ok(code)
}

/// A locale validated against the [`LocaleRegistry`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Locale {
    code: &'static str,
}

impl Locale {
    pub const ENGLISH: Locale = Locale { code: "en" };
    pub const SPANISH: Locale = Locale { code: "es" };
    pub const CATALAN: Locale = Locale { code: "ca" };

    /// Create a Locale from a code string.
    ///
    /// The code is normalized first, so `"EN"` and `"en"` resolve to the same
    /// locale. Unknown and disabled locales are rejected.
    pub fn from_code(code: &str) -> Result<Locale> {
        let normalized = normalize_code(code)?;

        match LocaleRegistry::get().get_by_code(&normalized) {
            Some(config) if config.enabled => Ok(Locale { code: config.code }),
            Some(_) => Err(Error::InvalidLocale(format!(
                "{} (not enabled)",
                normalized
            ))),
            None => Err(Error::InvalidLocale(format!("{} (unknown)", normalized))),
        }
    }

    pub fn code(&self) -> &'static str {
        self.code
    }

    /// # Panics
    /// Panics if the code is missing from the registry, which cannot happen
    /// for values built through `from_code` or the constants.
    pub fn config(&self) -> &'static LocaleConfig {
        LocaleRegistry::get()
            .get_by_code(self.code)
            .expect("Locale code should always be registered")
    }

    pub fn name(&self) -> &'static str {
        self.config().name
    }

    pub fn native_name(&self) -> &'static str {
        self.config().native_name
    }
}

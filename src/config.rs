use crate::i18n::normalize_code;
use crate::lifecycle::DEFAULT_SEQUENCE;
use anyhow::{Context, Result};

#[derive(Debug, Clone)]
pub struct Config {
    // Storage
    pub database_path: String,

    // Locales
    pub default_locale: Option<String>,

    // Content groups
    pub content_group_sequence: String,
    pub translation_timestamps: bool,

    // Schema
    pub schema_path: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        let default_locale = match std::env::var("DEFAULT_LOCALE") {
            Ok(raw) if !raw.trim().is_empty() => Some(
                normalize_code(&raw)
                    .with_context(|| format!("DEFAULT_LOCALE is not a locale code: {raw}"))?,
            ),
            _ => None,
        };

        let translation_timestamps = match std::env::var("TRANSLATION_TIMESTAMPS") {
            Ok(raw) => parse_flag(&raw)
                .with_context(|| format!("TRANSLATION_TIMESTAMPS must be true or false, got {raw}"))?,
            Err(_) => true,
        };

        Ok(Self {
            database_path: std::env::var("DATABASE_PATH")
                .unwrap_or_else(|_| "content.db".to_string()),

            default_locale,

            content_group_sequence: std::env::var("CONTENT_GROUP_SEQUENCE")
                .unwrap_or_else(|_| DEFAULT_SEQUENCE.to_string()),
            translation_timestamps,

            schema_path: std::env::var("SCHEMA_PATH")
                .unwrap_or_else(|_| "schema.json".to_string()),
        })
    }
}

fn parse_flag(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

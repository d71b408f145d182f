//! Internationalization (i18n) support for content groups.
//!
//! # Architecture
//!
//! - `registry`: the locales the host application recognizes
//! - `locale`: validated `Locale` values and the `LocaleDescriptor` normalization boundary
//! - `context`: the process-wide current locale used to default new rows
//! - `metrics`: counters for sibling sync and locale-resolved reads
//!
//! # Example
//!
//! ```rust,ignore
//! use content_groups::i18n::{self, Locale, LocaleDescriptor};
//!
//! let catalan = Locale::from_code("ca")?;
//! assert_eq!("pt_br".locale_code()?, "pt-BR");
//! i18n::set_current_locale(&catalan)?;
//! ```

mod context;
mod locale;
mod metrics;
mod registry;

pub use context::{clear_current_locale, current_locale, set_current_locale};
pub use locale::{normalize_code, Locale, LocaleDescriptor};
pub use metrics::{MetricsReport, SyncMetrics};
pub use registry::{LocaleConfig, LocaleRegistry};

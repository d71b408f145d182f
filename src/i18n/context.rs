//! Process-wide "current locale".
//!
//! Host applications set this once per request or job; the create pipeline
//! reads it to default the locale of rows that arrive without one.

use crate::error::{Error, Result};
use crate::i18n::LocaleDescriptor;
use std::sync::RwLock;

static CURRENT: RwLock<Option<String>> = RwLock::new(None);

/// Set the current locale, normalizing the descriptor first.
pub fn set_current_locale<L: LocaleDescriptor + ?Sized>(locale: &L) -> Result<()> {
    let code = locale.locale_code()?;
    let mut current = CURRENT.write().map_err(|_| Error::LockPoisoned)?;
    *current = Some(code);
    Ok(())
}

/// The current locale code, if one has been set.
pub fn current_locale() -> Result<Option<String>> {
    read_current(&CURRENT)
}

pub fn clear_current_locale() -> Result<()> {
    let mut current = CURRENT.write().map_err(|_| Error::LockPoisoned)?;
    *current = None;
    Ok(())
}

fn read_current(lock: &RwLock<Option<String>>) -> Result<Option<String>> {
    let current = lock.read().map_err(|_| Error::LockPoisoned)?;
    Ok(current.clone())
}

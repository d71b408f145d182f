//! Error types for the content-group engine.

use thiserror::Error;

/// Result type for content-group operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while declaring, writing or reading content groups.
#[derive(Debug, Error)]
pub enum Error {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// A locale descriptor could not be normalized to a code.
    #[error("invalid locale: {0:?}")]
    InvalidLocale(String),

    /// An entity declaration failed validation.
    #[error("invalid declaration for '{entity}': {}", errors.join("; "))]
    InvalidDeclaration { entity: String, errors: Vec<String> },

    /// No entity type is registered under this name.
    #[error("unknown entity type: {0}")]
    UnknownEntity(String),

    /// A field that is not a column of the entity's table.
    #[error("unknown field '{field}' on '{entity}'")]
    UnknownField { entity: String, field: String },

    /// A locale-scoped operation on a type that was not declared translatable.
    #[error("entity type '{0}' is not translatable")]
    NotTranslatable(String),

    /// An update or delete on a row that was never inserted.
    #[error("row of '{0}' has not been persisted")]
    NotPersisted(String),

    /// The sequence allocator could not issue a value.
    #[error("sequence '{name}' failed: {reason}")]
    Sequence { name: String, reason: String },

    /// The shared connection mutex was poisoned by a panicking writer.
    #[error("database connection lock poisoned")]
    LockPoisoned,
}

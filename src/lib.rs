//! Multi-locale content groups on SQLite.
//!
//! Rows of a translatable entity type that describe the same piece of
//! content share a `content_group_id`, one row per locale. Fields are
//! partitioned into translatable (per locale), global (per row) and ordinary
//! (shared by the whole group); writes keep ordinary fields equal across the
//! group, and reads can collapse each group to its best-matching locale.

pub mod config;
pub mod db;
pub mod error;
pub mod i18n;
pub mod lifecycle;
pub mod query;
pub mod row;
pub mod schema;
pub mod sequence;
pub mod sync;
pub mod translation;

pub use db::Database;
pub use error::{Error, Result};
pub use i18n::{Locale, LocaleDescriptor};
pub use lifecycle::{ContentStore, Stage};
pub use query::{Condition, Direction, LocaleRequest, Query, ALL};
pub use row::{Row, Value};
pub use schema::{EntityDecl, EntityType, FieldClass, RegistryOptions, TypeRegistry};
pub use sequence::SequenceAllocator;
pub use sync::{SyncEngine, SyncScope, WriteKind};
pub use translation::TranslationFactory;

//! Per-type field classification.

use crate::sync::SyncScope;
use serde::Serialize;

/// Storage-assigned row identifier column.
pub const ID_FIELD: &str = "id";
/// Name of the entity type a row was written as. Subtypes may share their
/// parent's table, so every read and bulk write filters on it.
pub const TYPE_FIELD: &str = "entity_type";
/// Locale column of translatable tables.
pub const LOCALE_FIELD: &str = "locale";
/// Content-group column of translatable tables.
pub const CONTENT_GROUP_FIELD: &str = "content_group_id";
/// Implicit per-translation creation timestamp.
pub const CREATED_AT_FIELD: &str = "created_at";
/// Implicit per-translation modification timestamp.
pub const UPDATED_AT_FIELD: &str = "updated_at";

/// Global fields every type starts with.
pub const BASE_GLOBAL_FIELDS: [&str; 2] = [LOCALE_FIELD, CONTENT_GROUP_FIELD];

/// How a field behaves across the rows of one content group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FieldClass {
    /// May differ between locale rows.
    Translatable,
    /// Always per-row; never synchronized.
    Global,
    /// Kept identical across the group.
    Ordinary,
}

/// A registered entity type.
///
/// Built by [`TypeRegistry`](crate::schema::TypeRegistry) from a declaration
/// plus a snapshot of the parent type taken at registration time.
#[derive(Debug, Clone)]
pub struct EntityType {
    pub(crate) name: String,
    pub(crate) table: String,
    pub(crate) parent: Option<String>,
    pub(crate) columns: Vec<String>,
    pub(crate) translatable: Vec<String>,
    pub(crate) global: Vec<String>,
    pub(crate) sync_scopes: Vec<SyncScope>,
    pub(crate) is_translatable: bool,
    pub(crate) timestamps: bool,
}

impl EntityType {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn parent(&self) -> Option<&str> {
        self.parent.as_deref()
    }

    /// Declared data columns, excluding `id`, `locale` and `content_group_id`.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    /// Translatable fields in declaration order, ancestors first.
    pub fn translatable_fields(&self) -> &[String] {
        &self.translatable
    }

    pub fn global_fields(&self) -> &[String] {
        &self.global
    }

    pub fn sync_scopes(&self) -> &[SyncScope] {
        &self.sync_scopes
    }

    pub fn is_translatable(&self) -> bool {
        self.is_translatable
    }

    /// Whether the implicit `created_at`/`updated_at` pair was added.
    pub fn has_translation_timestamps(&self) -> bool {
        self.timestamps
    }

    /// Classify a field. The row identifier and type column count as global.
    pub fn classify(&self, field: &str) -> FieldClass {
        if field == ID_FIELD || field == TYPE_FIELD || self.global.iter().any(|f| f == field) {
            FieldClass::Global
        } else if self.translatable.iter().any(|f| f == field) {
            FieldClass::Translatable
        } else {
            FieldClass::Ordinary
        }
    }

    /// Declared columns that must stay synchronized across the group.
    pub fn ordinary_fields(&self) -> impl Iterator<Item = &str> {
        self.columns
            .iter()
            .map(String::as_str)
            .filter(|field| self.classify(field) == FieldClass::Ordinary)
    }

    /// Whether `field` names a column of this type's table.
    pub fn has_column(&self, field: &str) -> bool {
        field == ID_FIELD
            || field == TYPE_FIELD
            || (self.is_translatable && BASE_GLOBAL_FIELDS.contains(&field))
            || self.columns.iter().any(|c| c == field)
    }
}

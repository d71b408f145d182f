//! Type registry: entity declarations and inheritance.
//!
//! A subtype is derived by copying its parent's registered [`EntityType`] and
//! appending the subtype's own declarations. The copy is a snapshot:
//! extending the parent afterwards does not reach subtypes that already exist.

use crate::error::{Error, Result};
use crate::schema::partition::{
    EntityType, BASE_GLOBAL_FIELDS, CREATED_AT_FIELD, UPDATED_AT_FIELD,
};
use crate::schema::validator::DeclarationValidator;
use crate::sync::SyncScope;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{debug, warn};

fn default_true() -> bool {
    true
}

/// Declaration of an entity type, as written by the host application or
/// loaded from a schema file.
#[derive(Debug, Clone, Deserialize)]
pub struct EntityDecl {
    pub name: String,
    #[serde(default)]
    pub parent: Option<String>,
    /// Defaults to the parent's table, or to `name` for root types.
    #[serde(default)]
    pub table: Option<String>,
    /// Columns added by this declaration.
    #[serde(default)]
    pub fields: Vec<String>,
    /// `Some` marks the type translatable and appends these fields.
    #[serde(default)]
    pub translatable: Option<Vec<String>>,
    /// Extra always-per-row fields added by this declaration.
    #[serde(default)]
    pub global: Vec<String>,
    /// Add the implicit `created_at`/`updated_at` pair when declaring translatable.
    #[serde(default = "default_true")]
    pub timestamps: bool,
    #[serde(default)]
    pub sync_scopes: Vec<SyncScope>,
}

impl EntityDecl {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            parent: None,
            table: None,
            fields: Vec::new(),
            translatable: None,
            global: Vec::new(),
            timestamps: true,
            sync_scopes: Vec::new(),
        }
    }

    pub fn parent(mut self, parent: impl Into<String>) -> Self {
        self.parent = Some(parent.into());
        self
    }

    pub fn table(mut self, table: impl Into<String>) -> Self {
        self.table = Some(table.into());
        self
    }

    pub fn fields<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn translatable<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.translatable
            .get_or_insert_with(Vec::new)
            .extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn global<I, S>(mut self, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.global.extend(fields.into_iter().map(Into::into));
        self
    }

    pub fn without_timestamps(mut self) -> Self {
        self.timestamps = false;
        self
    }

    pub fn sync_scope(mut self, scope: SyncScope) -> Self {
        self.sync_scopes.push(scope);
        self
    }
}

/// Registry-wide declaration options.
#[derive(Debug, Clone, Copy)]
pub struct RegistryOptions {
    /// When false, no translatable declaration adds the implicit timestamp pair.
    pub translation_timestamps: bool,
}

impl Default for RegistryOptions {
    fn default() -> Self {
        Self {
            translation_timestamps: true,
        }
    }
}

/// Registered entity types keyed by name.
#[derive(Debug, Clone, Default)]
pub struct TypeRegistry {
    types: HashMap<String, EntityType>,
    options: RegistryOptions,
}

impl TypeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_options(options: RegistryOptions) -> Self {
        Self {
            types: HashMap::new(),
            options,
        }
    }

    /// Register a declaration, deriving from its parent if it names one.
    pub fn register(&mut self, decl: EntityDecl) -> Result<&EntityType> {
        if self.types.contains_key(&decl.name) {
            return Err(invalid(&decl.name, "type is already registered".to_string()));
        }

        let parent = match &decl.parent {
            Some(parent) => Some(
                self.types
                    .get(parent)
                    .cloned()
                    .ok_or_else(|| invalid(&decl.name, format!("unknown parent '{}'", parent)))?,
            ),
            None => None,
        };

        let entity = self.derive(&decl, parent.as_ref());
        let report = DeclarationValidator::validate(&entity, parent.as_ref());
        for warning in &report.warnings {
            warn!(entity = %entity.name, "{}", warning);
        }
        if report.has_errors() {
            return Err(Error::InvalidDeclaration {
                entity: entity.name,
                errors: report.errors,
            });
        }

        debug!(
            entity = %entity.name,
            table = %entity.table,
            translatable = ?entity.translatable,
            "Registered entity type"
        );
        let name = entity.name.clone();
        Ok(self.types.entry(name).or_insert(entity))
    }

    fn derive(&self, decl: &EntityDecl, parent: Option<&EntityType>) -> EntityType {
        let mut entity = match parent {
            Some(parent) => EntityType {
                name: decl.name.clone(),
                parent: Some(parent.name.clone()),
                ..parent.clone()
            },
            None => EntityType {
                name: decl.name.clone(),
                table: decl.name.clone(),
                parent: None,
                columns: Vec::new(),
                translatable: Vec::new(),
                global: BASE_GLOBAL_FIELDS.iter().map(|f| f.to_string()).collect(),
                sync_scopes: Vec::new(),
                is_translatable: false,
                timestamps: false,
            },
        };

        if let Some(table) = &decl.table {
            entity.table = table.clone();
        }
        entity.columns.extend(decl.fields.iter().cloned());
        entity.global.extend(decl.global.iter().cloned());
        entity.sync_scopes.extend(decl.sync_scopes.iter().cloned());

        if let Some(fields) = &decl.translatable {
            entity.is_translatable = true;
            entity.translatable.extend(fields.iter().cloned());

            if decl.timestamps && self.options.translation_timestamps {
                entity.timestamps = true;
                for stamp in [CREATED_AT_FIELD, UPDATED_AT_FIELD] {
                    if !entity.columns.iter().any(|c| c == stamp) {
                        entity.columns.push(stamp.to_string());
                    }
                    if !entity.translatable.iter().any(|f| f == stamp) {
                        entity.translatable.push(stamp.to_string());
                    }
                }
            }
        }

        entity
    }

    /// Append a global field to an already registered type.
    ///
    /// Only `entity` itself changes; subtypes registered earlier keep the
    /// list they copied at derivation.
    pub fn add_global_field(&mut self, entity: &str, field: &str) -> Result<()> {
        let target = self
            .types
            .get_mut(entity)
            .ok_or_else(|| Error::UnknownEntity(entity.to_string()))?;

        let mut candidate = target.clone();
        candidate.global.push(field.to_string());
        let report = DeclarationValidator::validate(&candidate, None);
        if report.has_errors() {
            return Err(Error::InvalidDeclaration {
                entity: entity.to_string(),
                errors: report.errors,
            });
        }

        *target = candidate;
        Ok(())
    }

    /// Append a sync scope to an already registered type.
    pub fn add_sync_scope(&mut self, entity: &str, scope: SyncScope) -> Result<()> {
        self.types
            .get_mut(entity)
            .ok_or_else(|| Error::UnknownEntity(entity.to_string()))?
            .sync_scopes
            .push(scope);
        Ok(())
    }

    pub fn get(&self, name: &str) -> Result<&EntityType> {
        self.types
            .get(name)
            .ok_or_else(|| Error::UnknownEntity(name.to_string()))
    }

    pub fn entity_types(&self) -> impl Iterator<Item = &EntityType> {
        self.types.values()
    }
}

fn invalid(entity: &str, error: String) -> Error {
    Error::InvalidDeclaration {
        entity: entity.to_string(),
        errors: vec![error],
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::FieldClass;
    use proptest::prelude::*;

    fn no_timestamps() -> TypeRegistry {
        TypeRegistry::with_options(RegistryOptions {
            translation_timestamps: false,
        })
    }

    // ==================== Inheritance Tests ====================

    #[test]
    fn test_translatable_fields_concatenate_along_ancestors() {
        let mut registry = no_timestamps();
        registry
            .register(EntityDecl::new("t").fields(["a", "b", "c", "d", "e"]).translatable(["a", "b"]))
            .unwrap();
        registry
            .register(EntityDecl::new("t1").parent("t").translatable(["c", "d"]))
            .unwrap();
        registry
            .register(EntityDecl::new("t2").parent("t1").translatable(["e"]))
            .unwrap();

        assert_eq!(registry.get("t").unwrap().translatable_fields(), ["a", "b"]);
        assert_eq!(
            registry.get("t1").unwrap().translatable_fields(),
            ["a", "b", "c", "d"]
        );
        assert_eq!(
            registry.get("t2").unwrap().translatable_fields(),
            ["a", "b", "c", "d", "e"]
        );
    }

    #[test]
    fn test_subtype_shares_parent_table_and_columns() {
        let mut registry = no_timestamps();
        registry
            .register(
                EntityDecl::new("article")
                    .table("articles")
                    .fields(["title", "price"])
                    .translatable(["title"]),
            )
            .unwrap();
        let news = registry
            .register(EntityDecl::new("news").parent("article").fields(["source"]))
            .unwrap();

        assert_eq!(news.table(), "articles");
        assert_eq!(news.columns(), ["title", "price", "source"]);
        assert!(news.is_translatable());
        assert_eq!(news.parent(), Some("article"));
        assert_eq!(news.classify("source"), FieldClass::Ordinary);
    }

    #[test]
    fn test_global_fields_are_snapshot_at_derivation() {
        let mut registry = no_timestamps();
        registry
            .register(EntityDecl::new("article").fields(["title", "slug", "sku"]).translatable(["title"]))
            .unwrap();
        registry.add_global_field("article", "slug").unwrap();
        registry
            .register(EntityDecl::new("news").parent("article"))
            .unwrap();
        registry.add_global_field("article", "sku").unwrap();

        let article = registry.get("article").unwrap();
        let news = registry.get("news").unwrap();
        assert_eq!(article.global_fields(), ["locale", "content_group_id", "slug", "sku"]);
        assert_eq!(news.global_fields(), ["locale", "content_group_id", "slug"]);
        assert_eq!(news.classify("sku"), FieldClass::Ordinary);
        assert_eq!(article.classify("sku"), FieldClass::Global);
    }

    #[test]
    fn test_duplicates_accumulate() {
        let mut registry = no_timestamps();
        registry
            .register(EntityDecl::new("t").fields(["a"]).translatable(["a"]))
            .unwrap();
        let sub = registry
            .register(EntityDecl::new("t1").parent("t").translatable(["a"]))
            .unwrap();
        assert_eq!(sub.translatable_fields(), ["a", "a"]);
    }

    #[test]
    fn test_add_sync_scope_appends_to_one_type() {
        let mut registry = no_timestamps();
        registry
            .register(
                EntityDecl::new("article")
                    .fields(["title", "status"])
                    .translatable(["title"])
                    .sync_scope(SyncScope::literal("status <> 'draft'")),
            )
            .unwrap();
        registry
            .register(EntityDecl::new("news").parent("article"))
            .unwrap();

        registry
            .add_sync_scope("article", SyncScope::literal("status <> 'archived'"))
            .unwrap();
        assert_eq!(registry.get("article").unwrap().sync_scopes().len(), 2);
        assert_eq!(registry.get("news").unwrap().sync_scopes().len(), 1);

        assert!(matches!(
            registry.add_sync_scope("nope", SyncScope::literal("1 = 1")),
            Err(Error::UnknownEntity(_))
        ));
    }

    // ==================== Timestamp Tests ====================

    #[test]
    fn test_translatable_adds_timestamp_pair() {
        let mut registry = TypeRegistry::new();
        let article = registry
            .register(EntityDecl::new("article").fields(["title"]).translatable(["title"]))
            .unwrap();

        assert!(article.has_translation_timestamps());
        assert_eq!(
            article.translatable_fields(),
            ["title", "created_at", "updated_at"]
        );
        assert_eq!(article.columns(), ["title", "created_at", "updated_at"]);
    }

    #[test]
    fn test_timestamps_suppressed_per_declaration() {
        let mut registry = TypeRegistry::new();
        let article = registry
            .register(
                EntityDecl::new("article")
                    .fields(["title"])
                    .translatable(["title"])
                    .without_timestamps(),
            )
            .unwrap();
        assert!(!article.has_translation_timestamps());
        assert_eq!(article.translatable_fields(), ["title"]);
    }

    #[test]
    fn test_non_translatable_type_has_no_timestamps() {
        let mut registry = TypeRegistry::new();
        let tag = registry.register(EntityDecl::new("tag").fields(["label"])).unwrap();
        assert!(!tag.is_translatable());
        assert!(tag.translatable_fields().is_empty());
        assert_eq!(tag.columns(), ["label"]);
    }

    // ==================== Error Tests ====================

    #[test]
    fn test_unknown_parent() {
        let mut registry = TypeRegistry::new();
        let err = registry
            .register(EntityDecl::new("news").parent("article"))
            .unwrap_err();
        assert!(err.to_string().contains("unknown parent 'article'"));
    }

    #[test]
    fn test_duplicate_registration() {
        let mut registry = TypeRegistry::new();
        registry.register(EntityDecl::new("tag")).unwrap();
        assert!(registry.register(EntityDecl::new("tag")).is_err());
    }

    #[test]
    fn test_invalid_global_field_rejected() {
        let mut registry = no_timestamps();
        registry
            .register(EntityDecl::new("article").fields(["title"]).translatable(["title"]))
            .unwrap();
        assert!(registry.add_global_field("article", "missing").is_err());
        assert!(registry.add_global_field("article", "title").is_err());
        assert!(registry.add_global_field("nope", "title").is_err());
        assert_eq!(
            registry.get("article").unwrap().global_fields(),
            ["locale", "content_group_id"]
        );
    }

    #[test]
    fn test_get_unknown() {
        let registry = TypeRegistry::new();
        assert!(matches!(registry.get("x"), Err(Error::UnknownEntity(_))));
    }

    #[test]
    fn test_decl_deserializes_from_json() {
        let decl: EntityDecl = serde_json::from_str(
            r#"{"name": "article", "table": "articles", "fields": ["title", "status"],
                "translatable": ["title"], "sync_scopes": ["status = 'published'"]}"#,
        )
        .unwrap();
        assert_eq!(decl.table.as_deref(), Some("articles"));
        assert!(decl.timestamps);
        assert_eq!(decl.sync_scopes.len(), 1);

        let mut registry = TypeRegistry::new();
        let article = registry.register(decl).unwrap();
        assert_eq!(article.sync_scopes().len(), 1);
    }

    // ==================== Property Tests ====================

    proptest! {
        #[test]
        fn prop_subtype_list_is_ordered_concatenation(
            levels in proptest::collection::vec(
                proptest::collection::vec("f_[a-z]{1,4}", 0..4), 1..5)
        ) {
            let mut registry = no_timestamps();
            let all: Vec<String> = levels.iter().flatten().cloned().collect();
            let mut columns = all.clone();
            columns.sort();
            columns.dedup();

            let mut expected = Vec::new();
            for (depth, fields) in levels.iter().enumerate() {
                let name = format!("t{}", depth);
                let mut decl = EntityDecl::new(name.clone()).translatable(fields.clone());
                if depth == 0 {
                    decl = decl.fields(columns.clone());
                } else {
                    decl = decl.parent(format!("t{}", depth - 1));
                }
                registry.register(decl).unwrap();

                expected.extend(fields.iter().cloned());
                prop_assert_eq!(registry.get(&name).unwrap().translatable_fields(), &expected[..]);
            }
        }
    }
}

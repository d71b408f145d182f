//! Create and update pipelines for content-group rows.
//!
//! Writes go through [`ContentStore`], which runs a fixed list of [`Stage`]s.
//! Preparatory stages work on a staged copy of the row; the sibling sync and
//! the row's own write share one transaction, so either both commit or the
//! group is left as it was. The caller's row is only updated after commit.

use crate::db::{self, Database};
use crate::error::{Error, Result};
use crate::i18n::{current_locale, LocaleDescriptor, SyncMetrics};
use crate::query::Query;
use crate::row::{Row, Value};
use crate::schema::{EntityDecl, EntityType, TypeRegistry, CREATED_AT_FIELD, UPDATED_AT_FIELD};
use crate::sequence::SequenceAllocator;
use crate::sync::{SyncEngine, WriteKind};
use crate::translation::TranslationFactory;
use chrono::{SecondsFormat, Utc};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Default sequence for content-group ids.
pub const DEFAULT_SEQUENCE: &str = "content_group_id";

/// One step of a write pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    /// Allocate a content-group id when the row has none.
    AssignContentGroup,
    /// Fill a missing locale from the current locale, then the store default.
    AssignLocale,
    /// Stamp the implicit translation timestamps.
    TouchTimestamps,
    /// Propagate ordinary fields to the rest of the group.
    SyncSiblings,
    /// Insert or update the row itself.
    Persist,
}

impl Stage {
    pub const CREATE: &'static [Stage] = &[
        Stage::AssignContentGroup,
        Stage::AssignLocale,
        Stage::TouchTimestamps,
        Stage::SyncSiblings,
        Stage::Persist,
    ];

    pub const UPDATE: &'static [Stage] = &[Stage::TouchTimestamps, Stage::SyncSiblings, Stage::Persist];

    /// Stages that must run inside the write transaction.
    pub fn is_transactional(self) -> bool {
        matches!(self, Stage::SyncSiblings | Stage::Persist)
    }

    pub fn pipeline(kind: WriteKind) -> &'static [Stage] {
        match kind {
            WriteKind::Create => Self::CREATE,
            WriteKind::Update => Self::UPDATE,
        }
    }
}

/// Registered entity types bound to a database.
pub struct ContentStore {
    db: Database,
    registry: TypeRegistry,
    allocator: Arc<dyn SequenceAllocator>,
    sequence: String,
    default_locale: Option<String>,
}

impl ContentStore {
    /// Bind `registry` to `db`, provisioning a table for every registered type.
    ///
    /// Content-group ids come from `db`'s own sequence table.
    pub fn new(db: Database, registry: TypeRegistry) -> Result<Self> {
        for entity in registry.entity_types() {
            db.ensure_table(entity)?;
        }

        Ok(Self {
            allocator: Arc::new(db.clone()),
            db,
            registry,
            sequence: DEFAULT_SEQUENCE.to_string(),
            default_locale: None,
        })
    }

    pub fn with_allocator(mut self, allocator: Arc<dyn SequenceAllocator>) -> Self {
        self.allocator = allocator;
        self
    }

    pub fn with_sequence(mut self, name: impl Into<String>) -> Self {
        self.sequence = name.into();
        self
    }

    /// Locale used when neither the row nor the current locale supplies one.
    pub fn with_default_locale<L: LocaleDescriptor + ?Sized>(mut self, locale: &L) -> Result<Self> {
        self.default_locale = Some(locale.locale_code()?);
        Ok(self)
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn registry(&self) -> &TypeRegistry {
        &self.registry
    }

    pub fn default_locale(&self) -> Option<&str> {
        self.default_locale.as_deref()
    }

    /// Register a declaration and provision its table.
    pub fn register(&mut self, decl: EntityDecl) -> Result<&EntityType> {
        let name = decl.name.clone();
        let entity = self.registry.register(decl)?;
        self.db.ensure_table(entity)?;
        self.registry.get(&name)
    }

    pub fn entity(&self, name: &str) -> Result<&EntityType> {
        self.registry.get(name)
    }

    /// Run the create pipeline for `row`.
    ///
    /// On success `row` carries its new id and any assigned group, locale
    /// and timestamps. On failure it is left untouched.
    pub fn create(&self, row: &mut Row) -> Result<()> {
        self.write(row, WriteKind::Create)
    }

    /// Run the update pipeline for a persisted `row`.
    pub fn update(&self, row: &mut Row) -> Result<()> {
        if !row.is_persisted() {
            return Err(Error::NotPersisted(row.entity().to_string()));
        }
        self.write(row, WriteKind::Update)
    }

    fn write(&self, row: &mut Row, kind: WriteKind) -> Result<()> {
        let entity = self.registry.get(row.entity())?;
        let pipeline = Stage::pipeline(kind);
        let split = pipeline
            .iter()
            .position(|stage| stage.is_transactional())
            .unwrap_or(pipeline.len());
        let (prepare, write) = pipeline.split_at(split);

        let mut staged = row.clone();
        for stage in prepare {
            debug!(entity = %entity.name(), ?stage, "Running stage");
            self.prepare(*stage, entity, &mut staged, kind)?;
        }

        let result = self.db.transaction(|tx| {
            let mut inserted = None;
            for stage in write {
                debug!(entity = %entity.name(), ?stage, "Running stage");
                match stage {
                    Stage::SyncSiblings => {
                        SyncEngine::on_write(tx, entity, &staged, kind)?;
                    }
                    Stage::Persist => match kind {
                        WriteKind::Create => inserted = Some(db::insert_row(tx, entity, &staged)?),
                        WriteKind::Update => db::update_row(tx, entity, &staged)?,
                    },
                    _ => {}
                }
            }
            Ok(inserted)
        });

        match result {
            Ok(inserted) => {
                if let Some(id) = inserted {
                    staged.set_id(id);
                }
                info!(
                    entity = %entity.name(),
                    id = ?staged.id(),
                    content_group_id = ?staged.content_group_id(),
                    locale = ?staged.locale(),
                    ?kind,
                    "Saved row"
                );
                *row = staged;
                Ok(())
            }
            Err(e) => {
                SyncMetrics::global().record_failed_write();
                warn!(entity = %entity.name(), ?kind, error = %e, "Write rolled back");
                Err(e)
            }
        }
    }

    fn prepare(&self, stage: Stage, entity: &EntityType, row: &mut Row, kind: WriteKind) -> Result<()> {
        match stage {
            Stage::AssignContentGroup => {
                if entity.is_translatable() && row.content_group_id().is_none() {
                    let content_group_id = self.allocator.next_value(&self.sequence)?;
                    row.set_content_group_id(content_group_id);
                }
            }
            Stage::AssignLocale => {
                if entity.is_translatable() && row.locale().is_none() {
                    if let Some(code) = current_locale()?.or_else(|| self.default_locale.clone()) {
                        row.set_locale(code.as_str())?;
                    }
                }
            }
            Stage::TouchTimestamps => {
                if entity.has_translation_timestamps() {
                    let now = Value::Text(Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true));
                    if kind == WriteKind::Create && row.get(CREATED_AT_FIELD).is_none() {
                        row.set(CREATED_AT_FIELD, now.clone());
                    }
                    row.set(UPDATED_AT_FIELD, now);
                }
            }
            Stage::SyncSiblings | Stage::Persist => {}
        }
        Ok(())
    }

    pub fn find(&self, entity: &str, id: i64) -> Result<Option<Row>> {
        self.db.find(self.registry.get(entity)?, id)
    }

    pub fn fetch(&self, query: &Query) -> Result<Vec<Row>> {
        self.db.fetch(self.registry.get(query.entity())?, query)
    }

    pub fn select_ids(&self, query: &Query) -> Result<Vec<i64>> {
        self.db.select_ids(self.registry.get(query.entity())?, query)
    }

    /// All rows of one content group, lowest id first.
    pub fn group(&self, entity: &str, content_group_id: i64) -> Result<Vec<Row>> {
        self.db.group_rows(self.registry.get(entity)?, content_group_id)
    }

    /// Build an unsaved translation; see [`TranslationFactory::translate`].
    pub fn translate<L: LocaleDescriptor + ?Sized>(
        &self,
        entity: &str,
        content_group_id: i64,
        locale: &L,
    ) -> Result<Row> {
        TranslationFactory::translate(&self.db, self.registry.get(entity)?, content_group_id, locale)
    }

    /// Delete one row. The rest of its group is kept.
    pub fn delete(&self, row: &Row) -> Result<bool> {
        let id = row
            .id()
            .ok_or_else(|| Error::NotPersisted(row.entity().to_string()))?;
        self.db.delete(self.registry.get(row.entity())?, id)
    }
}

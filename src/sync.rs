//! Ordinary-field propagation across a content group.
//!
//! On every write of a translatable row, the ordinary fields of that row are
//! copied onto every other row with the same `content_group_id`, narrowed by
//! the type's sync scopes. Translatable and global fields are never touched.
//! [`SyncEngine::on_write`] must run on the same transaction as the row's own
//! insert or update.

use crate::db;
use crate::error::Result;
use crate::i18n::SyncMetrics;
use crate::query::Condition;
use crate::row::{Row, Value};
use crate::schema::{EntityType, CONTENT_GROUP_FIELD, ID_FIELD};
use rusqlite::Connection;
use serde::{Deserialize, Deserializer};
use std::fmt;
use std::sync::Arc;
use tracing::debug;

/// A function of the written row producing the sibling restriction.
pub type ScopeFn = dyn Fn(&Row) -> Condition + Send + Sync;

/// Restricts which siblings receive propagated values.
#[derive(Clone)]
pub enum SyncScope {
    /// A fixed condition.
    Literal(Condition),
    /// A condition computed from the row being written.
    Dynamic(Arc<ScopeFn>),
}

impl SyncScope {
    /// A literal SQL condition, e.g. `"status = 'published'"`.
    pub fn literal(sql: impl Into<String>) -> Self {
        SyncScope::Literal(Condition::raw(sql))
    }

    pub fn condition(condition: Condition) -> Self {
        SyncScope::Literal(condition)
    }

    pub fn dynamic<F>(scope: F) -> Self
    where
        F: Fn(&Row) -> Condition + Send + Sync + 'static,
    {
        SyncScope::Dynamic(Arc::new(scope))
    }

    /// The condition this scope contributes for `row`.
    pub fn resolve(&self, row: &Row) -> Condition {
        match self {
            SyncScope::Literal(condition) => condition.clone(),
            SyncScope::Dynamic(scope) => scope(row),
        }
    }
}

impl fmt::Debug for SyncScope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncScope::Literal(condition) => f.debug_tuple("Literal").field(condition).finish(),
            SyncScope::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

/// Schema files carry literal scopes as SQL strings.
impl<'de> Deserialize<'de> for SyncScope {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        String::deserialize(deserializer).map(SyncScope::literal)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteKind {
    Create,
    Update,
}

/// A bulk update against the siblings of one row.
#[derive(Debug, Clone, PartialEq)]
pub struct SiblingUpdate {
    pub conditions: Vec<Condition>,
    pub assignments: Vec<(String, Value)>,
}

pub struct SyncEngine;

impl SyncEngine {
    /// Work out the sibling update for `row`, if one is needed.
    ///
    /// Returns `None` for non-translatable types, rows without a content
    /// group and writes that carry no ordinary field.
    ///
    /// A create inserts every column, so ordinary columns missing from `row`
    /// propagate as NULL. An update only writes the fields `row` carries, so
    /// only those propagate.
    pub fn plan(entity: &EntityType, row: &Row, kind: WriteKind) -> Option<SiblingUpdate> {
        if !entity.is_translatable() {
            return None;
        }
        let content_group_id = row.content_group_id()?;

        let assignments: Vec<(String, Value)> = entity
            .ordinary_fields()
            .filter_map(|field| match (row.get(field), kind) {
                (Some(value), _) => Some((field.to_string(), value.clone())),
                (None, WriteKind::Create) => Some((field.to_string(), Value::Null)),
                (None, WriteKind::Update) => None,
            })
            .collect();
        if assignments.is_empty() {
            return None;
        }

        let mut conditions = vec![Condition::eq(CONTENT_GROUP_FIELD, content_group_id)];
        if let Some(id) = row.id() {
            conditions.push(Condition::ne(ID_FIELD, id));
        }
        conditions.extend(entity.sync_scopes().iter().map(|scope| scope.resolve(row)));

        Some(SiblingUpdate {
            conditions,
            assignments,
        })
    }

    /// Propagate `row`'s ordinary fields to its siblings on `conn`.
    ///
    /// Returns the number of sibling rows updated.
    pub fn on_write(
        conn: &Connection,
        entity: &EntityType,
        row: &Row,
        kind: WriteKind,
    ) -> Result<usize> {
        let Some(plan) = Self::plan(entity, row, kind) else {
            return Ok(0);
        };

        let updated = db::update_where(conn, entity, &plan.conditions, &plan.assignments)?;
        SyncMetrics::global().record_sibling_sync(updated);
        debug!(
            entity = %entity.name(),
            content_group_id = ?row.content_group_id(),
            ?kind,
            updated,
            "Synchronized sibling rows"
        );
        Ok(updated)
    }
}

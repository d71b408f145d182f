//! Rows of content-group tables.

use crate::error::Result;
use crate::i18n::LocaleDescriptor;
use crate::schema::{CONTENT_GROUP_FIELD, ID_FIELD, LOCALE_FIELD};
use serde_json::json;
use std::collections::BTreeMap;

/// Field values are stored as SQLite values.
pub use rusqlite::types::Value;

/// One locale row of an entity type.
///
/// `id`, `content_group_id` and `locale` are held outside the field map;
/// every other column lives in `fields`.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    entity: String,
    id: Option<i64>,
    content_group_id: Option<i64>,
    locale: Option<String>,
    fields: BTreeMap<String, Value>,
}

impl Row {
    /// A fresh, unsaved row of `entity`.
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            id: None,
            content_group_id: None,
            locale: None,
            fields: BTreeMap::new(),
        }
    }

    pub(crate) fn from_parts(
        entity: &str,
        id: i64,
        content_group_id: Option<i64>,
        locale: Option<String>,
        fields: BTreeMap<String, Value>,
    ) -> Self {
        Self {
            entity: entity.to_string(),
            id: Some(id),
            content_group_id,
            locale,
            fields,
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    /// Storage identifier; `None` until the row is created.
    pub fn id(&self) -> Option<i64> {
        self.id
    }

    pub(crate) fn set_id(&mut self, id: i64) {
        self.id = Some(id);
    }

    pub fn is_persisted(&self) -> bool {
        self.id.is_some()
    }

    pub fn content_group_id(&self) -> Option<i64> {
        self.content_group_id
    }

    pub fn set_content_group_id(&mut self, content_group_id: i64) {
        self.content_group_id = Some(content_group_id);
    }

    pub fn with_content_group_id(mut self, content_group_id: i64) -> Self {
        self.content_group_id = Some(content_group_id);
        self
    }

    pub fn locale(&self) -> Option<&str> {
        self.locale.as_deref()
    }

    /// Set the locale from any descriptor, storing its normalized code.
    ///
    /// A descriptor that cannot be normalized leaves the current locale
    /// untouched and returns the error.
    pub fn set_locale<L: LocaleDescriptor + ?Sized>(&mut self, locale: &L) -> Result<()> {
        self.locale = Some(locale.locale_code()?);
        Ok(())
    }

    pub fn with_locale<L: LocaleDescriptor + ?Sized>(mut self, locale: &L) -> Result<Self> {
        self.set_locale(locale)?;
        Ok(self)
    }

    pub fn get(&self, field: &str) -> Option<&Value> {
        self.fields.get(field)
    }

    /// Text value of a field, if it holds text.
    pub fn get_text(&self, field: &str) -> Option<&str> {
        match self.fields.get(field) {
            Some(Value::Text(text)) => Some(text),
            _ => None,
        }
    }

    pub fn get_integer(&self, field: &str) -> Option<i64> {
        match self.fields.get(field) {
            Some(Value::Integer(value)) => Some(*value),
            _ => None,
        }
    }

    pub fn set(&mut self, field: impl Into<String>, value: impl Into<Value>) {
        self.fields.insert(field.into(), value.into());
    }

    pub fn with(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.set(field, value);
        self
    }

    pub fn remove(&mut self, field: &str) -> Option<Value> {
        self.fields.remove(field)
    }

    pub fn fields(&self) -> &BTreeMap<String, Value> {
        &self.fields
    }

    /// JSON view of the row, implicit columns included.
    pub fn to_json(&self) -> serde_json::Value {
        let mut object = serde_json::Map::new();
        object.insert(ID_FIELD.to_string(), json!(self.id));
        object.insert(CONTENT_GROUP_FIELD.to_string(), json!(self.content_group_id));
        object.insert(LOCALE_FIELD.to_string(), json!(self.locale));
        for (field, value) in &self.fields {
            object.insert(field.clone(), value_to_json(value));
        }
        serde_json::Value::Object(object)
    }
}

fn value_to_json(value: &Value) -> serde_json::Value {
    match value {
        Value::Null => serde_json::Value::Null,
        Value::Integer(i) => json!(i),
        Value::Real(f) => json!(f),
        Value::Text(s) => json!(s),
        Value::Blob(bytes) => json!(bytes),
    }
}

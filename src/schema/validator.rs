//! Declaration validation.
//!
//! Registration runs every derived [`EntityType`] through
//! [`DeclarationValidator::validate`] before it becomes visible. Field and
//! table names end up interpolated into SQL, so they must be plain
//! identifiers.

use crate::schema::partition::{
    EntityType, BASE_GLOBAL_FIELDS, CONTENT_GROUP_FIELD, ID_FIELD, LOCALE_FIELD, TYPE_FIELD,
};
use regex::Regex;
use std::collections::HashSet;
use std::sync::OnceLock;

/// Validation report containing errors and warnings about a declaration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationReport {
    /// Problems that reject the declaration
    pub errors: Vec<String>,

    /// Accepted oddities worth logging
    pub warnings: Vec<String>,
}

impl ValidationReport {
    pub fn new() -> Self {
        Self {
            errors: Vec::new(),
            warnings: Vec::new(),
        }
    }

    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }
}

impl Default for ValidationReport {
    fn default() -> Self {
        Self::new()
    }
}

/// Validator for entity declarations.
pub struct DeclarationValidator;

static IDENTIFIER_REGEX: OnceLock<Regex> = OnceLock::new();

impl DeclarationValidator {
    /// Check that `name` can be used unquoted-safe as a table or column name.
    pub fn is_identifier(name: &str) -> bool {
        let regex =
            IDENTIFIER_REGEX.get_or_init(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_]{0,62}$").unwrap());
        regex.is_match(name)
    }

    /// Validate a derived entity type against its parent snapshot.
    pub fn validate(entity: &EntityType, parent: Option<&EntityType>) -> ValidationReport {
        let mut report = ValidationReport::new();

        if !Self::is_identifier(&entity.name) {
            report
                .errors
                .push(format!("type name {:?} is not an identifier", entity.name));
        }
        if !Self::is_identifier(&entity.table) {
            report
                .errors
                .push(format!("table name {:?} is not an identifier", entity.table));
        }

        let mut seen = HashSet::new();
        for column in &entity.columns {
            if !Self::is_identifier(column) {
                report
                    .errors
                    .push(format!("column {:?} is not an identifier", column));
            }
            if column == ID_FIELD
                || column == TYPE_FIELD
                || BASE_GLOBAL_FIELDS.contains(&column.as_str())
            {
                report
                    .errors
                    .push(format!("column '{}' is managed implicitly", column));
            }
            if !seen.insert(column.as_str()) {
                report
                    .errors
                    .push(format!("column '{}' is declared twice", column));
            }
        }

        let mut seen_translatable = HashSet::new();
        for field in &entity.translatable {
            if !entity.columns.contains(field) {
                report
                    .errors
                    .push(format!("translatable field '{}' is not a declared column", field));
            }
            if entity.global.contains(field) {
                report
                    .errors
                    .push(format!("field '{}' is both translatable and global", field));
            }
            if !seen_translatable.insert(field.as_str()) {
                report
                    .warnings
                    .push(format!("translatable field '{}' listed more than once", field));
            }
        }

        for field in &entity.global {
            let implicit = field == LOCALE_FIELD || field == CONTENT_GROUP_FIELD;
            if !implicit && !entity.columns.contains(field) {
                report
                    .errors
                    .push(format!("global field '{}' is not a declared column", field));
            }
        }

        if let Some(parent) = parent {
            if !entity.translatable.starts_with(&parent.translatable) {
                report.errors.push(format!(
                    "translatable fields do not extend those of '{}'",
                    parent.name
                ));
            }
        }

        report
    }
}

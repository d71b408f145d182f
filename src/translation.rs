use crate::db::Database;
use crate::error::{Error, Result};
use crate::i18n::{LocaleDescriptor, SyncMetrics};
use crate::row::Row;
use crate::schema::EntityType;
use tracing::{debug, info};

/// Builds new locale rows for existing content groups.
pub struct TranslationFactory;

impl TranslationFactory {
    /// Prepare an unsaved `locale` row for `content_group_id`.
    ///
    /// Ordinary fields are copied from the group's lowest-id row. A group
    /// with no rows yields an empty row carrying the requested group id and
    /// locale. Nothing is written; pass the result to `create`.
    pub fn translate<L: LocaleDescriptor + ?Sized>(
        db: &Database,
        entity: &EntityType,
        content_group_id: i64,
        locale: &L,
    ) -> Result<Row> {
        if !entity.is_translatable() {
            return Err(Error::NotTranslatable(entity.name().to_string()));
        }
        let code = locale.locale_code()?;
        let mut translation = Row::new(entity.name()).with_content_group_id(content_group_id);
        translation.set_locale(code.as_str())?;

        match db.first_in_group(entity, content_group_id)? {
            Some(representative) => {
                for field in entity.ordinary_fields() {
                    if let Some(value) = representative.get(field) {
                        translation.set(field, value.clone());
                    }
                }
                debug!(
                    entity = %entity.name(),
                    content_group_id,
                    representative = ?representative.id(),
                    "Cloned ordinary fields from representative"
                );
            }
            None => {
                debug!(entity = %entity.name(), content_group_id, "No rows in group, starting fresh");
            }
        }

        SyncMetrics::global().record_translation_built();
        info!(entity = %entity.name(), content_group_id, locale = %code, "Built translation");
        Ok(translation)
    }
}

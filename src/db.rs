use crate::error::{Error, Result};
use crate::i18n::SyncMetrics;
use crate::query::{
    placeholders, quote, type_condition, CompiledQuery, Condition, LocaleFilter, Query,
};
use crate::row::{Row, Value};
use crate::schema::{EntityType, CONTENT_GROUP_FIELD, ID_FIELD, LOCALE_FIELD, TYPE_FIELD};
use rusqlite::{params_from_iter, Connection, Transaction};
use std::collections::{BTreeMap, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};

/// Shared SQLite handle.
///
/// Every operation takes the connection lock for its whole duration, so
/// writes through one `Database` are serialized.
#[derive(Clone)]
pub struct Database {
    conn: Arc<Mutex<Connection>>,
}

impl Database {
    /// Open (or create) the database file at `database_path`.
    pub fn open(database_path: &str) -> Result<Self> {
        let conn = Connection::open(database_path)?;
        Self::from_connection(conn)
    }

    pub fn open_in_memory() -> Result<Self> {
        Self::from_connection(Connection::open_in_memory()?)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        // Sequence store used by the content-group id allocator
        conn.execute(
            "CREATE TABLE IF NOT EXISTS content_sequences (
                name TEXT PRIMARY KEY,
                value INTEGER NOT NULL
            )",
            [],
        )?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| Error::LockPoisoned)
    }

    /// Run caller-owned SQL (DDL, fixtures).
    pub fn execute_batch(&self, sql: &str) -> Result<()> {
        self.lock()?.execute_batch(sql)?;
        Ok(())
    }

    /// Create the table for `entity` if needed and add any declared column
    /// it is missing. Subtypes sharing a parent's table add their columns here.
    pub fn ensure_table(&self, entity: &EntityType) -> Result<()> {
        let conn = self.lock()?;
        let table = quote(entity.table());

        let mut columns = vec![
            format!("{} INTEGER PRIMARY KEY AUTOINCREMENT", quote(ID_FIELD)),
            format!("{} TEXT", quote(TYPE_FIELD)),
        ];
        if entity.is_translatable() {
            columns.push(format!("{} INTEGER", quote(CONTENT_GROUP_FIELD)));
            columns.push(format!("{} TEXT", quote(LOCALE_FIELD)));
        }
        columns.extend(entity.columns().iter().map(|c| quote(c)));

        conn.execute(
            &format!("CREATE TABLE IF NOT EXISTS {} ({})", table, columns.join(", ")),
            [],
        )?;

        let existing = Self::table_columns(&conn, entity.table())?;
        let mut wanted: Vec<&str> = vec![TYPE_FIELD];
        if entity.is_translatable() {
            wanted.extend([CONTENT_GROUP_FIELD, LOCALE_FIELD]);
        }
        wanted.extend(entity.columns().iter().map(String::as_str));

        for column in wanted.into_iter().filter(|c| !existing.contains(*c)) {
            debug!(table = %entity.table(), column, "Adding missing column");
            conn.execute(
                &format!("ALTER TABLE {} ADD COLUMN {}", table, quote(column)),
                [],
            )?;
        }

        if entity.is_translatable() {
            conn.execute(
                &format!(
                    "CREATE INDEX IF NOT EXISTS {} ON {} ({}, {})",
                    quote(&format!("{}_content_group_locale", entity.table())),
                    table,
                    quote(CONTENT_GROUP_FIELD),
                    quote(LOCALE_FIELD)
                ),
                [],
            )?;
        }

        Ok(())
    }

    fn table_columns(conn: &Connection, table: &str) -> Result<HashSet<String>> {
        let mut stmt = conn.prepare("SELECT name FROM pragma_table_info(?1)")?;
        let names = stmt
            .query_map([table], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<HashSet<_>, _>>()?;
        Ok(names)
    }

    /// Run `f` inside one transaction: commit on `Ok`, roll back on `Err`.
    pub fn transaction<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Transaction<'_>) -> Result<T>,
    {
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;

        match f(&tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(e) => {
                if let Err(rollback) = tx.rollback() {
                    warn!(error = %rollback, "Rollback failed");
                }
                Err(e)
            }
        }
    }

    /// Ids of the rows `query` matches, locale resolution applied.
    pub fn select_ids(&self, entity: &EntityType, query: &Query) -> Result<Vec<i64>> {
        let compiled = query.compile_ids(entity)?;
        record_resolution(&compiled);

        let conn = self.lock()?;
        let mut stmt = conn.prepare(&compiled.sql)?;
        let ids = stmt
            .query_map(params_from_iter(compiled.params.iter()), |row| row.get(0))?
            .collect::<std::result::Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    /// Rows `query` matches, locale resolution applied.
    pub fn fetch(&self, entity: &EntityType, query: &Query) -> Result<Vec<Row>> {
        let compiled = query.compile(entity)?;
        record_resolution(&compiled);

        let conn = self.lock()?;
        load_rows(&conn, entity, &compiled)
    }

    pub fn find(&self, entity: &EntityType, id: i64) -> Result<Option<Row>> {
        let query = Query::new(entity.name()).filter(Condition::eq(ID_FIELD, id));
        Ok(self.fetch(entity, &query)?.into_iter().next())
    }

    /// Every row of one content group, lowest id first.
    pub fn group_rows(&self, entity: &EntityType, content_group_id: i64) -> Result<Vec<Row>> {
        let query =
            Query::new(entity.name()).filter(Condition::eq(CONTENT_GROUP_FIELD, content_group_id));
        self.fetch(entity, &query)
    }

    /// The lowest-id row of a content group.
    pub fn first_in_group(&self, entity: &EntityType, content_group_id: i64) -> Result<Option<Row>> {
        let query = Query::new(entity.name())
            .filter(Condition::eq(CONTENT_GROUP_FIELD, content_group_id))
            .limit(1);
        Ok(self.fetch(entity, &query)?.into_iter().next())
    }

    /// Delete one row. Other rows of its group are left alone.
    pub fn delete(&self, entity: &EntityType, id: i64) -> Result<bool> {
        let conn = self.lock()?;
        let rows_affected = conn.execute(
            &format!(
                "DELETE FROM {} WHERE {} = ?1 AND {} = ?2",
                quote(entity.table()),
                quote(ID_FIELD),
                quote(TYPE_FIELD)
            ),
            rusqlite::params![id, entity.name()],
        )?;
        Ok(rows_affected > 0)
    }
}

fn record_resolution(compiled: &CompiledQuery) {
    if let LocaleFilter::Preferred(_) = compiled.filter {
        SyncMetrics::global().record_resolved_query();
    }
    debug!(sql = %compiled.sql, params = compiled.params.len(), "Compiled query");
}

fn load_rows(conn: &Connection, entity: &EntityType, compiled: &CompiledQuery) -> Result<Vec<Row>> {
    let mut stmt = conn.prepare(&compiled.sql)?;
    let rows = stmt
        .query_map(params_from_iter(compiled.params.iter()), |row| {
            let mut fields = BTreeMap::new();
            for (offset, column) in entity.columns().iter().enumerate() {
                fields.insert(column.clone(), row.get::<_, Value>(offset + 3)?);
            }
            Ok(Row::from_parts(
                entity.name(),
                row.get(0)?,
                row.get(1)?,
                row.get(2)?,
                fields,
            ))
        })?
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Reject fields that are not data columns of `entity`.
fn check_fields(entity: &EntityType, row: &Row) -> Result<()> {
    match row
        .fields()
        .keys()
        .find(|field| !entity.columns().contains(*field))
    {
        Some(field) => Err(Error::UnknownField {
            entity: entity.name().to_string(),
            field: field.clone(),
        }),
        None => Ok(()),
    }
}

/// Insert `row` and return its new id.
pub(crate) fn insert_row(conn: &Connection, entity: &EntityType, row: &Row) -> Result<i64> {
    check_fields(entity, row)?;

    let mut columns = vec![quote(TYPE_FIELD)];
    let mut values = vec![Value::Text(entity.name().to_string())];
    if let Some(id) = row.id() {
        columns.push(quote(ID_FIELD));
        values.push(Value::Integer(id));
    }
    if entity.is_translatable() {
        columns.push(quote(CONTENT_GROUP_FIELD));
        values.push(row.content_group_id().map_or(Value::Null, Value::Integer));
        columns.push(quote(LOCALE_FIELD));
        values.push(row.locale().map_or(Value::Null, |l| Value::Text(l.to_string())));
    }
    for (field, value) in row.fields() {
        columns.push(quote(field));
        values.push(value.clone());
    }

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        quote(entity.table()),
        columns.join(", "),
        placeholders(values.len())
    );
    conn.execute(&sql, params_from_iter(values.iter()))?;
    Ok(conn.last_insert_rowid())
}

/// Write `row`'s group, locale and carried fields back to its own record.
pub(crate) fn update_row(conn: &Connection, entity: &EntityType, row: &Row) -> Result<()> {
    check_fields(entity, row)?;
    let id = row
        .id()
        .ok_or_else(|| Error::NotPersisted(entity.name().to_string()))?;

    let mut assignments: Vec<(String, Value)> = Vec::new();
    if entity.is_translatable() {
        assignments.push((
            CONTENT_GROUP_FIELD.to_string(),
            row.content_group_id().map_or(Value::Null, Value::Integer),
        ));
        assignments.push((
            LOCALE_FIELD.to_string(),
            row.locale().map_or(Value::Null, |l| Value::Text(l.to_string())),
        ));
    }
    assignments.extend(row.fields().iter().map(|(f, v)| (f.clone(), v.clone())));

    let rows_affected = if assignments.is_empty() {
        // Nothing to write; still confirm the record exists
        conn.query_row(
            &format!(
                "SELECT COUNT(*) FROM {} WHERE {} = ?1 AND {} = ?2",
                quote(entity.table()),
                quote(ID_FIELD),
                quote(TYPE_FIELD)
            ),
            rusqlite::params![id, entity.name()],
            |r| r.get::<_, i64>(0),
        )? as usize
    } else {
        update_where(conn, entity, &[Condition::eq(ID_FIELD, id)], &assignments)?
    };

    if rows_affected == 0 {
        return Err(Error::NotPersisted(entity.name().to_string()));
    }
    Ok(())
}

/// `UPDATE table SET assignments WHERE conditions`, limited to rows of
/// `entity`'s own type; returns rows changed.
pub fn update_where(
    conn: &Connection,
    entity: &EntityType,
    conditions: &[Condition],
    assignments: &[(String, Value)],
) -> Result<usize> {
    if assignments.is_empty() {
        return Ok(0);
    }

    let mut params = Vec::new();
    let mut sets = Vec::with_capacity(assignments.len());
    for (field, value) in assignments {
        if !entity.has_column(field) {
            return Err(Error::UnknownField {
                entity: entity.name().to_string(),
                field: field.clone(),
            });
        }
        sets.push(format!("{} = ?", quote(field)));
        params.push(value.clone());
    }

    let mut clauses = vec![type_condition(entity).render(entity, &mut params)?];
    for condition in conditions {
        clauses.push(condition.render(entity, &mut params)?);
    }
    let sql = format!(
        "UPDATE {} SET {} WHERE {}",
        quote(entity.table()),
        sets.join(", "),
        clauses.join(" AND ")
    );

    let rows_affected = conn.execute(&sql, params_from_iter(params.iter()))?;
    Ok(rows_affected)
}

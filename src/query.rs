//! Read queries with locale resolution.
//!
//! A [`Query`] is an immutable value: every builder method returns a new
//! query, and [`Query::compile`] is a pure function from the accumulated
//! state to SQL plus positional parameters. Locale filtering is opt-in per
//! query. Once requested, each content group collapses to the single row
//! whose locale ranks highest in the preference list; groups without a row
//! in any preferred locale contribute nothing.

use crate::error::{Error, Result};
use crate::i18n::{normalize_code, Locale};
use crate::row::Value;
use crate::schema::{EntityType, CONTENT_GROUP_FIELD, ID_FIELD, LOCALE_FIELD, TYPE_FIELD};

/// A WHERE-clause term.
#[derive(Debug, Clone, PartialEq)]
pub enum Condition {
    Eq(String, Value),
    Ne(String, Value),
    In(String, Vec<Value>),
    IsNull(String),
    NotNull(String),
    /// Caller-written SQL, wrapped in parentheses. `?` placeholders bind
    /// `params` in order.
    Raw { sql: String, params: Vec<Value> },
}

impl Condition {
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Eq(field.into(), value.into())
    }

    pub fn ne(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Condition::Ne(field.into(), value.into())
    }

    pub fn in_list<I, V>(field: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Condition::In(field.into(), values.into_iter().map(Into::into).collect())
    }

    pub fn is_null(field: impl Into<String>) -> Self {
        Condition::IsNull(field.into())
    }

    pub fn not_null(field: impl Into<String>) -> Self {
        Condition::NotNull(field.into())
    }

    pub fn raw(sql: impl Into<String>) -> Self {
        Condition::Raw {
            sql: sql.into(),
            params: Vec::new(),
        }
    }

    pub fn raw_with(sql: impl Into<String>, params: Vec<Value>) -> Self {
        Condition::Raw {
            sql: sql.into(),
            params,
        }
    }

    /// Render as SQL against `entity`'s table, appending bound values.
    pub(crate) fn render(&self, entity: &EntityType, params: &mut Vec<Value>) -> Result<String> {
        let sql = match self {
            Condition::Eq(field, value) => {
                params.push(value.clone());
                format!("{} = ?", column(entity, field)?)
            }
            Condition::Ne(field, value) => {
                params.push(value.clone());
                format!("{} <> ?", column(entity, field)?)
            }
            Condition::In(field, values) if values.is_empty() => {
                column(entity, field)?;
                "0 = 1".to_string()
            }
            Condition::In(field, values) => {
                params.extend(values.iter().cloned());
                format!("{} IN ({})", column(entity, field)?, placeholders(values.len()))
            }
            Condition::IsNull(field) => format!("{} IS NULL", column(entity, field)?),
            Condition::NotNull(field) => format!("{} IS NOT NULL", column(entity, field)?),
            Condition::Raw { sql, params: bound } => {
                params.extend(bound.iter().cloned());
                format!("({})", sql)
            }
        };
        Ok(sql)
    }
}

/// One entry of a locale preference list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocaleRequest {
    /// Disable locale filtering for the query.
    All,
    /// A locale code, normalized when the query is compiled.
    Code(String),
}

/// The `ALL` sentinel.
pub const ALL: LocaleRequest = LocaleRequest::All;

impl From<&str> for LocaleRequest {
    fn from(code: &str) -> Self {
        LocaleRequest::Code(code.to_string())
    }
}

impl From<String> for LocaleRequest {
    fn from(code: String) -> Self {
        LocaleRequest::Code(code)
    }
}

impl From<Locale> for LocaleRequest {
    fn from(locale: Locale) -> Self {
        LocaleRequest::Code(locale.code().to_string())
    }
}

impl From<&Locale> for LocaleRequest {
    fn from(locale: &Locale) -> Self {
        LocaleRequest::Code(locale.code().to_string())
    }
}

/// Effective locale behavior of a query.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocaleFilter {
    /// No locale scope was requested.
    Unscoped,
    /// `ALL` was requested; no filtering.
    All,
    /// Normalized codes, most preferred first, without repeats.
    Preferred(Vec<String>),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Asc,
    Desc,
}

impl Direction {
    fn sql(self) -> &'static str {
        match self {
            Direction::Asc => "ASC",
            Direction::Desc => "DESC",
        }
    }
}

/// SQL text and its positional parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledQuery {
    pub sql: String,
    pub params: Vec<Value>,
    pub filter: LocaleFilter,
}

/// An immutable read query over one entity type.
#[derive(Debug, Clone, PartialEq)]
pub struct Query {
    entity: String,
    conditions: Vec<Condition>,
    joins: Vec<String>,
    order: Vec<(String, Direction)>,
    limit: Option<usize>,
    locales: Option<Vec<LocaleRequest>>,
}

impl Query {
    pub fn new(entity: impl Into<String>) -> Self {
        Self {
            entity: entity.into(),
            conditions: Vec::new(),
            joins: Vec::new(),
            order: Vec::new(),
            limit: None,
            locales: None,
        }
    }

    pub fn entity(&self) -> &str {
        &self.entity
    }

    pub fn filter(mut self, condition: Condition) -> Self {
        self.conditions.push(condition);
        self
    }

    /// Add a raw JOIN clause, e.g. `JOIN authors ON authors.id = articles.author_id`.
    pub fn join(mut self, clause: impl Into<String>) -> Self {
        self.joins.push(clause.into());
        self
    }

    pub fn order_by(mut self, field: impl Into<String>, direction: Direction) -> Self {
        self.order.push((field.into(), direction));
        self
    }

    pub fn limit(mut self, limit: usize) -> Self {
        self.limit = Some(limit);
        self
    }

    /// Request locale resolution. Repeated calls append to the preference list.
    pub fn with_locales<I, L>(mut self, locales: I) -> Self
    where
        I: IntoIterator<Item = L>,
        L: Into<LocaleRequest>,
    {
        self.locales
            .get_or_insert_with(Vec::new)
            .extend(locales.into_iter().map(Into::into));
        self
    }

    /// Request every locale: shorthand for `with_locales([ALL])`.
    pub fn all_locales(self) -> Self {
        self.with_locales([ALL])
    }

    pub fn locale_requests(&self) -> Option<&[LocaleRequest]> {
        self.locales.as_deref()
    }

    /// Reduce the accumulated locale requests to the filter they produce.
    pub fn locale_filter(&self) -> Result<LocaleFilter> {
        let Some(requests) = &self.locales else {
            return Ok(LocaleFilter::Unscoped);
        };
        if requests.contains(&LocaleRequest::All) {
            return Ok(LocaleFilter::All);
        }

        let mut codes: Vec<String> = Vec::with_capacity(requests.len());
        for request in requests {
            if let LocaleRequest::Code(raw) = request {
                let code = normalize_code(raw)?;
                if !codes.contains(&code) {
                    codes.push(code);
                }
            }
        }
        Ok(LocaleFilter::Preferred(codes))
    }

    /// Compile to a statement selecting full rows of `entity`.
    ///
    /// Columns come back as `id, content_group_id, locale` followed by
    /// [`EntityType::columns`] in order.
    pub fn compile(&self, entity: &EntityType) -> Result<CompiledQuery> {
        let table = quote(entity.table());
        let mut projection = vec![format!("{}.{}", table, quote(ID_FIELD))];
        if entity.is_translatable() {
            projection.push(format!("{}.{}", table, quote(CONTENT_GROUP_FIELD)));
            projection.push(format!("{}.{}", table, quote(LOCALE_FIELD)));
        } else {
            projection.push("NULL".to_string());
            projection.push("NULL".to_string());
        }
        projection.extend(
            entity
                .columns()
                .iter()
                .map(|c| format!("{}.{}", table, quote(c))),
        );
        self.build(entity, &projection.join(", "))
    }

    /// Compile to a statement selecting only row ids.
    pub fn compile_ids(&self, entity: &EntityType) -> Result<CompiledQuery> {
        let projection = format!("{}.{}", quote(entity.table()), quote(ID_FIELD));
        self.build(entity, &projection)
    }

    fn build(&self, entity: &EntityType, projection: &str) -> Result<CompiledQuery> {
        if entity.name() != self.entity {
            return Err(Error::UnknownEntity(self.entity.clone()));
        }

        let filter = self.locale_filter()?;
        if filter != LocaleFilter::Unscoped && !entity.is_translatable() {
            return Err(Error::NotTranslatable(entity.name().to_string()));
        }

        let table = quote(entity.table());
        let mut params = Vec::new();
        let mut sql = format!("SELECT {} FROM {}", projection, self.from_tail(&table));

        let mut clauses = self.base_clauses(entity, &mut params)?;
        if let LocaleFilter::Preferred(codes) = &filter {
            clauses.push(self.resolution_clause(entity, codes, &mut params)?);
        }
        push_where(&mut sql, &clauses);

        if self.order.is_empty() {
            sql.push_str(&format!(" ORDER BY {}.{} ASC", table, quote(ID_FIELD)));
        } else {
            let keys = self
                .order
                .iter()
                .map(|(field, direction)| -> Result<String> {
                    Ok(format!("{} {}", column(entity, field)?, direction.sql()))
                })
                .collect::<Result<Vec<_>>>()?;
            sql.push_str(&format!(" ORDER BY {}", keys.join(", ")));
        }
        if let Some(limit) = self.limit {
            sql.push_str(&format!(" LIMIT {}", limit));
        }

        Ok(CompiledQuery {
            sql,
            params,
            filter,
        })
    }

    fn from_tail(&self, table: &str) -> String {
        let mut from = table.to_string();
        for join in &self.joins {
            from.push(' ');
            from.push_str(join);
        }
        from
    }

    /// The type restriction followed by the caller's conditions.
    fn base_clauses(&self, entity: &EntityType, params: &mut Vec<Value>) -> Result<Vec<String>> {
        let mut clauses = vec![type_condition(entity).render(entity, params)?];
        for condition in &self.conditions {
            clauses.push(condition.render(entity, params)?);
        }
        Ok(clauses)
    }

    /// `id IN (one row per group, best-ranked locale first, lowest id on ties)`.
    fn resolution_clause(
        &self,
        entity: &EntityType,
        codes: &[String],
        params: &mut Vec<Value>,
    ) -> Result<String> {
        let table = quote(entity.table());
        let id = format!("{}.{}", table, quote(ID_FIELD));
        let group = format!("{}.{}", table, quote(CONTENT_GROUP_FIELD));
        let locale = format!("{}.{}", table, quote(LOCALE_FIELD));

        let mut rank = format!("CASE {}", locale);
        for (position, code) in codes.iter().enumerate() {
            rank.push_str(&format!(" WHEN ? THEN {}", position));
            params.push(Value::Text(code.clone()));
        }
        rank.push_str(&format!(" ELSE {} END", codes.len()));

        let mut inner = format!(
            "SELECT {} AS \"candidate_id\", ROW_NUMBER() OVER (PARTITION BY {} ORDER BY {} ASC, {}, {} ASC) AS \"locale_rank\" FROM {}",
            id,
            group,
            group,
            rank,
            id,
            self.from_tail(&table)
        );
        let mut clauses = self.base_clauses(entity, params)?;
        clauses.push(
            Condition::In(
                LOCALE_FIELD.to_string(),
                codes.iter().map(|c| Value::Text(c.clone())).collect(),
            )
            .render(entity, params)?,
        );
        push_where(&mut inner, &clauses);

        Ok(format!(
            "{} IN (SELECT \"candidate_id\" FROM ({}) WHERE \"locale_rank\" = 1)",
            id, inner
        ))
    }
}

fn push_where(sql: &mut String, clauses: &[String]) {
    if !clauses.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&clauses.join(" AND "));
    }
}

fn column(entity: &EntityType, field: &str) -> Result<String> {
    if !entity.has_column(field) {
        return Err(Error::UnknownField {
            entity: entity.name().to_string(),
            field: field.to_string(),
        });
    }
    Ok(format!("{}.{}", quote(entity.table()), quote(field)))
}

/// Restricts a statement to rows written as `entity`.
pub(crate) fn type_condition(entity: &EntityType) -> Condition {
    Condition::eq(TYPE_FIELD, entity.name().to_string())
}

pub(crate) fn quote(identifier: &str) -> String {
    format!("\"{}\"", identifier)
}

pub(crate) fn placeholders(count: usize) -> String {
    vec!["?"; count].join(", ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{EntityDecl, TypeRegistry};

    fn registry() -> TypeRegistry {
        let mut registry = TypeRegistry::new();
        registry
            .register(
                EntityDecl::new("article")
                    .table("articles")
                    .fields(["title", "price"])
                    .translatable(["title"])
                    .without_timestamps(),
            )
            .unwrap();
        registry
            .register(EntityDecl::new("tag").fields(["label"]))
            .unwrap();
        registry
    }

    // ==================== Locale filter Tests ====================

    #[test]
    fn test_unscoped_by_default() {
        assert_eq!(
            Query::new("article").locale_filter().unwrap(),
            LocaleFilter::Unscoped
        );
    }

    #[test]
    fn test_all_sentinel_anywhere_disables_filtering() {
        let query = Query::new("article").with_locales(["es", "ca"]).with_locales([ALL]);
        assert_eq!(query.locale_filter().unwrap(), LocaleFilter::All);

        let query = Query::new("article").with_locales([ALL, "es".into()]);
        assert_eq!(query.locale_filter().unwrap(), LocaleFilter::All);
    }

    #[test]
    fn test_requests_accumulate_in_order() {
        let query = Query::new("article")
            .with_locales(["ES"])
            .with_locales([Locale::CATALAN])
            .with_locales(["es", "en"]);
        assert_eq!(
            query.locale_filter().unwrap(),
            LocaleFilter::Preferred(vec!["es".into(), "ca".into(), "en".into()])
        );
    }

    #[test]
    fn test_builders_leave_base_untouched() {
        let base = Query::new("article").filter(Condition::eq("price", 10));
        let scoped = base.clone().with_locales(["es"]);
        assert_eq!(base.locale_requests(), None);
        assert_eq!(scoped.locale_requests().map(|r| r.len()), Some(1));

        let fresh = Query::new("article");
        assert_eq!(fresh.locale_filter().unwrap(), LocaleFilter::Unscoped);
    }

    #[test]
    fn test_empty_preference_list_is_scoped() {
        let query = Query::new("article").with_locales(Vec::<LocaleRequest>::new());
        assert_eq!(
            query.locale_filter().unwrap(),
            LocaleFilter::Preferred(Vec::new())
        );
    }

    #[test]
    fn test_malformed_locale_fails_compile() {
        let registry = registry();
        let query = Query::new("article").with_locales(["not a locale"]);
        assert!(matches!(
            query.compile(registry.get("article").unwrap()),
            Err(Error::InvalidLocale(_))
        ));
    }

    // ==================== SQL Tests ====================

    #[test]
    fn test_compile_unscoped() {
        let registry = registry();
        let compiled = Query::new("article")
            .filter(Condition::eq("price", 10))
            .compile(registry.get("article").unwrap())
            .unwrap();

        assert_eq!(
            compiled.sql,
            "SELECT \"articles\".\"id\", \"articles\".\"content_group_id\", \"articles\".\"locale\", \
             \"articles\".\"title\", \"articles\".\"price\" FROM \"articles\" \
             WHERE \"articles\".\"entity_type\" = ? AND \"articles\".\"price\" = ? \
             ORDER BY \"articles\".\"id\" ASC"
        );
        assert_eq!(
            compiled.params,
            vec![Value::Text("article".into()), Value::Integer(10)]
        );
    }

    #[test]
    fn test_compile_preferred_binds_rank_then_conditions() {
        let registry = registry();
        let compiled = Query::new("article")
            .filter(Condition::eq("price", 10))
            .with_locales(["es", "ca"])
            .compile_ids(registry.get("article").unwrap())
            .unwrap();

        assert!(compiled.sql.contains("ROW_NUMBER() OVER (PARTITION BY"));
        assert!(compiled.sql.contains("\"locale_rank\" = 1"));
        assert_eq!(
            compiled.params,
            vec![
                Value::Text("article".into()),
                Value::Integer(10),
                Value::Text("es".into()),
                Value::Text("ca".into()),
                Value::Text("article".into()),
                Value::Integer(10),
                Value::Text("es".into()),
                Value::Text("ca".into()),
            ]
        );
        assert_eq!(compiled.sql.matches('?').count(), compiled.params.len());
    }

    #[test]
    fn test_compile_empty_preference_matches_nothing() {
        let registry = registry();
        let compiled = Query::new("article")
            .with_locales(Vec::<&str>::new())
            .compile_ids(registry.get("article").unwrap())
            .unwrap();
        assert!(compiled.sql.contains("0 = 1"));
    }

    #[test]
    fn test_compile_order_and_limit() {
        let registry = registry();
        let compiled = Query::new("article")
            .order_by("price", Direction::Desc)
            .limit(5)
            .compile_ids(registry.get("article").unwrap())
            .unwrap();
        assert!(compiled
            .sql
            .ends_with("ORDER BY \"articles\".\"price\" DESC LIMIT 5"));
    }

    #[test]
    fn test_compile_rejects_unknown_field() {
        let registry = registry();
        let result = Query::new("article")
            .filter(Condition::is_null("nope"))
            .compile(registry.get("article").unwrap());
        assert!(matches!(result, Err(Error::UnknownField { .. })));
    }

    #[test]
    fn test_locale_scope_on_plain_type() {
        let registry = registry();
        let tag = registry.get("tag").unwrap();
        assert!(Query::new("tag").compile(tag).is_ok());
        assert!(matches!(
            Query::new("tag").with_locales(["es"]).compile(tag),
            Err(Error::NotTranslatable(_))
        ));
    }

    #[test]
    fn test_subtype_queries_are_scoped_to_their_type() {
        let mut registry = registry();
        registry
            .register(EntityDecl::new("review").parent("article").fields(["rating"]))
            .unwrap();

        let compiled = Query::new("review")
            .with_locales(["en"])
            .compile(registry.get("review").unwrap())
            .unwrap();
        assert!(compiled.sql.starts_with("SELECT \"articles\".\"id\""));
        assert_eq!(
            compiled.sql.matches("\"articles\".\"entity_type\" = ?").count(),
            2,
            "outer query and resolution subselect are both restricted"
        );
        assert_eq!(compiled.params[0], Value::Text("review".into()));
    }

    #[test]
    fn test_compile_entity_mismatch() {
        let registry = registry();
        let result = Query::new("tag").compile(registry.get("article").unwrap());
        assert!(matches!(result, Err(Error::UnknownEntity(_))));
    }

    #[test]
    fn test_raw_condition_and_in_list() {
        let registry = registry();
        let compiled = Query::new("article")
            .filter(Condition::raw_with("articles.price > ?", vec![Value::Integer(3)]))
            .filter(Condition::in_list("title", ["a".to_string(), "b".to_string()]))
            .compile_ids(registry.get("article").unwrap())
            .unwrap();
        assert!(compiled.sql.contains("(articles.price > ?)"));
        assert!(compiled.sql.contains("\"articles\".\"title\" IN (?, ?)"));
        assert_eq!(compiled.params.len(), 4);
    }
}

//! Postgres document store.
//!
//! Each collection is a table of JSONB documents:
//!
//! ```sql
//! CREATE TABLE "people" (seq BIGSERIAL PRIMARY KEY, doc JSONB NOT NULL);
//! CREATE UNIQUE INDEX "people_id_idx" ON "people" ((doc->>'_id'));
//! ```
//!
//! `seq` is the insertion order used as the final tie-break. Selectors are
//! rendered to parameterised SQL with the same semantics the memory store
//! evaluates in process; statements are built with SeaQuery and executed
//! through a [`LifeExecutor`].

use super::value_conversion::with_converted_params;
use super::{check_changes, generate_id, DocumentStore};
use crate::attributes::Attributes;
use crate::criteria::{CompareOp, Condition, Direction, Query};
use crate::document::ID_FIELD;
use crate::error::LifeError;
use crate::executor::LifeExecutor;
use sea_query::{Alias, Expr, NullOrdering, Order, PostgresQueryBuilder, SelectStatement, Values};
use serde_json::Value;

#[cfg(feature = "tracing")]
use crate::metrics::tracing_helpers;

/// SQL text with `?` placeholders plus the values bound to them
#[derive(Debug, Default, Clone, PartialEq)]
pub struct Fragment {
    sql: String,
    values: Vec<sea_query::Value>,
}

impl Fragment {
    fn new() -> Self {
        Self::default()
    }

    fn raw(sql: &str) -> Self {
        Self {
            sql: sql.to_string(),
            values: Vec::new(),
        }
    }

    fn sql(&mut self, sql: &str) -> &mut Self {
        self.sql.push_str(sql);
        self
    }

    /// `doc #> path` for a dotted field path
    fn field(&mut self, field: &str) -> &mut Self {
        self.sql.push_str("(doc #> string_to_array(CAST(? AS text), '.'))");
        self.values.push(field.to_string().into());
        self
    }

    fn json(&mut self, value: &Value) -> &mut Self {
        self.sql.push_str("CAST(? AS text)::jsonb");
        self.values.push(value.to_string().into());
        self
    }

    fn text(&mut self, value: &str) -> &mut Self {
        self.sql.push_str("CAST(? AS text)");
        self.values.push(value.to_string().into());
        self
    }

    fn double(&mut self, value: f64) -> &mut Self {
        self.sql.push_str("CAST(? AS float8)");
        self.values.push(value.into());
        self
    }

    fn append(&mut self, other: Fragment) -> &mut Self {
        self.sql.push_str(&other.sql);
        self.values.extend(other.values);
        self
    }

    fn join(parts: Vec<Fragment>, separator: &str, empty: &str) -> Fragment {
        if parts.is_empty() {
            return Fragment::raw(empty);
        }
        let mut joined = Fragment::new();
        joined.sql("(");
        for (i, part) in parts.into_iter().enumerate() {
            if i > 0 {
                joined.sql(separator);
            }
            joined.append(part);
        }
        joined.sql(")");
        joined
    }

    fn negate(inner: Fragment) -> Fragment {
        let mut negated = Fragment::raw("NOT COALESCE(");
        negated.append(inner).sql(", FALSE)");
        negated
    }

    pub fn into_expr(self) -> Expr {
        Expr::cust_with_values(self.sql, self.values)
    }

    pub fn as_sql(&self) -> &str {
        &self.sql
    }

    pub fn values(&self) -> &[sea_query::Value] {
        &self.values
    }
}

/// `(field as array, or [field])` so scalar and array fields share one test
fn elements(field: &str) -> Fragment {
    let mut f = Fragment::raw("jsonb_array_elements(CASE WHEN jsonb_typeof(");
    f.field(field)
        .sql(") = 'array' THEN ")
        .field(field)
        .sql(" ELSE jsonb_build_array(")
        .field(field)
        .sql(") END)");
    f
}

fn render_eq(field: &str, value: &Value) -> Fragment {
    let mut f = Fragment::new();
    match value {
        Value::Null => {
            f.sql("(").field(field).sql(" IS NULL OR ").field(field).sql(" = 'null'::jsonb)");
        }
        Value::Array(_) => {
            f.sql("COALESCE(").field(field).sql(" = ").json(value).sql(", FALSE)");
        }
        _ => {
            f.sql("EXISTS (SELECT 1 FROM ")
                .append(elements(field))
                .sql(" AS e(v) WHERE e.v = ")
                .json(value)
                .sql(")");
        }
    }
    f
}

fn render_compare(field: &str, op: CompareOp, value: &Value) -> Fragment {
    let mut f = Fragment::new();
    match value {
        Value::Number(n) => {
            let Some(n) = n.as_f64() else {
                return Fragment::raw("FALSE");
            };
            f.sql("EXISTS (SELECT 1 FROM ")
                .append(elements(field))
                .sql(" AS e(v) WHERE CASE WHEN jsonb_typeof(e.v) = 'number' THEN (e.v #>> '{}')::float8 ")
                .sql(op.as_sql())
                .sql(" ")
                .double(n)
                .sql(" ELSE FALSE END)");
        }
        Value::String(s) => {
            f.sql("EXISTS (SELECT 1 FROM ")
                .append(elements(field))
                .sql(" AS e(v) WHERE CASE WHEN jsonb_typeof(e.v) = 'string' THEN (e.v #>> '{}') COLLATE \"C\" ")
                .sql(op.as_sql())
                .sql(" ")
                .text(s)
                .sql(" ELSE FALSE END)");
        }
        _ => return Fragment::raw("FALSE"),
    }
    f
}

/// Escape LIKE metacharacters so a search term matches literally
fn like_pattern(term: &str) -> String {
    let mut pattern = String::with_capacity(term.len() + 2);
    pattern.push('%');
    for c in term.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// Render one condition to a boolean SQL fragment over the `doc` column
pub fn render_condition(condition: &Condition) -> Fragment {
    match condition {
        Condition::Eq(field, value) => render_eq(field, value),
        Condition::Ne(field, value) => Fragment::negate(render_eq(field, value)),
        Condition::Compare(field, op, value) => render_compare(field, *op, value),
        Condition::In(field, values) => Fragment::join(
            values.iter().map(|v| render_eq(field, v)).collect(),
            " OR ",
            "FALSE",
        ),
        Condition::NotIn(field, values) => {
            if values.is_empty() {
                return Fragment::raw("TRUE");
            }
            Fragment::negate(render_condition(&Condition::In(field.clone(), values.clone())))
        }
        Condition::All(field, values) => {
            if values.is_empty() {
                return Fragment::raw("FALSE");
            }
            let mut f = Fragment::raw("COALESCE(CASE WHEN jsonb_typeof(");
            f.field(field)
                .sql(") = 'array' THEN ")
                .field(field)
                .sql(" ELSE jsonb_build_array(")
                .field(field)
                .sql(") END @> ")
                .json(&Value::Array(values.clone()))
                .sql(", FALSE)");
            f
        }
        Condition::Exists(field, expected) => {
            let mut f = Fragment::new();
            f.field(field).sql(if *expected { " IS NOT NULL" } else { " IS NULL" });
            f
        }
        Condition::Search(term) => {
            let mut f = Fragment::raw(
                "EXISTS (SELECT 1 FROM jsonb_each(doc) AS s(k, v) WHERE s.k <> '_id' \
                 AND jsonb_typeof(s.v) = 'string' AND (s.v #>> '{}') ILIKE ",
            );
            f.text(&like_pattern(term)).sql(")");
            f
        }
        Condition::Point(field) => {
            let mut f = Fragment::raw("CASE WHEN jsonb_typeof(");
            f.field(field)
                .sql(") = 'array' THEN jsonb_array_length(")
                .field(field)
                .sql(") = 2 AND jsonb_typeof(")
                .field(field)
                .sql(" -> 0) = 'number' AND jsonb_typeof(")
                .field(field)
                .sql(" -> 1) = 'number' ELSE FALSE END");
            f
        }
        Condition::And(conditions) => {
            Fragment::join(conditions.iter().map(render_condition).collect(), " AND ", "TRUE")
        }
        Condition::Or(conditions) => {
            Fragment::join(conditions.iter().map(render_condition).collect(), " OR ", "FALSE")
        }
    }
}

fn table(collection: &str) -> Alias {
    Alias::new(collection.to_string())
}

fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('"', "\"\""))
}

fn order(direction: Direction) -> Order {
    match direction {
        Direction::Asc => Order::Asc,
        Direction::Desc => Order::Desc,
    }
}

/// Build the ordered, paged SELECT for a query, reading `column`
pub fn select_statement(collection: &str, query: &Query, column: &str) -> SelectStatement {
    let mut stmt = sea_query::Query::select();
    stmt.expr(Expr::cust(column.to_string())).from(table(collection));
    for condition in query.selector.conditions() {
        stmt.and_where(render_condition(condition).into_expr());
    }

    if let Some(near) = &query.near {
        let mut distance = Fragment::raw("power((");
        distance
            .field(&near.field)
            .sql(" ->> 0)::float8 - ")
            .double(near.point[0])
            .sql(", 2) + power((")
            .field(&near.field)
            .sql(" ->> 1)::float8 - ")
            .double(near.point[1])
            .sql(", 2)");
        stmt.order_by_expr(distance.into_expr(), order(near.direction));
    }
    for (field, direction) in &query.sort {
        let mut key = Fragment::new();
        key.field(field);
        // Missing fields sort before everything else, as in the memory store
        let nulls = match direction {
            Direction::Asc => NullOrdering::First,
            Direction::Desc => NullOrdering::Last,
        };
        stmt.order_by_expr_with_nulls(key.into_expr(), order(*direction), nulls);
    }
    stmt.order_by_expr(Expr::cust("seq"), order(query.natural));

    if let Some(limit) = query.limit {
        stmt.limit(limit);
    }
    if let Some(skip) = query.skip {
        stmt.offset(skip);
    }
    stmt
}

/// Build the COUNT(*) statement for a query; paging and ordering are dropped
pub fn count_statement(collection: &str, query: &Query) -> SelectStatement {
    let mut stmt = sea_query::Query::select();
    stmt.expr(Expr::cust("COUNT(*)")).from(table(collection));
    for condition in query.selector.conditions() {
        stmt.and_where(render_condition(condition).into_expr());
    }
    stmt
}

/// The rows an update touches: the query's own page, cut to one row unless
/// `multi`
fn update_targets(query: &Query, multi: bool) -> Query {
    let mut targets = query.clone();
    if !multi {
        targets.limit = Some(targets.limit.map_or(1, |limit| limit.min(1)));
    }
    targets
}

/// Document store over one Postgres database
pub struct PostgresStore<Ex> {
    executor: Ex,
}

impl<Ex: LifeExecutor> PostgresStore<Ex> {
    pub fn new(executor: Ex) -> Self {
        Self { executor }
    }

    pub fn executor(&self) -> &Ex {
        &self.executor
    }

    /// Create the collection table and its `_id` index when missing
    pub fn ensure_collection(&self, collection: &str) -> Result<(), LifeError> {
        let name = quote_ident(collection);
        let index = quote_ident(&format!("{collection}_id_idx"));
        self.executor.execute(
            &format!("CREATE TABLE IF NOT EXISTS {name} (seq BIGSERIAL PRIMARY KEY, doc JSONB NOT NULL)"),
            &[],
        )?;
        self.executor.execute(
            &format!("CREATE UNIQUE INDEX IF NOT EXISTS {index} ON {name} ((doc->>'_id'))"),
            &[],
        )?;
        Ok(())
    }

    fn query_rows(
        &self,
        collection: &str,
        (sql, values): (String, Values),
    ) -> Result<Vec<may_postgres::Row>, LifeError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::store_span("query", collection).entered();

        log::debug!("postgres query on {collection}: {sql}");
        with_converted_params(&values, |params| self.executor.query_all(&sql, params))
    }

    fn execute(&self, collection: &str, (sql, values): (String, Values)) -> Result<u64, LifeError> {
        #[cfg(feature = "tracing")]
        let _span = tracing_helpers::store_span("execute", collection).entered();

        log::debug!("postgres statement on {collection}: {sql}");
        with_converted_params(&values, |params| self.executor.execute(&sql, params))
    }
}

fn decode_document(text: &str) -> Result<Attributes, LifeError> {
    let value: Value = serde_json::from_str(text)
        .map_err(|e| LifeError::ParseError(format!("Stored document is not valid JSON: {e}")))?;
    Attributes::try_from(value)
}

impl<Ex: LifeExecutor> DocumentStore for PostgresStore<Ex> {
    fn select(&self, collection: &str, query: &Query) -> Result<Vec<Attributes>, LifeError> {
        let stmt = select_statement(collection, query, "doc::text");
        let rows = self.query_rows(collection, stmt.build(PostgresQueryBuilder))?;
        rows.iter()
            .map(|row| {
                let text: String = row.get(0);
                decode_document(&text).map(|doc| query.projection.apply(doc))
            })
            .collect()
    }

    fn count(&self, collection: &str, query: &Query) -> Result<u64, LifeError> {
        let stmt = count_statement(collection, query);
        let rows = self.query_rows(collection, stmt.build(PostgresQueryBuilder))?;
        let count: i64 = rows.first().map(|row| row.get(0)).unwrap_or(0);
        u64::try_from(count).map_err(|_| LifeError::Other(format!("Count cannot be negative: {count}")))
    }

    fn insert(&self, collection: &str, mut document: Attributes) -> Result<Attributes, LifeError> {
        if matches!(document.get(ID_FIELD), None | Some(Value::Null)) {
            document.insert(ID_FIELD, generate_id());
        }
        let mut value = Fragment::new();
        value.json(&document.clone().into_value());

        let mut stmt = sea_query::Query::insert();
        stmt.into_table(table(collection))
            .columns([Alias::new("doc")])
            .values([value.into_expr()])
            .map_err(|e| LifeError::QueryError(format!("Failed to build insert: {e}")))?;
        self.execute(collection, stmt.build(PostgresQueryBuilder))?;
        Ok(document)
    }

    fn update(
        &self,
        collection: &str,
        query: &Query,
        changes: &Attributes,
        multi: bool,
    ) -> Result<u64, LifeError> {
        check_changes(changes)?;

        let targets = select_statement(collection, &update_targets(query, multi), "seq");
        let rows = self.query_rows(collection, targets.build(PostgresQueryBuilder))?;
        let seqs: Vec<i64> = rows.iter().map(|row| row.get(0)).collect();
        if seqs.is_empty() {
            return Ok(0);
        }

        let mut merged = Fragment::raw("doc || ");
        merged.json(&changes.clone().into_value());
        let seq_list = format!(
            "{{{}}}",
            seqs.iter().map(i64::to_string).collect::<Vec<_>>().join(",")
        );
        let mut matching = Fragment::raw("seq = ANY(CAST(");
        matching.text(&seq_list).sql(" AS bigint[]))");

        let mut stmt = sea_query::Query::update();
        stmt.table(table(collection))
            .value(Alias::new("doc"), merged.into_expr())
            .and_where(matching.into_expr());
        self.execute(collection, stmt.build(PostgresQueryBuilder))
    }
}

//! Statement rendering.
//!
//! Maps a [`StatementSpec`] and compiled predicate to concrete SQL text plus
//! an ordered parameter list for the active dialect. Parameter order always
//! matches placeholder order; every identifier is sanitized before it reaches
//! the SQL text.

use crate::error::{DbError, DbResult};
use crate::models::QueryParam;
use crate::sql::ident::sanitize_identifier;
use crate::sql::predicate::Predicate;
use crate::sql::{Dialect, Placeholders};
use serde_json::Value as JsonValue;

/// Target table for a structured statement.
///
/// MySQL embeds the database in every statement as `` `db`.`table` ``.
/// Postgres statements use the bare table name: the connection is already
/// bound to a database, and the schema qualifier only applies to catalog
/// queries.
#[derive(Debug, Clone)]
pub struct TableRef {
    pub database: String,
    pub schema: Option<String>,
    pub table: String,
}

impl TableRef {
    pub fn new(
        database: impl Into<String>,
        schema: Option<String>,
        table: impl Into<String>,
    ) -> Self {
        Self {
            database: database.into(),
            schema,
            table: table.into(),
        }
    }

    /// Effective schema for catalog queries (Postgres defaults to "public").
    pub fn schema_or_default(&self) -> &str {
        self.schema.as_deref().unwrap_or("public")
    }

    fn qualified(&self, dialect: Dialect) -> DbResult<String> {
        let table = sanitize_identifier(&self.table)
            .ok_or_else(|| DbError::validation(format!("invalid table name: '{}'", self.table)))?;
        match dialect {
            Dialect::MySql => {
                let database = sanitize_identifier(&self.database).ok_or_else(|| {
                    DbError::validation(format!("invalid database name: '{}'", self.database))
                })?;
                Ok(format!(
                    "{}.{}",
                    dialect.quote(&database),
                    dialect.quote(&table)
                ))
            }
            Dialect::Postgres => Ok(table),
        }
    }
}

/// A structured statement to render. Each variant owns its fields; nothing
/// is shared between requests.
#[derive(Debug, Clone)]
pub enum StatementSpec {
    Select {
        table: TableRef,
        /// Empty means `*`
        columns: Vec<String>,
        predicate: Predicate,
        order_by: Vec<String>,
        /// Guardrail-clamped effective limit
        limit: u64,
        offset: Option<u64>,
    },
    Insert {
        table: TableRef,
        /// Ordered column/value pairs (see [`column_values_from_map`])
        values: Vec<(String, QueryParam)>,
    },
    Update {
        table: TableRef,
        values: Vec<(String, QueryParam)>,
        predicate: Predicate,
    },
    Delete {
        table: TableRef,
        predicate: Predicate,
    },
}

/// Build an ordered column/value sequence from a JSON object.
///
/// Column names are sanitized and the pairs are sorted by column name so the
/// SQL text and parameter list can never desynchronize, regardless of the
/// map's internal iteration order.
pub fn column_values_from_map(
    map: &serde_json::Map<String, JsonValue>,
) -> DbResult<Vec<(String, QueryParam)>> {
    let mut pairs = Vec::with_capacity(map.len());
    for (column, value) in map {
        let column = sanitize_identifier(column)
            .ok_or_else(|| DbError::validation(format!("invalid column name: '{}'", column)))?;
        pairs.push((column, QueryParam::from_json(value)));
    }
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(pairs)
}

/// Render a statement spec into SQL text and its ordered parameter list.
pub fn render(spec: &StatementSpec, dialect: Dialect) -> DbResult<(String, Vec<QueryParam>)> {
    match spec {
        StatementSpec::Select {
            table,
            columns,
            predicate,
            order_by,
            limit,
            offset,
        } => render_select(table, columns, predicate, order_by, *limit, *offset, dialect),
        StatementSpec::Insert { table, values } => render_insert(table, values, dialect),
        StatementSpec::Update {
            table,
            values,
            predicate,
        } => render_update(table, values, predicate, dialect),
        StatementSpec::Delete { table, predicate } => render_delete(table, predicate, dialect),
    }
}

/// Render the preflight `COUNT(*)` for a mutation, reusing the identical
/// compiled predicate so the count measures exactly what the mutation would
/// touch.
pub fn render_count(
    table: &TableRef,
    predicate: &Predicate,
    dialect: Dialect,
) -> DbResult<(String, Vec<QueryParam>)> {
    let mut ph = Placeholders::new(dialect);
    let mut params = Vec::new();
    let mut sql = format!("SELECT COUNT(*) FROM {}", table.qualified(dialect)?);
    if !predicate.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicate.render(&mut ph, &mut params));
    }
    Ok((sql, params))
}

fn render_select(
    table: &TableRef,
    columns: &[String],
    predicate: &Predicate,
    order_by: &[String],
    limit: u64,
    offset: Option<u64>,
    dialect: Dialect,
) -> DbResult<(String, Vec<QueryParam>)> {
    let projection = if columns.is_empty() {
        "*".to_string()
    } else {
        columns
            .iter()
            .map(|c| {
                sanitize_identifier(c)
                    .ok_or_else(|| DbError::validation(format!("invalid column name: '{}'", c)))
            })
            .collect::<DbResult<Vec<_>>>()?
            .join(", ")
    };

    let mut ph = Placeholders::new(dialect);
    let mut params = Vec::new();
    let mut sql = format!("SELECT {} FROM {}", projection, table.qualified(dialect)?);

    if !predicate.is_empty() {
        sql.push_str(" WHERE ");
        sql.push_str(&predicate.render(&mut ph, &mut params));
    }

    if !order_by.is_empty() {
        let entries = order_by
            .iter()
            .map(|o| {
                sanitize_identifier(o)
                    .ok_or_else(|| DbError::validation(format!("invalid ORDER BY entry: '{}'", o)))
            })
            .collect::<DbResult<Vec<_>>>()?;
        sql.push_str(" ORDER BY ");
        sql.push_str(&entries.join(", "));
    }

    sql.push_str(&format!(" LIMIT {}", limit));
    if let Some(offset) = offset.filter(|o| *o > 0) {
        sql.push_str(&format!(" OFFSET {}", offset));
    }

    Ok((sql, params))
}

fn render_insert(
    table: &TableRef,
    values: &[(String, QueryParam)],
    dialect: Dialect,
) -> DbResult<(String, Vec<QueryParam>)> {
    if values.is_empty() {
        return Err(DbError::query_build("INSERT requires at least one column"));
    }

    let mut ph = Placeholders::new(dialect);
    let columns: Vec<&str> = values.iter().map(|(c, _)| c.as_str()).collect();
    let placeholders: Vec<String> = values.iter().map(|_| ph.next()).collect();
    let params: Vec<QueryParam> = values.iter().map(|(_, v)| v.clone()).collect();

    let sql = format!(
        "INSERT INTO {} ({}) VALUES ({})",
        table.qualified(dialect)?,
        columns.join(", "),
        placeholders.join(", ")
    );
    Ok((sql, params))
}

fn render_update(
    table: &TableRef,
    values: &[(String, QueryParam)],
    predicate: &Predicate,
    dialect: Dialect,
) -> DbResult<(String, Vec<QueryParam>)> {
    if values.is_empty() {
        return Err(DbError::query_build("UPDATE requires at least one column"));
    }
    if predicate.is_empty() {
        // The guardrail engine rejects this earlier; refuse here as well so
        // the builder can never emit an unbounded UPDATE.
        return Err(DbError::query_build(
            "refusing to render UPDATE without WHERE",
        ));
    }

    let mut ph = Placeholders::new(dialect);
    let mut params = Vec::with_capacity(values.len() + predicate.len());

    let assignments: Vec<String> = values
        .iter()
        .map(|(column, value)| {
            params.push(value.clone());
            format!("{} = {}", column, ph.next())
        })
        .collect();

    let mut sql = format!(
        "UPDATE {} SET {}",
        table.qualified(dialect)?,
        assignments.join(", ")
    );
    sql.push_str(" WHERE ");
    sql.push_str(&predicate.render(&mut ph, &mut params));

    Ok((sql, params))
}

fn render_delete(
    table: &TableRef,
    predicate: &Predicate,
    dialect: Dialect,
) -> DbResult<(String, Vec<QueryParam>)> {
    if predicate.is_empty() {
        return Err(DbError::query_build(
            "refusing to render DELETE without WHERE",
        ));
    }

    let mut ph = Placeholders::new(dialect);
    let mut params = Vec::new();
    let mut sql = format!("DELETE FROM {}", table.qualified(dialect)?);
    sql.push_str(" WHERE ");
    sql.push_str(&predicate.render(&mut ph, &mut params));

    Ok((sql, params))
}

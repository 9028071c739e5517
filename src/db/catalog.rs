//! Schema introspection.
//!
//! Read-only catalog queries against `information_schema`, `pg_catalog`, and
//! the MySQL SHOW commands. Results come back as typed structs so the tool
//! layer can format them without re-parsing driver rows.

use crate::db::executor::Executor;
use crate::db::pool::DbPool;
use crate::error::{DbError, DbResult};
use crate::models::QueryParam;
use crate::sql::{Dialect, sanitize_identifier};
use schemars::JsonSchema;
use serde::Serialize;
use serde_json::Value as JsonValue;

/// Upper bound for catalog result sets; real schemas sit far below this.
const CATALOG_ROW_LIMIT: u64 = 10_000;

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TableColumn {
    pub name: String,
    /// Rendered type including length/precision, e.g. `varchar(255)`
    pub data_type: String,
    pub nullable: bool,
    pub default: Option<String>,
    /// MySQL column key marker (PRI, UNI, MUL); empty for Postgres
    pub key: Option<String>,
    /// MySQL extra info (auto_increment etc.); empty for Postgres
    pub extra: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ForeignKey {
    pub column: String,
    pub referenced_schema: String,
    pub referenced_table: String,
    pub referenced_column: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct IndexInfo {
    pub name: String,
    /// "UNIQUE" or "INDEX" for MySQL; the index definition for Postgres
    pub detail: String,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct TableSchema {
    pub database: String,
    pub schema: Option<String>,
    pub table: String,
    pub columns: Vec<TableColumn>,
    pub foreign_keys: Vec<ForeignKey>,
    pub indexes: Vec<IndexInfo>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SequenceInfo {
    pub name: String,
    pub data_type: String,
    /// Postgres start/min/max/increment; absent for MySQL auto_increment
    pub start_value: Option<String>,
    pub min_value: Option<String>,
    pub max_value: Option<String>,
    pub increment: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CustomType {
    pub name: String,
    /// enum, composite, or domain
    pub category: String,
    /// Labels in declared order, for enum types only
    pub values: Vec<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum RoutineKind {
    Function,
    Procedure,
    Aggregate,
    Window,
}

impl RoutineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Function => "function",
            Self::Procedure => "procedure",
            Self::Aggregate => "aggregate",
            Self::Window => "window",
        }
    }
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RoutineInfo {
    pub name: String,
    pub kind: RoutineKind,
    pub arguments: Option<String>,
    pub return_type: Option<String>,
    pub language: Option<String>,
    pub created: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RoutineSource {
    pub name: String,
    pub kind: RoutineKind,
    pub definition: String,
}

/// List table names in a database (Postgres: within a schema).
pub async fn list_tables(
    executor: &Executor,
    pool: &DbPool,
    database: &str,
    schema: &str,
) -> DbResult<Vec<String>> {
    let result = match pool.dialect() {
        Dialect::Postgres => {
            executor
                .fetch(
                    pool,
                    "SELECT tablename FROM pg_tables WHERE schemaname = $1 ORDER BY tablename",
                    &[QueryParam::String(schema.to_string())],
                    CATALOG_ROW_LIMIT,
                )
                .await?
        }
        Dialect::MySql => {
            // SHOW does not accept bind parameters; the name is sanitized
            // and quoted instead.
            let database = sanitize_identifier(database).ok_or_else(|| {
                DbError::validation(format!("invalid database name: '{database}'"))
            })?;
            executor
                .fetch(
                    pool,
                    &format!("SHOW TABLES FROM {}", Dialect::MySql.quote(&database)),
                    &[],
                    CATALOG_ROW_LIMIT,
                )
                .await?
        }
    };

    Ok(result
        .rows
        .iter()
        .filter_map(|row| row.values().next().and_then(JsonValue::as_str))
        .map(str::to_string)
        .collect())
}

/// Full schema for one table: columns, foreign keys, and indexes.
pub async fn table_schema(
    executor: &Executor,
    pool: &DbPool,
    database: &str,
    schema: &str,
    table: &str,
) -> DbResult<TableSchema> {
    let columns = match pool.dialect() {
        Dialect::Postgres => postgres_columns(executor, pool, database, schema, table).await?,
        Dialect::MySql => mysql_columns(executor, pool, database, table).await?,
    };
    if columns.is_empty() {
        return Err(DbError::not_found("table", table));
    }

    let foreign_keys = match pool.dialect() {
        Dialect::Postgres => postgres_foreign_keys(executor, pool, schema, table).await?,
        Dialect::MySql => mysql_foreign_keys(executor, pool, database, table).await?,
    };
    let indexes = match pool.dialect() {
        Dialect::Postgres => postgres_indexes(executor, pool, schema, table).await?,
        Dialect::MySql => mysql_indexes(executor, pool, database, table).await?,
    };

    Ok(TableSchema {
        database: database.to_string(),
        schema: match pool.dialect() {
            Dialect::Postgres => Some(schema.to_string()),
            Dialect::MySql => None,
        },
        table: table.to_string(),
        columns,
        foreign_keys,
        indexes,
    })
}

/// Sequences (Postgres) or auto-increment columns (MySQL).
pub async fn sequences(
    executor: &Executor,
    pool: &DbPool,
    database: &str,
    schema: &str,
) -> DbResult<Vec<SequenceInfo>> {
    match pool.dialect() {
        Dialect::Postgres => {
            let sql = "SELECT sequence_name, data_type, start_value, minimum_value, \
                       maximum_value, increment \
                       FROM information_schema.sequences \
                       WHERE sequence_catalog = $1 AND sequence_schema = $2 \
                       ORDER BY sequence_name";
            let result = executor
                .fetch(
                    pool,
                    sql,
                    &[
                        QueryParam::String(database.to_string()),
                        QueryParam::String(schema.to_string()),
                    ],
                    CATALOG_ROW_LIMIT,
                )
                .await?;
            Ok(result
                .rows
                .iter()
                .map(|row| SequenceInfo {
                    name: text(row, "sequence_name"),
                    data_type: text(row, "data_type"),
                    start_value: opt_text(row, "start_value"),
                    min_value: opt_text(row, "minimum_value"),
                    max_value: opt_text(row, "maximum_value"),
                    increment: opt_text(row, "increment"),
                })
                .collect())
        }
        Dialect::MySql => {
            let sql = "SELECT TABLE_NAME AS table_name, COLUMN_NAME AS column_name, \
                       DATA_TYPE AS data_type \
                       FROM INFORMATION_SCHEMA.COLUMNS \
                       WHERE TABLE_SCHEMA = ? AND EXTRA LIKE '%auto_increment%' \
                       ORDER BY TABLE_NAME, ORDINAL_POSITION";
            let result = executor
                .fetch(
                    pool,
                    sql,
                    &[QueryParam::String(database.to_string())],
                    CATALOG_ROW_LIMIT,
                )
                .await?;
            Ok(result
                .rows
                .iter()
                .map(|row| SequenceInfo {
                    name: format!("{}.{}", text(row, "table_name"), text(row, "column_name")),
                    data_type: text(row, "data_type"),
                    start_value: None,
                    min_value: None,
                    max_value: None,
                    increment: None,
                })
                .collect())
        }
    }
}

/// Enum, composite, and domain types in a Postgres schema, with enum labels
/// expanded in declared order.
pub async fn custom_types(
    executor: &Executor,
    pool: &DbPool,
    schema: &str,
) -> DbResult<Vec<CustomType>> {
    let sql = "SELECT t.typname AS type_name, t.typtype AS type_kind, \
               CASE t.typtype \
                   WHEN 'e' THEN 'enum' \
                   WHEN 'c' THEN 'composite' \
                   WHEN 'd' THEN 'domain' \
                   ELSE 'other' \
               END AS type_category \
               FROM pg_type t \
               JOIN pg_namespace n ON n.oid = t.typnamespace \
               WHERE n.nspname = $1 AND t.typtype IN ('e', 'c', 'd') \
               ORDER BY t.typname";
    let result = executor
        .fetch(
            pool,
            sql,
            &[QueryParam::String(schema.to_string())],
            CATALOG_ROW_LIMIT,
        )
        .await?;

    let mut types = Vec::with_capacity(result.rows.len());
    for row in &result.rows {
        let name = text(row, "type_name");
        let values = if text(row, "type_kind") == "e" {
            enum_labels(executor, pool, schema, &name).await?
        } else {
            Vec::new()
        };
        types.push(CustomType {
            name,
            category: text(row, "type_category"),
            values,
        });
    }
    Ok(types)
}

async fn enum_labels(
    executor: &Executor,
    pool: &DbPool,
    schema: &str,
    type_name: &str,
) -> DbResult<Vec<String>> {
    let sql = "SELECT e.enumlabel FROM pg_enum e \
               JOIN pg_type t ON t.oid = e.enumtypid \
               JOIN pg_namespace n ON n.oid = t.typnamespace \
               WHERE n.nspname = $1 AND t.typname = $2 \
               ORDER BY e.enumsortorder";
    let result = executor
        .fetch(
            pool,
            sql,
            &[
                QueryParam::String(schema.to_string()),
                QueryParam::String(type_name.to_string()),
            ],
            CATALOG_ROW_LIMIT,
        )
        .await?;
    Ok(result
        .rows
        .iter()
        .filter_map(|row| row.get("enumlabel").and_then(JsonValue::as_str))
        .map(str::to_string)
        .collect())
}

/// Functions and procedures in a database/schema.
pub async fn routines(
    executor: &Executor,
    pool: &DbPool,
    database: &str,
    schema: &str,
) -> DbResult<Vec<RoutineInfo>> {
    match pool.dialect() {
        Dialect::Postgres => {
            let sql = "SELECT p.proname AS name, p.prokind AS kind, \
                       pg_catalog.pg_get_function_arguments(p.oid) AS arguments, \
                       pg_catalog.pg_get_function_result(p.oid) AS return_type, \
                       l.lanname AS language \
                       FROM pg_proc p \
                       JOIN pg_namespace n ON n.oid = p.pronamespace \
                       JOIN pg_language l ON l.oid = p.prolang \
                       WHERE n.nspname = $1 \
                       ORDER BY p.proname";
            let result = executor
                .fetch(
                    pool,
                    sql,
                    &[QueryParam::String(schema.to_string())],
                    CATALOG_ROW_LIMIT,
                )
                .await?;
            Ok(result
                .rows
                .iter()
                .map(|row| RoutineInfo {
                    name: text(row, "name"),
                    kind: prokind_to_routine(&text(row, "kind")),
                    arguments: opt_text(row, "arguments"),
                    return_type: opt_text(row, "return_type"),
                    language: opt_text(row, "language"),
                    created: None,
                })
                .collect())
        }
        Dialect::MySql => {
            let sql = "SELECT ROUTINE_NAME AS name, ROUTINE_TYPE AS kind, \
                       DTD_IDENTIFIER AS return_type, CREATED AS created \
                       FROM INFORMATION_SCHEMA.ROUTINES \
                       WHERE ROUTINE_SCHEMA = ? \
                       ORDER BY ROUTINE_NAME";
            let result = executor
                .fetch(
                    pool,
                    sql,
                    &[QueryParam::String(database.to_string())],
                    CATALOG_ROW_LIMIT,
                )
                .await?;
            Ok(result
                .rows
                .iter()
                .map(|row| RoutineInfo {
                    name: text(row, "name"),
                    kind: routine_type_to_kind(&text(row, "kind")),
                    arguments: None,
                    return_type: opt_text(row, "return_type"),
                    language: None,
                    created: opt_text(row, "created"),
                })
                .collect())
        }
    }
}

/// Source definition of one function or procedure.
pub async fn routine_source(
    executor: &Executor,
    pool: &DbPool,
    database: &str,
    schema: &str,
    name: &str,
) -> DbResult<RoutineSource> {
    match pool.dialect() {
        Dialect::Postgres => {
            let sql = "SELECT p.proname AS name, p.prokind AS kind, \
                       pg_catalog.pg_get_functiondef(p.oid) AS definition \
                       FROM pg_proc p \
                       JOIN pg_namespace n ON n.oid = p.pronamespace \
                       WHERE n.nspname = $1 AND p.proname = $2";
            let result = executor
                .fetch(
                    pool,
                    sql,
                    &[
                        QueryParam::String(schema.to_string()),
                        QueryParam::String(name.to_string()),
                    ],
                    1,
                )
                .await?;
            let row = result
                .rows
                .first()
                .ok_or_else(|| DbError::not_found("function or procedure", name))?;
            Ok(RoutineSource {
                name: text(row, "name"),
                kind: prokind_to_routine(&text(row, "kind")),
                definition: text(row, "definition"),
            })
        }
        Dialect::MySql => {
            let sql = "SELECT ROUTINE_NAME AS name, ROUTINE_TYPE AS kind, \
                       ROUTINE_DEFINITION AS definition \
                       FROM INFORMATION_SCHEMA.ROUTINES \
                       WHERE ROUTINE_SCHEMA = ? AND ROUTINE_NAME = ?";
            let result = executor
                .fetch(
                    pool,
                    sql,
                    &[
                        QueryParam::String(database.to_string()),
                        QueryParam::String(name.to_string()),
                    ],
                    1,
                )
                .await?;
            let row = result
                .rows
                .first()
                .ok_or_else(|| DbError::not_found("function or procedure", name))?;
            let definition = match opt_text(row, "definition") {
                Some(d) if !d.is_empty() => d,
                _ => "Source code not available".to_string(),
            };
            Ok(RoutineSource {
                name: text(row, "name"),
                kind: routine_type_to_kind(&text(row, "kind")),
                definition,
            })
        }
    }
}

/// Look up whether a routine is a function or procedure before executing it.
pub async fn routine_kind(
    executor: &Executor,
    pool: &DbPool,
    database: &str,
    schema: &str,
    name: &str,
) -> DbResult<RoutineKind> {
    match pool.dialect() {
        Dialect::Postgres => {
            let sql = "SELECT p.prokind AS kind FROM pg_proc p \
                       JOIN pg_namespace n ON n.oid = p.pronamespace \
                       WHERE n.nspname = $1 AND p.proname = $2";
            let result = executor
                .fetch(
                    pool,
                    sql,
                    &[
                        QueryParam::String(schema.to_string()),
                        QueryParam::String(name.to_string()),
                    ],
                    1,
                )
                .await?;
            let row = result
                .rows
                .first()
                .ok_or_else(|| DbError::not_found("function or procedure", name))?;
            Ok(prokind_to_routine(&text(row, "kind")))
        }
        Dialect::MySql => {
            let sql = "SELECT ROUTINE_TYPE AS kind \
                       FROM INFORMATION_SCHEMA.ROUTINES \
                       WHERE ROUTINE_SCHEMA = ? AND ROUTINE_NAME = ?";
            let result = executor
                .fetch(
                    pool,
                    sql,
                    &[
                        QueryParam::String(database.to_string()),
                        QueryParam::String(name.to_string()),
                    ],
                    1,
                )
                .await?;
            let row = result
                .rows
                .first()
                .ok_or_else(|| DbError::not_found("function or procedure", name))?;
            Ok(routine_type_to_kind(&text(row, "kind")))
        }
    }
}

async fn postgres_columns(
    executor: &Executor,
    pool: &DbPool,
    database: &str,
    schema: &str,
    table: &str,
) -> DbResult<Vec<TableColumn>> {
    let sql = "SELECT column_name, data_type, is_nullable, column_default, \
               character_maximum_length, numeric_precision, numeric_scale \
               FROM information_schema.columns \
               WHERE table_catalog = $1 AND table_schema = $2 AND table_name = $3 \
               ORDER BY ordinal_position";
    let result = executor
        .fetch(
            pool,
            sql,
            &[
                QueryParam::String(database.to_string()),
                QueryParam::String(schema.to_string()),
                QueryParam::String(table.to_string()),
            ],
            CATALOG_ROW_LIMIT,
        )
        .await?;

    Ok(result
        .rows
        .iter()
        .map(|row| TableColumn {
            name: text(row, "column_name"),
            data_type: render_data_type(row),
            nullable: text(row, "is_nullable").eq_ignore_ascii_case("yes"),
            default: opt_text(row, "column_default"),
            key: None,
            extra: None,
        })
        .collect())
}

async fn mysql_columns(
    executor: &Executor,
    pool: &DbPool,
    database: &str,
    table: &str,
) -> DbResult<Vec<TableColumn>> {
    let sql = "SELECT COLUMN_NAME AS column_name, DATA_TYPE AS data_type, \
               IS_NULLABLE AS is_nullable, COLUMN_DEFAULT AS column_default, \
               COLUMN_KEY AS column_key, EXTRA AS extra, \
               CHARACTER_MAXIMUM_LENGTH AS character_maximum_length, \
               NUMERIC_PRECISION AS numeric_precision, NUMERIC_SCALE AS numeric_scale \
               FROM INFORMATION_SCHEMA.COLUMNS \
               WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? \
               ORDER BY ORDINAL_POSITION";
    let result = executor
        .fetch(
            pool,
            sql,
            &[
                QueryParam::String(database.to_string()),
                QueryParam::String(table.to_string()),
            ],
            CATALOG_ROW_LIMIT,
        )
        .await?;

    Ok(result
        .rows
        .iter()
        .map(|row| TableColumn {
            name: text(row, "column_name"),
            data_type: render_data_type(row),
            nullable: text(row, "is_nullable").eq_ignore_ascii_case("yes"),
            default: opt_text(row, "column_default"),
            key: opt_text(row, "column_key").filter(|s| !s.is_empty()),
            extra: opt_text(row, "extra").filter(|s| !s.is_empty()),
        })
        .collect())
}

async fn postgres_foreign_keys(
    executor: &Executor,
    pool: &DbPool,
    schema: &str,
    table: &str,
) -> DbResult<Vec<ForeignKey>> {
    let sql = "SELECT kcu.column_name, \
               ccu.table_schema AS foreign_schema, \
               ccu.table_name AS foreign_table, \
               ccu.column_name AS foreign_column \
               FROM information_schema.table_constraints AS tc \
               JOIN information_schema.key_column_usage AS kcu \
                   ON tc.constraint_name = kcu.constraint_name \
                   AND tc.table_schema = kcu.table_schema \
               JOIN information_schema.constraint_column_usage AS ccu \
                   ON ccu.constraint_name = tc.constraint_name \
                   AND ccu.table_schema = tc.table_schema \
               WHERE tc.constraint_type = 'FOREIGN KEY' \
                   AND tc.table_schema = $1 AND tc.table_name = $2";
    let result = executor
        .fetch(
            pool,
            sql,
            &[
                QueryParam::String(schema.to_string()),
                QueryParam::String(table.to_string()),
            ],
            CATALOG_ROW_LIMIT,
        )
        .await?;

    Ok(result
        .rows
        .iter()
        .map(|row| ForeignKey {
            column: text(row, "column_name"),
            referenced_schema: text(row, "foreign_schema"),
            referenced_table: text(row, "foreign_table"),
            referenced_column: text(row, "foreign_column"),
        })
        .collect())
}

async fn mysql_foreign_keys(
    executor: &Executor,
    pool: &DbPool,
    database: &str,
    table: &str,
) -> DbResult<Vec<ForeignKey>> {
    let sql = "SELECT COLUMN_NAME AS column_name, \
               REFERENCED_TABLE_SCHEMA AS foreign_schema, \
               REFERENCED_TABLE_NAME AS foreign_table, \
               REFERENCED_COLUMN_NAME AS foreign_column \
               FROM INFORMATION_SCHEMA.KEY_COLUMN_USAGE \
               WHERE TABLE_SCHEMA = ? AND TABLE_NAME = ? \
                   AND REFERENCED_TABLE_NAME IS NOT NULL";
    let result = executor
        .fetch(
            pool,
            sql,
            &[
                QueryParam::String(database.to_string()),
                QueryParam::String(table.to_string()),
            ],
            CATALOG_ROW_LIMIT,
        )
        .await?;

    Ok(result
        .rows
        .iter()
        .map(|row| ForeignKey {
            column: text(row, "column_name"),
            referenced_schema: text(row, "foreign_schema"),
            referenced_table: text(row, "foreign_table"),
            referenced_column: text(row, "foreign_column"),
        })
        .collect())
}

async fn postgres_indexes(
    executor: &Executor,
    pool: &DbPool,
    schema: &str,
    table: &str,
) -> DbResult<Vec<IndexInfo>> {
    let sql = "SELECT indexname, indexdef FROM pg_indexes \
               WHERE schemaname = $1 AND tablename = $2";
    let result = executor
        .fetch(
            pool,
            sql,
            &[
                QueryParam::String(schema.to_string()),
                QueryParam::String(table.to_string()),
            ],
            CATALOG_ROW_LIMIT,
        )
        .await?;

    Ok(result
        .rows
        .iter()
        .map(|row| IndexInfo {
            name: text(row, "indexname"),
            detail: text(row, "indexdef"),
        })
        .collect())
}

async fn mysql_indexes(
    executor: &Executor,
    pool: &DbPool,
    database: &str,
    table: &str,
) -> DbResult<Vec<IndexInfo>> {
    let database = sanitize_identifier(database)
        .ok_or_else(|| DbError::validation(format!("invalid database name: '{database}'")))?;
    let table = sanitize_identifier(table)
        .ok_or_else(|| DbError::validation(format!("invalid table name: '{table}'")))?;
    let sql = format!(
        "SHOW INDEX FROM {}.{}",
        Dialect::MySql.quote(&database),
        Dialect::MySql.quote(&table)
    );
    let result = executor.fetch(pool, &sql, &[], CATALOG_ROW_LIMIT).await?;

    // One row per indexed column; collapse to one entry per index name and
    // skip the primary key (it shows in the column key markers).
    let mut indexes: Vec<IndexInfo> = Vec::new();
    for row in &result.rows {
        let name = text(row, "Key_name");
        if name.is_empty() || name == "PRIMARY" {
            continue;
        }
        if indexes.iter().any(|i| i.name == name) {
            continue;
        }
        let non_unique = row
            .get("Non_unique")
            .map(|v| v.as_i64() == Some(1) || v.as_str() == Some("1"))
            .unwrap_or(true);
        indexes.push(IndexInfo {
            name,
            detail: if non_unique { "INDEX" } else { "UNIQUE" }.to_string(),
        });
    }
    Ok(indexes)
}

fn prokind_to_routine(prokind: &str) -> RoutineKind {
    match prokind {
        "p" => RoutineKind::Procedure,
        "a" => RoutineKind::Aggregate,
        "w" => RoutineKind::Window,
        _ => RoutineKind::Function,
    }
}

fn routine_type_to_kind(routine_type: &str) -> RoutineKind {
    if routine_type.eq_ignore_ascii_case("procedure") {
        RoutineKind::Procedure
    } else {
        RoutineKind::Function
    }
}

/// Append length or precision to a base type name, e.g. `varchar(255)`,
/// `numeric(10,2)`.
fn render_data_type(row: &serde_json::Map<String, JsonValue>) -> String {
    let mut data_type = text(row, "data_type");
    if let Some(len) = int(row, "character_maximum_length") {
        data_type.push_str(&format!("({len})"));
    } else if let Some(precision) = int(row, "numeric_precision") {
        match int(row, "numeric_scale") {
            Some(scale) => data_type.push_str(&format!("({precision},{scale})")),
            None => data_type.push_str(&format!("({precision})")),
        }
    }
    data_type
}

fn text(row: &serde_json::Map<String, JsonValue>, key: &str) -> String {
    opt_text(row, key).unwrap_or_default()
}

fn opt_text(row: &serde_json::Map<String, JsonValue>, key: &str) -> Option<String> {
    match row.get(key)? {
        JsonValue::String(s) => Some(s.clone()),
        JsonValue::Null => None,
        other => Some(other.to_string()),
    }
}

fn int(row: &serde_json::Map<String, JsonValue>, key: &str) -> Option<i64> {
    row.get(key).and_then(JsonValue::as_i64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(entries: &[(&str, JsonValue)]) -> serde_json::Map<String, JsonValue> {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_render_data_type_char_length() {
        let row = row(&[
            ("data_type", json!("varchar")),
            ("character_maximum_length", json!(255)),
        ]);
        assert_eq!(render_data_type(&row), "varchar(255)");
    }

    #[test]
    fn test_render_data_type_precision_scale() {
        let row = row(&[
            ("data_type", json!("numeric")),
            ("character_maximum_length", json!(null)),
            ("numeric_precision", json!(10)),
            ("numeric_scale", json!(2)),
        ]);
        assert_eq!(render_data_type(&row), "numeric(10,2)");
    }

    #[test]
    fn test_render_data_type_bare() {
        let row = row(&[("data_type", json!("text"))]);
        assert_eq!(render_data_type(&row), "text");
    }

    #[test]
    fn test_prokind_mapping() {
        assert_eq!(prokind_to_routine("f"), RoutineKind::Function);
        assert_eq!(prokind_to_routine("p"), RoutineKind::Procedure);
        assert_eq!(prokind_to_routine("a"), RoutineKind::Aggregate);
        assert_eq!(prokind_to_routine("w"), RoutineKind::Window);
    }

    #[test]
    fn test_routine_type_mapping() {
        assert_eq!(routine_type_to_kind("PROCEDURE"), RoutineKind::Procedure);
        assert_eq!(routine_type_to_kind("FUNCTION"), RoutineKind::Function);
    }

    #[test]
    fn test_opt_text_handles_non_strings() {
        let row = row(&[("a", json!(5)), ("b", json!(null)), ("c", json!("x"))]);
        assert_eq!(opt_text(&row, "a"), Some("5".to_string()));
        assert_eq!(opt_text(&row, "b"), None);
        assert_eq!(opt_text(&row, "c"), Some("x".to_string()));
        assert_eq!(opt_text(&row, "missing"), None);
    }
}

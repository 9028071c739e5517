//! Structured query tools: select, insert, update, delete, and raw SQL.
//!
//! Every handler follows the same shape: allowlist check, guardrail gates,
//! statement rendering, execution. Handlers never build SQL themselves; they
//! delegate to the statement builder so policy and rendering stay in one
//! place.

use crate::db::executor::Executor;
use crate::db::pool::DbPool;
use crate::error::DbResult;
use crate::models::{QueryParam, QueryResult};
use crate::sql::guard::is_read_only_statement;
use crate::sql::{
    FilterClause, Guardrails, MutationKind, Predicate, StatementSpec, TableRef,
    column_values_from_map, render, render_count,
};
use crate::tools::format::{OutputFormat, RowsOutput};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::info;

/// Shared per-process state handed to every tool handler.
pub struct ServerState {
    pub pool: DbPool,
    pub executor: Executor,
    pub guardrails: Guardrails,
}

/// Input for the query_select tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SelectInput {
    /// Target database (must be on the configured allowlist)
    pub database: String,
    /// Table name
    pub table: String,
    /// Schema (PostgreSQL only, defaults to "public")
    #[serde(default)]
    pub schema: Option<String>,
    /// Columns to return; empty means all columns
    #[serde(default)]
    pub columns: Vec<String>,
    /// WHERE conditions, combined with AND
    #[serde(default)]
    pub filters: Vec<FilterClause>,
    /// ORDER BY entries, e.g. "name" or "created_at DESC"
    #[serde(default)]
    pub order_by: Vec<String>,
    /// Maximum rows to return (clamped to the configured cap)
    #[serde(default)]
    pub limit: Option<u64>,
    /// Rows to skip
    #[serde(default)]
    pub offset: Option<u64>,
    /// Output format: json (default), table, or markdown
    #[serde(default)]
    pub format: OutputFormat,
}

/// Input for the query_insert tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct InsertInput {
    /// Target database (must be on the configured allowlist)
    pub database: String,
    /// Table name
    pub table: String,
    /// Schema (PostgreSQL only, defaults to "public")
    #[serde(default)]
    pub schema: Option<String>,
    /// Column-to-value map for the new row
    pub values: serde_json::Map<String, JsonValue>,
}

/// Input for the query_update tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct UpdateInput {
    /// Target database (must be on the configured allowlist)
    pub database: String,
    /// Table name
    pub table: String,
    /// Schema (PostgreSQL only, defaults to "public")
    #[serde(default)]
    pub schema: Option<String>,
    /// Column-to-value map with the new values
    pub values: serde_json::Map<String, JsonValue>,
    /// WHERE conditions selecting the rows to update; must not be empty
    pub filters: Vec<FilterClause>,
}

/// Input for the query_delete tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct DeleteInput {
    /// Target database (must be on the configured allowlist)
    pub database: String,
    /// Table name
    pub table: String,
    /// Schema (PostgreSQL only, defaults to "public")
    #[serde(default)]
    pub schema: Option<String>,
    /// WHERE conditions selecting the rows to delete; must not be empty
    pub filters: Vec<FilterClause>,
}

/// Input for the query_raw tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RawInput {
    /// Target database (must be on the configured allowlist)
    pub database: String,
    /// SQL text with positional placeholders ($1... or ?)
    pub sql: String,
    /// Positional parameter values
    #[serde(default)]
    pub params: Vec<JsonValue>,
    /// Maximum rows to return for reads (clamped to the configured cap)
    #[serde(default)]
    pub limit: Option<u64>,
    /// Output format: json (default), table, or markdown
    #[serde(default)]
    pub format: OutputFormat,
}

/// Output for mutating tools.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct MutationOutput {
    /// Rows affected as reported by the database
    pub rows_affected: u64,
    /// Rows matched by the preflight count, for update/delete
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_matched: Option<u64>,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
    /// Set when lenient filter mode dropped clauses from the predicate
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

pub struct QueryTools {
    state: Arc<ServerState>,
}

impl QueryTools {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    pub async fn select(&self, input: SelectInput) -> DbResult<RowsOutput> {
        let state = &self.state;
        state.guardrails.check_database(&input.database)?;

        let predicate =
            Predicate::compile(&input.filters, state.guardrails.lenient_filters())?;
        let warning = dropped_filter_warning(input.filters.len(), &predicate);
        let limit = state.guardrails.clamp_select_limit(input.limit);

        let spec = StatementSpec::Select {
            table: TableRef::new(&input.database, input.schema.clone(), &input.table),
            columns: input.columns,
            predicate,
            order_by: input.order_by,
            limit,
            offset: input.offset,
        };
        let (sql, params) = render(&spec, state.pool.dialect())?;

        let result = state
            .executor
            .fetch(&state.pool, &sql, &params, limit)
            .await?;
        info!(
            database = %input.database,
            table = %input.table,
            rows = result.row_count(),
            truncated = result.truncated,
            "select completed"
        );
        Ok(RowsOutput::from_result_with_warning(
            result,
            input.format,
            warning,
        ))
    }

    pub async fn insert(&self, input: InsertInput) -> DbResult<MutationOutput> {
        let state = &self.state;
        state.guardrails.check_database(&input.database)?;
        state.guardrails.check_mutation_allowed(MutationKind::Insert)?;

        let spec = StatementSpec::Insert {
            table: TableRef::new(&input.database, input.schema.clone(), &input.table),
            values: column_values_from_map(&input.values)?,
        };
        let (sql, params) = render(&spec, state.pool.dialect())?;

        let result = state.executor.execute(&state.pool, &sql, &params).await?;
        info!(
            database = %input.database,
            table = %input.table,
            rows_affected = result.rows_affected,
            "insert completed"
        );
        Ok(mutation_output(result, None, None))
    }

    pub async fn update(&self, input: UpdateInput) -> DbResult<MutationOutput> {
        let state = &self.state;
        state.guardrails.check_database(&input.database)?;
        state.guardrails.check_mutation_allowed(MutationKind::Update)?;

        let predicate =
            Predicate::compile(&input.filters, state.guardrails.lenient_filters())?;
        let warning = dropped_filter_warning(input.filters.len(), &predicate);
        state
            .guardrails
            .require_predicate(&predicate, MutationKind::Update)?;

        let table = TableRef::new(&input.database, input.schema.clone(), &input.table);
        let matched = self.preflight_count(&table, &predicate).await?;
        state
            .guardrails
            .check_mutation_count(MutationKind::Update, matched)?;

        let spec = StatementSpec::Update {
            table,
            values: column_values_from_map(&input.values)?,
            predicate,
        };
        let (sql, params) = render(&spec, state.pool.dialect())?;

        let result = state.executor.execute(&state.pool, &sql, &params).await?;
        info!(
            database = %input.database,
            table = %input.table,
            matched,
            rows_affected = result.rows_affected,
            "update completed"
        );
        Ok(mutation_output(result, Some(matched), warning))
    }

    pub async fn delete(&self, input: DeleteInput) -> DbResult<MutationOutput> {
        let state = &self.state;
        state.guardrails.check_database(&input.database)?;
        state.guardrails.check_mutation_allowed(MutationKind::Delete)?;

        let predicate =
            Predicate::compile(&input.filters, state.guardrails.lenient_filters())?;
        let warning = dropped_filter_warning(input.filters.len(), &predicate);
        state
            .guardrails
            .require_predicate(&predicate, MutationKind::Delete)?;

        let table = TableRef::new(&input.database, input.schema.clone(), &input.table);
        let matched = self.preflight_count(&table, &predicate).await?;
        state
            .guardrails
            .check_mutation_count(MutationKind::Delete, matched)?;

        let spec = StatementSpec::Delete { table, predicate };
        let (sql, params) = render(&spec, state.pool.dialect())?;

        let result = state.executor.execute(&state.pool, &sql, &params).await?;
        info!(
            database = %input.database,
            table = %input.table,
            matched,
            rows_affected = result.rows_affected,
            "delete completed"
        );
        Ok(mutation_output(result, Some(matched), warning))
    }

    /// Run caller-supplied SQL. Statements classified as reads go through
    /// the fetch path with the row limit; everything else executes as a
    /// write (and is rejected earlier in read-only mode). The statement
    /// runs in the context of the named database, so unqualified table
    /// names on MySQL resolve there rather than in the primary database.
    pub async fn raw(&self, input: RawInput) -> DbResult<RowsOutput> {
        let state = &self.state;
        let dialect = state.pool.dialect();
        state.guardrails.check_database(&input.database)?;
        state.guardrails.check_raw_statement(&input.sql, dialect)?;

        let params: Vec<QueryParam> = input.params.iter().map(QueryParam::from_json).collect();

        let result = if is_read_only_statement(&input.sql, dialect) {
            let limit = state.guardrails.clamp_select_limit(input.limit);
            state
                .executor
                .fetch_in_database(&state.pool, &input.database, &input.sql, &params, limit)
                .await?
        } else {
            state
                .executor
                .execute_in_database(&state.pool, &input.database, &input.sql, &params)
                .await?
        };
        info!(
            database = %input.database,
            rows = result.row_count(),
            rows_affected = result.rows_affected,
            "raw query completed"
        );
        Ok(RowsOutput::from_result(result, input.format))
    }

    /// Count rows the mutation predicate matches, with the same bound
    /// parameters the mutation will use.
    async fn preflight_count(&self, table: &TableRef, predicate: &Predicate) -> DbResult<u64> {
        let state = &self.state;
        let (sql, params) = render_count(table, predicate, state.pool.dialect())?;
        state.executor.fetch_count(&state.pool, &sql, &params).await
    }
}

fn mutation_output(
    result: QueryResult,
    rows_matched: Option<u64>,
    warning: Option<String>,
) -> MutationOutput {
    MutationOutput {
        rows_affected: result.rows_affected.unwrap_or(0),
        rows_matched,
        execution_time_ms: result.execution_time_ms,
        warning,
    }
}

/// In lenient mode invalid clauses are dropped; surface that in the output
/// so a narrowed query is never mistaken for a full one.
fn dropped_filter_warning(requested: usize, predicate: &Predicate) -> Option<String> {
    let dropped = requested.saturating_sub(predicate.len());
    if dropped > 0 {
        Some(format!(
            "{dropped} filter clause(s) were dropped due to invalid columns or operators"
        ))
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_dropped_filter_warning() {
        let filters = vec![FilterClause {
            column: "id".to_string(),
            op: "=".to_string(),
            value: Some(json!(1)),
        }];
        let predicate = Predicate::compile(&filters, true).unwrap();
        assert!(dropped_filter_warning(1, &predicate).is_none());
        assert!(
            dropped_filter_warning(3, &predicate)
                .unwrap()
                .contains("2 filter clause(s)")
        );
    }

    #[test]
    fn test_mutation_output_carries_dropped_filter_warning() {
        let filters = vec![
            FilterClause {
                column: "status; DROP TABLE users".to_string(),
                op: "=".to_string(),
                value: Some(json!("active")),
            },
            FilterClause {
                column: "id".to_string(),
                op: "=".to_string(),
                value: Some(json!(7)),
            },
        ];
        let predicate = Predicate::compile(&filters, true).unwrap();
        assert_eq!(predicate.len(), 1);

        let warning = dropped_filter_warning(filters.len(), &predicate);
        let output = mutation_output(QueryResult::write_result(1, 3), Some(1), warning);
        assert_eq!(output.rows_affected, 1);
        assert!(
            output
                .warning
                .as_deref()
                .unwrap()
                .contains("1 filter clause(s)")
        );

        let rendered = serde_json::to_value(&output).unwrap();
        assert!(rendered.get("warning").is_some());
    }

    #[test]
    fn test_select_input_defaults() {
        let input: SelectInput = serde_json::from_value(json!({
            "database": "app",
            "table": "users"
        }))
        .unwrap();
        assert!(input.columns.is_empty());
        assert!(input.filters.is_empty());
        assert!(input.limit.is_none());
        assert!(matches!(input.format, OutputFormat::Json));
    }

    #[test]
    fn test_update_input_requires_filters_field() {
        let result: Result<UpdateInput, _> = serde_json::from_value(json!({
            "database": "app",
            "table": "users",
            "values": {"status": "x"}
        }));
        assert!(result.is_err());
    }
}

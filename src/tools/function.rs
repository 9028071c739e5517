//! Function and procedure tools: listing, source retrieval, and execution.

use crate::db::catalog::{self, RoutineInfo, RoutineKind, RoutineSource};
use crate::error::{DbError, DbResult};
use crate::models::QueryParam;
use crate::sql::{Dialect, Placeholders, sanitize_identifier};
use crate::tools::query::ServerState;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::sync::Arc;
use tracing::info;

/// Input for the get_functions tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListRoutinesInput {
    /// Target database (must be on the configured allowlist)
    pub database: String,
    /// Schema (PostgreSQL only, defaults to "public")
    #[serde(default)]
    pub schema: Option<String>,
}

/// Input for the get_function_source tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct RoutineSourceInput {
    /// Target database (must be on the configured allowlist)
    pub database: String,
    /// Function or procedure name
    pub name: String,
    /// Schema (PostgreSQL only, defaults to "public")
    #[serde(default)]
    pub schema: Option<String>,
}

/// Input for the execute_function tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ExecuteRoutineInput {
    /// Target database (must be on the configured allowlist)
    pub database: String,
    /// Function or procedure name
    pub name: String,
    /// Schema (PostgreSQL only, defaults to "public")
    #[serde(default)]
    pub schema: Option<String>,
    /// Positional arguments
    #[serde(default)]
    pub params: Vec<JsonValue>,
}

/// Output for the get_functions tool, grouped by routine kind.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListRoutinesOutput {
    pub database: String,
    pub functions: Vec<RoutineInfo>,
    pub procedures: Vec<RoutineInfo>,
    /// Aggregates and window functions (PostgreSQL)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub other: Vec<RoutineInfo>,
}

/// Output for the execute_function tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ExecuteRoutineOutput {
    /// Whether a function or a procedure ran
    pub kind: RoutineKind,
    /// Result rows; a single `result` row for scalar functions
    pub rows: Vec<serde_json::Map<String, JsonValue>>,
    pub row_count: usize,
    pub execution_time_ms: u64,
}

pub struct FunctionTools {
    state: Arc<ServerState>,
}

impl FunctionTools {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    pub async fn list(&self, input: ListRoutinesInput) -> DbResult<ListRoutinesOutput> {
        let state = &self.state;
        state.guardrails.check_database(&input.database)?;

        let schema = effective_schema(&input.schema);
        let routines =
            catalog::routines(&state.executor, &state.pool, &input.database, &schema).await?;

        let mut functions = Vec::new();
        let mut procedures = Vec::new();
        let mut other = Vec::new();
        for routine in routines {
            match routine.kind {
                RoutineKind::Function => functions.push(routine),
                RoutineKind::Procedure => procedures.push(routine),
                _ => other.push(routine),
            }
        }

        Ok(ListRoutinesOutput {
            database: input.database,
            functions,
            procedures,
            other,
        })
    }

    pub async fn source(&self, input: RoutineSourceInput) -> DbResult<RoutineSource> {
        let state = &self.state;
        state.guardrails.check_database(&input.database)?;

        let schema = effective_schema(&input.schema);
        catalog::routine_source(
            &state.executor,
            &state.pool,
            &input.database,
            &schema,
            &input.name,
        )
        .await
    }

    /// Execute a stored function or procedure with positional arguments.
    ///
    /// The routine kind is looked up first: procedures are assumed to
    /// mutate, so read-only mode rejects them while plain functions stay
    /// callable.
    pub async fn execute(&self, input: ExecuteRoutineInput) -> DbResult<ExecuteRoutineOutput> {
        let state = &self.state;
        let dialect = state.pool.dialect();
        state.guardrails.check_database(&input.database)?;

        let name = sanitize_identifier(&input.name)
            .ok_or_else(|| DbError::validation(format!("invalid routine name: '{}'", input.name)))?;
        let schema = effective_schema(&input.schema);

        let kind =
            catalog::routine_kind(&state.executor, &state.pool, &input.database, &schema, &name)
                .await?;
        if kind == RoutineKind::Procedure && state.guardrails.read_only() {
            return Err(DbError::read_only("procedure execution"));
        }

        let qualified = qualified_routine(&input.database, &schema, &name, dialect)?;
        let mut placeholders = Placeholders::new(dialect);
        let args: Vec<String> = input.params.iter().map(|_| placeholders.next()).collect();
        let params: Vec<QueryParam> = input.params.iter().map(QueryParam::from_json).collect();

        let sql = match kind {
            RoutineKind::Procedure => format!("CALL {}({})", qualified, args.join(", ")),
            _ => format!("SELECT {}({}) AS result", qualified, args.join(", ")),
        };

        let limit = state.guardrails.clamp_select_limit(None);
        let result = state
            .executor
            .fetch(&state.pool, &sql, &params, limit)
            .await?;
        info!(
            database = %input.database,
            routine = %name,
            kind = %kind.as_str(),
            rows = result.row_count(),
            "routine executed"
        );
        Ok(ExecuteRoutineOutput {
            kind,
            row_count: result.rows.len(),
            rows: result.rows,
            execution_time_ms: result.execution_time_ms,
        })
    }
}

/// Qualify a routine name for invocation. Postgres prefixes the schema;
/// MySQL prefixes the quoted database.
fn qualified_routine(
    database: &str,
    schema: &str,
    name: &str,
    dialect: Dialect,
) -> DbResult<String> {
    match dialect {
        Dialect::Postgres => {
            let schema = sanitize_identifier(schema)
                .ok_or_else(|| DbError::validation(format!("invalid schema name: '{schema}'")))?;
            Ok(format!("{schema}.{name}"))
        }
        Dialect::MySql => {
            let database = sanitize_identifier(database).ok_or_else(|| {
                DbError::validation(format!("invalid database name: '{database}'"))
            })?;
            Ok(format!(
                "{}.{}",
                Dialect::MySql.quote(&database),
                Dialect::MySql.quote(name)
            ))
        }
    }
}

fn effective_schema(schema: &Option<String>) -> String {
    schema
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("public")
        .to_string()
}

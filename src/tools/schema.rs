//! Metadata tools: database, table, sequence, and custom type introspection.

use crate::db::catalog::{self, CustomType, SequenceInfo, TableSchema};
use crate::error::{DbError, DbResult};
use crate::sql::Dialect;
use crate::tools::query::ServerState;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Input for the list_tables tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct ListTablesInput {
    /// Target database (must be on the configured allowlist)
    pub database: String,
    /// Schema (PostgreSQL only, defaults to "public")
    #[serde(default)]
    pub schema: Option<String>,
}

/// Input for the get_table_schema tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct TableSchemaInput {
    /// Target database (must be on the configured allowlist)
    pub database: String,
    /// Table name
    pub table: String,
    /// Schema (PostgreSQL only, defaults to "public")
    #[serde(default)]
    pub schema: Option<String>,
}

/// Input for the get_sequences tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct SequencesInput {
    /// Target database (must be on the configured allowlist)
    pub database: String,
    /// Schema (PostgreSQL only, defaults to "public")
    #[serde(default)]
    pub schema: Option<String>,
}

/// Input for the get_custom_types tool.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct CustomTypesInput {
    /// Target database (must be on the configured allowlist)
    pub database: String,
    /// Schema (defaults to "public")
    #[serde(default)]
    pub schema: Option<String>,
}

/// Output for the list_databases tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListDatabasesOutput {
    /// Databases this server is allowed to touch, in configuration order
    pub databases: Vec<String>,
    /// True when the server rejects all mutations
    pub read_only: bool,
}

/// Output for the list_tables tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ListTablesOutput {
    pub database: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub schema: Option<String>,
    pub tables: Vec<String>,
    pub count: usize,
}

/// Output for the get_sequences tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct SequencesOutput {
    pub database: String,
    /// Sequences (PostgreSQL) or auto-increment columns (MySQL)
    pub sequences: Vec<SequenceInfo>,
}

/// Output for the get_custom_types tool.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct CustomTypesOutput {
    pub database: String,
    pub schema: String,
    /// Enum, composite, and domain types; enum values listed in declared order
    pub types: Vec<CustomType>,
}

pub struct SchemaTools {
    state: Arc<ServerState>,
}

impl SchemaTools {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self { state }
    }

    /// Report the configured allowlist. No database round trip: databases
    /// outside the allowlist must stay invisible even if the credentials
    /// could see them.
    pub fn list_databases(&self) -> ListDatabasesOutput {
        ListDatabasesOutput {
            databases: self.state.guardrails.allowed_databases().to_vec(),
            read_only: self.state.guardrails.read_only(),
        }
    }

    pub async fn list_tables(&self, input: ListTablesInput) -> DbResult<ListTablesOutput> {
        let state = &self.state;
        state.guardrails.check_database(&input.database)?;

        let schema = effective_schema(&input.schema);
        let tables =
            catalog::list_tables(&state.executor, &state.pool, &input.database, &schema).await?;
        let count = tables.len();
        Ok(ListTablesOutput {
            database: input.database,
            schema: match state.pool.dialect() {
                Dialect::Postgres => Some(schema),
                Dialect::MySql => None,
            },
            tables,
            count,
        })
    }

    pub async fn table_schema(&self, input: TableSchemaInput) -> DbResult<TableSchema> {
        let state = &self.state;
        state.guardrails.check_database(&input.database)?;

        let schema = effective_schema(&input.schema);
        catalog::table_schema(
            &state.executor,
            &state.pool,
            &input.database,
            &schema,
            &input.table,
        )
        .await
    }

    pub async fn sequences(&self, input: SequencesInput) -> DbResult<SequencesOutput> {
        let state = &self.state;
        state.guardrails.check_database(&input.database)?;

        let schema = effective_schema(&input.schema);
        let sequences =
            catalog::sequences(&state.executor, &state.pool, &input.database, &schema).await?;
        Ok(SequencesOutput {
            database: input.database,
            sequences,
        })
    }

    pub async fn custom_types(&self, input: CustomTypesInput) -> DbResult<CustomTypesOutput> {
        let state = &self.state;
        if state.pool.dialect() != Dialect::Postgres {
            return Err(DbError::validation(
                "custom types are only supported on PostgreSQL",
            ));
        }
        state.guardrails.check_database(&input.database)?;

        let schema = effective_schema(&input.schema);
        let types = catalog::custom_types(&state.executor, &state.pool, &schema).await?;
        Ok(CustomTypesOutput {
            database: input.database,
            schema,
            types,
        })
    }
}

fn effective_schema(schema: &Option<String>) -> String {
    schema
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or("public")
        .to_string()
}

//! MCP service implementation using rmcp.
//!
//! Exposes the guarded query, metadata, and routine tools over the MCP
//! protocol. Handlers stay thin: guardrails and SQL construction live in
//! the tool layer, and `DbError` maps onto protocol error codes in one
//! place.

use crate::db::catalog::{RoutineSource, TableSchema};
use crate::tools::function::{
    ExecuteRoutineInput, ExecuteRoutineOutput, FunctionTools, ListRoutinesInput,
    ListRoutinesOutput, RoutineSourceInput,
};
use crate::tools::query::{
    DeleteInput, InsertInput, MutationOutput, QueryTools, RawInput, SelectInput, ServerState,
    UpdateInput,
};
use crate::tools::schema::{
    CustomTypesInput, CustomTypesOutput, ListDatabasesOutput, ListTablesInput, ListTablesOutput,
    SchemaTools, SequencesInput, SequencesOutput, TableSchemaInput,
};
use crate::tools::RowsOutput;
use rmcp::{
    ErrorData as McpError, Json, ServerHandler,
    handler::server::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{Implementation, ProtocolVersion, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};
use std::sync::Arc;

#[derive(Clone)]
pub struct SqlService {
    state: Arc<ServerState>,
    tool_router: ToolRouter<Self>,
}

impl SqlService {
    pub fn new(state: Arc<ServerState>) -> Self {
        Self {
            state,
            tool_router: Self::tool_router(),
        }
    }

    fn query_tools(&self) -> QueryTools {
        QueryTools::new(self.state.clone())
    }

    fn schema_tools(&self) -> SchemaTools {
        SchemaTools::new(self.state.clone())
    }

    fn function_tools(&self) -> FunctionTools {
        FunctionTools::new(self.state.clone())
    }
}

#[tool_router]
impl SqlService {
    #[tool(
        description = "Run a SELECT against a table with optional column projection, filters, ordering, limit, and offset.\nFilters are column/op/value objects combined with AND; values bind as parameters.\nOutput format: json (default), table, or markdown."
    )]
    async fn query_select(
        &self,
        Parameters(input): Parameters<SelectInput>,
    ) -> Result<Json<RowsOutput>, McpError> {
        self.query_tools()
            .select(input)
            .await
            .map(Json)
            .map_err(Into::into)
    }

    #[tool(
        description = "Insert one row. Values are a column-to-value map; everything binds as parameters.\nRejected in read-only mode."
    )]
    async fn query_insert(
        &self,
        Parameters(input): Parameters<InsertInput>,
    ) -> Result<Json<MutationOutput>, McpError> {
        self.query_tools()
            .insert(input)
            .await
            .map(Json)
            .map_err(Into::into)
    }

    #[tool(
        description = "Update rows matching the filters. Filters must not be empty.\nA COUNT(*) preflight rejects the update when it would touch more rows than the configured cap.\nRejected in read-only mode."
    )]
    async fn query_update(
        &self,
        Parameters(input): Parameters<UpdateInput>,
    ) -> Result<Json<MutationOutput>, McpError> {
        self.query_tools()
            .update(input)
            .await
            .map(Json)
            .map_err(Into::into)
    }

    #[tool(
        description = "Delete rows matching the filters. Filters must not be empty.\nA COUNT(*) preflight rejects the delete when it would touch more rows than the configured cap.\nRejected in read-only mode."
    )]
    async fn query_delete(
        &self,
        Parameters(input): Parameters<DeleteInput>,
    ) -> Result<Json<MutationOutput>, McpError> {
        self.query_tools()
            .delete(input)
            .await
            .map(Json)
            .map_err(Into::into)
    }

    #[tool(
        description = "Run raw SQL with positional bind parameters in the context of the named database (on MySQL the session switches with USE, so unqualified table names resolve there).\nDisabled unless the server was started with ALLOW_RAW_QUERY; in read-only mode only SELECT-shaped statements are accepted."
    )]
    async fn query_raw(
        &self,
        Parameters(input): Parameters<RawInput>,
    ) -> Result<Json<RowsOutput>, McpError> {
        self.query_tools()
            .raw(input)
            .await
            .map(Json)
            .map_err(Into::into)
    }

    #[tool(
        description = "List the databases this server is allowed to touch (the configured allowlist)."
    )]
    async fn list_databases(&self) -> Json<ListDatabasesOutput> {
        Json(self.schema_tools().list_databases())
    }

    #[tool(
        description = "List tables in a database. PostgreSQL accepts an optional schema (default \"public\")."
    )]
    async fn list_tables(
        &self,
        Parameters(input): Parameters<ListTablesInput>,
    ) -> Result<Json<ListTablesOutput>, McpError> {
        self.schema_tools()
            .list_tables(input)
            .await
            .map(Json)
            .map_err(Into::into)
    }

    #[tool(
        description = "Describe a table: columns with types and defaults, foreign keys, and indexes."
    )]
    async fn get_table_schema(
        &self,
        Parameters(input): Parameters<TableSchemaInput>,
    ) -> Result<Json<TableSchema>, McpError> {
        self.schema_tools()
            .table_schema(input)
            .await
            .map(Json)
            .map_err(Into::into)
    }

    #[tool(
        description = "List sequences (PostgreSQL) or auto-increment columns (MySQL) in a database."
    )]
    async fn get_sequences(
        &self,
        Parameters(input): Parameters<SequencesInput>,
    ) -> Result<Json<SequencesOutput>, McpError> {
        self.schema_tools()
            .sequences(input)
            .await
            .map(Json)
            .map_err(Into::into)
    }

    #[tool(
        description = "List custom types (enums with their values, composites, domains). PostgreSQL only."
    )]
    async fn get_custom_types(
        &self,
        Parameters(input): Parameters<CustomTypesInput>,
    ) -> Result<Json<CustomTypesOutput>, McpError> {
        self.schema_tools()
            .custom_types(input)
            .await
            .map(Json)
            .map_err(Into::into)
    }

    #[tool(
        description = "List stored functions and procedures, grouped by kind, with signatures where available."
    )]
    async fn get_functions(
        &self,
        Parameters(input): Parameters<ListRoutinesInput>,
    ) -> Result<Json<ListRoutinesOutput>, McpError> {
        self.function_tools()
            .list(input)
            .await
            .map(Json)
            .map_err(Into::into)
    }

    #[tool(description = "Get the source definition of a stored function or procedure.")]
    async fn get_function_source(
        &self,
        Parameters(input): Parameters<RoutineSourceInput>,
    ) -> Result<Json<RoutineSource>, McpError> {
        self.function_tools()
            .source(input)
            .await
            .map(Json)
            .map_err(Into::into)
    }

    #[tool(
        description = "Execute a stored function or procedure with positional arguments.\nProcedures are rejected in read-only mode; plain functions stay callable."
    )]
    async fn execute_function(
        &self,
        Parameters(input): Parameters<ExecuteRoutineInput>,
    ) -> Result<Json<ExecuteRoutineOutput>, McpError> {
        self.function_tools()
            .execute(input)
            .await
            .map(Json)
            .map_err(Into::into)
    }
}

#[tool_handler]
impl ServerHandler for SqlService {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            protocol_version: ProtocolVersion::V_2025_03_26,
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            server_info: Implementation {
                name: "sql-mcp-server".to_owned(),
                title: Some("SQL MCP Server".to_owned()),
                version: env!("CARGO_PKG_VERSION").to_owned(),
                icons: None,
                website_url: None,
            },
            instructions: Some(
                "Guarded SQL tools for PostgreSQL and MySQL.\n\
                \n\
                ## Workflow\n\
                1. Call `list_databases` to see which databases are allowed\n\
                2. Explore with `list_tables`, `get_table_schema`, `get_sequences`, `get_custom_types`\n\
                3. Query with `query_select`; mutate with `query_insert`/`query_update`/`query_delete`\n\
                \n\
                ## Guardrails\n\
                - Every call names a database; anything off the allowlist is rejected\n\
                - SELECT results are capped at the configured row limit\n\
                - UPDATE and DELETE require filters and are preflighted with COUNT(*)\n\
                  against a per-operation row cap\n\
                - `query_raw` only works when the server was started with raw SQL enabled\n\
                - In read-only mode all mutations and stored procedures are rejected"
                    .to_string(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{Config, GuardrailConfig};
    use crate::db::{DbPool, Executor};
    use crate::sql::Guardrails;
    use clap::Parser;

    fn test_service() -> SqlService {
        let config =
            Config::try_parse_from(["sql-mcp-server", "--databases", "app"]).expect("config");
        let pool = DbPool::connect_lazy(&config).expect("pool");
        let state = Arc::new(ServerState {
            pool,
            executor: Executor::new(5),
            guardrails: Guardrails::new(GuardrailConfig::default(), vec!["app".to_string()]),
        });
        SqlService::new(state)
    }

    #[tokio::test]
    async fn test_server_info() {
        let service = test_service();
        let info = service.get_info();
        assert_eq!(info.server_info.name, "sql-mcp-server");
        assert!(info.capabilities.tools.is_some());
        assert!(info.instructions.is_some());
    }

    #[tokio::test]
    async fn test_list_databases_reports_allowlist() {
        let service = test_service();
        let Json(output) = service.list_databases().await;
        assert_eq!(output.databases, vec!["app"]);
        assert!(!output.read_only);
    }
}

//! Data models for the SQL MCP Server.

pub mod query;

pub use query::{ColumnMetadata, QueryParam, QueryResult};

//! Tool handlers behind the MCP surface.

pub mod format;
pub mod function;
pub mod query;
pub mod schema;

pub use format::{OutputFormat, RowsOutput};
pub use function::FunctionTools;
pub use query::{QueryTools, ServerState};
pub use schema::SchemaTools;

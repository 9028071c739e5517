//! Guarded SQL MCP server for PostgreSQL and MySQL.
//!
//! Exposes structured CRUD, raw SQL, and schema introspection tools over
//! the Model Context Protocol. All SQL is generated from validated parts:
//! identifiers pass a strict sanitizer, values bind as parameters, and a
//! guardrail policy (database allowlist, read-only mode, row caps, raw-SQL
//! opt-in) is enforced before anything reaches the database.

pub mod config;
pub mod db;
pub mod error;
pub mod mcp;
pub mod models;
pub mod sql;
pub mod tools;
pub mod transport;

pub use config::Config;
pub use error::{DbError, DbResult};

//! Error types for the SQL MCP Server.
//!
//! This module defines all error types using `thiserror` for ergonomic error
//! handling. Guardrail and validation failures are always surfaced before any
//! mutating SQL is issued; each variant carries enough context for an AI
//! assistant to correct the request.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("Invalid input: {message}")]
    Validation { message: String },

    #[error("Access to database '{database}' not allowed (allowed: {allowed})")]
    AccessDenied { database: String, allowed: String },

    #[error("Database is in read-only mode: {operation} is not allowed")]
    ReadOnlyViolation { operation: String },

    #[error("Raw SQL queries are blocked. Set ALLOW_RAW_QUERY=true to enable this feature")]
    RawQueryDisabled,

    #[error(
        "{operation} would affect {matched} row(s), which exceeds the maximum of {limit}. Refine the WHERE clause to target fewer rows"
    )]
    RowLimitExceeded {
        operation: String,
        matched: u64,
        limit: u64,
    },

    #[error("{kind} '{name}' not found")]
    NotFound { kind: String, name: String },

    #[error("Failed to build statement: {message}")]
    QueryBuild { message: String },

    #[error("Execution failed: {message}")]
    Execution {
        message: String,
        /// e.g., "42P01" for undefined table
        sql_state: Option<String>,
    },

    #[error("Connection failed: {message}")]
    Connection { message: String },

    #[error("Timeout: {operation} exceeded {elapsed_secs}s")]
    Timeout {
        operation: String,
        elapsed_secs: u32,
    },

    #[error("Internal error: {message}")]
    Internal { message: String },
}

impl DbError {
    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create an access-denied error listing the configured allowlist.
    pub fn access_denied(database: impl Into<String>, allowed: &[String]) -> Self {
        Self::AccessDenied {
            database: database.into(),
            allowed: allowed.join(", "),
        }
    }

    /// Create a read-only violation error.
    pub fn read_only(operation: impl Into<String>) -> Self {
        Self::ReadOnlyViolation {
            operation: operation.into(),
        }
    }

    /// Create a row-limit-exceeded error for a mutation preflight.
    pub fn row_limit_exceeded(operation: impl Into<String>, matched: u64, limit: u64) -> Self {
        Self::RowLimitExceeded {
            operation: operation.into(),
            matched,
            limit,
        }
    }

    /// Create a not-found error for a missing table, function, or procedure.
    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Self::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// Create a statement rendering error.
    pub fn query_build(message: impl Into<String>) -> Self {
        Self::QueryBuild {
            message: message.into(),
        }
    }

    /// Create an execution error with optional SQL state.
    pub fn execution(message: impl Into<String>, sql_state: Option<String>) -> Self {
        Self::Execution {
            message: message.into(),
            sql_state,
        }
    }

    /// Create a connection error.
    pub fn connection(message: impl Into<String>) -> Self {
        Self::Connection {
            message: message.into(),
        }
    }

    /// Create a timeout error.
    pub fn timeout(operation: impl Into<String>, elapsed_secs: u32) -> Self {
        Self::Timeout {
            operation: operation.into(),
            elapsed_secs,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Check if this error is retryable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Connection { .. } | Self::Timeout { .. })
    }
}

/// Convert sqlx errors to DbError.
impl From<sqlx::Error> for DbError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::Configuration(msg) => DbError::connection(msg.to_string()),
            sqlx::Error::Database(db_err) => {
                let code = db_err.code().map(|c| c.to_string());
                DbError::execution(db_err.message(), code)
            }
            sqlx::Error::RowNotFound => DbError::execution("No rows returned", None),
            sqlx::Error::PoolTimedOut => DbError::timeout("connection pool acquire", 30),
            sqlx::Error::PoolClosed => DbError::connection("Connection pool is closed"),
            sqlx::Error::Io(io_err) => DbError::connection(format!("I/O error: {}", io_err)),
            sqlx::Error::Tls(tls_err) => DbError::connection(format!("TLS error: {}", tls_err)),
            sqlx::Error::Protocol(msg) => DbError::connection(format!("Protocol error: {}", msg)),
            sqlx::Error::TypeNotFound { type_name } => {
                DbError::execution(format!("Type not found: {}", type_name), None)
            }
            sqlx::Error::ColumnNotFound(col) => {
                DbError::execution(format!("Column not found: {}", col), None)
            }
            sqlx::Error::ColumnIndexOutOfBounds { index, len } => DbError::internal(format!(
                "Column index {} out of bounds (len: {})",
                index, len
            )),
            sqlx::Error::ColumnDecode { index, source } => {
                DbError::internal(format!("Failed to decode column {}: {}", index, source))
            }
            sqlx::Error::Decode(source) => DbError::internal(format!("Decode error: {}", source)),
            sqlx::Error::WorkerCrashed => DbError::internal("Database worker crashed"),
            _ => DbError::internal(format!("Unknown database error: {}", err)),
        }
    }
}

/// Result type alias for database operations.
pub type DbResult<T> = Result<T, DbError>;

/// Convert DbError to MCP ErrorData for semantic error categorization.
impl From<DbError> for rmcp::ErrorData {
    fn from(err: DbError) -> Self {
        match &err {
            // Request-shaped failures the caller can fix -> invalid_params
            DbError::Validation { .. }
            | DbError::AccessDenied { .. }
            | DbError::ReadOnlyViolation { .. }
            | DbError::RawQueryDisabled
            | DbError::RowLimitExceeded { .. }
            | DbError::QueryBuild { .. } => rmcp::ErrorData::invalid_params(err.to_string(), None),

            DbError::NotFound { .. } => rmcp::ErrorData::resource_not_found(err.to_string(), None),

            // Execution errors carry the SQL state in the message when known
            DbError::Execution { message, sql_state } => {
                let msg = match sql_state {
                    Some(code) => format!("{} (SQLSTATE: {})", message, code),
                    None => message.clone(),
                };
                rmcp::ErrorData::invalid_params(msg, None)
            }

            DbError::Connection { .. } | DbError::Timeout { .. } | DbError::Internal { .. } => {
                rmcp::ErrorData::internal_error(err.to_string(), None)
            }
        }
    }
}

//! Configuration handling for the SQL MCP Server.
//!
//! All configuration is read once at startup from CLI arguments and
//! environment variables, then treated as immutable for the process lifetime.

use clap::{Parser, ValueEnum};

pub const DEFAULT_MAX_SELECT_LIMIT: u64 = 1000;
pub const DEFAULT_MAX_UPDATE_LIMIT: u64 = 1;
pub const DEFAULT_MAX_DELETE_LIMIT: u64 = 1;
pub const DEFAULT_QUERY_TIMEOUT_SECS: u64 = 30;

// Pool configuration defaults
pub const DEFAULT_MAX_CONNECTIONS: u32 = 10;
pub const DEFAULT_ACQUIRE_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_IDLE_TIMEOUT_SECS: u64 = 600;

/// Kind of database server this process talks to. Fixed at startup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum DatabaseKind {
    /// PostgreSQL server
    #[default]
    Postgres,
    /// MySQL server
    Mysql,
}

impl std::fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Postgres => write!(f, "postgres"),
            Self::Mysql => write!(f, "mysql"),
        }
    }
}

/// Server configuration parsed from CLI arguments and environment variables.
#[derive(Debug, Clone, Parser)]
#[command(name = "sql-mcp-server", version, about)]
pub struct Config {
    /// Database server kind
    #[arg(long, env = "DB_TYPE", value_enum, default_value_t = DatabaseKind::Postgres)]
    pub db_type: DatabaseKind,

    /// Database server host
    #[arg(long, env = "DB_HOST", default_value = "localhost")]
    pub host: String,

    /// Database server port (defaults to 5432 for postgres, 3306 for mysql)
    #[arg(long, env = "DB_PORT")]
    pub port: Option<u16>,

    /// Database user
    #[arg(long, env = "DB_USER", default_value = "postgres")]
    pub user: String,

    /// Database password (sensitive - never logged)
    #[arg(long, env = "DB_PASSWORD", default_value = "", hide_env_values = true)]
    pub password: String,

    /// Comma-separated allowlist of database names. The first entry is used
    /// for the initial connection.
    #[arg(long, env = "DB_NAME", default_value = "postgres")]
    pub databases: String,

    /// Reject all mutating operations (INSERT/UPDATE/DELETE/raw writes/procedures)
    #[arg(long, env = "DB_READONLY", default_value_t = false)]
    pub read_only: bool,

    /// Allow the query_raw tool to run caller-supplied SQL text
    #[arg(long, env = "ALLOW_RAW_QUERY", default_value_t = false)]
    pub allow_raw_query: bool,

    /// Maximum rows a SELECT may return; also the default when no limit is given
    #[arg(long, env = "MAX_SELECT_LIMIT", default_value_t = DEFAULT_MAX_SELECT_LIMIT)]
    pub max_select_limit: u64,

    /// Maximum rows an UPDATE may affect (checked by COUNT(*) preflight)
    #[arg(long, env = "MAX_UPDATE_LIMIT", default_value_t = DEFAULT_MAX_UPDATE_LIMIT)]
    pub max_update_limit: u64,

    /// Maximum rows a DELETE may affect (checked by COUNT(*) preflight)
    #[arg(long, env = "MAX_DELETE_LIMIT", default_value_t = DEFAULT_MAX_DELETE_LIMIT)]
    pub max_delete_limit: u64,

    /// Silently drop filter clauses with unsanitizable columns instead of
    /// failing the request (legacy behavior, off by default)
    #[arg(long, env = "LENIENT_FILTERS", default_value_t = false)]
    pub lenient_filters: bool,

    /// Log level filter (overridden by RUST_LOG)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,

    /// Emit logs as JSON
    #[arg(long, env = "LOG_JSON", default_value_t = false)]
    pub json_logs: bool,
}

impl Config {
    /// Parse the comma-separated allowlist into trimmed database names.
    pub fn allowlist(&self) -> Vec<String> {
        self.databases
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect()
    }

    /// The database used for the initial connection (first allowlist entry).
    pub fn primary_database(&self) -> Option<String> {
        self.allowlist().into_iter().next()
    }

    /// Effective port, falling back to the dialect default.
    pub fn effective_port(&self) -> u16 {
        self.port.unwrap_or(match self.db_type {
            DatabaseKind::Postgres => 5432,
            DatabaseKind::Mysql => 3306,
        })
    }

    /// Extract the immutable guardrail policy from this configuration.
    pub fn guardrail_config(&self) -> GuardrailConfig {
        GuardrailConfig {
            read_only: self.read_only,
            allow_raw_query: self.allow_raw_query,
            max_select_limit: self.max_select_limit,
            max_update_limit: self.max_update_limit,
            max_delete_limit: self.max_delete_limit,
            lenient_filters: self.lenient_filters,
        }
    }
}

/// Process-wide immutable guardrail policy, read concurrently by all requests.
#[derive(Debug, Clone)]
pub struct GuardrailConfig {
    pub read_only: bool,
    pub allow_raw_query: bool,
    pub max_select_limit: u64,
    pub max_update_limit: u64,
    pub max_delete_limit: u64,
    pub lenient_filters: bool,
}

impl Default for GuardrailConfig {
    fn default() -> Self {
        Self {
            read_only: false,
            allow_raw_query: false,
            max_select_limit: DEFAULT_MAX_SELECT_LIMIT,
            max_update_limit: DEFAULT_MAX_UPDATE_LIMIT,
            max_delete_limit: DEFAULT_MAX_DELETE_LIMIT,
            lenient_filters: false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse_args(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("sql-mcp-server").chain(args.iter().copied()))
            .expect("arguments should parse")
    }

    #[test]
    fn test_defaults() {
        let config = parse_args(&[]);
        assert_eq!(config.db_type, DatabaseKind::Postgres);
        assert_eq!(config.effective_port(), 5432);
        assert_eq!(config.max_select_limit, DEFAULT_MAX_SELECT_LIMIT);
        assert_eq!(config.max_update_limit, 1);
        assert_eq!(config.max_delete_limit, 1);
        assert!(!config.read_only);
        assert!(!config.allow_raw_query);
        assert!(!config.lenient_filters);
    }

    #[test]
    fn test_mysql_default_port() {
        let config = parse_args(&["--db-type", "mysql"]);
        assert_eq!(config.effective_port(), 3306);
    }

    #[test]
    fn test_explicit_port_wins() {
        let config = parse_args(&["--db-type", "mysql", "--port", "3307"]);
        assert_eq!(config.effective_port(), 3307);
    }

    #[test]
    fn test_allowlist_parsing() {
        let config = parse_args(&["--databases", "app, analytics ,archive"]);
        assert_eq!(config.allowlist(), vec!["app", "analytics", "archive"]);
        assert_eq!(config.primary_database(), Some("app".to_string()));
    }

    #[test]
    fn test_allowlist_skips_empty_entries() {
        let config = parse_args(&["--databases", "app,,archive,"]);
        assert_eq!(config.allowlist(), vec!["app", "archive"]);
    }

    #[test]
    fn test_guardrail_config_extraction() {
        let config = parse_args(&[
            "--read-only",
            "--allow-raw-query",
            "--max-select-limit",
            "500",
        ]);
        let guard = config.guardrail_config();
        assert!(guard.read_only);
        assert!(guard.allow_raw_query);
        assert_eq!(guard.max_select_limit, 500);
    }
}

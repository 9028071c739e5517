//! Connection pool construction.
//!
//! One pool is built at startup against the primary (first allowlisted)
//! database and reused for every request. Dialect-specific pools are kept
//! concrete (PgPool/MySqlPool) so the full native type system stays
//! available to the row decoders.

use crate::config::{
    Config, DEFAULT_ACQUIRE_TIMEOUT_SECS, DEFAULT_IDLE_TIMEOUT_SECS, DEFAULT_MAX_CONNECTIONS,
    DatabaseKind,
};
use crate::error::{DbError, DbResult};
use crate::sql::Dialect;
use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions};
use sqlx::{MySqlPool, PgPool};
use std::time::Duration;
use tracing::info;

/// Dialect-specific connection pool.
#[derive(Debug, Clone)]
pub enum DbPool {
    Postgres(PgPool),
    MySql(MySqlPool),
}

impl DbPool {
    /// Connect according to the startup configuration.
    ///
    /// The pool is lazy: no connection is attempted until the first query,
    /// so startup succeeds even when the database is briefly unavailable.
    pub fn connect_lazy(config: &Config) -> DbResult<Self> {
        let database = config.primary_database().ok_or_else(|| {
            DbError::validation("DB_NAME must list at least one database")
        })?;

        info!(
            db_type = %config.db_type,
            host = %config.host,
            port = config.effective_port(),
            database = %database,
            "initializing connection pool"
        );

        match config.db_type {
            DatabaseKind::Postgres => {
                let options = PgConnectOptions::new()
                    .host(&config.host)
                    .port(config.effective_port())
                    .username(&config.user)
                    .password(&config.password)
                    .database(&database);
                let pool = pg_pool_options().connect_lazy_with(options);
                Ok(Self::Postgres(pool))
            }
            DatabaseKind::Mysql => {
                let options = MySqlConnectOptions::new()
                    .host(&config.host)
                    .port(config.effective_port())
                    .username(&config.user)
                    .password(&config.password)
                    .database(&database);
                let pool = mysql_pool_options().connect_lazy_with(options);
                Ok(Self::MySql(pool))
            }
        }
    }

    pub fn dialect(&self) -> Dialect {
        match self {
            Self::Postgres(_) => Dialect::Postgres,
            Self::MySql(_) => Dialect::MySql,
        }
    }

    /// Verify connectivity with a trivial round trip.
    pub async fn ping(&self) -> DbResult<()> {
        match self {
            Self::Postgres(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
            }
            Self::MySql(pool) => {
                sqlx::query("SELECT 1").execute(pool).await?;
            }
        }
        Ok(())
    }

    pub async fn close(&self) {
        match self {
            Self::Postgres(pool) => pool.close().await,
            Self::MySql(pool) => pool.close().await,
        }
    }
}

// No min_connections: pre-warming spawns a pool maintenance task, which
// requires a Tokio context, and connect_lazy must work from sync startup
// code before the runtime handles any request.
fn pg_pool_options() -> PgPoolOptions {
    PgPoolOptions::new()
        .max_connections(DEFAULT_MAX_CONNECTIONS)
        .acquire_timeout(Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS))
        .idle_timeout(Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS))
}

fn mysql_pool_options() -> MySqlPoolOptions {
    MySqlPoolOptions::new()
        .max_connections(DEFAULT_MAX_CONNECTIONS)
        .acquire_timeout(Duration::from_secs(DEFAULT_ACQUIRE_TIMEOUT_SECS))
        .idle_timeout(Duration::from_secs(DEFAULT_IDLE_TIMEOUT_SECS))
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;

    fn config(args: &[&str]) -> Config {
        Config::try_parse_from(std::iter::once("sql-mcp-server").chain(args.iter().copied()))
            .expect("arguments should parse")
    }

    // Plain #[test] on purpose: the lazy constructor runs from sync startup
    // code and must not require a Tokio context.
    #[test]
    fn test_lazy_connect_reports_dialect() {
        let pool = DbPool::connect_lazy(&config(&["--databases", "app"])).unwrap();
        assert_eq!(pool.dialect(), Dialect::Postgres);

        let pool =
            DbPool::connect_lazy(&config(&["--db-type", "mysql", "--databases", "app"])).unwrap();
        assert_eq!(pool.dialect(), Dialect::MySql);
    }

    #[test]
    fn test_lazy_connect_requires_database() {
        let err = DbPool::connect_lazy(&config(&["--databases", " , "])).unwrap_err();
        assert!(matches!(err, DbError::Validation { .. }));
    }
}

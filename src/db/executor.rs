//! Statement execution.
//!
//! Runs rendered SQL against the pool with bound parameters, a timeout, and
//! streaming row limits. Reads fetch `limit + 1` rows to detect truncation
//! without pulling the full result set; writes report the driver's
//! rows-affected count.
//!
//! The per-dialect submodules are intentionally parallel so differences
//! between the drivers stay obvious.

use crate::db::pool::DbPool;
use crate::db::types::RowToJson;
use crate::error::{DbError, DbResult};
use crate::models::{QueryParam, QueryResult};
use futures_util::StreamExt;
use std::time::{Duration, Instant};
use tokio::time::timeout;
use tracing::{debug, warn};

/// Executes rendered statements with a fixed per-query timeout.
#[derive(Debug, Clone)]
pub struct Executor {
    query_timeout: Duration,
}

impl Executor {
    pub fn new(timeout_secs: u64) -> Self {
        Self {
            query_timeout: Duration::from_secs(timeout_secs),
        }
    }

    /// Run a read statement and normalize the rows.
    ///
    /// `row_limit` must already be guardrail-clamped; one extra row is
    /// fetched to set the `truncated` flag.
    pub async fn fetch(
        &self,
        pool: &DbPool,
        sql: &str,
        params: &[QueryParam],
        row_limit: u64,
    ) -> DbResult<QueryResult> {
        let start = Instant::now();
        debug!(sql = %sql, params = params.len(), limit = row_limit, "executing read");

        match pool {
            DbPool::Postgres(p) => {
                let rows =
                    postgres::fetch_rows(p, sql, params, row_limit, self.query_timeout).await?;
                Ok(normalize_rows(rows, row_limit, start))
            }
            DbPool::MySql(p) => {
                let rows =
                    mysql::fetch_rows(p, sql, params, row_limit, self.query_timeout).await?;
                Ok(normalize_rows(rows, row_limit, start))
            }
        }
    }

    /// Run a mutation and return the rows-affected count with timing.
    pub async fn execute(
        &self,
        pool: &DbPool,
        sql: &str,
        params: &[QueryParam],
    ) -> DbResult<QueryResult> {
        let start = Instant::now();
        debug!(sql = %sql, params = params.len(), "executing write");

        let rows_affected = match pool {
            DbPool::Postgres(p) => {
                postgres::execute_write(p, sql, params, self.query_timeout).await?
            }
            DbPool::MySql(p) => mysql::execute_write(p, sql, params, self.query_timeout).await?,
        };

        Ok(QueryResult::write_result(
            rows_affected,
            start.elapsed().as_millis() as u64,
        ))
    }

    /// Run a read in the context of a named database.
    ///
    /// MySQL acquires one pooled connection, switches it with `USE`, and
    /// runs the statement there, so unqualified table names resolve in the
    /// named database. Structured statements always qualify `` `db`.`table` ``,
    /// so a connection returning to the pool with a different default
    /// database cannot affect them. Postgres connections are bound to a
    /// single database; the pool is used as-is.
    pub async fn fetch_in_database(
        &self,
        pool: &DbPool,
        database: &str,
        sql: &str,
        params: &[QueryParam],
        row_limit: u64,
    ) -> DbResult<QueryResult> {
        match pool {
            DbPool::Postgres(_) => self.fetch(pool, sql, params, row_limit).await,
            DbPool::MySql(p) => {
                let start = Instant::now();
                debug!(sql = %sql, database = %database, limit = row_limit, "executing read");
                let rows = mysql::fetch_rows_in_database(
                    p,
                    database,
                    sql,
                    params,
                    row_limit,
                    self.query_timeout,
                )
                .await?;
                Ok(normalize_rows(rows, row_limit, start))
            }
        }
    }

    /// Run a mutation in the context of a named database (see
    /// [`Executor::fetch_in_database`]).
    pub async fn execute_in_database(
        &self,
        pool: &DbPool,
        database: &str,
        sql: &str,
        params: &[QueryParam],
    ) -> DbResult<QueryResult> {
        match pool {
            DbPool::Postgres(_) => self.execute(pool, sql, params).await,
            DbPool::MySql(p) => {
                let start = Instant::now();
                debug!(sql = %sql, database = %database, "executing write");
                let rows_affected = mysql::execute_write_in_database(
                    p,
                    database,
                    sql,
                    params,
                    self.query_timeout,
                )
                .await?;
                Ok(QueryResult::write_result(
                    rows_affected,
                    start.elapsed().as_millis() as u64,
                ))
            }
        }
    }

    /// Run a single-value `COUNT(*)` query (mutation preflight).
    pub async fn fetch_count(
        &self,
        pool: &DbPool,
        sql: &str,
        params: &[QueryParam],
    ) -> DbResult<u64> {
        let result = self.fetch(pool, sql, params, 1).await?;
        let row = result
            .rows
            .first()
            .ok_or_else(|| DbError::internal("COUNT(*) returned no rows"))?;
        let value = row
            .values()
            .next()
            .ok_or_else(|| DbError::internal("COUNT(*) returned no columns"))?;
        value
            .as_i64()
            .map(|n| n.max(0) as u64)
            .ok_or_else(|| DbError::internal(format!("COUNT(*) returned non-integer: {value}")))
    }
}

/// Turn fetched driver rows into a normalized result, marking truncation
/// when the extra probe row came back.
fn normalize_rows<R: RowToJson>(rows: Vec<R>, row_limit: u64, start: Instant) -> QueryResult {
    let execution_time_ms = start.elapsed().as_millis() as u64;

    if rows.is_empty() {
        return QueryResult::empty(execution_time_ms);
    }

    let truncated = rows.len() as u64 > row_limit;
    let columns = rows[0].column_metadata();
    let json_rows: Vec<serde_json::Map<String, serde_json::Value>> = rows
        .iter()
        .take(row_limit as usize)
        .map(|r| r.to_json_map())
        .collect();

    if truncated {
        warn!(limit = row_limit, "result truncated at row limit");
    }

    QueryResult {
        columns,
        rows: json_rows,
        rows_affected: None,
        truncated,
        execution_time_ms,
    }
}

fn collect_rows<R>(results: Vec<Result<R, sqlx::Error>>) -> DbResult<Vec<R>> {
    let mut rows = Vec::with_capacity(results.len());
    for result in results {
        rows.push(result.map_err(DbError::from)?);
    }
    Ok(rows)
}

fn timeout_error(operation: &str, elapsed: Duration) -> DbError {
    DbError::timeout(operation, elapsed.as_secs() as u32)
}

mod postgres {
    use super::*;
    use sqlx::PgPool;
    use sqlx::postgres::{PgArguments, PgRow};

    pub async fn fetch_rows(
        pool: &PgPool,
        sql: &str,
        params: &[QueryParam],
        row_limit: u64,
        query_timeout: Duration,
    ) -> DbResult<Vec<PgRow>> {
        let fetch_limit = row_limit as usize + 1;
        let rows_future = if params.is_empty() {
            // Raw (unprepared) execution for parameterless SQL; some
            // statements reject the prepared path.
            use sqlx::Executor;
            pool.fetch(sql).take(fetch_limit).collect::<Vec<_>>()
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_param(query, param);
            }
            query.fetch(pool).take(fetch_limit).collect::<Vec<_>>()
        };

        match timeout(query_timeout, rows_future).await {
            Ok(results) => collect_rows(results),
            Err(_) => Err(timeout_error("query execution", query_timeout)),
        }
    }

    pub async fn execute_write(
        pool: &PgPool,
        sql: &str,
        params: &[QueryParam],
        query_timeout: Duration,
    ) -> DbResult<u64> {
        let result = if params.is_empty() {
            use sqlx::Executor;
            timeout(query_timeout, pool.execute(sql)).await
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_param(query, param);
            }
            timeout(query_timeout, query.execute(pool)).await
        };

        match result {
            Ok(Ok(r)) => Ok(r.rows_affected()),
            Ok(Err(e)) => Err(DbError::from(e)),
            Err(_) => Err(timeout_error("write execution", query_timeout)),
        }
    }

    fn bind_param<'q>(
        query: sqlx::query::Query<'q, sqlx::Postgres, PgArguments>,
        param: &'q QueryParam,
    ) -> sqlx::query::Query<'q, sqlx::Postgres, PgArguments> {
        match param {
            QueryParam::Null => query.bind(None::<String>),
            QueryParam::Bool(v) => query.bind(*v),
            QueryParam::Int(v) => query.bind(*v),
            QueryParam::Float(v) => query.bind(*v),
            QueryParam::String(v) => query.bind(v.as_str()),
            QueryParam::Json(v) => query.bind(sqlx::types::Json(v)),
        }
    }
}

mod mysql {
    use super::*;
    use crate::sql::{Dialect, sanitize_identifier};
    use sqlx::MySqlPool;
    use sqlx::mysql::{MySqlArguments, MySqlRow};

    pub async fn fetch_rows(
        pool: &MySqlPool,
        sql: &str,
        params: &[QueryParam],
        row_limit: u64,
        query_timeout: Duration,
    ) -> DbResult<Vec<MySqlRow>> {
        let fetch_limit = row_limit as usize + 1;
        let rows_future = if params.is_empty() {
            use sqlx::Executor;
            pool.fetch(sql).take(fetch_limit).collect::<Vec<_>>()
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_param(query, param);
            }
            query.fetch(pool).take(fetch_limit).collect::<Vec<_>>()
        };

        match timeout(query_timeout, rows_future).await {
            Ok(results) => collect_rows(results),
            Err(_) => Err(timeout_error("query execution", query_timeout)),
        }
    }

    pub async fn execute_write(
        pool: &MySqlPool,
        sql: &str,
        params: &[QueryParam],
        query_timeout: Duration,
    ) -> DbResult<u64> {
        let result = if params.is_empty() {
            use sqlx::Executor;
            timeout(query_timeout, pool.execute(sql)).await
        } else {
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_param(query, param);
            }
            timeout(query_timeout, query.execute(pool)).await
        };

        match result {
            Ok(Ok(r)) => Ok(r.rows_affected()),
            Ok(Err(e)) => Err(DbError::from(e)),
            Err(_) => Err(timeout_error("write execution", query_timeout)),
        }
    }

    pub async fn fetch_rows_in_database(
        pool: &MySqlPool,
        database: &str,
        sql: &str,
        params: &[QueryParam],
        row_limit: u64,
        query_timeout: Duration,
    ) -> DbResult<Vec<MySqlRow>> {
        let use_sql = use_statement(database)?;
        let fetch_limit = row_limit as usize + 1;
        let work = async {
            let mut conn = pool.acquire().await.map_err(DbError::from)?;
            sqlx::query(&use_sql)
                .execute(&mut *conn)
                .await
                .map_err(DbError::from)?;
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_param(query, param);
            }
            let results: Vec<_> = query.fetch(&mut *conn).take(fetch_limit).collect().await;
            collect_rows(results)
        };
        match timeout(query_timeout, work).await {
            Ok(rows) => rows,
            Err(_) => Err(timeout_error("query execution", query_timeout)),
        }
    }

    pub async fn execute_write_in_database(
        pool: &MySqlPool,
        database: &str,
        sql: &str,
        params: &[QueryParam],
        query_timeout: Duration,
    ) -> DbResult<u64> {
        let use_sql = use_statement(database)?;
        let work = async {
            let mut conn = pool.acquire().await.map_err(DbError::from)?;
            sqlx::query(&use_sql)
                .execute(&mut *conn)
                .await
                .map_err(DbError::from)?;
            let mut query = sqlx::query(sql);
            for param in params {
                query = bind_param(query, param);
            }
            let result = query.execute(&mut *conn).await.map_err(DbError::from)?;
            Ok(result.rows_affected())
        };
        match timeout(query_timeout, work).await {
            Ok(rows_affected) => rows_affected,
            Err(_) => Err(timeout_error("write execution", query_timeout)),
        }
    }

    /// `USE` cannot take a bind parameter; the database name is sanitized
    /// and quoted instead.
    pub fn use_statement(database: &str) -> DbResult<String> {
        let database = sanitize_identifier(database).ok_or_else(|| {
            DbError::validation(format!("invalid database name: '{database}'"))
        })?;
        Ok(format!("USE {}", Dialect::MySql.quote(&database)))
    }

    fn bind_param<'q>(
        query: sqlx::query::Query<'q, sqlx::MySql, MySqlArguments>,
        param: &'q QueryParam,
    ) -> sqlx::query::Query<'q, sqlx::MySql, MySqlArguments> {
        match param {
            QueryParam::Null => query.bind(None::<String>),
            QueryParam::Bool(v) => query.bind(*v),
            QueryParam::Int(v) => query.bind(*v),
            QueryParam::Float(v) => query.bind(*v),
            QueryParam::String(v) => query.bind(v.as_str()),
            QueryParam::Json(v) => query.bind(sqlx::types::Json(v)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ColumnMetadata;
    use serde_json::Value as JsonValue;

    struct FakeRow(Vec<(String, JsonValue)>);

    impl RowToJson for FakeRow {
        fn to_json_map(&self) -> serde_json::Map<String, JsonValue> {
            self.0.iter().cloned().collect()
        }

        fn column_metadata(&self) -> Vec<ColumnMetadata> {
            self.0
                .iter()
                .map(|(name, _)| ColumnMetadata::new(name.clone(), "text", true))
                .collect()
        }
    }

    fn rows(n: usize) -> Vec<FakeRow> {
        (0..n)
            .map(|i| FakeRow(vec![("id".to_string(), JsonValue::from(i as i64))]))
            .collect()
    }

    #[test]
    fn test_normalize_empty() {
        let result = normalize_rows(rows(0), 10, Instant::now());
        assert!(result.rows.is_empty());
        assert!(!result.truncated);
        assert!(result.columns.is_empty());
    }

    #[test]
    fn test_normalize_under_limit() {
        let result = normalize_rows(rows(3), 10, Instant::now());
        assert_eq!(result.row_count(), 3);
        assert!(!result.truncated);
        assert_eq!(result.columns.len(), 1);
        assert_eq!(result.columns[0].name, "id");
    }

    #[test]
    fn test_normalize_truncates_probe_row() {
        // 11 rows fetched against a limit of 10: the probe row marks
        // truncation and is dropped from the output.
        let result = normalize_rows(rows(11), 10, Instant::now());
        assert_eq!(result.row_count(), 10);
        assert!(result.truncated);
    }

    #[test]
    fn test_normalize_exactly_at_limit() {
        let result = normalize_rows(rows(10), 10, Instant::now());
        assert_eq!(result.row_count(), 10);
        assert!(!result.truncated);
    }

    #[test]
    fn test_use_statement_quotes_database() {
        assert_eq!(
            mysql::use_statement("analytics").unwrap(),
            "USE `analytics`"
        );
        assert!(mysql::use_statement("evil`; DROP TABLE x").is_err());
        assert!(mysql::use_statement("").is_err());
    }
}

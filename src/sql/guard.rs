//! Guardrail policy.
//!
//! Centralizes every safety decision: database allowlisting, read-only
//! enforcement, raw-SQL opt-in, SELECT limit clamping, and the mutation
//! row-cap check fed by the `COUNT(*)` preflight. Tool handlers never apply
//! policy themselves; they ask this engine.

use crate::config::GuardrailConfig;
use crate::error::{DbError, DbResult};
use crate::sql::Dialect;
use crate::sql::predicate::Predicate;
use sqlparser::ast::Statement;
use sqlparser::dialect::{MySqlDialect, PostgreSqlDialect};
use sqlparser::parser::Parser;

/// Kind of mutating operation, used for read-only gating and row caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MutationKind {
    Insert,
    Update,
    Delete,
}

impl MutationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }
}

impl std::fmt::Display for MutationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Immutable policy engine, built once at startup from configuration.
#[derive(Debug, Clone)]
pub struct Guardrails {
    config: GuardrailConfig,
    allowed_databases: Vec<String>,
}

impl Guardrails {
    pub fn new(config: GuardrailConfig, allowed_databases: Vec<String>) -> Self {
        Self {
            config,
            allowed_databases,
        }
    }

    pub fn read_only(&self) -> bool {
        self.config.read_only
    }

    pub fn lenient_filters(&self) -> bool {
        self.config.lenient_filters
    }

    /// The configured database allowlist, in configuration order.
    pub fn allowed_databases(&self) -> &[String] {
        &self.allowed_databases
    }

    /// Exact-match check against the configured database allowlist.
    ///
    /// No pattern matching and no normalization: the requested name must
    /// equal a configured entry byte-for-byte.
    pub fn check_database(&self, database: &str) -> DbResult<()> {
        if self.allowed_databases.iter().any(|d| d == database) {
            Ok(())
        } else {
            Err(DbError::access_denied(database, &self.allowed_databases))
        }
    }

    /// Reject mutations when the server runs in read-only mode.
    pub fn check_mutation_allowed(&self, kind: MutationKind) -> DbResult<()> {
        if self.config.read_only {
            Err(DbError::read_only(kind.as_str()))
        } else {
            Ok(())
        }
    }

    /// Raw SQL execution must be explicitly enabled.
    pub fn check_raw_enabled(&self) -> DbResult<()> {
        if self.config.allow_raw_query {
            Ok(())
        } else {
            Err(DbError::RawQueryDisabled)
        }
    }

    /// Gate a raw statement through read-only mode.
    ///
    /// In read-only mode only statements classified as reads may run; the
    /// classification happens on the parsed AST, not on a string prefix.
    pub fn check_raw_statement(&self, sql: &str, dialect: Dialect) -> DbResult<()> {
        self.check_raw_enabled()?;
        if self.config.read_only && !is_read_only_statement(sql, dialect) {
            return Err(DbError::read_only("raw query"));
        }
        Ok(())
    }

    /// Clamp a requested SELECT limit into `1..=max_select_limit`.
    ///
    /// Absent or zero requests fall back to the configured maximum.
    pub fn clamp_select_limit(&self, requested: Option<u64>) -> u64 {
        let max = self.config.max_select_limit;
        match requested {
            Some(n) if n >= 1 && n <= max => n,
            _ => max,
        }
    }

    /// UPDATE and DELETE must target rows through a non-empty predicate.
    pub fn require_predicate(&self, predicate: &Predicate, kind: MutationKind) -> DbResult<()> {
        if predicate.is_empty() {
            Err(DbError::validation(format!(
                "{} requires at least one valid filter; refusing to touch the whole table",
                kind.as_str().to_uppercase()
            )))
        } else {
            Ok(())
        }
    }

    /// Compare the preflight `COUNT(*)` result against the row cap.
    ///
    /// The count is advisory: rows can change between the count and the
    /// mutation. The cap still bounds accidental mass updates, which is the
    /// failure mode it exists for.
    pub fn check_mutation_count(&self, kind: MutationKind, matched: u64) -> DbResult<()> {
        let cap = match kind {
            MutationKind::Update => self.config.max_update_limit,
            MutationKind::Delete => self.config.max_delete_limit,
            MutationKind::Insert => return Ok(()),
        };
        if matched > cap {
            Err(DbError::row_limit_exceeded(kind.as_str(), matched, cap))
        } else {
            Ok(())
        }
    }
}

/// Classify a raw statement as read-only.
///
/// Parses with the dialect-appropriate grammar and accepts only SELECT-shaped
/// statements (queries, EXPLAIN, SHOW). Multi-statement input is read-only
/// only if every statement is. Unparseable input falls back to a first-token
/// check so dialect extensions sqlparser does not know still classify
/// sensibly.
pub fn is_read_only_statement(sql: &str, dialect: Dialect) -> bool {
    let statements = match dialect {
        Dialect::Postgres => Parser::parse_sql(&PostgreSqlDialect {}, sql),
        Dialect::MySql => Parser::parse_sql(&MySqlDialect {}, sql),
    };
    match statements {
        Ok(statements) if !statements.is_empty() => {
            statements.iter().all(statement_is_read_only)
        }
        _ => first_token_is_read_only(sql),
    }
}

fn statement_is_read_only(statement: &Statement) -> bool {
    match statement {
        Statement::Query(_)
        | Statement::ExplainTable { .. }
        | Statement::ShowTables { .. }
        | Statement::ShowColumns { .. }
        | Statement::ShowDatabases { .. }
        | Statement::ShowVariable { .. }
        | Statement::ShowVariables { .. }
        | Statement::ShowCreate { .. }
        | Statement::ShowFunctions { .. }
        | Statement::ShowStatus { .. } => true,
        // EXPLAIN ANALYZE executes the inner statement, so EXPLAIN is only
        // a read when what it explains is a read.
        Statement::Explain { statement, .. } => statement_is_read_only(statement),
        _ => false,
    }
}

fn first_token_is_read_only(sql: &str) -> bool {
    let first = sql
        .trim_start()
        .split_whitespace()
        .next()
        .unwrap_or("")
        .to_ascii_uppercase();
    matches!(
        first.as_str(),
        "SELECT" | "SHOW" | "EXPLAIN" | "DESCRIBE" | "DESC" | "WITH" | "VALUES" | "TABLE"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::predicate::FilterClause;
    use serde_json::json;

    fn guardrails(config: GuardrailConfig) -> Guardrails {
        Guardrails::new(config, vec!["mydb".to_string(), "analytics".to_string()])
    }

    fn default_guardrails() -> Guardrails {
        guardrails(GuardrailConfig::default())
    }

    fn read_only_guardrails() -> Guardrails {
        guardrails(GuardrailConfig {
            read_only: true,
            allow_raw_query: true,
            ..GuardrailConfig::default()
        })
    }

    #[test]
    fn test_allowlist_exact_match() {
        let guard = default_guardrails();
        assert!(guard.check_database("mydb").is_ok());
        assert!(guard.check_database("analytics").is_ok());
        assert!(guard.check_database("MYDB").is_err());
        assert!(guard.check_database("mydb2").is_err());
        assert!(guard.check_database("").is_err());
    }

    #[test]
    fn test_access_denied_lists_allowed() {
        let guard = default_guardrails();
        let err = guard.check_database("other").unwrap_err();
        let message = err.to_string();
        assert!(message.contains("other"));
        assert!(message.contains("mydb"));
    }

    #[test]
    fn test_read_only_blocks_mutations() {
        let guard = read_only_guardrails();
        for kind in [
            MutationKind::Insert,
            MutationKind::Update,
            MutationKind::Delete,
        ] {
            let err = guard.check_mutation_allowed(kind).unwrap_err();
            assert!(matches!(err, DbError::ReadOnlyViolation { .. }));
        }
        assert!(
            default_guardrails()
                .check_mutation_allowed(MutationKind::Delete)
                .is_ok()
        );
    }

    #[test]
    fn test_raw_query_opt_in() {
        let guard = default_guardrails();
        assert!(matches!(
            guard.check_raw_enabled().unwrap_err(),
            DbError::RawQueryDisabled
        ));

        let guard = guardrails(GuardrailConfig {
            allow_raw_query: true,
            ..GuardrailConfig::default()
        });
        assert!(guard.check_raw_enabled().is_ok());
    }

    #[test]
    fn test_raw_statement_read_only_gate() {
        let guard = read_only_guardrails();
        assert!(
            guard
                .check_raw_statement("SELECT * FROM users", Dialect::Postgres)
                .is_ok()
        );
        assert!(
            guard
                .check_raw_statement("DELETE FROM users", Dialect::Postgres)
                .is_err()
        );
        assert!(
            guard
                .check_raw_statement("UPDATE users SET a = 1", Dialect::MySql)
                .is_err()
        );
    }

    #[test]
    fn test_classifier_handles_leading_whitespace_and_case() {
        assert!(is_read_only_statement(
            "  \n\tselect 1",
            Dialect::Postgres
        ));
        assert!(is_read_only_statement(
            "WITH t AS (SELECT 1) SELECT * FROM t",
            Dialect::Postgres
        ));
        assert!(!is_read_only_statement(
            "  drop table users",
            Dialect::MySql
        ));
    }

    #[test]
    fn test_classifier_rejects_mixed_multi_statement() {
        assert!(!is_read_only_statement(
            "SELECT 1; DELETE FROM users",
            Dialect::Postgres
        ));
    }

    #[test]
    fn test_explain_classified_by_inner_statement() {
        assert!(is_read_only_statement(
            "EXPLAIN SELECT * FROM users",
            Dialect::Postgres
        ));
        assert!(!is_read_only_statement(
            "EXPLAIN ANALYZE DELETE FROM users",
            Dialect::Postgres
        ));
    }

    #[test]
    fn test_classifier_is_not_fooled_by_prefix_tricks() {
        // Parses as a mutation even though a naive prefix check could be
        // bypassed with comments.
        assert!(!is_read_only_statement(
            "/* SELECT */ DELETE FROM users",
            Dialect::Postgres
        ));
    }

    #[test]
    fn test_select_limit_clamp() {
        let guard = default_guardrails();
        assert_eq!(guard.clamp_select_limit(Some(10)), 10);
        assert_eq!(guard.clamp_select_limit(Some(1)), 1);
        assert_eq!(guard.clamp_select_limit(Some(1000)), 1000);
        assert_eq!(guard.clamp_select_limit(Some(5000)), 1000);
        assert_eq!(guard.clamp_select_limit(Some(0)), 1000);
        assert_eq!(guard.clamp_select_limit(None), 1000);
    }

    #[test]
    fn test_require_predicate() {
        let guard = default_guardrails();
        let err = guard
            .require_predicate(&Predicate::default(), MutationKind::Delete)
            .unwrap_err();
        assert!(matches!(err, DbError::Validation { .. }));

        let filters = vec![FilterClause {
            column: "id".to_string(),
            op: "=".to_string(),
            value: Some(json!(1)),
        }];
        let predicate = Predicate::compile(&filters, false).unwrap();
        assert!(
            guard
                .require_predicate(&predicate, MutationKind::Update)
                .is_ok()
        );
    }

    #[test]
    fn test_mutation_row_cap() {
        let guard = guardrails(GuardrailConfig {
            max_update_limit: 5,
            max_delete_limit: 1,
            ..GuardrailConfig::default()
        });
        assert!(guard.check_mutation_count(MutationKind::Update, 5).is_ok());
        assert!(
            guard
                .check_mutation_count(MutationKind::Update, 6)
                .is_err()
        );
        assert!(guard.check_mutation_count(MutationKind::Delete, 0).is_ok());
        let err = guard
            .check_mutation_count(MutationKind::Delete, 2)
            .unwrap_err();
        assert!(matches!(
            err,
            DbError::RowLimitExceeded {
                matched: 2,
                limit: 1,
                ..
            }
        ));
        // Inserts are never preflight-capped.
        assert!(
            guard
                .check_mutation_count(MutationKind::Insert, 10_000)
                .is_ok()
        );
    }
}

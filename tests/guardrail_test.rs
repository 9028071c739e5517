//! Guardrail policy tests: allowlist, read-only mode, raw-SQL gating, and
//! row caps, exercised the way the tool handlers drive them.

use serde_json::json;
use sql_mcp_server::config::GuardrailConfig;
use sql_mcp_server::error::DbError;
use sql_mcp_server::sql::{
    Dialect, FilterClause, Guardrails, MutationKind, Predicate,
};

fn guardrails(config: GuardrailConfig) -> Guardrails {
    Guardrails::new(config, vec!["app".to_string(), "analytics".to_string()])
}

#[test]
fn allowlist_is_exact_match_only() {
    let guard = guardrails(GuardrailConfig::default());
    assert!(guard.check_database("app").is_ok());
    assert!(guard.check_database("App").is_err());
    assert!(guard.check_database("app ").is_err());
    assert!(guard.check_database("app%").is_err());
    assert!(guard.check_database("information_schema").is_err());
}

#[test]
fn read_only_mode_rejects_every_mutation_kind() {
    let guard = guardrails(GuardrailConfig {
        read_only: true,
        ..GuardrailConfig::default()
    });
    for kind in [
        MutationKind::Insert,
        MutationKind::Update,
        MutationKind::Delete,
    ] {
        assert!(matches!(
            guard.check_mutation_allowed(kind),
            Err(DbError::ReadOnlyViolation { .. })
        ));
    }
}

#[test]
fn raw_sql_is_opt_in() {
    let disabled = guardrails(GuardrailConfig::default());
    assert!(matches!(
        disabled.check_raw_statement("SELECT 1", Dialect::Postgres),
        Err(DbError::RawQueryDisabled)
    ));

    let enabled = guardrails(GuardrailConfig {
        allow_raw_query: true,
        ..GuardrailConfig::default()
    });
    assert!(
        enabled
            .check_raw_statement("SELECT 1", Dialect::Postgres)
            .is_ok()
    );
}

#[test]
fn read_only_raw_accepts_select_shapes_only() {
    let guard = guardrails(GuardrailConfig {
        read_only: true,
        allow_raw_query: true,
        ..GuardrailConfig::default()
    });

    for sql in [
        "SELECT * FROM users",
        "  select id from app.users where id = $1",
        "WITH t AS (SELECT 1 AS n) SELECT n FROM t",
        "EXPLAIN SELECT * FROM users",
        "SHOW TABLES",
    ] {
        assert!(
            guard.check_raw_statement(sql, Dialect::Postgres).is_ok()
                || guard.check_raw_statement(sql, Dialect::MySql).is_ok(),
            "should accept: {sql}"
        );
    }

    for sql in [
        "DELETE FROM users",
        "UPDATE users SET admin = true",
        "INSERT INTO users (id) VALUES (1)",
        "DROP TABLE users",
        "TRUNCATE users",
        "SELECT 1; DELETE FROM users",
        "/* SELECT */ DROP TABLE users",
    ] {
        assert!(
            guard.check_raw_statement(sql, Dialect::Postgres).is_err(),
            "should reject: {sql}"
        );
    }
}

#[test]
fn select_limit_clamps_into_configured_range() {
    let guard = guardrails(GuardrailConfig {
        max_select_limit: 200,
        ..GuardrailConfig::default()
    });
    assert_eq!(guard.clamp_select_limit(None), 200);
    assert_eq!(guard.clamp_select_limit(Some(0)), 200);
    assert_eq!(guard.clamp_select_limit(Some(1)), 1);
    assert_eq!(guard.clamp_select_limit(Some(200)), 200);
    assert_eq!(guard.clamp_select_limit(Some(10_000)), 200);
}

#[test]
fn mutations_require_a_surviving_predicate() {
    let guard = guardrails(GuardrailConfig::default());

    let empty = Predicate::compile(&[], false).unwrap();
    assert!(
        guard
            .require_predicate(&empty, MutationKind::Delete)
            .is_err()
    );

    // Lenient mode dropping every clause must not slip past the gate.
    let all_invalid = vec![FilterClause {
        column: "id; DROP TABLE users".to_string(),
        op: "=".to_string(),
        value: Some(json!(1)),
    }];
    let dropped = Predicate::compile(&all_invalid, true).unwrap();
    assert!(dropped.is_empty());
    assert!(
        guard
            .require_predicate(&dropped, MutationKind::Update)
            .is_err()
    );
}

#[test]
fn strict_mode_fails_on_invalid_filter_column() {
    let invalid = vec![FilterClause {
        column: "id'--".to_string(),
        op: "=".to_string(),
        value: Some(json!(1)),
    }];
    assert!(matches!(
        Predicate::compile(&invalid, false),
        Err(DbError::Validation { .. })
    ));
}

#[test]
fn row_caps_compare_preflight_counts() {
    let guard = guardrails(GuardrailConfig {
        max_update_limit: 10,
        max_delete_limit: 1,
        ..GuardrailConfig::default()
    });

    assert!(guard.check_mutation_count(MutationKind::Update, 10).is_ok());
    let err = guard
        .check_mutation_count(MutationKind::Update, 11)
        .unwrap_err();
    match err {
        DbError::RowLimitExceeded { matched, limit, .. } => {
            assert_eq!(matched, 11);
            assert_eq!(limit, 10);
        }
        other => panic!("unexpected error: {other:?}"),
    }

    assert!(guard.check_mutation_count(MutationKind::Delete, 1).is_ok());
    assert!(guard.check_mutation_count(MutationKind::Delete, 2).is_err());
}

#[test]
fn guardrail_errors_map_to_protocol_codes() {
    use rmcp::ErrorData;

    let invalid: ErrorData = DbError::validation("bad input").into();
    assert_eq!(invalid.code.0, -32602);

    let denied: ErrorData = DbError::access_denied("other", &["app".to_string()]).into();
    assert_eq!(denied.code.0, -32602);

    let missing: ErrorData = DbError::not_found("table", "ghost").into();
    assert_eq!(missing.code.0, -32002);

    let internal: ErrorData = DbError::internal("boom").into();
    assert_eq!(internal.code.0, -32603);
}

//! End-to-end statement rendering tests: filter clauses through predicate
//! compilation into dialect-correct SQL with aligned parameters.

use rand::Rng;
use rand::seq::SliceRandom;
use serde_json::{Value as JsonValue, json};
use sql_mcp_server::models::QueryParam;
use sql_mcp_server::sql::{
    Dialect, FilterClause, Predicate, StatementSpec, TableRef, column_values_from_map, render,
    render_count,
};

fn filter(column: &str, op: &str, value: JsonValue) -> FilterClause {
    FilterClause {
        column: column.to_string(),
        op: op.to_string(),
        value: Some(value),
    }
}

fn compile(filters: &[FilterClause]) -> Predicate {
    Predicate::compile(filters, false).expect("filters should compile")
}

fn table() -> TableRef {
    TableRef::new("appdb", None, "orders")
}

fn count_placeholders(sql: &str, dialect: Dialect) -> usize {
    match dialect {
        Dialect::MySql => sql.matches('?').count(),
        Dialect::Postgres => {
            let mut n = 0;
            while sql.contains(&format!("${}", n + 1)) {
                n += 1;
            }
            n
        }
    }
}

#[test]
fn select_renders_full_clause_order() {
    let spec = StatementSpec::Select {
        table: table(),
        columns: vec!["id".to_string(), "total".to_string()],
        predicate: compile(&[
            filter("status", "=", json!("open")),
            filter("total", ">", json!(100)),
        ]),
        order_by: vec!["total DESC".to_string()],
        limit: 50,
        offset: Some(10),
    };

    let (sql, params) = render(&spec, Dialect::Postgres).unwrap();
    assert_eq!(
        sql,
        "SELECT id, total FROM orders WHERE status = $1 AND total > $2 \
         ORDER BY total DESC LIMIT 50 OFFSET 10"
    );
    assert_eq!(
        params,
        vec![
            QueryParam::String("open".to_string()),
            QueryParam::Int(100)
        ]
    );

    let (sql, params) = render(&spec, Dialect::MySql).unwrap();
    assert_eq!(
        sql,
        "SELECT id, total FROM `appdb`.`orders` WHERE status = ? AND total > ? \
         ORDER BY total DESC LIMIT 50 OFFSET 10"
    );
    assert_eq!(params.len(), 2);
}

#[test]
fn in_list_expands_one_placeholder_per_element() {
    let predicate = compile(&[filter("id", "IN", json!([1, 2, 3]))]);
    let spec = StatementSpec::Select {
        table: table(),
        columns: vec![],
        predicate,
        order_by: vec![],
        limit: 10,
        offset: None,
    };

    let (sql, params) = render(&spec, Dialect::Postgres).unwrap();
    assert!(sql.contains("id IN ($1, $2, $3)"), "got: {sql}");
    assert_eq!(
        params,
        vec![QueryParam::Int(1), QueryParam::Int(2), QueryParam::Int(3)]
    );
}

#[test]
fn update_binds_set_values_before_where_values() {
    let values: serde_json::Map<String, JsonValue> = [
        ("status".to_string(), json!("closed")),
        ("note".to_string(), json!("done")),
    ]
    .into_iter()
    .collect();

    let spec = StatementSpec::Update {
        table: table(),
        values: column_values_from_map(&values).unwrap(),
        predicate: compile(&[filter("id", "=", json!(7))]),
    };

    let (sql, params) = render(&spec, Dialect::Postgres).unwrap();
    // Columns sorted: note before status
    assert_eq!(
        sql,
        "UPDATE orders SET note = $1, status = $2 WHERE id = $3"
    );
    assert_eq!(
        params,
        vec![
            QueryParam::String("done".to_string()),
            QueryParam::String("closed".to_string()),
            QueryParam::Int(7),
        ]
    );
}

#[test]
fn count_matches_mutation_predicate_exactly() {
    let filters = [
        filter("status", "=", json!("stale")),
        filter("updated_at", "<", json!("2020-01-01")),
    ];
    let predicate = compile(&filters);

    let (count_sql, count_params) = render_count(&table(), &predicate, Dialect::MySql).unwrap();
    let spec = StatementSpec::Delete {
        table: table(),
        predicate: compile(&filters),
    };
    let (delete_sql, delete_params) = render(&spec, Dialect::MySql).unwrap();

    let count_where = count_sql.split(" WHERE ").nth(1).unwrap();
    let delete_where = delete_sql.split(" WHERE ").nth(1).unwrap();
    assert_eq!(count_where, delete_where);
    assert_eq!(count_params, delete_params);
}

#[test]
fn null_equality_renders_is_null_without_params() {
    let predicate = compile(&[
        filter("deleted_at", "=", json!(null)),
        filter("archived_at", "!=", json!(null)),
    ]);
    let spec = StatementSpec::Select {
        table: table(),
        columns: vec![],
        predicate,
        order_by: vec![],
        limit: 10,
        offset: None,
    };

    let (sql, params) = render(&spec, Dialect::Postgres).unwrap();
    assert!(sql.contains("deleted_at IS NULL"));
    assert!(sql.contains("archived_at IS NOT NULL"));
    assert!(params.is_empty());
}

/// Random mixes of valid clauses must always produce as many bound
/// parameters as placeholders, with Postgres placeholders numbered
/// sequentially from $1.
#[test]
fn randomized_placeholder_parameter_alignment() {
    let pool: Vec<FilterClause> = vec![
        filter("a", "=", json!("x")),
        filter("b", ">", json!(5)),
        filter("c", "<=", json!(2.5)),
        filter("d", "LIKE", json!("%y%")),
        filter("e", "IN", json!([1, 2, 3, 4])),
        filter("f", "NOT IN", json!(["p", "q"])),
        filter("g", "BETWEEN", json!([10, 20])),
        filter("h", "IS NULL", json!(null)),
        filter("i", "=", json!(null)),
        filter("j", "!=", json!(true)),
    ];

    let mut rng = rand::thread_rng();
    for _ in 0..200 {
        let n = rng.gen_range(1..=pool.len());
        let chosen: Vec<FilterClause> = pool
            .choose_multiple(&mut rng, n)
            .cloned()
            .collect();
        let predicate = Predicate::compile(&chosen, false).unwrap();

        for dialect in [Dialect::Postgres, Dialect::MySql] {
            let spec = StatementSpec::Select {
                table: table(),
                columns: vec![],
                predicate: predicate.clone(),
                order_by: vec![],
                limit: 100,
                offset: None,
            };
            let (sql, params) = render(&spec, dialect).unwrap();
            assert_eq!(
                count_placeholders(&sql, dialect),
                params.len(),
                "misaligned for {dialect}: {sql}"
            );
        }
    }
}

#[test]
fn insert_order_is_deterministic_across_map_orderings() {
    let forward: serde_json::Map<String, JsonValue> = [
        ("alpha".to_string(), json!(1)),
        ("beta".to_string(), json!(2)),
        ("gamma".to_string(), json!(3)),
    ]
    .into_iter()
    .collect();
    let reversed: serde_json::Map<String, JsonValue> = [
        ("gamma".to_string(), json!(3)),
        ("beta".to_string(), json!(2)),
        ("alpha".to_string(), json!(1)),
    ]
    .into_iter()
    .collect();

    let spec_a = StatementSpec::Insert {
        table: table(),
        values: column_values_from_map(&forward).unwrap(),
    };
    let spec_b = StatementSpec::Insert {
        table: table(),
        values: column_values_from_map(&reversed).unwrap(),
    };

    let (sql_a, params_a) = render(&spec_a, Dialect::Postgres).unwrap();
    let (sql_b, params_b) = render(&spec_b, Dialect::Postgres).unwrap();
    assert_eq!(sql_a, sql_b);
    assert_eq!(params_a, params_b);
}

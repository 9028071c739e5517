//! Filter clause compilation.
//!
//! Turns caller-supplied `(column, op, value)` clauses into a dialect-neutral
//! predicate tree. Clause order is preserved and all clauses are conjoined
//! with AND; there is no OR support or nesting.
//!
//! Invalid filter columns fail the request with a validation error by
//! default. Under lenient mode (`LENIENT_FILTERS=true`) such clauses are
//! silently dropped instead, matching the legacy behavior.

use crate::error::{DbError, DbResult};
use crate::models::QueryParam;
use crate::sql::Placeholders;
use crate::sql::ident::sanitize_identifier;
use schemars::JsonSchema;
use serde::Deserialize;
use serde_json::Value as JsonValue;

/// A single WHERE condition as supplied by the caller.
#[derive(Debug, Clone, Deserialize, JsonSchema)]
pub struct FilterClause {
    /// Column name
    pub column: String,
    /// Operator: =, !=, <, <=, >, >=, LIKE, IN, NOT IN, BETWEEN, IS NULL, IS NOT NULL
    pub op: String,
    /// Value to compare. An array for IN/NOT IN/BETWEEN; omitted for IS [NOT] NULL.
    #[serde(default)]
    pub value: Option<JsonValue>,
}

/// One compiled condition. Parameters are stored in bind order.
#[derive(Debug, Clone)]
pub(crate) enum PredicateNode {
    /// `column <op> ?` with a single bound value
    Compare {
        column: String,
        op: String,
        param: QueryParam,
    },
    /// `column [NOT] IN (?, ?, ...)` with one placeholder per element
    InList {
        column: String,
        negated: bool,
        params: Vec<QueryParam>,
    },
    /// `column IS [NOT] NULL`, no bound value
    Null { column: String, negated: bool },
    /// `column BETWEEN ? AND ?`
    Between {
        column: String,
        low: QueryParam,
        high: QueryParam,
    },
}

/// Compiled conjunction of filter clauses, ready for dialect rendering.
#[derive(Debug, Clone, Default)]
pub struct Predicate {
    pub(crate) nodes: Vec<PredicateNode>,
}

impl Predicate {
    /// Compile filter clauses into a predicate tree.
    ///
    /// When `lenient` is true, clauses with unsanitizable columns or
    /// unrecognized operator tokens are dropped; otherwise they fail the
    /// request. Malformed values (wrong BETWEEN arity, non-scalar where a
    /// scalar is required) always fail.
    pub fn compile(filters: &[FilterClause], lenient: bool) -> DbResult<Predicate> {
        let mut nodes = Vec::with_capacity(filters.len());
        for clause in filters {
            let column = match sanitize_identifier(&clause.column) {
                Some(col) => col,
                None if lenient => {
                    tracing::warn!(column = %clause.column, "Dropping filter with invalid column");
                    continue;
                }
                None => {
                    return Err(DbError::validation(format!(
                        "invalid filter column: '{}'",
                        clause.column
                    )));
                }
            };

            match compile_clause(column, clause)? {
                Some(node) => nodes.push(node),
                None if lenient => {
                    tracing::warn!(op = %clause.op, "Dropping filter with invalid operator");
                }
                None => {
                    return Err(DbError::validation(format!(
                        "invalid filter operator: '{}'",
                        clause.op
                    )));
                }
            }
        }
        Ok(Predicate { nodes })
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Render this predicate as a WHERE-clause body, appending bound values
    /// to `params` in placeholder order.
    pub(crate) fn render(&self, ph: &mut Placeholders, params: &mut Vec<QueryParam>) -> String {
        let mut parts = Vec::with_capacity(self.nodes.len());
        for node in &self.nodes {
            match node {
                PredicateNode::Compare { column, op, param } => {
                    parts.push(format!("{} {} {}", column, op, ph.next()));
                    params.push(param.clone());
                }
                PredicateNode::InList {
                    column,
                    negated,
                    params: values,
                } => {
                    let placeholders: Vec<String> = values.iter().map(|_| ph.next()).collect();
                    let keyword = if *negated { "NOT IN" } else { "IN" };
                    parts.push(format!("{} {} ({})", column, keyword, placeholders.join(", ")));
                    params.extend(values.iter().cloned());
                }
                PredicateNode::Null { column, negated } => {
                    let keyword = if *negated { "IS NOT NULL" } else { "IS NULL" };
                    parts.push(format!("{} {}", column, keyword));
                }
                PredicateNode::Between { column, low, high } => {
                    let lo = ph.next();
                    let hi = ph.next();
                    parts.push(format!("{} BETWEEN {} AND {}", column, lo, hi));
                    params.push(low.clone());
                    params.push(high.clone());
                }
            }
        }
        parts.join(" AND ")
    }
}

/// Compile one clause with an already-sanitized column.
///
/// Returns `Ok(None)` when the operator token is unrecognized and fails the
/// fallback charset check, so the caller can apply the drop-or-fail policy.
fn compile_clause(column: String, clause: &FilterClause) -> DbResult<Option<PredicateNode>> {
    let op = clause.op.trim().to_uppercase();
    let value = clause.value.as_ref();

    let node = match op.as_str() {
        "=" | "!=" | "<>" => {
            let negated = op != "=";
            match value {
                None | Some(JsonValue::Null) => PredicateNode::Null { column, negated },
                Some(JsonValue::Array(items)) => in_list(column, negated, items)?,
                Some(v) => PredicateNode::Compare {
                    column,
                    op: if negated { "!=".to_string() } else { "=".to_string() },
                    param: QueryParam::scalar_from_json(v)?,
                },
            }
        }
        ">" | ">=" | "<" | "<=" => PredicateNode::Compare {
            param: QueryParam::scalar_from_json(required_value(&op, value)?)?,
            column,
            op,
        },
        // MySQL has no ILIKE; collapse both to LIKE as the portable form
        "LIKE" | "ILIKE" => PredicateNode::Compare {
            column,
            op: "LIKE".to_string(),
            param: QueryParam::scalar_from_json(required_value(&op, value)?)?,
        },
        "IN" | "NOT IN" => {
            let negated = op == "NOT IN";
            match required_value(&op, value)? {
                JsonValue::Array(items) => in_list(column, negated, items)?,
                // Scalar degrades to plain equality
                v => PredicateNode::Compare {
                    column,
                    op: if negated { "!=".to_string() } else { "=".to_string() },
                    param: QueryParam::scalar_from_json(v)?,
                },
            }
        }
        // Any supplied value is ignored
        "IS NULL" => PredicateNode::Null {
            column,
            negated: false,
        },
        "IS NOT NULL" => PredicateNode::Null {
            column,
            negated: true,
        },
        "BETWEEN" => match required_value(&op, value)? {
            JsonValue::Array(items) if items.len() == 2 => PredicateNode::Between {
                column,
                low: QueryParam::scalar_from_json(&items[0])?,
                high: QueryParam::scalar_from_json(&items[1])?,
            },
            _ => {
                return Err(DbError::validation(
                    "BETWEEN requires an array of exactly two values",
                ));
            }
        },
        // Fallback: pass other operators through as a parameterized infix
        // expression. The operator token is restricted to letters and spaces
        // (REGEXP, NOT LIKE, SOUNDS LIKE, ...) so it cannot smuggle SQL.
        other => {
            if !other.chars().all(|c| c.is_ascii_alphabetic() || c == ' ') {
                return Ok(None);
            }
            PredicateNode::Compare {
                column,
                op: other.to_string(),
                param: value.map(QueryParam::from_json).unwrap_or(QueryParam::Null),
            }
        }
    };

    Ok(Some(node))
}

fn in_list(column: String, negated: bool, items: &[JsonValue]) -> DbResult<PredicateNode> {
    if items.is_empty() {
        return Err(DbError::validation("IN requires a non-empty array"));
    }
    let params = items
        .iter()
        .map(QueryParam::scalar_from_json)
        .collect::<DbResult<Vec<_>>>()?;
    Ok(PredicateNode::InList {
        column,
        negated,
        params,
    })
}

fn required_value<'a>(op: &str, value: Option<&'a JsonValue>) -> DbResult<&'a JsonValue> {
    value.ok_or_else(|| DbError::validation(format!("operator {} requires a value", op)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sql::Dialect;
    use serde_json::json;

    fn clause(column: &str, op: &str, value: JsonValue) -> FilterClause {
        FilterClause {
            column: column.to_string(),
            op: op.to_string(),
            value: Some(value),
        }
    }

    fn clause_no_value(column: &str, op: &str) -> FilterClause {
        FilterClause {
            column: column.to_string(),
            op: op.to_string(),
            value: None,
        }
    }

    fn render(pred: &Predicate, dialect: Dialect) -> (String, Vec<QueryParam>) {
        let mut ph = Placeholders::new(dialect);
        let mut params = Vec::new();
        let sql = pred.render(&mut ph, &mut params);
        (sql, params)
    }

    #[test]
    fn test_basic_comparison() {
        let pred = Predicate::compile(&[clause("age", ">=", json!(18))], false).unwrap();
        let (sql, params) = render(&pred, Dialect::Postgres);
        assert_eq!(sql, "age >= $1");
        assert_eq!(params, vec![QueryParam::Int(18)]);
    }

    #[test]
    fn test_clause_order_preserved() {
        let pred = Predicate::compile(
            &[
                clause("status", "=", json!("active")),
                clause("age", ">", json!(21)),
                clause("name", "LIKE", json!("J%")),
            ],
            false,
        )
        .unwrap();
        let (sql, params) = render(&pred, Dialect::Postgres);
        assert_eq!(sql, "status = $1 AND age > $2 AND name LIKE $3");
        assert_eq!(
            params,
            vec![
                QueryParam::String("active".to_string()),
                QueryParam::Int(21),
                QueryParam::String("J%".to_string()),
            ]
        );
    }

    #[test]
    fn test_mysql_placeholders() {
        let pred = Predicate::compile(
            &[clause("a", "=", json!(1)), clause("b", "<", json!(2))],
            false,
        )
        .unwrap();
        let (sql, params) = render(&pred, Dialect::MySql);
        assert_eq!(sql, "a = ? AND b < ?");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_in_list_expansion() {
        let pred =
            Predicate::compile(&[clause("id", "IN", json!([1, 2, 3]))], false).unwrap();
        let (sql, params) = render(&pred, Dialect::Postgres);
        assert_eq!(sql, "id IN ($1, $2, $3)");
        assert_eq!(params.len(), 3);
    }

    #[test]
    fn test_not_in_list() {
        let pred =
            Predicate::compile(&[clause("id", "NOT IN", json!(["a", "b"]))], false).unwrap();
        let (sql, params) = render(&pred, Dialect::MySql);
        assert_eq!(sql, "id NOT IN (?, ?)");
        assert_eq!(params.len(), 2);
    }

    #[test]
    fn test_in_with_scalar_degrades_to_equality() {
        let pred = Predicate::compile(&[clause("id", "IN", json!(7))], false).unwrap();
        let (sql, params) = render(&pred, Dialect::Postgres);
        assert_eq!(sql, "id = $1");
        assert_eq!(params, vec![QueryParam::Int(7)]);
    }

    #[test]
    fn test_in_rejects_empty_array() {
        let err = Predicate::compile(&[clause("id", "IN", json!([]))], false).unwrap_err();
        assert!(err.to_string().contains("non-empty"));
    }

    #[test]
    fn test_is_null_ignores_value() {
        let pred = Predicate::compile(
            &[clause("deleted_at", "IS NULL", json!("ignored"))],
            false,
        )
        .unwrap();
        let (sql, params) = render(&pred, Dialect::Postgres);
        assert_eq!(sql, "deleted_at IS NULL");
        assert!(params.is_empty());
    }

    #[test]
    fn test_equality_with_null_value_renders_is_null() {
        let pred = Predicate::compile(&[clause("email", "=", json!(null))], false).unwrap();
        let (sql, _) = render(&pred, Dialect::Postgres);
        assert_eq!(sql, "email IS NULL");

        let pred = Predicate::compile(&[clause_no_value("email", "!=")], false).unwrap();
        let (sql, _) = render(&pred, Dialect::Postgres);
        assert_eq!(sql, "email IS NOT NULL");
    }

    #[test]
    fn test_between() {
        let pred =
            Predicate::compile(&[clause("age", "BETWEEN", json!([18, 65]))], false).unwrap();
        let (sql, params) = render(&pred, Dialect::Postgres);
        assert_eq!(sql, "age BETWEEN $1 AND $2");
        assert_eq!(params, vec![QueryParam::Int(18), QueryParam::Int(65)]);
    }

    #[test]
    fn test_between_requires_two_values() {
        let err =
            Predicate::compile(&[clause("age", "BETWEEN", json!([18]))], false).unwrap_err();
        assert!(err.to_string().contains("two values"));
    }

    #[test]
    fn test_fallback_operator_is_parameterized() {
        let pred = Predicate::compile(&[clause("name", "REGEXP", json!("^J"))], false).unwrap();
        let (sql, params) = render(&pred, Dialect::MySql);
        assert_eq!(sql, "name REGEXP ?");
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_fallback_operator_charset_enforced() {
        // Operators carrying digits or punctuation could smuggle SQL text
        let err = Predicate::compile(
            &[clause("id", "= 1 OR 1=1 --", json!(1))],
            false,
        )
        .unwrap_err();
        assert!(matches!(err, DbError::Validation { .. }));
    }

    #[test]
    fn test_invalid_column_fails_by_default() {
        let err = Predicate::compile(
            &[clause("id; DROP TABLE users", "=", json!(1))],
            false,
        )
        .unwrap_err();
        assert!(matches!(err, DbError::Validation { .. }));
    }

    #[test]
    fn test_invalid_column_dropped_in_lenient_mode() {
        let pred = Predicate::compile(
            &[
                clause("id; DROP TABLE users", "=", json!(1)),
                clause("status", "=", json!("active")),
            ],
            true,
        )
        .unwrap();
        assert_eq!(pred.len(), 1);
        let (sql, params) = render(&pred, Dialect::Postgres);
        assert_eq!(sql, "status = $1");
        assert_eq!(params.len(), 1);
    }

    #[test]
    fn test_ilike_collapses_to_like() {
        let pred = Predicate::compile(&[clause("name", "ILIKE", json!("j%"))], false).unwrap();
        let (sql, _) = render(&pred, Dialect::Postgres);
        assert_eq!(sql, "name LIKE $1");
    }

    #[test]
    fn test_operator_case_insensitive() {
        let pred = Predicate::compile(&[clause_no_value("x", "is null")], false).unwrap();
        let (sql, _) = render(&pred, Dialect::Postgres);
        assert_eq!(sql, "x IS NULL");
    }
}

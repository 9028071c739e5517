//! Query-related data models.
//!
//! This module defines the bound-parameter and result-set types shared by the
//! statement builder, executor, and tool handlers.

use crate::error::{DbError, DbResult};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

/// A parameter value bound positionally into a statement.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QueryParam {
    /// NULL value
    Null,
    /// Boolean value
    Bool(bool),
    /// Integer value (stored as i64 for maximum range)
    Int(i64),
    /// Floating point value
    Float(f64),
    /// String value
    String(String),
    /// Arbitrary JSON value (bound as the driver's JSON type)
    Json(JsonValue),
}

impl QueryParam {
    /// Check if this parameter is null.
    pub fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Get the type name of this parameter for debugging.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Float(_) => "float",
            Self::String(_) => "string",
            Self::Json(_) => "json",
        }
    }

    /// Convert a JSON scalar into a bindable parameter.
    ///
    /// Arrays and objects bind as the driver's JSON type; numbers that fit in
    /// i64 bind as integers, everything else as floats.
    pub fn from_json(value: &JsonValue) -> Self {
        match value {
            JsonValue::Null => Self::Null,
            JsonValue::Bool(b) => Self::Bool(*b),
            JsonValue::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else {
                    Self::Float(n.as_f64().unwrap_or(0.0))
                }
            }
            JsonValue::String(s) => Self::String(s.clone()),
            other => Self::Json(other.clone()),
        }
    }

    /// Convert a JSON scalar, rejecting arrays and objects.
    ///
    /// Used where a single comparison value is required (e.g. `=`, `>`).
    pub fn scalar_from_json(value: &JsonValue) -> DbResult<Self> {
        match value {
            JsonValue::Array(_) | JsonValue::Object(_) => Err(DbError::validation(format!(
                "expected a scalar value, got {}",
                json_kind(value)
            ))),
            other => Ok(Self::from_json(other)),
        }
    }
}

fn json_kind(value: &JsonValue) -> &'static str {
    match value {
        JsonValue::Null => "null",
        JsonValue::Bool(_) => "boolean",
        JsonValue::Number(_) => "number",
        JsonValue::String(_) => "string",
        JsonValue::Array(_) => "an array",
        JsonValue::Object(_) => "an object",
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnMetadata {
    pub name: String,
    /// Database-specific type (e.g., "int8", "varchar", "TEXT")
    pub type_name: String,
    pub nullable: bool,
}

impl ColumnMetadata {
    /// Create new column metadata.
    pub fn new(name: impl Into<String>, type_name: impl Into<String>, nullable: bool) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            nullable,
        }
    }
}

/// Ordered rows produced by a read statement. Built fresh per query and
/// discarded once the response is rendered.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryResult {
    pub columns: Vec<ColumnMetadata>,
    pub rows: Vec<serde_json::Map<String, JsonValue>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rows_affected: Option<u64>,
    pub truncated: bool,
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Create an empty result.
    pub fn empty(execution_time_ms: u64) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            rows_affected: None,
            truncated: false,
            execution_time_ms,
        }
    }

    /// Create a result for write operations (INSERT/UPDATE/DELETE).
    pub fn write_result(rows_affected: u64, execution_time_ms: u64) -> Self {
        Self {
            columns: Vec::new(),
            rows: Vec::new(),
            rows_affected: Some(rows_affected),
            truncated: false,
            execution_time_ms,
        }
    }

    /// Get the number of rows in the result.
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Check if the result is empty.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty() && self.rows_affected.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_param_types() {
        assert!(QueryParam::Null.is_null());
        assert!(!QueryParam::Bool(true).is_null());
        assert_eq!(QueryParam::Int(42).type_name(), "int");
        assert_eq!(
            QueryParam::String("hello".to_string()).type_name(),
            "string"
        );
    }

    #[test]
    fn test_from_json_scalars() {
        assert_eq!(QueryParam::from_json(&json!(null)), QueryParam::Null);
        assert_eq!(QueryParam::from_json(&json!(true)), QueryParam::Bool(true));
        assert_eq!(QueryParam::from_json(&json!(42)), QueryParam::Int(42));
        assert_eq!(QueryParam::from_json(&json!(1.5)), QueryParam::Float(1.5));
        assert_eq!(
            QueryParam::from_json(&json!("x")),
            QueryParam::String("x".to_string())
        );
    }

    #[test]
    fn test_from_json_array_binds_as_json() {
        let param = QueryParam::from_json(&json!([1, 2]));
        assert_eq!(param.type_name(), "json");
    }

    #[test]
    fn test_scalar_from_json_rejects_array() {
        let err = QueryParam::scalar_from_json(&json!([1, 2])).unwrap_err();
        assert!(err.to_string().contains("scalar"));
    }

    #[test]
    fn test_query_result_empty() {
        let result = QueryResult::empty(10);
        assert!(result.is_empty());
        assert_eq!(result.row_count(), 0);
    }

    #[test]
    fn test_query_result_write() {
        let result = QueryResult::write_result(5, 20);
        assert!(!result.is_empty());
        assert_eq!(result.rows_affected, Some(5));
    }
}

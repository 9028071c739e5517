//! Result rendering for tool output.
//!
//! Read results can be returned as structured JSON, an ASCII table (MySQL
//! CLI style), or a Markdown table.

use crate::models::{ColumnMetadata, QueryResult};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use unicode_width::UnicodeWidthStr;

/// Output format for query results.
#[derive(Debug, Clone, Copy, Default, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Structured JSON (default)
    #[default]
    Json,
    /// ASCII table
    Table,
    /// Markdown table
    Markdown,
}

/// Output for read operations.
#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct RowsOutput {
    /// Column metadata (name, type, nullable). Empty when format is table/markdown.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub columns: Vec<ColumnOutput>,
    /// Result rows as key-value maps. Empty when format is table/markdown.
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub rows: Vec<serde_json::Map<String, JsonValue>>,
    /// Pre-formatted output when format is table or markdown
    #[serde(skip_serializing_if = "Option::is_none")]
    pub formatted: Option<String>,
    /// True when the result was cut off at the row limit
    pub truncated: bool,
    /// Number of rows returned
    pub row_count: usize,
    /// Execution time in milliseconds
    pub execution_time_ms: u64,
    /// Warning for degraded requests (e.g. dropped filters in lenient mode)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
}

#[derive(Debug, Clone, Serialize, JsonSchema)]
pub struct ColumnOutput {
    pub name: String,
    pub type_name: String,
    pub nullable: bool,
}

impl From<ColumnMetadata> for ColumnOutput {
    fn from(meta: ColumnMetadata) -> Self {
        Self {
            name: meta.name,
            type_name: meta.type_name,
            nullable: meta.nullable,
        }
    }
}

impl RowsOutput {
    pub fn from_result(result: QueryResult, format: OutputFormat) -> Self {
        Self::from_result_with_warning(result, format, None)
    }

    pub fn from_result_with_warning(
        result: QueryResult,
        format: OutputFormat,
        warning: Option<String>,
    ) -> Self {
        let row_count = result.rows.len();
        let truncated = result.truncated;
        let execution_time_ms = result.execution_time_ms;

        match format {
            OutputFormat::Json => Self {
                columns: result.columns.into_iter().map(Into::into).collect(),
                rows: result.rows,
                formatted: None,
                truncated,
                row_count,
                execution_time_ms,
                warning,
            },
            OutputFormat::Table => Self {
                columns: Vec::new(),
                rows: Vec::new(),
                formatted: Some(format_as_table(
                    &result.columns,
                    &result.rows,
                    truncated,
                    execution_time_ms,
                )),
                truncated,
                row_count,
                execution_time_ms,
                warning,
            },
            OutputFormat::Markdown => Self {
                columns: Vec::new(),
                rows: Vec::new(),
                formatted: Some(format_as_markdown(
                    &result.columns,
                    &result.rows,
                    truncated,
                    row_count,
                )),
                truncated,
                row_count,
                execution_time_ms,
                warning,
            },
        }
    }
}

/// Render a single cell for text output.
fn format_value(value: &JsonValue) -> String {
    match value {
        JsonValue::Null => "NULL".to_string(),
        JsonValue::Bool(b) => b.to_string(),
        JsonValue::Number(n) => n.to_string(),
        JsonValue::String(s) => s.clone(),
        JsonValue::Array(arr) => serde_json::to_string(arr).unwrap_or_default(),
        JsonValue::Object(obj) => serde_json::to_string(obj).unwrap_or_default(),
    }
}

/// ASCII table in the style of the MySQL CLI.
fn format_as_table(
    columns: &[ColumnMetadata],
    rows: &[serde_json::Map<String, JsonValue>],
    truncated: bool,
    execution_time_ms: u64,
) -> String {
    if columns.is_empty() {
        return "Empty set".to_string();
    }

    let mut widths: Vec<usize> = columns.iter().map(|c| c.name.width()).collect();
    for row in rows {
        for (i, col) in columns.iter().enumerate() {
            if let Some(value) = row.get(&col.name) {
                widths[i] = widths[i].max(format_value(value).width());
            }
        }
    }

    let separator: String = widths
        .iter()
        .map(|w| format!("+{}", "-".repeat(w + 2)))
        .collect::<String>()
        + "+\n";

    let mut output = String::new();
    output.push_str(&separator);
    let header: String = columns
        .iter()
        .zip(&widths)
        .map(|(col, w)| format!("| {:^width$} ", col.name, width = w))
        .collect::<String>()
        + "|\n";
    output.push_str(&header);
    output.push_str(&separator);

    for row in rows {
        let row_str: String = columns
            .iter()
            .zip(&widths)
            .map(|(col, w)| {
                let value = row.get(&col.name).cloned().unwrap_or(JsonValue::Null);
                let formatted = format_value(&value);
                // Numbers right-aligned, everything else left-aligned
                if matches!(value, JsonValue::Number(_)) {
                    format!("| {:>width$} ", formatted, width = w)
                } else {
                    format!("| {:<width$} ", formatted, width = w)
                }
            })
            .collect::<String>()
            + "|\n";
        output.push_str(&row_str);
    }
    output.push_str(&separator);

    let row_text = if rows.len() == 1 { "row" } else { "rows" };
    let truncated_text = if truncated { " (truncated)" } else { "" };
    output.push_str(&format!(
        "{} {} in set{} ({:.2} sec)\n",
        rows.len(),
        row_text,
        truncated_text,
        execution_time_ms as f64 / 1000.0
    ));

    output
}

/// Markdown table.
fn format_as_markdown(
    columns: &[ColumnMetadata],
    rows: &[serde_json::Map<String, JsonValue>],
    truncated: bool,
    row_count: usize,
) -> String {
    if columns.is_empty() {
        return "*Empty set*".to_string();
    }

    let mut output = String::new();
    let header: String = columns
        .iter()
        .map(|c| format!("| {} ", c.name))
        .collect::<String>()
        + "|\n";
    output.push_str(&header);

    let sep: String = columns.iter().map(|_| "|---").collect::<String>() + "|\n";
    output.push_str(&sep);

    for row in rows {
        let row_str: String = columns
            .iter()
            .map(|col| {
                let value = row.get(&col.name).cloned().unwrap_or(JsonValue::Null);
                format!("| {} ", format_value(&value))
            })
            .collect::<String>()
            + "|\n";
        output.push_str(&row_str);
    }

    let truncated_text = if truncated { " *(truncated)*" } else { "" };
    output.push_str(&format!("\n*{} rows*{}", row_count, truncated_text));

    output
}

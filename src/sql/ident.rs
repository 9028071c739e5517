//! Identifier sanitization.
//!
//! Identifiers cannot be passed as bind parameters, so this charset check is
//! the sole defense against identifier-based injection. Every table, column,
//! and order-by token flows through here before reaching SQL text.

/// Validate an identifier token.
///
/// Trims surrounding ASCII spaces only, then accepts ASCII letters, digits,
/// underscore, space (for `ORDER BY name DESC`), and dot (for qualified
/// names). Returns `None` on any other byte, including quotes, backticks,
/// semicolons, and control characters. Tabs and newlines are not trimmed,
/// so a token carrying them anywhere is rejected.
pub fn sanitize_identifier(token: &str) -> Option<String> {
    let trimmed = token.trim_matches(' ');
    if trimmed.is_empty() {
        return None;
    }
    if trimmed
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == ' ' || c == '.')
    {
        Some(trimmed.to_string())
    } else {
        None
    }
}

//! Guarded dynamic statement construction.
//!
//! This is the core of the server: filter clauses are compiled into a
//! dialect-neutral predicate tree, statement specs are rendered into
//! dialect-correct parameterized SQL, and the guardrail engine applies the
//! safety policy before anything reaches the executor.

pub mod builder;
pub mod guard;
pub mod ident;
pub mod predicate;

pub use builder::{StatementSpec, TableRef, column_values_from_map, render, render_count};
pub use guard::{Guardrails, MutationKind};
pub use ident::sanitize_identifier;
pub use predicate::{FilterClause, Predicate};

/// SQL dialect governing placeholder syntax and identifier quoting.
///
/// Chosen once at startup from configuration and fixed for the process
/// lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Postgres,
    MySql,
}

impl Dialect {
    /// Quote a single identifier segment.
    ///
    /// Identifiers must already have passed [`sanitize_identifier`], so no
    /// escaping of embedded quote characters is needed.
    pub fn quote(&self, ident: &str) -> String {
        match self {
            Self::Postgres => format!("\"{}\"", ident),
            Self::MySql => format!("`{}`", ident),
        }
    }
}

impl std::fmt::Display for Dialect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Postgres => write!(f, "postgres"),
            Self::MySql => write!(f, "mysql"),
        }
    }
}

/// Generates positional placeholders in the active dialect's style.
///
/// Postgres uses sequential `$1,$2,...`; MySQL uses `?` for every bound
/// value. Callers must push exactly one parameter per `next()` call so the
/// Nth placeholder always binds the Nth parameter.
#[derive(Debug)]
pub(crate) struct Placeholders {
    dialect: Dialect,
    issued: usize,
}

impl Placeholders {
    pub(crate) fn new(dialect: Dialect) -> Self {
        Self { dialect, issued: 0 }
    }

    pub(crate) fn next(&mut self) -> String {
        self.issued += 1;
        match self.dialect {
            Dialect::Postgres => format!("${}", self.issued),
            Dialect::MySql => "?".to_string(),
        }
    }

    #[cfg(test)]
    pub(crate) fn issued(&self) -> usize {
        self.issued
    }
}

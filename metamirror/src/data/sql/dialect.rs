//! SQL dialect trait for the mirror backends
//!
//! This trait defines the capabilities the meta query compiler needs from a
//! database: literal quoting, LIKE escaping and JSON document access.

use crate::domain::meta_query::{CastType, CompareOp};

/// SQL dialect trait for generating database-specific SQL
///
/// Different databases have different syntax for:
/// - String literal escaping
/// - LIKE escape characters
/// - JSON path extraction and existence checks
/// - Type casting
pub trait SqlDialect: Send + Sync {
    /// Get the dialect name
    fn name(&self) -> &'static str;

    /// Quote a string as a complete SQL literal, escaping its contents
    ///
    /// - MySQL: backslash escapes (`'it\'s'`)
    /// - SQLite: doubled quotes (`'it''s'`)
    fn quote_literal(&self, value: &str) -> String;

    /// Escape LIKE metacharacters (`%`, `_`, `\`) in user input
    fn escape_like(&self, value: &str) -> String {
        crate::utils::sql::escape_like_pattern(value)
    }

    /// Suffix appended after a LIKE pattern literal so `\` acts as escape
    ///
    /// - MySQL: empty (backslash is the default escape)
    /// - SQLite: ` ESCAPE '\'`
    fn like_escape_suffix(&self) -> &'static str;

    /// Extract a JSON value without unquoting it
    ///
    /// - MySQL: `JSON_EXTRACT(doc, path)`
    /// - SQLite: `(doc -> path)`
    fn json_extract(&self, doc: &str, path: &str) -> String;

    /// Extract a JSON scalar as plain SQL text
    ///
    /// - MySQL: `JSON_UNQUOTE(JSON_EXTRACT(doc, path))`
    /// - SQLite: `json_extract(doc, path)`
    fn json_extract_unquoted(&self, doc: &str, path: &str) -> String;

    /// Predicate true when the path is present in the document
    ///
    /// - MySQL: `JSON_CONTAINS_PATH(doc, 'one', path)`
    /// - SQLite: `json_type(doc, path) IS NOT NULL`
    fn json_contains_path(&self, doc: &str, path: &str) -> String;

    /// Cast an expression to the given type
    fn cast(&self, expr: &str, cast: CastType) -> String;

    /// Keyword for a regular expression match operator
    ///
    /// - MySQL: `RLIKE`, `REGEXP`, `NOT REGEXP` as written
    /// - SQLite: `RLIKE` becomes `REGEXP` (backed by the connection's `regexp()` function)
    fn regexp_operator(&self, op: CompareOp) -> &'static str {
        op.as_sql()
    }
}

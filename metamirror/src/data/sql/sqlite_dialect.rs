//! SQLite SQL dialect implementation

use super::SqlDialect;
use crate::domain::meta_query::{CastType, CompareOp};

/// SQLite SQL dialect
pub struct SqliteDialect;

impl SqlDialect for SqliteDialect {
    fn name(&self) -> &'static str {
        "sqlite"
    }

    fn quote_literal(&self, value: &str) -> String {
        format!("'{}'", value.replace('\'', "''"))
    }

    fn like_escape_suffix(&self) -> &'static str {
        " ESCAPE '\\'"
    }

    fn json_extract(&self, doc: &str, path: &str) -> String {
        // `->` keeps the JSON representation (strings stay quoted)
        format!("({} -> {})", doc, path)
    }

    fn json_extract_unquoted(&self, doc: &str, path: &str) -> String {
        format!("json_extract({}, {})", doc, path)
    }

    fn json_contains_path(&self, doc: &str, path: &str) -> String {
        format!("json_type({}, {}) IS NOT NULL", doc, path)
    }

    fn cast(&self, expr: &str, cast: CastType) -> String {
        // SQLite only knows storage affinities
        let affinity = match cast {
            CastType::Signed | CastType::Unsigned => "INTEGER",
            CastType::Decimal(_) => "NUMERIC",
            CastType::Binary => "BLOB",
            CastType::Char | CastType::Date | CastType::Datetime | CastType::Time => "TEXT",
        };
        format!("CAST({} AS {})", expr, affinity)
    }

    fn regexp_operator(&self, op: CompareOp) -> &'static str {
        match op {
            CompareOp::Rlike => "REGEXP",
            other => other.as_sql(),
        }
    }
}

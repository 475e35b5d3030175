//! ORDER BY rewriting
//!
//! Host queries sort metadata through the legacy `meta_value` column of the
//! normalized table. Once the filter has been compiled against the mirror
//! table, those sort expressions are rewritten into JSON extractions keyed by
//! the matching compiled clause.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::compiler::mirror_table_name;
use super::types::{CastType, CompiledClause, CompiledClauses};
use crate::core::constants::{
    LEGACY_VALUE_COLUMN, MIRROR_DOCUMENT_COLUMN, NUMERIC_SORT_KEY, SUPPORTED_OBJECT_TYPE,
};
use crate::data::sql::SqlContext;
use crate::utils::sql::json_path_for_key;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Direction {
    #[default]
    Asc,
    Desc,
}

impl Direction {
    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

impl FromStr for Direction {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "ASC" => Ok(Self::Asc),
            "DESC" => Ok(Self::Desc),
            _ => Err(format!("Invalid sort direction '{}'. Valid options: asc, desc", s)),
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

/// One entry of an ORDER BY clause
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrderEntry {
    pub expression: String,
    pub direction: Option<Direction>,
}

impl OrderEntry {
    pub fn new(expression: impl Into<String>, direction: Direction) -> Self {
        Self {
            expression: expression.into(),
            direction: Some(direction),
        }
    }

    /// Parse a single `expr [ASC|DESC]` entry
    fn parse(text: &str) -> Self {
        let text = text.trim();
        if let Some((expression, last)) = text.rsplit_once(char::is_whitespace)
            && let Ok(direction) = last.parse::<Direction>()
        {
            return Self {
                expression: expression.trim_end().to_string(),
                direction: Some(direction),
            };
        }
        Self {
            expression: text.to_string(),
            direction: None,
        }
    }

    fn references_legacy_column(&self) -> bool {
        self.expression.contains(LEGACY_VALUE_COLUMN)
    }
}

impl fmt::Display for OrderEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Some(direction) => write!(f, "{} {}", self.expression, direction),
            None => f.write_str(&self.expression),
        }
    }
}

/// Split ORDER BY text into entries on top-level commas
pub fn parse_order_by(text: &str) -> Vec<OrderEntry> {
    let mut entries = Vec::new();
    let mut depth = 0usize;
    let mut quote: Option<char> = None;
    let mut start = 0;

    for (i, c) in text.char_indices() {
        match (quote, c) {
            (Some(q), c) if c == q => quote = None,
            (Some(_), _) => {}
            (None, '\'' | '"' | '`') => quote = Some(c),
            (None, '(') => depth += 1,
            (None, ')') => depth = depth.saturating_sub(1),
            (None, ',') if depth == 0 => {
                entries.push(&text[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    entries.push(&text[start..]);

    entries
        .into_iter()
        .filter(|e| !e.trim().is_empty())
        .map(OrderEntry::parse)
        .collect()
}

pub fn render_order_by(entries: &[OrderEntry]) -> String {
    entries
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// A sort key requested by the caller (e.g. `meta_value`, `meta_value_num`,
/// a clause name, or a regular column)
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct OrderKey {
    pub name: String,
    #[serde(default)]
    pub direction: Direction,
}

impl OrderKey {
    pub fn new(name: impl Into<String>, direction: Direction) -> Self {
        Self {
            name: name.into(),
            direction,
        }
    }
}

impl FromStr for OrderKey {
    type Err = String;

    /// Parse `name` or `name:dir`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.rsplit_once(':') {
            Some((name, dir)) if !name.is_empty() => Ok(Self::new(name, dir.parse()?)),
            _ if s.is_empty() => Err("Sort key cannot be empty".to_string()),
            _ => Ok(Self::new(s, Direction::default())),
        }
    }
}

/// Ordering requested by the caller
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct OrderSpec {
    pub keys: Vec<OrderKey>,
}

impl OrderSpec {
    pub fn new(keys: Vec<OrderKey>) -> Self {
        Self { keys }
    }

    /// Numeric sorting applies only when the whole ordering is the single
    /// numeric value key.
    pub fn is_numeric_sort(&self) -> bool {
        matches!(self.keys.as_slice(), [only] if only.name == NUMERIC_SORT_KEY)
    }
}

/// Rewrite ORDER BY entries that reference the legacy value column
///
/// Passes `entries` through unchanged unless some entry references the legacy
/// column and `join_text` already joins the mirror table.
pub fn rewrite_order_by(
    ctx: &SqlContext,
    entries: &[OrderEntry],
    clauses: &CompiledClauses,
    join_text: &str,
    numeric_sort: bool,
) -> Vec<OrderEntry> {
    let joins_mirror = mirror_table_name(ctx, SUPPORTED_OBJECT_TYPE)
        .is_some_and(|mirror| join_text.contains(&mirror));
    if !joins_mirror || !entries.iter().any(OrderEntry::references_legacy_column) {
        return entries.to_vec();
    }

    entries
        .iter()
        .map(|entry| {
            if !entry.references_legacy_column() {
                return entry.clone();
            }
            let Some(clause) = clauses.iter().find(|c| entry.expression.contains(&c.alias)) else {
                tracing::debug!(expression = %entry.expression, "No meta clause matches ORDER BY entry");
                return entry.clone();
            };
            match sort_expression(ctx, clause, numeric_sort) {
                Some(expression) => {
                    OrderEntry::new(expression, entry.direction.unwrap_or_default())
                }
                None => entry.clone(),
            }
        })
        .collect()
}

fn sort_expression(ctx: &SqlContext, clause: &CompiledClause, numeric_sort: bool) -> Option<String> {
    let key = clause.key.as_deref()?;
    let path = ctx.literal(&json_path_for_key(key));
    let doc = format!("{}.{}", clause.alias, MIRROR_DOCUMENT_COLUMN);
    let dialect = ctx.dialect();

    let expression = if numeric_sort {
        dialect.cast(&dialect.json_extract_unquoted(&doc, &path), CastType::Signed)
    } else if clause.declared_type.is_none() {
        // Compares JSON-encoded values, not unquoted scalars
        dialect.json_extract(&doc, &path)
    } else {
        dialect.cast(&dialect.json_extract_unquoted(&doc, &path), clause.cast)
    };
    Some(expression)
}

/// Rewrite a complete ORDER BY clause text
///
/// Returns the original text untouched when the guard condition fails.
pub fn rewrite_order_by_sql(
    ctx: &SqlContext,
    order_by: &str,
    join_text: &str,
    spec: &OrderSpec,
    clauses: &CompiledClauses,
) -> String {
    if !order_by.contains(LEGACY_VALUE_COLUMN) {
        return order_by.to_string();
    }
    let entries = parse_order_by(order_by);
    let rewritten = rewrite_order_by(ctx, &entries, clauses, join_text, spec.is_numeric_sort());
    if rewritten == entries {
        return order_by.to_string();
    }
    let sql = render_order_by(&rewritten);
    tracing::trace!(order_by = %sql, "Rewrote ORDER BY clause");
    sql
}

//! Meta query compiler
//!
//! Turns a filter tree into JOIN/WHERE fragments reading from the JSON mirror
//! table instead of self-joining the normalized metadata table.
//!
//! All leaves share one JOIN since each entity has exactly one mirror row.
//! Compiler state (alias registry, clause map) lives only for the duration of
//! one [`MetaQuery::get_sql`] call, so a `MetaQuery` can be shared freely.

use std::sync::OnceLock;

use regex::Regex;

use super::registry::AliasRegistry;
use super::types::{
    CastType, CompareOp, CompiledClause, CompiledClauses, CompiledQuery, FilterChild, FilterNode,
    Leaf, MetaScalar, MetaSql, MetaValue, Relation,
};
use crate::core::constants::{MIRROR_DOCUMENT_COLUMN, MIRROR_NAME_PREFIX, SUPPORTED_OBJECT_TYPE};
use crate::data::sql::SqlContext;
use crate::utils::sql::json_path_for_key;

/// Mirror table name for an object type, or `None` if the type is unsupported
pub fn mirror_table_name(ctx: &SqlContext, object_type: &str) -> Option<String> {
    if object_type != SUPPORTED_OBJECT_TYPE {
        return None;
    }
    Some(ctx.table(&format!("{}{}meta", MIRROR_NAME_PREFIX, object_type)))
}

/// Column in the mirror table holding the object id
pub fn mirror_id_column(object_type: &str) -> String {
    format!("{}_id", object_type)
}

/// A metadata filter tree ready to be compiled
#[derive(Debug, Clone, PartialEq)]
pub struct MetaQuery {
    tree: FilterNode,
}

impl MetaQuery {
    pub fn new(tree: FilterNode) -> Self {
        Self { tree }
    }

    pub fn tree(&self) -> &FilterNode {
        &self.tree
    }

    /// Generate SQL clauses to be appended to a main query
    ///
    /// Returns `None` when the object type has no mirror table; the caller
    /// should then fall back to its own SQL. The WHERE fragment is prefixed
    /// with ` AND ` so it can follow the host's WHERE clause directly.
    pub fn get_sql(
        &self,
        ctx: &SqlContext,
        object_type: &str,
        primary_table: &str,
        primary_id_column: &str,
    ) -> Option<CompiledQuery> {
        let mirror_table = mirror_table_name(ctx, object_type)?;

        let mut compiler = Compiler {
            ctx,
            mirror_table,
            mirror_id_column: mirror_id_column(object_type),
            primary_table,
            primary_id_column,
            registry: AliasRegistry::new(),
            clauses: CompiledClauses::default(),
        };

        let mut sql = match &self.tree {
            FilterNode::Group { relation, children } => {
                compiler.compile_group(*relation, children, 0)
            }
            FilterNode::Leaf(leaf) => {
                let root = [FilterChild {
                    name: None,
                    node: FilterNode::Leaf(leaf.clone()),
                }];
                compiler.compile_group(Relation::And, &root, 0)
            }
        };

        if !sql.where_clause.is_empty() {
            sql.where_clause = format!(" AND {}", sql.where_clause);
        }

        tracing::trace!(
            join = %sql.join,
            where_clause = %sql.where_clause,
            clauses = compiler.clauses.len(),
            "Compiled meta query"
        );

        Some(CompiledQuery {
            sql,
            clauses: compiler.clauses,
        })
    }
}

/// Fragments produced by a single leaf
#[derive(Debug, Default)]
struct LeafSql {
    join: Vec<String>,
    where_chunks: Vec<String>,
}

struct Compiler<'a> {
    ctx: &'a SqlContext,
    mirror_table: String,
    mirror_id_column: String,
    primary_table: &'a str,
    primary_id_column: &'a str,
    registry: AliasRegistry,
    clauses: CompiledClauses,
}

impl Compiler<'_> {
    fn compile_group(&mut self, relation: Relation, children: &[FilterChild], depth: usize) -> MetaSql {
        let mut joins: Vec<String> = Vec::new();
        let mut wheres: Vec<String> = Vec::new();

        for child in children {
            match &child.node {
                FilterNode::Leaf(leaf) => {
                    let leaf_sql = self.compile_leaf(leaf, child.name.as_deref());
                    match leaf_sql.where_chunks.len() {
                        0 => {}
                        1 => wheres.extend(leaf_sql.where_chunks),
                        _ => wheres.push(format!("( {} )", leaf_sql.where_chunks.join(" AND "))),
                    }
                    joins.extend(leaf_sql.join);
                }
                FilterNode::Group { relation, children } => {
                    let sub = self.compile_group(*relation, children, depth + 1);
                    if !sub.where_clause.is_empty() {
                        wheres.push(sub.where_clause);
                    }
                    if !sub.join.is_empty() {
                        joins.push(sub.join);
                    }
                }
            }
        }

        // Filter duplicate JOIN clauses, keeping first occurrence order
        let mut unique_joins: Vec<String> = Vec::with_capacity(joins.len());
        for join in joins {
            if !unique_joins.contains(&join) {
                unique_joins.push(join);
            }
        }

        let where_clause = if wheres.is_empty() {
            String::new()
        } else {
            let indent = "  ".repeat(depth);
            let separator = format!(" \n  {indent}{} \n  {indent}", relation.as_sql());
            format!("( \n  {indent}{}\n{indent})", wheres.join(&separator))
        };

        MetaSql {
            join: unique_joins.join(" "),
            where_clause,
        }
    }

    fn compile_leaf(&mut self, leaf: &Leaf, name: Option<&str>) -> LeafSql {
        let mut sql = LeafSql::default();

        if leaf.key.is_none() && leaf.value.is_none() {
            return sql;
        }

        let value_is_list = leaf.value.as_ref().is_some_and(MetaValue::is_list);
        let compare = CompareOp::resolve(leaf.compare.as_deref(), value_is_list);
        let compare_key = CompareOp::resolve_key(leaf.compare_key.as_deref());

        let key = leaf.key.as_deref().map(str::trim);
        let path = self.ctx.literal(&json_path_for_key(key.unwrap_or_default()));

        let (alias, first_use) = self.registry.register(&self.mirror_table);
        if first_use {
            sql.join.push(format!(
                " INNER JOIN {table} AS {alias} ON ( {primary}.{primary_id} = {alias}.{mirror_id} )",
                table = self.mirror_table,
                alias = alias,
                primary = self.primary_table,
                primary_id = self.primary_id_column,
                mirror_id = self.mirror_id_column,
            ));
        }

        let declared_type = leaf
            .cast_type
            .as_deref()
            .map(str::trim)
            .filter(|t| !t.is_empty());
        let cast = CastType::resolve(declared_type);

        // Integer-like names are positional, not caller-chosen
        let base = name
            .filter(|n| !n.is_empty() && n.parse::<i64>().is_err())
            .unwrap_or(alias.as_str());
        let clause_name = self.registry.unique_clause_key(base);

        self.clauses.push(CompiledClause {
            name: clause_name,
            key: key.map(str::to_string),
            alias: alias.clone(),
            cast,
            declared_type: declared_type.map(str::to_string),
            compare,
            compare_key,
        });

        let doc = format!("{}.{}", alias, MIRROR_DOCUMENT_COLUMN);
        let dialect = self.ctx.dialect();

        if key.is_some() {
            match compare {
                CompareOp::NotExists => sql.where_chunks.push(format!(
                    "(NOT {} OR {} IS NULL)",
                    dialect.json_contains_path(&doc, &path),
                    doc
                )),
                CompareOp::Exists if leaf.value.is_none() => {
                    sql.where_chunks.push(dialect.json_contains_path(&doc, &path));
                }
                _ => {}
            }
        }

        if let Some(value) = &leaf.value
            && let Some((operator, operand)) = self.value_operand(compare, value, cast)
        {
            let extracted = dialect.json_extract_unquoted(&doc, &path);
            let column = match cast {
                CastType::Char => extracted,
                other => dialect.cast(&extracted, other),
            };
            let operator = match operator {
                CompareOp::Rlike | CompareOp::Regexp | CompareOp::NotRegexp => {
                    dialect.regexp_operator(operator)
                }
                other => other.as_sql(),
            };
            sql.where_chunks.push(format!("{} {} {}", column, operator, operand));
        }

        // Key and value predicates for the same clause are ANDed together
        if sql.where_chunks.len() > 1 {
            sql.where_chunks = vec![format!("( {} )", sql.where_chunks.join(" AND "))];
        }

        sql
    }

    /// Right-hand side of a value predicate, with the operator to apply.
    /// `None` means the value contributes no predicate.
    fn value_operand(
        &self,
        compare: CompareOp,
        value: &MetaValue,
        cast: CastType,
    ) -> Option<(CompareOp, String)> {
        match compare {
            CompareOp::In | CompareOp::NotIn => {
                let items = coerce_list(value);
                if items.is_empty() {
                    return None;
                }
                let literals: Vec<String> =
                    items.iter().map(|v| self.literal(v, false, cast)).collect();
                Some((compare, format!("({})", literals.join(","))))
            }
            CompareOp::Between | CompareOp::NotBetween => {
                let items = coerce_list(value);
                let [low, high, ..] = items.as_slice() else {
                    return None;
                };
                Some((
                    compare,
                    format!(
                        "{} AND {}",
                        self.literal(low, false, cast),
                        self.literal(high, false, cast)
                    ),
                ))
            }
            CompareOp::Like | CompareOp::NotLike => {
                let scalar = first_scalar(value)?;
                let dialect = self.ctx.dialect();
                let pattern = format!("%{}%", dialect.escape_like(&scalar_text(scalar, true)));
                Some((
                    compare,
                    format!("{}{}", dialect.quote_literal(&pattern), dialect.like_escape_suffix()),
                ))
            }
            // EXISTS with a value is interpreted as '='
            CompareOp::Exists => Some((
                CompareOp::Eq,
                self.literal(first_scalar(value)?, true, cast),
            )),
            // 'value' is ignored for NOT EXISTS
            CompareOp::NotExists => None,
            _ => Some((compare, self.literal(first_scalar(value)?, true, cast))),
        }
    }

    /// Mirrored values are text, so numbers stay bare only against a numeric cast
    fn literal(&self, scalar: &MetaScalar, trim: bool, cast: CastType) -> String {
        match scalar {
            MetaScalar::Number(n) if cast != CastType::Char => n.to_string(),
            other => self.ctx.literal(&scalar_text(other, trim)),
        }
    }
}

fn split_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[,\s]+").expect("Invalid regex"))
}

/// Coerce a value to a list, splitting scalar strings on commas/whitespace
fn coerce_list(value: &MetaValue) -> Vec<MetaScalar> {
    match value {
        MetaValue::List(items) => items.clone(),
        MetaValue::Scalar(MetaScalar::Text(s)) => split_regex()
            .split(s)
            .filter(|piece| !piece.is_empty())
            .map(MetaScalar::text)
            .collect(),
        MetaValue::Scalar(other) => vec![other.clone()],
    }
}

/// Scalar used by single-value operators; lists contribute their first element
fn first_scalar(value: &MetaValue) -> Option<&MetaScalar> {
    match value {
        MetaValue::Scalar(scalar) => Some(scalar),
        MetaValue::List(items) => items.first(),
    }
}

fn scalar_text(scalar: &MetaScalar, trim: bool) -> String {
    match scalar {
        MetaScalar::Text(s) if trim => s.trim().to_string(),
        MetaScalar::Text(s) => s.clone(),
        MetaScalar::Number(n) => n.to_string(),
        MetaScalar::Bool(b) => String::from(if *b { "1" } else { "0" }),
    }
}

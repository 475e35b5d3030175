//! Metadata query acceleration
//!
//! Compiles metadata filter trees into SQL against the JSON mirror table and
//! rewrites ORDER BY clauses that sort by the legacy value column.
//!
//! ## Usage
//!
//! ```no_run
//! use metamirror::data::sql::{Backend, SqlContext};
//! use metamirror::domain::meta_query::{MetaQuery, parse_filter_tree};
//!
//! let tree = parse_filter_tree(r#"[{"key": "color", "value": "red"}]"#).unwrap();
//! let ctx = SqlContext::new(Backend::Mysql, "wp_");
//! if let Some(compiled) = MetaQuery::new(tree).get_sql(&ctx, "entity", "wp_entities", "ID") {
//!     println!("{}{}", compiled.sql.join, compiled.sql.where_clause);
//! }
//! ```

mod compiler;
mod orderby;
mod parser;
mod registry;
mod types;

pub use compiler::{MetaQuery, mirror_id_column, mirror_table_name};
pub use orderby::{
    Direction, OrderEntry, OrderKey, OrderSpec, parse_order_by, render_order_by, rewrite_order_by,
    rewrite_order_by_sql,
};
pub use parser::{ParseError, filter_tree_from_value, parse_filter_tree};
pub use registry::AliasRegistry;
pub use types::{
    CastType, CompareOp, CompiledClause, CompiledClauses, CompiledQuery, FilterChild, FilterNode,
    Leaf, MetaScalar, MetaSql, MetaValue, Relation,
};

//! Host query integration
//!
//! The host query engine builds its own JOIN/WHERE for metadata filters and
//! then offers them here. When acceleration applies, the fragments are
//! replaced by ones reading the JSON mirror table, and the final ORDER BY is
//! rewritten to sort by the mirrored values.

use serde::{Deserialize, Serialize};

use super::meta_query::{
    CompiledClauses, CompiledQuery, FilterNode, MetaQuery, MetaSql, OrderSpec, rewrite_order_by_sql,
};
use crate::core::config::AppConfig;
use crate::data::sql::SqlContext;

/// A request from the host to generate metadata SQL
#[derive(Debug, Clone, Copy)]
pub struct MetaSqlRequest<'a> {
    pub object_type: &'a str,
    pub tree: &'a FilterNode,
    pub primary_table: &'a str,
    pub primary_id_column: &'a str,
    /// Host asked to skip filter plugins for this query
    pub suppress_filters: bool,
}

/// Result of [`QueryHooks::filter_meta_sql`]
#[derive(Debug, Clone, PartialEq)]
pub enum MetaSqlOutcome {
    /// Fragments compiled against the mirror table
    Accelerated(CompiledQuery),
    /// The host's own SQL, returned untouched
    Bypassed(MetaSql),
}

impl MetaSqlOutcome {
    pub fn sql(&self) -> &MetaSql {
        match self {
            Self::Accelerated(compiled) => &compiled.sql,
            Self::Bypassed(sql) => sql,
        }
    }

    pub fn clauses(&self) -> Option<&CompiledClauses> {
        match self {
            Self::Accelerated(compiled) => Some(&compiled.clauses),
            Self::Bypassed(_) => None,
        }
    }

    pub fn is_accelerated(&self) -> bool {
        matches!(self, Self::Accelerated(_))
    }
}

/// Clause pieces of a fully built host query
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct QueryClauses {
    pub join: String,
    #[serde(rename = "where")]
    pub where_clause: String,
    pub orderby: String,
}

#[derive(Debug, Clone)]
pub struct QueryHooks {
    ctx: SqlContext,
    enabled: bool,
}

impl QueryHooks {
    pub fn new(ctx: SqlContext, enabled: bool) -> Self {
        Self { ctx, enabled }
    }

    pub fn from_config(config: &AppConfig) -> Self {
        Self::new(
            SqlContext::new(config.database.backend, config.tables.prefix.clone()),
            config.enabled,
        )
    }

    pub fn context(&self) -> &SqlContext {
        &self.ctx
    }

    /// Replace the host's metadata JOIN/WHERE with mirror-table fragments
    ///
    /// Returns `original` when acceleration is disabled, suppressed for this
    /// query, or the object type has no mirror table.
    pub fn filter_meta_sql(&self, original: MetaSql, request: &MetaSqlRequest<'_>) -> MetaSqlOutcome {
        if !self.enabled || request.suppress_filters {
            tracing::debug!(
                enabled = self.enabled,
                suppress_filters = request.suppress_filters,
                "Meta query acceleration bypassed"
            );
            return MetaSqlOutcome::Bypassed(original);
        }

        let query = MetaQuery::new(request.tree.clone());
        match query.get_sql(
            &self.ctx,
            request.object_type,
            request.primary_table,
            request.primary_id_column,
        ) {
            Some(compiled) => MetaSqlOutcome::Accelerated(compiled),
            None => {
                tracing::debug!(object_type = request.object_type, "No mirror table for object type");
                MetaSqlOutcome::Bypassed(original)
            }
        }
    }

    /// Rewrite the ORDER BY of a built query to sort on mirrored values
    pub fn rewrite_query_clauses(
        &self,
        mut clauses: QueryClauses,
        order: &OrderSpec,
        compiled: &CompiledClauses,
    ) -> QueryClauses {
        if !self.enabled {
            return clauses;
        }
        clauses.orderby = rewrite_order_by_sql(&self.ctx, &clauses.orderby, &clauses.join, order, compiled);
        clauses
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sql::Backend;
    use crate::domain::meta_query::{Direction, Leaf, MetaScalar, MetaValue, OrderKey, parse_filter_tree};

    fn hooks(enabled: bool) -> QueryHooks {
        QueryHooks::new(SqlContext::new(Backend::Mysql, "wp_"), enabled)
    }

    fn host_sql() -> MetaSql {
        MetaSql {
            join: " INNER JOIN wp_entitymeta ON ( wp_entities.ID = wp_entitymeta.entity_id )".to_string(),
            where_clause: " AND ( wp_entitymeta.meta_key = 'color' )".to_string(),
        }
    }

    fn tree() -> FilterNode {
        FilterNode::leaf(Leaf::new("color").value(MetaValue::Scalar(MetaScalar::text("red"))))
    }

    fn request<'a>(tree: &'a FilterNode, object_type: &'a str, suppress_filters: bool) -> MetaSqlRequest<'a> {
        MetaSqlRequest {
            object_type,
            tree,
            primary_table: "wp_entities",
            primary_id_column: "ID",
            suppress_filters,
        }
    }

    #[test]
    fn accelerates_supported_type() {
        let tree = tree();
        let outcome = hooks(true).filter_meta_sql(host_sql(), &request(&tree, "entity", false));
        assert!(outcome.is_accelerated());
        assert!(outcome.sql().join.contains("wp_metamirror_entitymeta"));
        assert_eq!(outcome.clauses().map(CompiledClauses::len), Some(1));
    }

    #[test]
    fn unsupported_type_returns_host_sql() {
        let tree = tree();
        let outcome = hooks(true).filter_meta_sql(host_sql(), &request(&tree, "comment", false));
        assert_eq!(outcome, MetaSqlOutcome::Bypassed(host_sql()));
        assert!(outcome.clauses().is_none());
    }

    #[test]
    fn suppressed_or_disabled_returns_host_sql() {
        let tree = tree();
        let outcome = hooks(true).filter_meta_sql(host_sql(), &request(&tree, "entity", true));
        assert_eq!(outcome.sql(), &host_sql());

        let outcome = hooks(false).filter_meta_sql(host_sql(), &request(&tree, "entity", false));
        assert_eq!(outcome.sql(), &host_sql());
    }

    #[test]
    fn full_host_round() {
        let hooks = hooks(true);
        let tree = parse_filter_tree(
            r#"{"relation": "AND", "price_clause": {"key": "price", "value": 5, "compare": ">", "type": "UNSIGNED"}}"#,
        )
        .unwrap();
        let outcome = hooks.filter_meta_sql(MetaSql::default(), &request(&tree, "entity", false));
        let MetaSqlOutcome::Accelerated(compiled) = outcome else {
            panic!("expected acceleration");
        };
        assert_eq!(compiled.clauses.names(), vec!["price_clause"]);

        let clauses = QueryClauses {
            join: compiled.sql.join.clone(),
            where_clause: format!("1=1{}", compiled.sql.where_clause),
            orderby: "wp_metamirror_entitymeta.meta_value DESC".to_string(),
        };
        let order = OrderSpec::new(vec![OrderKey::new("meta_value", Direction::Desc)]);
        let rewritten = hooks.rewrite_query_clauses(clauses.clone(), &order, &compiled.clauses);
        assert_eq!(
            rewritten.orderby,
            "CAST(JSON_UNQUOTE(JSON_EXTRACT(wp_metamirror_entitymeta.json, '$.price')) AS UNSIGNED) DESC"
        );
        assert_eq!(rewritten.join, clauses.join);
        assert_eq!(rewritten.where_clause, clauses.where_clause);
    }

    #[test]
    fn disabled_hooks_leave_order_by() {
        let clauses = QueryClauses {
            join: " INNER JOIN wp_metamirror_entitymeta AS wp_metamirror_entitymeta ON ( wp_entities.ID = wp_metamirror_entitymeta.entity_id )".to_string(),
            where_clause: String::new(),
            orderby: "wp_metamirror_entitymeta.meta_value ASC".to_string(),
        };
        let rewritten = hooks(false).rewrite_query_clauses(clauses.clone(), &OrderSpec::default(), &CompiledClauses::default());
        assert_eq!(rewritten, clauses);
    }
}

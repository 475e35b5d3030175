//! Meta query type definitions
//!
//! Defines the filter tree, operators, cast types and the compiled output
//! shared by the compiler and the ORDER BY rewriter.

use std::fmt;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

// =============================================================================
// Filter Tree
// =============================================================================

/// Boolean relation joining the children of a group
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Relation {
    #[default]
    And,
    Or,
}

impl Relation {
    /// Parse a relation, case-insensitive. Anything other than `OR` is `AND`.
    pub fn parse(s: &str) -> Self {
        if s.trim().eq_ignore_ascii_case("OR") {
            Self::Or
        } else {
            Self::And
        }
    }

    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::And => "AND",
            Self::Or => "OR",
        }
    }
}

/// A single scalar metadata value
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetaScalar {
    Text(String),
    Number(serde_json::Number),
    Bool(bool),
}

impl MetaScalar {
    pub fn text(s: impl Into<String>) -> Self {
        Self::Text(s.into())
    }
}

impl From<&str> for MetaScalar {
    fn from(s: &str) -> Self {
        Self::Text(s.to_string())
    }
}

impl From<i64> for MetaScalar {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

/// Value attached to a leaf condition
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum MetaValue {
    Scalar(MetaScalar),
    List(Vec<MetaScalar>),
}

impl MetaValue {
    pub fn is_list(&self) -> bool {
        matches!(self, Self::List(_))
    }
}

/// A single key/operator/value condition
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Leaf {
    pub key: Option<String>,
    pub value: Option<MetaValue>,
    pub compare: Option<String>,
    pub compare_key: Option<String>,
    #[serde(rename = "type")]
    pub cast_type: Option<String>,
}

impl Leaf {
    pub fn new(key: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            ..Self::default()
        }
    }

    pub fn value(mut self, value: MetaValue) -> Self {
        self.value = Some(value);
        self
    }

    pub fn compare(mut self, compare: impl Into<String>) -> Self {
        self.compare = Some(compare.into());
        self
    }

    pub fn cast_type(mut self, cast_type: impl Into<String>) -> Self {
        self.cast_type = Some(cast_type.into());
        self
    }
}

/// Child of a group: the node itself and the caller-supplied clause name, if any
#[derive(Debug, Clone, PartialEq)]
pub struct FilterChild {
    pub name: Option<String>,
    pub node: FilterNode,
}

/// Node of a metadata filter tree
#[derive(Debug, Clone, PartialEq)]
pub enum FilterNode {
    Group {
        relation: Relation,
        children: Vec<FilterChild>,
    },
    Leaf(Leaf),
}

impl FilterNode {
    /// Group of unnamed children
    pub fn group(relation: Relation, children: Vec<FilterNode>) -> Self {
        Self::Group {
            relation,
            children: children
                .into_iter()
                .map(|node| FilterChild { name: None, node })
                .collect(),
        }
    }

    pub fn leaf(leaf: Leaf) -> Self {
        Self::Leaf(leaf)
    }

    /// Number of leaves in the tree
    pub fn leaf_count(&self) -> usize {
        match self {
            Self::Leaf(_) => 1,
            Self::Group { children, .. } => children.iter().map(|c| c.node.leaf_count()).sum(),
        }
    }
}

// =============================================================================
// Operators
// =============================================================================

/// Comparison operator applied to a metadata value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum CompareOp {
    #[serde(rename = "=")]
    Eq,
    #[serde(rename = "!=")]
    Ne,
    #[serde(rename = "LIKE")]
    Like,
    #[serde(rename = "NOT LIKE")]
    NotLike,
    #[serde(rename = "IN")]
    In,
    #[serde(rename = "NOT IN")]
    NotIn,
    #[serde(rename = "EXISTS")]
    Exists,
    #[serde(rename = "NOT EXISTS")]
    NotExists,
    #[serde(rename = "RLIKE")]
    Rlike,
    #[serde(rename = "REGEXP")]
    Regexp,
    #[serde(rename = "NOT REGEXP")]
    NotRegexp,
    #[serde(rename = ">")]
    Gt,
    #[serde(rename = ">=")]
    Gte,
    #[serde(rename = "<")]
    Lt,
    #[serde(rename = "<=")]
    Lte,
    #[serde(rename = "BETWEEN")]
    Between,
    #[serde(rename = "NOT BETWEEN")]
    NotBetween,
}

impl CompareOp {
    pub const ALL: [CompareOp; 17] = [
        Self::Eq,
        Self::Ne,
        Self::Like,
        Self::NotLike,
        Self::In,
        Self::NotIn,
        Self::Exists,
        Self::NotExists,
        Self::Rlike,
        Self::Regexp,
        Self::NotRegexp,
        Self::Gt,
        Self::Gte,
        Self::Lt,
        Self::Lte,
        Self::Between,
        Self::NotBetween,
    ];

    pub fn as_sql(&self) -> &'static str {
        match self {
            Self::Eq => "=",
            Self::Ne => "!=",
            Self::Like => "LIKE",
            Self::NotLike => "NOT LIKE",
            Self::In => "IN",
            Self::NotIn => "NOT IN",
            Self::Exists => "EXISTS",
            Self::NotExists => "NOT EXISTS",
            Self::Rlike => "RLIKE",
            Self::Regexp => "REGEXP",
            Self::NotRegexp => "NOT REGEXP",
            Self::Gt => ">",
            Self::Gte => ">=",
            Self::Lt => "<",
            Self::Lte => "<=",
            Self::Between => "BETWEEN",
            Self::NotBetween => "NOT BETWEEN",
        }
    }

    /// Operators that only make sense for ordered (numeric, date) values
    pub fn is_numeric(&self) -> bool {
        matches!(
            self,
            Self::Gt | Self::Gte | Self::Lt | Self::Lte | Self::Between | Self::NotBetween
        )
    }

    /// Operators whose value is always treated as a list
    pub fn takes_list(&self) -> bool {
        matches!(
            self,
            Self::In | Self::NotIn | Self::Between | Self::NotBetween
        )
    }

    fn lookup(normalized: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.as_sql() == normalized)
    }

    /// Normalize a caller-supplied value operator.
    ///
    /// Missing operators default to `IN` for list values and `=` otherwise.
    /// Unrecognized operators degrade to `=`.
    pub fn resolve(compare: Option<&str>, value_is_list: bool) -> Self {
        match compare {
            Some(raw) => Self::lookup(&raw.to_uppercase()).unwrap_or(Self::Eq),
            None if value_is_list => Self::In,
            None => Self::Eq,
        }
    }

    /// Normalize a caller-supplied key operator. Only non-numeric operators
    /// are accepted; everything else degrades to `=`.
    pub fn resolve_key(compare_key: Option<&str>) -> Self {
        match compare_key.map(|raw| Self::lookup(&raw.to_uppercase())) {
            Some(Some(op)) if !op.is_numeric() => op,
            _ => Self::Eq,
        }
    }
}

impl fmt::Display for CompareOp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_sql())
    }
}

// =============================================================================
// Cast Types
// =============================================================================

/// SQL type a JSON-extracted scalar is coerced to before comparison
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CastType {
    Binary,
    Char,
    Date,
    Datetime,
    Signed,
    Unsigned,
    Time,
    /// DECIMAL with optional (precision, scale)
    Decimal(Option<(u32, Option<u32>)>),
}

fn cast_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(
            r"^(BINARY|CHAR|DATE|DATETIME|SIGNED|UNSIGNED|TIME|NUMERIC|DECIMAL)(?:\((\d+)(?:,\s?(\d+))?\))?$",
        )
        .expect("Invalid regex")
    })
}

impl CastType {
    /// Resolve a caller-supplied type hint. Empty or unrecognized hints are `CHAR`.
    pub fn resolve(hint: Option<&str>) -> Self {
        let Some(hint) = hint.map(str::trim).filter(|h| !h.is_empty()) else {
            return Self::Char;
        };
        let upper = hint.to_uppercase();
        let Some(caps) = cast_regex().captures(&upper) else {
            return Self::Char;
        };

        // Out-of-range numbers make the whole hint unrecognized
        let number = |group: usize| match caps.get(group) {
            Some(m) => m.as_str().parse::<u32>().map(Some),
            None => Ok(None),
        };
        let (Ok(precision), Ok(scale)) = (number(2), number(3)) else {
            return Self::Char;
        };
        let params = precision.map(|p| (p, scale));

        match (&caps[1], params) {
            ("NUMERIC", None) => Self::Signed,
            ("NUMERIC" | "DECIMAL", params) => Self::Decimal(params),
            // Only numeric types accept a precision
            (_, Some(_)) => Self::Char,
            ("BINARY", None) => Self::Binary,
            ("CHAR", None) => Self::Char,
            ("DATE", None) => Self::Date,
            ("DATETIME", None) => Self::Datetime,
            ("SIGNED", None) => Self::Signed,
            ("UNSIGNED", None) => Self::Unsigned,
            ("TIME", None) => Self::Time,
            _ => Self::Char,
        }
    }
}

impl fmt::Display for CastType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Binary => f.write_str("BINARY"),
            Self::Char => f.write_str("CHAR"),
            Self::Date => f.write_str("DATE"),
            Self::Datetime => f.write_str("DATETIME"),
            Self::Signed => f.write_str("SIGNED"),
            Self::Unsigned => f.write_str("UNSIGNED"),
            Self::Time => f.write_str("TIME"),
            Self::Decimal(None) => f.write_str("DECIMAL"),
            Self::Decimal(Some((p, None))) => write!(f, "DECIMAL({})", p),
            Self::Decimal(Some((p, Some(s)))) => write!(f, "DECIMAL({},{})", p, s),
        }
    }
}

impl Serialize for CastType {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

// =============================================================================
// Compiled Output
// =============================================================================

/// Record of one compiled leaf, used to resolve ORDER BY references
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CompiledClause {
    /// Unique clause name within one compile call
    pub name: String,
    /// Trimmed metadata key, if the leaf had one
    pub key: Option<String>,
    pub alias: String,
    pub cast: CastType,
    /// Raw type hint as supplied by the caller (non-empty only)
    pub declared_type: Option<String>,
    pub compare: CompareOp,
    pub compare_key: CompareOp,
}

/// Compiled clauses in registration order
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct CompiledClauses {
    entries: Vec<CompiledClause>,
}

impl CompiledClauses {
    pub fn push(&mut self, clause: CompiledClause) {
        self.entries.push(clause);
    }

    pub fn get(&self, name: &str) -> Option<&CompiledClause> {
        self.entries.iter().find(|c| c.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &CompiledClause> {
        self.entries.iter()
    }

    pub fn names(&self) -> Vec<&str> {
        self.entries.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// JOIN and WHERE fragments to splice into a host query
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct MetaSql {
    pub join: String,
    #[serde(rename = "where")]
    pub where_clause: String,
}

/// Result of compiling a filter tree
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct CompiledQuery {
    pub sql: MetaSql,
    pub clauses: CompiledClauses,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn relation_parse() {
        assert_eq!(Relation::parse("or"), Relation::Or);
        assert_eq!(Relation::parse(" OR "), Relation::Or);
        assert_eq!(Relation::parse("AND"), Relation::And);
        assert_eq!(Relation::parse("xor"), Relation::And);
    }

    #[test]
    fn compare_defaults() {
        assert_eq!(CompareOp::resolve(None, true), CompareOp::In);
        assert_eq!(CompareOp::resolve(None, false), CompareOp::Eq);
    }

    #[test]
    fn compare_normalizes_case_and_unknowns() {
        assert_eq!(CompareOp::resolve(Some("not like"), false), CompareOp::NotLike);
        assert_eq!(CompareOp::resolve(Some("between"), true), CompareOp::Between);
        assert_eq!(CompareOp::resolve(Some("~~"), false), CompareOp::Eq);
        assert_eq!(CompareOp::resolve(Some("; DROP"), true), CompareOp::Eq);
    }

    #[test]
    fn compare_key_rejects_numeric_operators() {
        assert_eq!(CompareOp::resolve_key(Some("like")), CompareOp::Like);
        assert_eq!(CompareOp::resolve_key(Some(">")), CompareOp::Eq);
        assert_eq!(CompareOp::resolve_key(None), CompareOp::Eq);
    }

    #[test]
    fn every_operator_round_trips_through_resolve() {
        for op in CompareOp::ALL {
            assert_eq!(CompareOp::resolve(Some(op.as_sql()), false), op);
        }
    }

    #[test]
    fn cast_resolution() {
        assert_eq!(CastType::resolve(None), CastType::Char);
        assert_eq!(CastType::resolve(Some("")), CastType::Char);
        assert_eq!(CastType::resolve(Some("banana")), CastType::Char);
        assert_eq!(CastType::resolve(Some("NUMERIC")), CastType::Signed);
        assert_eq!(CastType::resolve(Some("numeric")), CastType::Signed);
        assert_eq!(CastType::resolve(Some("date")), CastType::Date);
        assert_eq!(CastType::resolve(Some("DECIMAL")), CastType::Decimal(None));
        assert_eq!(
            CastType::resolve(Some("DECIMAL(10,2)")).to_string(),
            "DECIMAL(10,2)"
        );
        assert_eq!(
            CastType::resolve(Some("decimal(10, 2)")).to_string(),
            "DECIMAL(10,2)"
        );
        assert_eq!(CastType::resolve(Some("NUMERIC(8)")).to_string(), "DECIMAL(8)");
        assert_eq!(CastType::resolve(Some("CHAR(10)")), CastType::Char);
        assert_eq!(CastType::resolve(Some("SIGNED; DROP")), CastType::Char);
    }

    #[test]
    fn cast_precision_overflow_is_unrecognized() {
        assert_eq!(CastType::resolve(Some("DECIMAL(99999999999)")), CastType::Char);
        assert_eq!(CastType::resolve(Some("DECIMAL(10,99999999999)")), CastType::Char);
        assert_eq!(CastType::resolve(Some("NUMERIC(99999999999)")), CastType::Char);
        assert_eq!(CastType::resolve(Some("DECIMAL(4294967295)")).to_string(), "DECIMAL(4294967295)");
    }

    #[test]
    fn compiled_clauses_lookup_preserves_order() {
        let mut clauses = CompiledClauses::default();
        for name in ["b", "a"] {
            clauses.push(CompiledClause {
                name: name.to_string(),
                key: Some("k".to_string()),
                alias: "t".to_string(),
                cast: CastType::Char,
                declared_type: None,
                compare: CompareOp::Eq,
                compare_key: CompareOp::Eq,
            });
        }
        assert_eq!(clauses.names(), vec!["b", "a"]);
        assert!(clauses.get("a").is_some());
        assert!(clauses.get("c").is_none());
        assert_eq!(clauses.len(), 2);
    }

    #[test]
    fn meta_sql_serializes_where_field() {
        let sql = MetaSql {
            join: "J".to_string(),
            where_clause: "W".to_string(),
        };
        let json = serde_json::to_value(&sql).unwrap();
        assert_eq!(json["where"], "W");
    }
}

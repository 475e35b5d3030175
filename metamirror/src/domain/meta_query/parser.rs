//! Filter tree parsing
//!
//! Parses JSON filter definitions into a [`FilterNode`] tree with validation.
//!
//! Accepted shapes:
//! - an array is an AND group of its elements
//! - an object with a non-null `key` or `value` is a leaf
//! - any other object is a group: `relation` selects AND/OR and every other
//!   object or array member is a child, named by its member key

use serde_json::{Map, Value};
use thiserror::Error;

use super::types::{FilterChild, FilterNode, Leaf, MetaScalar, MetaValue, Relation};

/// Maximum size of filter JSON in bytes (64KB)
const MAX_FILTER_JSON_SIZE: usize = 64 * 1024;

/// Maximum group nesting depth
const MAX_DEPTH: usize = 32;

/// Maximum number of leaf conditions
const MAX_LEAVES: usize = 256;

#[derive(Error, Debug, PartialEq)]
pub enum ParseError {
    #[error("Filter JSON exceeds maximum size of {max} bytes")]
    TooLarge { max: usize },

    #[error("Invalid filter JSON: {0}")]
    InvalidJson(String),

    #[error("Filter tree is nested deeper than {max} levels")]
    TooDeep { max: usize },

    #[error("Maximum {max} filter conditions allowed")]
    TooManyLeaves { max: usize },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidField { field: String, reason: String },

    #[error("Filter tree must be a JSON object or array")]
    InvalidRoot,
}

/// Parse a filter tree from a JSON string
///
/// Validates JSON size, tree depth and leaf count.
pub fn parse_filter_tree(json_str: &str) -> Result<FilterNode, ParseError> {
    if json_str.len() > MAX_FILTER_JSON_SIZE {
        return Err(ParseError::TooLarge {
            max: MAX_FILTER_JSON_SIZE,
        });
    }

    let value: Value =
        serde_json::from_str(json_str).map_err(|e| ParseError::InvalidJson(e.to_string()))?;

    let tree = filter_tree_from_value(&value)?;

    if tree.leaf_count() > MAX_LEAVES {
        return Err(ParseError::TooManyLeaves { max: MAX_LEAVES });
    }

    Ok(tree)
}

/// Build a filter tree from an already-decoded JSON value
pub fn filter_tree_from_value(value: &Value) -> Result<FilterNode, ParseError> {
    match value {
        Value::Object(_) | Value::Array(_) => parse_node(value, 0),
        _ => Err(ParseError::InvalidRoot),
    }
}

fn is_leaf(map: &Map<String, Value>) -> bool {
    let present = |field: &str| map.get(field).is_some_and(|v| !v.is_null());
    present("key") || present("value")
}

fn parse_node(value: &Value, depth: usize) -> Result<FilterNode, ParseError> {
    if depth > MAX_DEPTH {
        return Err(ParseError::TooDeep { max: MAX_DEPTH });
    }

    match value {
        Value::Object(map) if is_leaf(map) => parse_leaf(map).map(FilterNode::Leaf),
        Value::Object(map) => {
            let relation = map
                .get("relation")
                .and_then(Value::as_str)
                .map(Relation::parse)
                .unwrap_or_default();

            let mut children = Vec::new();
            for (name, child) in map {
                if name == "relation" || !(child.is_object() || child.is_array()) {
                    continue;
                }
                children.push(FilterChild {
                    name: Some(name.clone()),
                    node: parse_node(child, depth + 1)?,
                });
            }
            Ok(FilterNode::Group { relation, children })
        }
        Value::Array(items) => {
            let mut children = Vec::with_capacity(items.len());
            for child in items.iter().filter(|c| c.is_object() || c.is_array()) {
                children.push(FilterChild {
                    name: None,
                    node: parse_node(child, depth + 1)?,
                });
            }
            Ok(FilterNode::Group {
                relation: Relation::And,
                children,
            })
        }
        _ => Err(ParseError::InvalidRoot),
    }
}

fn parse_leaf(map: &Map<String, Value>) -> Result<Leaf, ParseError> {
    let string_field = |field: &str| -> Result<Option<String>, ParseError> {
        match map.get(field) {
            None | Some(Value::Null) => Ok(None),
            Some(Value::String(s)) => Ok(Some(s.clone())),
            Some(Value::Number(n)) => Ok(Some(n.to_string())),
            Some(_) => Err(ParseError::InvalidField {
                field: field.to_string(),
                reason: "expected a string".to_string(),
            }),
        }
    };

    let compare_key = match string_field("compare_key")? {
        Some(op) => Some(op),
        None => string_field("compareKey")?,
    };

    let value = match map.get("value") {
        None | Some(Value::Null) => None,
        Some(Value::Array(items)) => Some(MetaValue::List(
            items
                .iter()
                .map(parse_scalar)
                .collect::<Result<Vec<_>, _>>()?,
        )),
        Some(other) => Some(MetaValue::Scalar(parse_scalar(other)?)),
    };

    Ok(Leaf {
        key: string_field("key")?,
        value,
        compare: string_field("compare")?,
        compare_key,
        cast_type: string_field("type")?,
    })
}

fn parse_scalar(value: &Value) -> Result<MetaScalar, ParseError> {
    match value {
        Value::String(s) => Ok(MetaScalar::Text(s.clone())),
        Value::Number(n) => Ok(MetaScalar::Number(n.clone())),
        Value::Bool(b) => Ok(MetaScalar::Bool(*b)),
        Value::Null => Ok(MetaScalar::Text(String::new())),
        Value::Array(_) | Value::Object(_) => Err(ParseError::InvalidField {
            field: "value".to_string(),
            reason: "nested arrays and objects are not supported".to_string(),
        }),
    }
}

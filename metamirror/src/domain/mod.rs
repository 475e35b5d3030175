//! Domain logic for metadata query acceleration
//!
//! - `meta_query` - filter tree compilation and ORDER BY rewriting
//! - `hooks` - integration points called by the host query engine

pub mod hooks;
pub mod meta_query;

pub use hooks::{MetaSqlOutcome, MetaSqlRequest, QueryClauses, QueryHooks};

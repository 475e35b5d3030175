//! Data storage layer
//!
//! - `sql` - SQL dialects injected into the meta query compiler
//! - `mirror` - mirror table schema and the service managing it
//! - `sqlite` - embedded mirror store
//! - `mysql` - MySQL/MariaDB mirror store
//! - `error` - unified error type for all backends

pub mod error;
pub mod mirror;
pub mod mysql;
pub mod sql;
pub mod sqlite;

pub use error::DataError;
pub use mirror::{MirrorService, MirrorTables};
pub use mysql::MysqlMirror;
pub use sqlite::SqliteMirror;

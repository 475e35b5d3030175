//! SQL abstraction layer for multi-database support
//!
//! This module provides the capability interface injected into the meta
//! query compiler: the dialect of the mirror backend plus table prefixing.

mod dialect;
mod mysql_dialect;
mod sqlite_dialect;

pub use dialect::SqlDialect;
pub use mysql_dialect::MysqlDialect;
pub use sqlite_dialect::SqliteDialect;

use serde::{Deserialize, Serialize};

/// Database backend identifier
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    Mysql,
    #[default]
    Sqlite,
}

impl Backend {
    /// Get the SQL dialect for this backend
    pub fn dialect(&self) -> &'static dyn SqlDialect {
        match self {
            Backend::Mysql => &MysqlDialect,
            Backend::Sqlite => &SqliteDialect,
        }
    }

    /// Get the backend name
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Mysql => "mysql",
            Backend::Sqlite => "sqlite",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}

impl std::str::FromStr for Backend {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "mysql" | "mariadb" => Ok(Backend::Mysql),
            "sqlite" => Ok(Backend::Sqlite),
            _ => Err(format!("Invalid backend '{}'. Valid options: mysql, sqlite", s)),
        }
    }
}

/// Per-call SQL context: backend dialect and table name prefix
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SqlContext {
    pub backend: Backend,
    pub table_prefix: String,
}

impl SqlContext {
    pub fn new(backend: Backend, table_prefix: impl Into<String>) -> Self {
        Self {
            backend,
            table_prefix: table_prefix.into(),
        }
    }

    pub fn dialect(&self) -> &'static dyn SqlDialect {
        self.backend.dialect()
    }

    /// Prefixed table name
    pub fn table(&self, name: &str) -> String {
        format!("{}{}", self.table_prefix, name)
    }

    pub fn literal(&self, value: &str) -> String {
        self.dialect().quote_literal(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backend_from_str() {
        assert_eq!("MySQL".parse::<Backend>(), Ok(Backend::Mysql));
        assert_eq!("mariadb".parse::<Backend>(), Ok(Backend::Mysql));
        assert_eq!("sqlite".parse::<Backend>(), Ok(Backend::Sqlite));
        assert!("postgres".parse::<Backend>().is_err());
    }

    #[test]
    fn context_prefixes_tables() {
        let ctx = SqlContext::new(Backend::Mysql, "wp_");
        assert_eq!(ctx.table("metamirror_entitymeta"), "wp_metamirror_entitymeta");
        assert_eq!(ctx.dialect().name(), "mysql");
        assert_eq!(ctx.literal("a'b"), r"'a\'b'");
    }
}

//! Unified error type for data layer
//!
//! Wraps backend errors while preserving which backend produced them.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DataError {
    /// SQLite database error
    #[error("SQLite error: {0}")]
    Sqlite(sqlx::Error),

    /// MySQL/MariaDB database error
    #[error("MySQL error: {0}")]
    Mysql(sqlx::Error),

    /// Database server too old for JSON functions
    #[error("Unsupported {backend} server version {version} (requires {required} or newer)")]
    UnsupportedVersion {
        backend: &'static str,
        version: String,
        required: &'static str,
    },

    /// Stored mirror document is not valid JSON
    #[error("Invalid mirror document for entity {entity_id}: {error}")]
    InvalidDocument { entity_id: i64, error: String },

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl DataError {
    /// Create a SQLite error with preserved context
    pub fn from_sqlite(e: sqlx::Error) -> Self {
        Self::Sqlite(e)
    }

    /// Create a MySQL error with preserved context
    pub fn from_mysql(e: sqlx::Error) -> Self {
        Self::Mysql(e)
    }

    /// Name of the backend that produced the error, if any
    pub fn backend(&self) -> Option<&'static str> {
        match self {
            Self::Sqlite(_) => Some("sqlite"),
            Self::Mysql(_) => Some("mysql"),
            Self::UnsupportedVersion { backend, .. } => Some(*backend),
            Self::InvalidDocument { .. } | Self::Config(_) => None,
        }
    }
}

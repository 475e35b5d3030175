//! MySQL/MariaDB mirror store
//!
//! JSON functions used by the mirror require MySQL 5.7.22+ or MariaDB 10.5+.
//! Trigger DDL goes through the text protocol since MySQL cannot prepare it.

pub use sqlx::MySqlPool;

use std::str::FromStr;
use std::time::Duration;

use sqlx::mysql::{MySqlConnectOptions, MySqlPoolOptions};

use crate::core::constants::{DB_ACQUIRE_TIMEOUT_SECS, DB_MAX_CONNECTIONS};
use crate::data::error::DataError;
use crate::data::mirror::schema::MirrorTables;
use crate::data::sql::Backend;

/// Oldest MySQL release with JSON_OBJECTAGG
const MYSQL_MIN_VERSION: (u32, u32, u32) = (5, 7, 22);

/// Oldest MariaDB release with the required JSON support
const MARIADB_MIN_VERSION: (u32, u32, u32) = (10, 5, 0);

pub struct MysqlMirror {
    pool: MySqlPool,
    tables: MirrorTables,
}

impl MysqlMirror {
    /// Connect and verify the server supports the JSON functions in use
    pub async fn init(url: &str, tables: MirrorTables) -> Result<Self, DataError> {
        let options = MySqlConnectOptions::from_str(url)
            .map_err(|e| DataError::Config(format!("Invalid MySQL URL: {}", e)))?;

        let pool = MySqlPoolOptions::new()
            .max_connections(DB_MAX_CONNECTIONS)
            .acquire_timeout(Duration::from_secs(DB_ACQUIRE_TIMEOUT_SECS))
            .connect_with(options)
            .await
            .map_err(DataError::from_mysql)?;

        let version: String = sqlx::query_scalar("SELECT VERSION()")
            .fetch_one(&pool)
            .await
            .map_err(DataError::from_mysql)?;
        check_server_version(&version)?;

        tracing::debug!(version = %version, mirror = %tables.mirror_table(), "MysqlMirror initialized");
        Ok(Self { pool, tables })
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }

    pub fn tables(&self) -> &MirrorTables {
        &self.tables
    }

    async fn execute(&self, sql: &str) -> Result<(), DataError> {
        sqlx::raw_sql(sql)
            .execute(&self.pool)
            .await
            .map_err(DataError::from_mysql)?;
        Ok(())
    }

    pub async fn create_table(&self) -> Result<(), DataError> {
        self.execute(&self.tables.create_table(Backend::Mysql)).await
    }

    /// Create all synchronization triggers
    ///
    /// Returns `false` as soon as one trigger fails to be created.
    pub async fn create_triggers(&self) -> Result<bool, DataError> {
        for (name, sql) in self.tables.create_triggers(Backend::Mysql) {
            if let Err(e) = self.execute(&sql).await {
                tracing::warn!(trigger = %name, error = %e, "Failed to create trigger");
                return Ok(false);
            }
        }
        Ok(true)
    }

    pub async fn drop_triggers(&self) -> Result<(), DataError> {
        for sql in self.tables.drop_triggers() {
            self.execute(&sql).await?;
        }
        Ok(())
    }

    pub async fn backfill(&self) -> Result<(), DataError> {
        let mut tx = self.pool.begin().await.map_err(DataError::from_mysql)?;
        for sql in self.tables.backfill(Backend::Mysql) {
            sqlx::raw_sql(&sql)
                .execute(&mut *tx)
                .await
                .map_err(DataError::from_mysql)?;
        }
        tx.commit().await.map_err(DataError::from_mysql)?;
        Ok(())
    }

    pub async fn drop_table(&self) -> Result<(), DataError> {
        self.execute(&self.tables.drop_table()).await
    }

    /// Raw mirror document text for an entity
    pub async fn document_text(&self, entity_id: i64) -> Result<Option<Option<String>>, DataError> {
        // JSON columns do not decode as strings directly
        let sql = format!(
            "SELECT CAST(json AS CHAR) FROM {} WHERE {} = ?",
            self.tables.mirror_table(),
            self.tables.id_column()
        );
        sqlx::query_scalar::<_, Option<String>>(&sql)
            .bind(entity_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DataError::from_mysql)
    }

    /// Close the connection pool gracefully
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::debug!("MySQL pool closed");
    }
}

/// Parse the leading `major.minor.patch` of a server version string
fn parse_version(version: &str) -> Option<(u32, u32, u32)> {
    let numeric = version.split(['-', ' ']).next()?;
    let mut parts = numeric.split('.').map(|p| p.parse::<u32>().ok());
    let major = parts.next()??;
    let minor = parts.next().flatten().unwrap_or(0);
    let patch = parts.next().flatten().unwrap_or(0);
    Some((major, minor, patch))
}

fn check_server_version(version: &str) -> Result<(), DataError> {
    let is_mariadb = version.to_lowercase().contains("mariadb");
    let (backend, required, min) = if is_mariadb {
        ("mariadb", "10.5", MARIADB_MIN_VERSION)
    } else {
        ("mysql", "5.7.22", MYSQL_MIN_VERSION)
    };

    match parse_version(version) {
        Some(parsed) if parsed >= min => Ok(()),
        _ => Err(DataError::UnsupportedVersion {
            backend,
            version: version.to_string(),
            required,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_version() {
        assert_eq!(parse_version("8.0.35"), Some((8, 0, 35)));
        assert_eq!(parse_version("10.6.12-MariaDB-1:10.6.12+maria~ubu2004"), Some((10, 6, 12)));
        assert_eq!(parse_version("5.7"), Some((5, 7, 0)));
        assert_eq!(parse_version("unknown"), None);
    }

    #[test]
    fn test_check_server_version() {
        assert!(check_server_version("8.0.35").is_ok());
        assert!(check_server_version("5.7.22-log").is_ok());
        assert!(check_server_version("10.5.0-MariaDB").is_ok());

        let err = check_server_version("5.7.21").unwrap_err();
        assert!(matches!(err, DataError::UnsupportedVersion { backend: "mysql", .. }));

        // MariaDB 10.4 is numerically newer than MySQL 5.7.22 but lacks support
        let err = check_server_version("10.4.30-MariaDB").unwrap_err();
        assert!(matches!(err, DataError::UnsupportedVersion { backend: "mariadb", .. }));
    }
}

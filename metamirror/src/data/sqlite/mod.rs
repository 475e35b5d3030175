//! SQLite mirror store
//!
//! Embedded backend: the mirror table and its triggers live in the same
//! SQLite database as the entity and metadata tables.

pub use sqlx::SqlitePool;

use std::str::FromStr;
use std::time::Duration;

use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};

use crate::core::constants::{DB_ACQUIRE_TIMEOUT_SECS, DB_MAX_CONNECTIONS};
use crate::data::error::DataError;
use crate::data::mirror::schema::MirrorTables;
use crate::data::sql::Backend;

pub struct SqliteMirror {
    pool: SqlitePool,
    tables: MirrorTables,
}

impl SqliteMirror {
    /// Open a pool for the database at `url`, creating the file if missing
    pub async fn init(url: &str, tables: MirrorTables) -> Result<Self, DataError> {
        let options = SqliteConnectOptions::from_str(url)
            .map_err(|e| DataError::Config(format!("Invalid SQLite URL '{}': {}", url, e)))?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(DB_ACQUIRE_TIMEOUT_SECS))
            // REGEXP/RLIKE filters need a regexp() function
            .with_regexp();

        let pool = SqlitePoolOptions::new()
            .max_connections(DB_MAX_CONNECTIONS)
            .acquire_timeout(Duration::from_secs(DB_ACQUIRE_TIMEOUT_SECS))
            .connect_with(options)
            .await
            .map_err(DataError::from_sqlite)?;

        tracing::debug!(mirror = %tables.mirror_table(), "SqliteMirror initialized");
        Ok(Self { pool, tables })
    }

    /// Wrap an existing pool
    pub fn from_pool(pool: SqlitePool, tables: MirrorTables) -> Self {
        Self { pool, tables }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    pub fn tables(&self) -> &MirrorTables {
        &self.tables
    }

    async fn execute(&self, sql: &str) -> Result<(), DataError> {
        sqlx::raw_sql(sql)
            .execute(&self.pool)
            .await
            .map_err(DataError::from_sqlite)?;
        Ok(())
    }

    pub async fn create_table(&self) -> Result<(), DataError> {
        self.execute(&self.tables.create_table(Backend::Sqlite)).await
    }

    /// Create all synchronization triggers
    ///
    /// Returns `false` as soon as one trigger fails to be created.
    pub async fn create_triggers(&self) -> Result<bool, DataError> {
        for (name, sql) in self.tables.create_triggers(Backend::Sqlite) {
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

    /// Rebuild every mirror document in a single transaction
    pub async fn backfill(&self) -> Result<(), DataError> {
        let mut tx = self.pool.begin().await.map_err(DataError::from_sqlite)?;
        for sql in self.tables.backfill(Backend::Sqlite) {
            sqlx::raw_sql(&sql)
                .execute(&mut *tx)
                .await
                .map_err(DataError::from_sqlite)?;
        }
        tx.commit().await.map_err(DataError::from_sqlite)?;
        Ok(())
    }

    pub async fn drop_table(&self) -> Result<(), DataError> {
        self.execute(&self.tables.drop_table()).await
    }

    /// Raw mirror document text for an entity
    ///
    /// The outer `Option` is the row, the inner one a NULL document.
    pub async fn document_text(&self, entity_id: i64) -> Result<Option<Option<String>>, DataError> {
        let sql = format!(
            "SELECT json FROM {} WHERE {} = ?",
            self.tables.mirror_table(),
            self.tables.id_column()
        );
        sqlx::query_scalar::<_, Option<String>>(&sql)
            .bind(entity_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(DataError::from_sqlite)
    }

    /// Close the connection pool gracefully
    pub async fn close(&self) {
        self.pool.close().await;
        tracing::debug!("SQLite pool closed");
    }
}

//! Mirror store management
//!
//! Creates, repairs and removes the JSON mirror table and the triggers that
//! keep it in sync with the normalized metadata table.

pub mod schema;

pub use schema::{MirrorTables, TriggerKind};

use std::sync::Arc;

use crate::core::config::AppConfig;
use crate::data::error::DataError;
use crate::data::mysql::MysqlMirror;
use crate::data::sql::Backend;
use crate::data::sqlite::SqliteMirror;

/// Mirror store service enum
///
/// Wraps the backend-specific mirror store (SQLite or MySQL).
pub enum MirrorService {
    Sqlite(Arc<SqliteMirror>),
    Mysql(Arc<MysqlMirror>),
}

impl MirrorService {
    /// Connect to the configured database
    pub async fn init(config: &AppConfig) -> Result<Self, DataError> {
        let tables = MirrorTables::from_config(&config.tables);
        match config.database.backend {
            Backend::Sqlite => {
                let service = SqliteMirror::init(&config.database.url, tables).await?;
                Ok(Self::Sqlite(Arc::new(service)))
            }
            Backend::Mysql => {
                let service = MysqlMirror::init(&config.database.url, tables).await?;
                Ok(Self::Mysql(Arc::new(service)))
            }
        }
    }

    pub fn backend(&self) -> Backend {
        match self {
            Self::Sqlite(_) => Backend::Sqlite,
            Self::Mysql(_) => Backend::Mysql,
        }
    }

    pub fn tables(&self) -> &MirrorTables {
        match self {
            Self::Sqlite(s) => s.tables(),
            Self::Mysql(m) => m.tables(),
        }
    }

    /// Create the mirror table and triggers, then backfill
    ///
    /// Returns `Ok(false)` when a trigger could not be created; the table is
    /// left in place and no backfill runs.
    pub async fn install(&self) -> Result<bool, DataError> {
        self.create_table().await?;
        self.drop_triggers().await?;
        if !self.create_triggers().await? {
            return Ok(false);
        }
        self.backfill().await?;
        tracing::debug!(mirror = %self.tables().mirror_table(), "Mirror installed");
        Ok(true)
    }

    /// Rebuild documents from the metadata table and purge orphaned rows
    pub async fn repair(&self) -> Result<(), DataError> {
        self.backfill().await?;
        tracing::debug!(mirror = %self.tables().mirror_table(), "Mirror repaired");
        Ok(())
    }

    /// Stop synchronizing; the mirror table is kept
    pub async fn deactivate(&self) -> Result<(), DataError> {
        self.drop_triggers().await
    }

    /// Remove triggers and the mirror table
    pub async fn uninstall(&self) -> Result<(), DataError> {
        self.drop_triggers().await?;
        match self {
            Self::Sqlite(s) => s.drop_table().await?,
            Self::Mysql(m) => m.drop_table().await?,
        }
        tracing::debug!(mirror = %self.tables().mirror_table(), "Mirror uninstalled");
        Ok(())
    }

    /// Mirror document of one entity, `None` when the entity has no row
    ///
    /// A NULL document reads as an empty object.
    pub async fn document(&self, entity_id: i64) -> Result<Option<serde_json::Value>, DataError> {
        let text = match self {
            Self::Sqlite(s) => s.document_text(entity_id).await?,
            Self::Mysql(m) => m.document_text(entity_id).await?,
        };
        let Some(text) = text else {
            return Ok(None);
        };
        let Some(text) = text else {
            return Ok(Some(serde_json::Value::Object(serde_json::Map::new())));
        };
        serde_json::from_str(&text)
            .map(Some)
            .map_err(|e| DataError::InvalidDocument {
                entity_id,
                error: e.to_string(),
            })
    }

    /// Close the connection pool gracefully
    pub async fn close(&self) {
        match self {
            Self::Sqlite(s) => s.close().await,
            Self::Mysql(m) => m.close().await,
        }
    }

    async fn create_table(&self) -> Result<(), DataError> {
        match self {
            Self::Sqlite(s) => s.create_table().await,
            Self::Mysql(m) => m.create_table().await,
        }
    }

    async fn create_triggers(&self) -> Result<bool, DataError> {
        match self {
            Self::Sqlite(s) => s.create_triggers().await,
            Self::Mysql(m) => m.create_triggers().await,
        }
    }

    async fn drop_triggers(&self) -> Result<(), DataError> {
        match self {
            Self::Sqlite(s) => s.drop_triggers().await,
            Self::Mysql(m) => m.drop_triggers().await,
        }
    }

    async fn backfill(&self) -> Result<(), DataError> {
        match self {
            Self::Sqlite(s) => s.backfill().await,
            Self::Mysql(m) => m.backfill().await,
        }
    }
}

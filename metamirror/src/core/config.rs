use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Deserialize;

use super::cli::CliConfig;
use super::constants::{
    CONFIG_FILE_NAME, DEFAULT_DATABASE_URL, DEFAULT_META_TABLE, DEFAULT_PRIMARY_ID_COLUMN,
    DEFAULT_PRIMARY_TABLE,
};
use crate::data::sql::{Backend, SqlContext};

// =============================================================================
// File Config
// =============================================================================

/// Database configuration section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct DatabaseFileConfig {
    /// Mirror backend: sqlite (default) or mysql
    pub backend: Option<Backend>,
    pub url: Option<String>,
}

/// Table naming section (from JSON config file)
#[derive(Debug, Default, Clone, Deserialize)]
pub struct TablesFileConfig {
    pub prefix: Option<String>,
    pub primary_table: Option<String>,
    pub primary_id_column: Option<String>,
    pub meta_table: Option<String>,
}

/// File-based configuration (JSON)
#[derive(Debug, Default, Deserialize)]
pub struct FileConfig {
    pub database: Option<DatabaseFileConfig>,
    pub tables: Option<TablesFileConfig>,
    pub enabled: Option<bool>,
    #[serde(flatten)]
    pub extra: serde_json::Value,
}

impl FileConfig {
    /// Load configuration from a JSON file
    fn load_from_file(path: &Path) -> Result<Self> {
        tracing::debug!(path = %path.display(), "Loading config file");
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;
        let config: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse config file: {}", path.display()))?;
        tracing::trace!(config = ?config, "Parsed config file");
        Ok(config)
    }

    /// Warn about unknown fields in the config
    fn warn_unknown_fields(&self) {
        if let serde_json::Value::Object(map) = &self.extra
            && !map.is_empty()
        {
            let keys_str: String = map
                .keys()
                .map(|k| k.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            tracing::warn!(
                fields = %keys_str,
                "Unknown fields in config file (possible typos)"
            );
        }
    }

    /// Merge another FileConfig into this one (other takes precedence)
    fn merge(&mut self, other: FileConfig) {
        if let Some(database) = other.database {
            let current = self.database.get_or_insert_with(DatabaseFileConfig::default);
            if database.backend.is_some() {
                tracing::trace!(backend = ?database.backend, "Merging database.backend");
                current.backend = database.backend;
            }
            if database.url.is_some() {
                current.url = database.url;
            }
        }

        if let Some(tables) = other.tables {
            let current = self.tables.get_or_insert_with(TablesFileConfig::default);
            if tables.prefix.is_some() {
                current.prefix = tables.prefix;
            }
            if tables.primary_table.is_some() {
                current.primary_table = tables.primary_table;
            }
            if tables.primary_id_column.is_some() {
                current.primary_id_column = tables.primary_id_column;
            }
            if tables.meta_table.is_some() {
                current.meta_table = tables.meta_table;
            }
        }

        if other.enabled.is_some() {
            self.enabled = other.enabled;
        }
    }
}

// =============================================================================
// Runtime Config
// =============================================================================

/// Database configuration (final/runtime)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseConfig {
    pub backend: Backend,
    pub url: String,
}

/// Table naming (final/runtime). Names are unprefixed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TablesConfig {
    pub prefix: String,
    pub primary_table: String,
    pub primary_id_column: String,
    pub meta_table: String,
}

impl TablesConfig {
    /// Prefixed primary entity table
    pub fn primary_table_name(&self) -> String {
        format!("{}{}", self.prefix, self.primary_table)
    }

    /// Prefixed normalized metadata table
    pub fn meta_table_name(&self) -> String {
        format!("{}{}", self.prefix, self.meta_table)
    }
}

/// Final merged application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub database: DatabaseConfig,
    pub tables: TablesConfig,
    /// Whether host queries are accelerated at all
    pub enabled: bool,
}

impl AppConfig {
    /// Load configuration from all sources
    ///
    /// Priority (lowest to highest):
    /// 1. Defaults
    /// 2. Local directory config OR CLI-specified config path
    /// 3. CLI arguments (which include env var fallbacks via clap)
    pub fn load(cli: &CliConfig) -> Result<Self> {
        tracing::debug!("Loading application configuration");
        tracing::trace!(cli = ?cli, "CLI config");

        let mut file_config = FileConfig::default();

        let overlay_path = if let Some(ref path) = cli.config {
            if !path.exists() {
                anyhow::bail!("Config file not found: {}", path.display());
            }
            Some(path.clone())
        } else {
            let local = PathBuf::from(CONFIG_FILE_NAME);
            if local.exists() { Some(local) } else { None }
        };

        if let Some(path) = overlay_path {
            let overlay_config = FileConfig::load_from_file(&path)?;
            overlay_config.warn_unknown_fields();
            file_config.merge(overlay_config);
            tracing::debug!(path = %path.display(), "Config file loaded");
        }

        let file_database = file_config.database.unwrap_or_default();
        let file_tables = file_config.tables.unwrap_or_default();

        // Layer configs: defaults -> file config -> CLI/env overrides
        let url = cli
            .database_url
            .clone()
            .or(file_database.url)
            .unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string());

        // An explicit backend wins; otherwise the URL scheme decides
        let backend = cli
            .backend
            .or(file_database.backend)
            .or_else(|| backend_from_url(&url))
            .unwrap_or_default();

        let tables = TablesConfig {
            prefix: cli
                .prefix
                .clone()
                .or(file_tables.prefix)
                .unwrap_or_default(),
            primary_table: file_tables
                .primary_table
                .unwrap_or_else(|| DEFAULT_PRIMARY_TABLE.to_string()),
            primary_id_column: file_tables
                .primary_id_column
                .unwrap_or_else(|| DEFAULT_PRIMARY_ID_COLUMN.to_string()),
            meta_table: file_tables
                .meta_table
                .unwrap_or_else(|| DEFAULT_META_TABLE.to_string()),
        };

        let config = Self {
            database: DatabaseConfig { backend, url },
            tables,
            enabled: file_config.enabled.unwrap_or(true),
        };
        config.validate()?;

        tracing::debug!(
            backend = %config.database.backend,
            prefix = %config.tables.prefix,
            enabled = config.enabled,
            "Configuration loaded"
        );
        Ok(config)
    }

    /// SQL context for compiling queries against the configured backend
    pub fn sql_context(&self) -> SqlContext {
        SqlContext::new(self.database.backend, self.tables.prefix.clone())
    }

    fn validate(&self) -> Result<()> {
        // Table and column names are interpolated into SQL as identifiers
        let identifiers = [
            ("tables.prefix", &self.tables.prefix),
            ("tables.primary_table", &self.tables.primary_table),
            ("tables.primary_id_column", &self.tables.primary_id_column),
            ("tables.meta_table", &self.tables.meta_table),
        ];
        for (field, value) in identifiers {
            if !is_identifier(value) {
                anyhow::bail!(
                    "Configuration error: {} must contain only letters, digits and underscores",
                    field
                );
            }
        }
        for (field, value) in &identifiers[1..] {
            if value.is_empty() {
                anyhow::bail!("Configuration error: {} must not be empty", field);
            }
        }

        if let Some(url_backend) = backend_from_url(&self.database.url)
            && url_backend != self.database.backend
        {
            anyhow::bail!(
                "Configuration error: database.url is a {} URL but database.backend is {}",
                url_backend,
                self.database.backend
            );
        }

        Ok(())
    }
}

/// Infer the backend from a connection URL scheme
fn backend_from_url(url: &str) -> Option<Backend> {
    let scheme = url.split_once(':')?.0.to_lowercase();
    match scheme.as_str() {
        "mysql" | "mariadb" => Some(Backend::Mysql),
        "sqlite" => Some(Backend::Sqlite),
        _ => None,
    }
}

fn is_identifier(value: &str) -> bool {
    value.chars().all(|c| c.is_ascii_alphanumeric() || c == '_')
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_config(content: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_backend_serde() {
        let backend: Backend = serde_json::from_str(r#""mysql""#).unwrap();
        assert_eq!(backend, Backend::Mysql);
        let backend: Backend = serde_json::from_str(r#""sqlite""#).unwrap();
        assert_eq!(backend, Backend::Sqlite);
    }

    #[test]
    fn test_file_config_parse_full() {
        let json = r#"{
            "database": { "backend": "mysql", "url": "mysql://root@localhost/wp" },
            "tables": { "prefix": "wp_", "primary_table": "posts", "primary_id_column": "ID", "meta_table": "postmeta" },
            "enabled": false
        }"#;
        let config: FileConfig = serde_json::from_str(json).unwrap();

        let database = config.database.as_ref().unwrap();
        assert_eq!(database.backend, Some(Backend::Mysql));
        assert_eq!(database.url.as_deref(), Some("mysql://root@localhost/wp"));
        let tables = config.tables.as_ref().unwrap();
        assert_eq!(tables.prefix.as_deref(), Some("wp_"));
        assert_eq!(tables.primary_id_column.as_deref(), Some("ID"));
        assert_eq!(config.enabled, Some(false));
    }

    #[test]
    fn test_file_config_parse_empty() {
        let config: FileConfig = serde_json::from_str("{}").unwrap();
        assert!(config.database.is_none());
        assert!(config.tables.is_none());
        assert!(config.enabled.is_none());
    }

    #[test]
    fn test_file_config_parse_extra_fields() {
        let json = r#"{ "enabled": true, "unknown_field": 123 }"#;
        let config: FileConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.extra.get("unknown_field").unwrap(), 123);
    }

    #[test]
    fn test_file_config_merge() {
        let mut base = FileConfig {
            database: Some(DatabaseFileConfig {
                backend: Some(Backend::Sqlite),
                url: Some("sqlite://base.db".to_string()),
            }),
            tables: Some(TablesFileConfig {
                prefix: Some("a_".to_string()),
                ..Default::default()
            }),
            enabled: Some(true),
            extra: serde_json::Value::Null,
        };
        let overlay = FileConfig {
            database: Some(DatabaseFileConfig {
                backend: None,
                url: Some("sqlite://overlay.db".to_string()),
            }),
            tables: Some(TablesFileConfig {
                meta_table: Some("meta".to_string()),
                ..Default::default()
            }),
            enabled: None,
            extra: serde_json::Value::Null,
        };
        base.merge(overlay);

        let database = base.database.unwrap();
        assert_eq!(database.backend, Some(Backend::Sqlite));
        assert_eq!(database.url.as_deref(), Some("sqlite://overlay.db"));
        let tables = base.tables.unwrap();
        assert_eq!(tables.prefix.as_deref(), Some("a_"));
        assert_eq!(tables.meta_table.as_deref(), Some("meta"));
        assert_eq!(base.enabled, Some(true));
    }

    #[test]
    fn test_app_config_defaults() {
        let config = AppConfig::load(&CliConfig::default()).unwrap();

        assert_eq!(config.database.backend, Backend::Sqlite);
        assert_eq!(config.database.url, DEFAULT_DATABASE_URL);
        assert_eq!(config.tables.prefix, "");
        assert_eq!(config.tables.primary_table_name(), "entities");
        assert_eq!(config.tables.primary_id_column, "id");
        assert_eq!(config.tables.meta_table_name(), "entitymeta");
        assert!(config.enabled);
    }

    #[test]
    fn test_app_config_from_file() {
        let file = write_config(
            r#"{ "database": { "url": "mysql://root@localhost/wp" }, "tables": { "prefix": "wp_" }, "enabled": false }"#,
        );
        let cli = CliConfig {
            config: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let config = AppConfig::load(&cli).unwrap();

        assert_eq!(config.database.backend, Backend::Mysql);
        assert_eq!(config.tables.primary_table_name(), "wp_entities");
        assert!(!config.enabled);
        assert_eq!(config.sql_context(), SqlContext::new(Backend::Mysql, "wp_"));
    }

    #[test]
    fn test_app_config_cli_override() {
        let file = write_config(r#"{ "tables": { "prefix": "file_" } }"#);
        let cli = CliConfig {
            config: Some(file.path().to_path_buf()),
            backend: Some(Backend::Sqlite),
            database_url: Some("sqlite::memory:".to_string()),
            prefix: Some("cli_".to_string()),
        };
        let config = AppConfig::load(&cli).unwrap();

        assert_eq!(config.database.url, "sqlite::memory:");
        assert_eq!(config.tables.prefix, "cli_");
    }

    #[test]
    fn test_app_config_missing_file() {
        let cli = CliConfig {
            config: Some(PathBuf::from("/nonexistent/metamirror.json")),
            ..Default::default()
        };
        let err = AppConfig::load(&cli).unwrap_err();
        assert!(err.to_string().contains("Config file not found"));
    }

    #[test]
    fn test_app_config_invalid_json() {
        let file = write_config("{ not json");
        let cli = CliConfig {
            config: Some(file.path().to_path_buf()),
            ..Default::default()
        };
        let err = AppConfig::load(&cli).unwrap_err();
        assert!(err.to_string().contains("Failed to parse config file"));
    }

    #[test]
    fn test_app_config_validation_identifier() {
        let cli = CliConfig {
            prefix: Some("wp_; DROP".to_string()),
            ..Default::default()
        };
        let err = AppConfig::load(&cli).unwrap_err();
        assert!(err.to_string().contains("tables.prefix"));
    }

    #[test]
    fn test_app_config_validation_backend_mismatch() {
        let cli = CliConfig {
            backend: Some(Backend::Mysql),
            database_url: Some("sqlite::memory:".to_string()),
            ..Default::default()
        };
        assert!(AppConfig::load(&cli).is_err());
    }

    #[test]
    fn test_backend_from_url() {
        assert_eq!(backend_from_url("mysql://localhost/db"), Some(Backend::Mysql));
        assert_eq!(backend_from_url("mariadb://localhost/db"), Some(Backend::Mysql));
        assert_eq!(backend_from_url("sqlite::memory:"), Some(Backend::Sqlite));
        assert_eq!(backend_from_url("postgres://x"), None);
        assert_eq!(backend_from_url("metamirror.db"), None);
    }
}

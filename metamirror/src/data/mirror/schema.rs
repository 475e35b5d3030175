//! Mirror store schema definitions
//!
//! Generates the DDL that keeps the JSON mirror table in sync with the
//! normalized metadata table:
//! - the mirror table itself (one row per entity)
//! - five triggers covering entity and metadata writes
//! - the backfill that rebuilds every document from the metadata table

use crate::core::config::TablesConfig;
use crate::core::constants::{MIRROR_DOCUMENT_COLUMN, MIRROR_NAME_PREFIX, SUPPORTED_OBJECT_TYPE};
use crate::data::sql::Backend;
use crate::domain::meta_query::mirror_id_column;

/// Synchronization trigger kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TriggerKind {
    /// New entity gets an empty document
    InsertEntity,
    /// Deleted entity loses its mirror row
    DeleteEntity,
    /// New metadata entry sets the document key
    InsertMeta,
    /// Updated metadata entry overwrites the document key
    UpdateMeta,
    /// Deleted metadata entry removes the document key
    DeleteMeta,
}

impl TriggerKind {
    pub const ALL: [TriggerKind; 5] = [
        Self::InsertEntity,
        Self::DeleteEntity,
        Self::InsertMeta,
        Self::UpdateMeta,
        Self::DeleteMeta,
    ];

    pub fn suffix(&self) -> &'static str {
        match self {
            Self::InsertEntity => "insert_entity",
            Self::DeleteEntity => "delete_entity",
            Self::InsertMeta => "insert_meta",
            Self::UpdateMeta => "update_meta",
            Self::DeleteMeta => "delete_meta",
        }
    }
}

/// Table naming for one mirrored object type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MirrorTables {
    pub prefix: String,
    pub object_type: String,
    /// Primary entity table, unprefixed
    pub primary_table: String,
    pub primary_id_column: String,
    /// Normalized metadata table, unprefixed
    pub meta_table: String,
}

impl MirrorTables {
    pub fn from_config(tables: &TablesConfig) -> Self {
        Self {
            prefix: tables.prefix.clone(),
            object_type: SUPPORTED_OBJECT_TYPE.to_string(),
            primary_table: tables.primary_table.clone(),
            primary_id_column: tables.primary_id_column.clone(),
            meta_table: tables.meta_table.clone(),
        }
    }

    pub fn mirror_table(&self) -> String {
        format!("{}{}{}meta", self.prefix, MIRROR_NAME_PREFIX, self.object_type)
    }

    /// Entity id column of both the mirror and the metadata table
    pub fn id_column(&self) -> String {
        mirror_id_column(&self.object_type)
    }

    pub fn trigger_name(&self, kind: TriggerKind) -> String {
        format!("{}{}{}", self.prefix, MIRROR_NAME_PREFIX, kind.suffix())
    }

    fn primary(&self) -> String {
        format!("{}{}", self.prefix, self.primary_table)
    }

    fn meta(&self) -> String {
        format!("{}{}", self.prefix, self.meta_table)
    }

    pub fn create_table(&self, backend: Backend) -> String {
        let (id_type, doc_type) = match backend {
            Backend::Mysql => ("BIGINT UNSIGNED NOT NULL DEFAULT 0", "JSON"),
            Backend::Sqlite => ("INTEGER NOT NULL", "TEXT"),
        };
        format!(
            "CREATE TABLE IF NOT EXISTS {mirror} (\n    {id} {id_type},\n    {doc} {doc_type},\n    PRIMARY KEY ({id})\n)",
            mirror = self.mirror_table(),
            id = self.id_column(),
            doc = MIRROR_DOCUMENT_COLUMN,
        )
    }

    pub fn drop_table(&self) -> String {
        format!("DROP TABLE IF EXISTS {}", self.mirror_table())
    }

    /// Trigger DDL in creation order, paired with the trigger name
    pub fn create_triggers(&self, backend: Backend) -> Vec<(String, String)> {
        TriggerKind::ALL
            .iter()
            .map(|&kind| (self.trigger_name(kind), self.create_trigger(backend, kind)))
            .collect()
    }

    pub fn drop_triggers(&self) -> Vec<String> {
        TriggerKind::ALL
            .iter()
            .map(|&kind| format!("DROP TRIGGER IF EXISTS {}", self.trigger_name(kind)))
            .collect()
    }

    fn create_trigger(&self, backend: Backend, kind: TriggerKind) -> String {
        let mirror = self.mirror_table();
        let id = self.id_column();
        let doc = MIRROR_DOCUMENT_COLUMN;

        let (timing, event, table, body) = match kind {
            TriggerKind::InsertEntity => {
                let insert = match backend {
                    Backend::Mysql => "INSERT IGNORE",
                    Backend::Sqlite => "INSERT OR IGNORE",
                };
                (
                    "AFTER",
                    "INSERT",
                    self.primary(),
                    format!(
                        "{insert} INTO {mirror} ({id}, {doc}) VALUES (NEW.{pid}, '{{}}')",
                        pid = self.primary_id_column
                    ),
                )
            }
            TriggerKind::DeleteEntity => (
                "BEFORE",
                "DELETE",
                self.primary(),
                format!(
                    "DELETE FROM {mirror} WHERE {id} = OLD.{pid}",
                    pid = self.primary_id_column
                ),
            ),
            TriggerKind::InsertMeta | TriggerKind::UpdateMeta => {
                let event = if kind == TriggerKind::InsertMeta { "INSERT" } else { "UPDATE" };
                (
                    "AFTER",
                    event,
                    self.meta(),
                    format!(
                        "UPDATE {mirror} SET {doc} = {set} WHERE {id} = NEW.{id}",
                        set = json_set(backend, doc, "NEW")
                    ),
                )
            }
            TriggerKind::DeleteMeta => (
                "AFTER",
                "DELETE",
                self.meta(),
                format!(
                    "UPDATE {mirror} SET {doc} = {remove} WHERE {id} = OLD.{id}",
                    remove = json_remove(backend, doc, "OLD")
                ),
            ),
        };

        let name = self.trigger_name(kind);
        match backend {
            Backend::Mysql => format!(
                "CREATE TRIGGER {name} {timing} {event} ON {table} FOR EACH ROW {body}"
            ),
            Backend::Sqlite => format!(
                "CREATE TRIGGER {name} {timing} {event} ON {table} FOR EACH ROW BEGIN {body}; END"
            ),
        }
    }

    /// Statements rebuilding the mirror from the metadata table, in order:
    /// aggregate upsert, reset of entities without metadata, empty rows for
    /// entities never mirrored, purge of rows whose entity is gone
    pub fn backfill(&self, backend: Backend) -> Vec<String> {
        let mirror = self.mirror_table();
        let meta = self.meta();
        let primary = self.primary();
        let id = self.id_column();
        let pid = &self.primary_id_column;
        let doc = MIRROR_DOCUMENT_COLUMN;

        let (aggregate, insert_ignore) = match backend {
            Backend::Mysql => (
                format!(
                    "INSERT INTO {mirror} ({id}, {doc}) \
                     SELECT {id}, JSON_OBJECTAGG(meta_key, meta_value) FROM {meta} \
                     WHERE meta_key IS NOT NULL GROUP BY {id} \
                     ON DUPLICATE KEY UPDATE {doc} = VALUES({doc})"
                ),
                "INSERT IGNORE",
            ),
            Backend::Sqlite => (
                format!(
                    "INSERT INTO {mirror} ({id}, {doc}) \
                     SELECT {id}, json_group_object(meta_key, meta_value) FROM {meta} \
                     WHERE meta_key IS NOT NULL GROUP BY {id} \
                     ON CONFLICT({id}) DO UPDATE SET {doc} = excluded.{doc}"
                ),
                "INSERT OR IGNORE",
            ),
        };

        vec![
            aggregate,
            format!(
                "UPDATE {mirror} SET {doc} = '{{}}' \
                 WHERE {id} NOT IN (SELECT {id} FROM {meta} WHERE meta_key IS NOT NULL)"
            ),
            format!("{insert_ignore} INTO {mirror} ({id}, {doc}) SELECT {pid}, '{{}}' FROM {primary}"),
            format!("DELETE FROM {mirror} WHERE {id} NOT IN (SELECT {pid} FROM {primary})"),
        ]
    }
}

/// JSON path expression built from a trigger row's meta key
fn key_path(backend: Backend, row: &str) -> String {
    match backend {
        Backend::Mysql => format!("CONCAT('$.\"', {row}.meta_key, '\"')"),
        Backend::Sqlite => format!("'$.\"' || {row}.meta_key || '\"'"),
    }
}

fn json_set(backend: Backend, doc: &str, row: &str) -> String {
    let path = key_path(backend, row);
    match backend {
        Backend::Mysql => format!("JSON_SET(COALESCE({doc}, '{{}}'), {path}, {row}.meta_value)"),
        Backend::Sqlite => format!("json_set(COALESCE({doc}, '{{}}'), {path}, {row}.meta_value)"),
    }
}

fn json_remove(backend: Backend, doc: &str, row: &str) -> String {
    let path = key_path(backend, row);
    match backend {
        Backend::Mysql => format!("JSON_REMOVE({doc}, {path})"),
        Backend::Sqlite => format!("json_remove({doc}, {path})"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::sql::SqlContext;
    use crate::domain::meta_query::mirror_table_name;

    fn tables(prefix: &str) -> MirrorTables {
        MirrorTables {
            prefix: prefix.to_string(),
            object_type: "entity".to_string(),
            primary_table: "entities".to_string(),
            primary_id_column: "ID".to_string(),
            meta_table: "entitymeta".to_string(),
        }
    }

    #[test]
    fn mirror_table_matches_compiler() {
        let tables = tables("wp_");
        let ctx = SqlContext::new(Backend::Mysql, "wp_");
        assert_eq!(Some(tables.mirror_table()), mirror_table_name(&ctx, "entity"));
        assert_eq!(tables.id_column(), "entity_id");
    }

    #[test]
    fn create_table_per_backend() {
        assert_eq!(
            tables("wp_").create_table(Backend::Mysql),
            "CREATE TABLE IF NOT EXISTS wp_metamirror_entitymeta (\n    entity_id BIGINT UNSIGNED NOT NULL DEFAULT 0,\n    json JSON,\n    PRIMARY KEY (entity_id)\n)"
        );
        assert!(
            tables("")
                .create_table(Backend::Sqlite)
                .contains("entity_id INTEGER NOT NULL,\n    json TEXT,")
        );
        assert_eq!(
            tables("wp_").drop_table(),
            "DROP TABLE IF EXISTS wp_metamirror_entitymeta"
        );
    }

    #[test]
    fn trigger_names_are_prefixed() {
        let names: Vec<String> = tables("wp_")
            .create_triggers(Backend::Mysql)
            .into_iter()
            .map(|(name, _)| name)
            .collect();
        assert_eq!(
            names,
            vec![
                "wp_metamirror_insert_entity",
                "wp_metamirror_delete_entity",
                "wp_metamirror_insert_meta",
                "wp_metamirror_update_meta",
                "wp_metamirror_delete_meta",
            ]
        );
        assert_eq!(
            tables("wp_").drop_triggers()[0],
            "DROP TRIGGER IF EXISTS wp_metamirror_insert_entity"
        );
    }

    #[test]
    fn mysql_trigger_bodies() {
        let triggers = tables("wp_").create_triggers(Backend::Mysql);
        assert_eq!(
            triggers[0].1,
            "CREATE TRIGGER wp_metamirror_insert_entity AFTER INSERT ON wp_entities FOR EACH ROW INSERT IGNORE INTO wp_metamirror_entitymeta (entity_id, json) VALUES (NEW.ID, '{}')"
        );
        assert_eq!(
            triggers[1].1,
            "CREATE TRIGGER wp_metamirror_delete_entity BEFORE DELETE ON wp_entities FOR EACH ROW DELETE FROM wp_metamirror_entitymeta WHERE entity_id = OLD.ID"
        );
        assert_eq!(
            triggers[2].1,
            "CREATE TRIGGER wp_metamirror_insert_meta AFTER INSERT ON wp_entitymeta FOR EACH ROW UPDATE wp_metamirror_entitymeta SET json = JSON_SET(COALESCE(json, '{}'), CONCAT('$.\"', NEW.meta_key, '\"'), NEW.meta_value) WHERE entity_id = NEW.entity_id"
        );
        assert!(triggers[3].1.contains("AFTER UPDATE ON wp_entitymeta"));
        assert_eq!(
            triggers[4].1,
            "CREATE TRIGGER wp_metamirror_delete_meta AFTER DELETE ON wp_entitymeta FOR EACH ROW UPDATE wp_metamirror_entitymeta SET json = JSON_REMOVE(json, CONCAT('$.\"', OLD.meta_key, '\"')) WHERE entity_id = OLD.entity_id"
        );
    }

    #[test]
    fn sqlite_trigger_bodies() {
        let triggers = tables("").create_triggers(Backend::Sqlite);
        assert_eq!(
            triggers[0].1,
            "CREATE TRIGGER metamirror_insert_entity AFTER INSERT ON entities FOR EACH ROW BEGIN INSERT OR IGNORE INTO metamirror_entitymeta (entity_id, json) VALUES (NEW.ID, '{}'); END"
        );
        assert!(triggers[2].1.contains(
            "json_set(COALESCE(json, '{}'), '$.\"' || NEW.meta_key || '\"', NEW.meta_value)"
        ));
        assert!(triggers[4].1.ends_with("WHERE entity_id = OLD.entity_id; END"));
    }

    #[test]
    fn backfill_statements() {
        let statements = tables("wp_").backfill(Backend::Mysql);
        assert_eq!(statements.len(), 4);
        assert!(statements[0].contains("JSON_OBJECTAGG(meta_key, meta_value) FROM wp_entitymeta"));
        assert!(statements[0].ends_with("ON DUPLICATE KEY UPDATE json = VALUES(json)"));
        assert!(statements[2].starts_with("INSERT IGNORE INTO wp_metamirror_entitymeta"));
        assert_eq!(
            statements[3],
            "DELETE FROM wp_metamirror_entitymeta WHERE entity_id NOT IN (SELECT ID FROM wp_entities)"
        );

        let statements = tables("").backfill(Backend::Sqlite);
        assert!(statements[0].contains("json_group_object(meta_key, meta_value)"));
        assert!(statements[0].ends_with("ON CONFLICT(entity_id) DO UPDATE SET json = excluded.json"));
    }
}

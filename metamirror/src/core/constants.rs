// =============================================================================
// Application Identity
// =============================================================================

/// Application name in lowercase (for paths and identifiers)
pub const APP_NAME_LOWER: &str = "metamirror";

// =============================================================================
// Configuration Files
// =============================================================================

/// Config file name
pub const CONFIG_FILE_NAME: &str = "metamirror.json";

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "METAMIRROR_CONFIG";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "METAMIRROR_LOG";

// =============================================================================
// Environment Variables - Database
// =============================================================================

/// Environment variable for the mirror database backend (mysql or sqlite)
pub const ENV_BACKEND: &str = "METAMIRROR_BACKEND";

/// Environment variable for the database connection URL
pub const ENV_DATABASE_URL: &str = "METAMIRROR_DATABASE_URL";

/// Environment variable for the table name prefix
pub const ENV_PREFIX: &str = "METAMIRROR_PREFIX";

// =============================================================================
// Database Defaults
// =============================================================================

/// Default database URL (SQLite file in the working directory)
pub const DEFAULT_DATABASE_URL: &str = "sqlite://metamirror.db";

/// Default primary entity table (before prefixing)
pub const DEFAULT_PRIMARY_TABLE: &str = "entities";

/// Default primary id column
pub const DEFAULT_PRIMARY_ID_COLUMN: &str = "id";

/// Default normalized metadata table (before prefixing)
pub const DEFAULT_META_TABLE: &str = "entitymeta";

/// Maximum pool connections for the mirror store
pub const DB_MAX_CONNECTIONS: u32 = 5;

/// Pool acquire timeout in seconds
pub const DB_ACQUIRE_TIMEOUT_SECS: u64 = 30;

// =============================================================================
// Mirror Table
// =============================================================================

/// The only object type with a mirror table
pub const SUPPORTED_OBJECT_TYPE: &str = "entity";

/// Mirror table column holding the JSON document
pub const MIRROR_DOCUMENT_COLUMN: &str = "json";

/// Table name fragment shared by the mirror table and its triggers
pub const MIRROR_NAME_PREFIX: &str = "metamirror_";

// =============================================================================
// Host Query Conventions
// =============================================================================

/// Value column of the normalized metadata table, as referenced by host ORDER BY
pub const LEGACY_VALUE_COLUMN: &str = "meta_value";

/// Sort key requesting numeric ordering of metadata values
pub const NUMERIC_SORT_KEY: &str = "meta_value_num";

//! Catalog schema definitions.
//!
//! The catalog is a single SQLite database holding four tables:
//! 1. datasets: one row per distinct content hash (immutable snapshots).
//! 2. experiments: append-only run ledger.
//! 3. experiment_datasets: many-to-many link keyed on the pair.
//! 4. usage_events: append-only audit trail.

pub const CATALOG_DB_NAME: &str = "catalog.db";
pub const CATALOG_EVENTS_NAME: &str = "catalog.events.jsonl";
pub const OBJECTS_DIR: &str = "objects";
pub const TMP_DIR: &str = "tmp";
pub const CATALOG_SCHEMA_VERSION: u32 = 1;

pub const CATALOG_DB_SCHEMA_META: &str = "
    CREATE TABLE IF NOT EXISTS meta (
        key TEXT PRIMARY KEY,
        value TEXT NOT NULL
    )
";

pub const CATALOG_DB_SCHEMA_DATASETS: &str = "
    CREATE TABLE IF NOT EXISTS datasets (
        content_hash TEXT PRIMARY KEY,
        version_id TEXT NOT NULL,
        kind TEXT NOT NULL, -- file | directory
        source_path TEXT NOT NULL,
        stored_path TEXT NOT NULL,
        row_count INTEGER NOT NULL DEFAULT 0,
        column_count INTEGER NOT NULL DEFAULT 0,
        metadata TEXT NOT NULL DEFAULT '{}', -- JSON object of string -> string
        created_at TEXT NOT NULL
    )
";
pub const CATALOG_DB_SCHEMA_DATASETS_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_datasets_version_id ON datasets(version_id)";

pub const CATALOG_DB_SCHEMA_EXPERIMENTS: &str = "
    CREATE TABLE IF NOT EXISTS experiments (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL,
        dataset_ref TEXT NOT NULL,
        params TEXT NOT NULL DEFAULT '{}', -- JSON object of scalars
        metrics TEXT NOT NULL DEFAULT '{}', -- JSON object of scalars
        created_at TEXT NOT NULL,
        FOREIGN KEY(dataset_ref) REFERENCES datasets(content_hash)
    )
";

pub const CATALOG_DB_SCHEMA_EXPERIMENT_DATASETS: &str = "
    CREATE TABLE IF NOT EXISTS experiment_datasets (
        experiment_id INTEGER NOT NULL,
        content_hash TEXT NOT NULL,
        PRIMARY KEY(experiment_id, content_hash),
        FOREIGN KEY(experiment_id) REFERENCES experiments(id),
        FOREIGN KEY(content_hash) REFERENCES datasets(content_hash)
    )
";

// No foreign key: usage history outlives the datasets it mentions.
pub const CATALOG_DB_SCHEMA_USAGE_EVENTS: &str = "
    CREATE TABLE IF NOT EXISTS usage_events (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        dataset_ref TEXT NOT NULL,
        action TEXT NOT NULL,
        created_at TEXT NOT NULL
    )
";
pub const CATALOG_DB_SCHEMA_USAGE_INDEX: &str =
    "CREATE INDEX IF NOT EXISTS idx_usage_events_dataset_ref ON usage_events(dataset_ref)";

/// Statements run in order on every catalog open.
pub const CATALOG_DB_SCHEMA: &[&str] = &[
    CATALOG_DB_SCHEMA_META,
    CATALOG_DB_SCHEMA_DATASETS,
    CATALOG_DB_SCHEMA_DATASETS_INDEX,
    CATALOG_DB_SCHEMA_EXPERIMENTS,
    CATALOG_DB_SCHEMA_EXPERIMENT_DATASETS,
    CATALOG_DB_SCHEMA_USAGE_EVENTS,
    CATALOG_DB_SCHEMA_USAGE_INDEX,
];

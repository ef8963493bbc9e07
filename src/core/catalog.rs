//! The metadata catalog: one SQLite database holding datasets, experiments,
//! the experiment/dataset link table and usage events.
//!
//! A [`Catalog`] is opened once per process and borrowed by every
//! component. Opening creates the store layout and the schema, both
//! idempotently. Each method is one short connection/transaction; nothing
//! here holds a transaction across file I/O.

use crate::core::broker::DbBroker;
use crate::core::config::Config;
use crate::core::error::DatatraceError;
use crate::core::scalar::{self, ScalarMap};
use crate::core::schemas;
use rusqlite::types::Type;
use rusqlite::{Connection, OptionalExtension, Row, params};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const SHA256_HEX_LEN: usize = 64;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DatasetKind {
    File,
    Directory,
}

impl DatasetKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            DatasetKind::File => "file",
            DatasetKind::Directory => "directory",
        }
    }

    fn parse(s: &str) -> Option<Self> {
        match s {
            "file" => Some(DatasetKind::File),
            "directory" => Some(DatasetKind::Directory),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Dataset {
    pub content_hash: String,
    pub version_id: String,
    pub kind: DatasetKind,
    pub source_path: String,
    pub stored_path: String,
    pub row_count: u64,
    pub column_count: u64,
    pub metadata: BTreeMap<String, String>,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Experiment {
    pub id: i64,
    pub name: String,
    /// Full content hash of the dataset the run used.
    pub dataset_ref: String,
    pub params: ScalarMap,
    pub metrics: ScalarMap,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct NewExperiment {
    pub name: String,
    pub dataset_hash: String,
    pub params: ScalarMap,
    pub metrics: ScalarMap,
    pub created_at: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UsageEvent {
    pub id: i64,
    pub dataset_ref: String,
    pub action: String,
    pub created_at: String,
}

/// Outcome of [`Catalog::upsert_dataset`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upsert {
    Inserted,
    Unchanged,
}

const DATASET_COLUMNS: &str = "content_hash, version_id, kind, source_path, stored_path, \
     row_count, column_count, metadata, created_at";
const EXPERIMENT_COLUMNS: &str = "id, name, dataset_ref, params, metrics, created_at";

pub struct Catalog {
    config: Config,
    broker: DbBroker,
}

impl Catalog {
    /// Creates the store layout and schema if missing. Safe on every start.
    pub fn open(config: Config) -> Result<Self, DatatraceError> {
        fs::create_dir_all(&config.root)?;
        fs::create_dir_all(config.root.join(schemas::OBJECTS_DIR))?;
        fs::create_dir_all(config.root.join(schemas::TMP_DIR))?;

        let broker = DbBroker::new(
            &config.root.join(schemas::CATALOG_DB_NAME),
            &config.root.join(schemas::CATALOG_EVENTS_NAME),
            config.busy_timeout_secs,
        );
        broker.with_write("catalog.init", |conn| {
            for stmt in schemas::CATALOG_DB_SCHEMA {
                conn.execute(stmt, [])?;
            }
            conn.execute(
                "INSERT OR IGNORE INTO meta(key, value) VALUES('schema_version', ?1)",
                params![schemas::CATALOG_SCHEMA_VERSION.to_string()],
            )?;
            Ok(())
        })?;
        info!(root = %config.root.display(), "catalog ready");

        Ok(Self { config, broker })
    }

    /// Opens the catalog at `root`, honouring `<root>/datatrace.toml`.
    pub fn open_at(root: &Path) -> Result<Self, DatatraceError> {
        Self::open(Config::load(root)?)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn root(&self) -> &Path {
        &self.config.root
    }

    pub fn db_path(&self) -> &Path {
        self.broker.db_path()
    }

    pub fn objects_dir(&self) -> PathBuf {
        self.config.root.join(schemas::OBJECTS_DIR)
    }

    pub fn tmp_dir(&self) -> PathBuf {
        self.config.root.join(schemas::TMP_DIR)
    }

    pub fn schema_version(&self) -> Result<Option<u32>, DatatraceError> {
        self.broker.with_read("catalog.schema_version", |conn| {
            let v: Option<String> = conn
                .query_row(
                    "SELECT value FROM meta WHERE key = 'schema_version'",
                    [],
                    |r| r.get(0),
                )
                .optional()?;
            Ok(v.and_then(|s| s.parse().ok()))
        })
    }

    // --- datasets ---

    /// Inserts `record`, or does nothing if an identical row already exists.
    /// A row with the same hash but a different shape is an integrity violation.
    pub fn upsert_dataset(&self, record: &Dataset) -> Result<Upsert, DatatraceError> {
        let metadata = serde_json::to_string(&record.metadata)?;
        self.broker.with_write("dataset.upsert", |conn| {
            let existing: Option<(String, String, i64, i64)> = conn
                .query_row(
                    "SELECT kind, stored_path, row_count, column_count
                     FROM datasets WHERE content_hash = ?1",
                    params![record.content_hash],
                    |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
                )
                .optional()?;

            match existing {
                None => {
                    conn.execute(
                        &format!(
                            "INSERT INTO datasets({}) VALUES(?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
                            DATASET_COLUMNS
                        ),
                        params![
                            record.content_hash,
                            record.version_id,
                            record.kind.as_str(),
                            record.source_path,
                            record.stored_path,
                            record.row_count as i64,
                            record.column_count as i64,
                            metadata,
                            record.created_at,
                        ],
                    )?;
                    debug!(content_hash = %record.content_hash, "dataset inserted");
                    Ok(Upsert::Inserted)
                }
                Some((kind, stored_path, rows, cols))
                    if kind == record.kind.as_str()
                        && stored_path == record.stored_path
                        && rows == record.row_count as i64
                        && cols == record.column_count as i64 =>
                {
                    Ok(Upsert::Unchanged)
                }
                Some(_) => Err(DatatraceError::IntegrityViolation(format!(
                    "dataset {} already recorded with different content",
                    record.content_hash
                ))),
            }
        })
    }

    /// Resolves a hex prefix (version id or full hash) to exactly one dataset.
    pub fn find_dataset_by_prefix(&self, prefix: &str) -> Result<Dataset, DatatraceError> {
        let prefix = normalize_ref(prefix)?;
        let mut matches = self.broker.with_read("dataset.find", |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM datasets WHERE substr(content_hash, 1, ?1) = ?2
                 ORDER BY content_hash",
                DATASET_COLUMNS
            ))?;
            let rows = stmt.query_map(params![prefix.len() as i64, prefix], dataset_from_row)?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r?);
            }
            Ok(out)
        })?;

        match matches.len() {
            0 => Err(DatatraceError::NotFound(format!("dataset '{}'", prefix))),
            1 => Ok(matches.remove(0)),
            n => Err(DatatraceError::AmbiguousReference { prefix, matches: n }),
        }
    }

    pub fn get_dataset(&self, content_hash: &str) -> Result<Option<Dataset>, DatatraceError> {
        self.broker.with_read("dataset.get", |conn| {
            Ok(conn
                .query_row(
                    &format!(
                        "SELECT {} FROM datasets WHERE content_hash = ?1",
                        DATASET_COLUMNS
                    ),
                    params![content_hash],
                    dataset_from_row,
                )
                .optional()?)
        })
    }

    /// All datasets, most recent first.
    pub fn list_datasets(&self) -> Result<Vec<Dataset>, DatatraceError> {
        self.broker.with_read("dataset.list", |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM datasets ORDER BY created_at DESC, rowid DESC",
                DATASET_COLUMNS
            ))?;
            let rows = stmt.query_map([], dataset_from_row)?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r?);
            }
            Ok(out)
        })
    }

    // --- experiments ---

    /// Inserts the experiment and its dataset link in one transaction.
    pub fn insert_experiment(&self, record: &NewExperiment) -> Result<i64, DatatraceError> {
        let params_json = scalar::to_json(&record.params)?;
        let metrics_json = scalar::to_json(&record.metrics)?;
        self.broker.with_write("experiment.insert", |conn| {
            require_dataset(conn, &record.dataset_hash)?;
            conn.execute(
                "INSERT INTO experiments(name, dataset_ref, params, metrics, created_at)
                 VALUES(?1, ?2, ?3, ?4, ?5)",
                params![
                    record.name,
                    record.dataset_hash,
                    params_json,
                    metrics_json,
                    record.created_at,
                ],
            )?;
            let id = conn.last_insert_rowid();
            link(conn, id, &record.dataset_hash)?;
            Ok(id)
        })
    }

    /// Idempotent: re-linking an existing pair changes nothing.
    pub fn link_experiment_dataset(
        &self,
        experiment_id: i64,
        content_hash: &str,
    ) -> Result<(), DatatraceError> {
        self.broker.with_write("experiment.link", |conn| {
            let exists: Option<i64> = conn
                .query_row(
                    "SELECT id FROM experiments WHERE id = ?1",
                    params![experiment_id],
                    |r| r.get(0),
                )
                .optional()?;
            if exists.is_none() {
                return Err(DatatraceError::NotFound(format!(
                    "experiment {}",
                    experiment_id
                )));
            }
            require_dataset(conn, content_hash)?;
            link(conn, experiment_id, content_hash)
        })
    }

    /// Content hashes linked to an experiment, sorted.
    pub fn linked_datasets(&self, experiment_id: i64) -> Result<Vec<String>, DatatraceError> {
        self.broker.with_read("experiment.links", |conn| {
            let mut stmt = conn.prepare(
                "SELECT content_hash FROM experiment_datasets
                 WHERE experiment_id = ?1 ORDER BY content_hash",
            )?;
            let rows = stmt.query_map(params![experiment_id], |r| r.get(0))?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r?);
            }
            Ok(out)
        })
    }

    pub fn get_experiment(&self, id: i64) -> Result<Option<Experiment>, DatatraceError> {
        self.broker.with_read("experiment.get", |conn| {
            Ok(conn
                .query_row(
                    &format!("SELECT {} FROM experiments WHERE id = ?1", EXPERIMENT_COLUMNS),
                    params![id],
                    experiment_from_row,
                )
                .optional()?)
        })
    }

    /// All experiments, most recent first.
    pub fn list_experiments(&self) -> Result<Vec<Experiment>, DatatraceError> {
        self.broker.with_read("experiment.list", |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM experiments ORDER BY created_at DESC, id DESC",
                EXPERIMENT_COLUMNS
            ))?;
            let rows = stmt.query_map([], experiment_from_row)?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r?);
            }
            Ok(out)
        })
    }

    /// Experiments linked to `content_hash`, most recent first.
    pub fn experiments_for_dataset(
        &self,
        content_hash: &str,
    ) -> Result<Vec<Experiment>, DatatraceError> {
        self.broker.with_read("experiment.for_dataset", |conn| {
            let mut stmt = conn.prepare(
                "SELECT e.id, e.name, e.dataset_ref, e.params, e.metrics, e.created_at
                 FROM experiments e
                 JOIN experiment_datasets l ON l.experiment_id = e.id
                 WHERE l.content_hash = ?1
                 ORDER BY e.created_at DESC, e.id DESC",
            )?;
            let rows = stmt.query_map(params![content_hash], experiment_from_row)?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r?);
            }
            Ok(out)
        })
    }

    /// `(YYYY-MM-DD, count)` pairs in ascending date order.
    pub fn experiments_per_day(&self) -> Result<Vec<(String, u64)>, DatatraceError> {
        self.broker.with_read("experiment.per_day", |conn| {
            let mut stmt = conn.prepare(
                "SELECT substr(created_at, 1, 10) AS day, COUNT(*)
                 FROM experiments GROUP BY day ORDER BY day",
            )?;
            let rows = stmt.query_map([], |r| {
                Ok((r.get::<_, String>(0)?, r.get::<_, i64>(1)? as u64))
            })?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r?);
            }
            Ok(out)
        })
    }

    // --- usage events ---

    pub fn insert_usage_event(
        &self,
        dataset_ref: &str,
        action: &str,
        created_at: &str,
    ) -> Result<i64, DatatraceError> {
        self.broker.with_write("usage.insert", |conn| {
            conn.execute(
                "INSERT INTO usage_events(dataset_ref, action, created_at) VALUES(?1, ?2, ?3)",
                params![dataset_ref, action, created_at],
            )?;
            Ok(conn.last_insert_rowid())
        })
    }

    /// Events whose stored reference starts with `prefix`, most recent first.
    pub fn usage_events_matching(&self, prefix: &str) -> Result<Vec<UsageEvent>, DatatraceError> {
        let prefix = normalize_ref(prefix)?;
        self.broker.with_read("usage.for_dataset", |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, dataset_ref, action, created_at FROM usage_events
                 WHERE substr(dataset_ref, 1, ?1) = ?2
                 ORDER BY created_at DESC, id DESC",
            )?;
            let rows = stmt.query_map(params![prefix.len() as i64, prefix], usage_from_row)?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r?);
            }
            Ok(out)
        })
    }

    pub fn list_usage_events(&self) -> Result<Vec<UsageEvent>, DatatraceError> {
        self.broker.with_read("usage.list", |conn| {
            let mut stmt = conn.prepare(
                "SELECT id, dataset_ref, action, created_at FROM usage_events
                 ORDER BY created_at DESC, id DESC",
            )?;
            let rows = stmt.query_map([], usage_from_row)?;
            let mut out = Vec::new();
            for r in rows {
                out.push(r?);
            }
            Ok(out)
        })
    }
}

/// Trims and lowercases a dataset reference; it must be 1..=64 hex chars.
pub fn normalize_ref(reference: &str) -> Result<String, DatatraceError> {
    let r = reference.trim().to_ascii_lowercase();
    if r.is_empty() {
        return Err(DatatraceError::InvalidArgument(
            "dataset reference is empty".to_string(),
        ));
    }
    if r.len() > SHA256_HEX_LEN || !r.chars().all(|c| c.is_ascii_hexdigit()) {
        return Err(DatatraceError::InvalidArgument(format!(
            "dataset reference '{}' is not a hex prefix of a content hash",
            reference
        )));
    }
    Ok(r)
}

fn require_dataset(conn: &Connection, content_hash: &str) -> Result<(), DatatraceError> {
    let found: Option<String> = conn
        .query_row(
            "SELECT content_hash FROM datasets WHERE content_hash = ?1",
            params![content_hash],
            |r| r.get(0),
        )
        .optional()?;
    match found {
        Some(_) => Ok(()),
        None => Err(DatatraceError::NotFound(format!("dataset '{}'", content_hash))),
    }
}

fn link(conn: &Connection, experiment_id: i64, content_hash: &str) -> Result<(), DatatraceError> {
    conn.execute(
        "INSERT OR IGNORE INTO experiment_datasets(experiment_id, content_hash) VALUES(?1, ?2)",
        params![experiment_id, content_hash],
    )?;
    Ok(())
}

fn json_column<T: serde::de::DeserializeOwned>(
    idx: usize,
    raw: &str,
) -> rusqlite::Result<T> {
    serde_json::from_str(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn scalar_column(idx: usize, raw: &str) -> rusqlite::Result<ScalarMap> {
    scalar::from_json(raw)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(e)))
}

fn dataset_from_row(row: &Row<'_>) -> rusqlite::Result<Dataset> {
    let kind: String = row.get(2)?;
    let metadata: String = row.get(7)?;
    Ok(Dataset {
        content_hash: row.get(0)?,
        version_id: row.get(1)?,
        kind: DatasetKind::parse(&kind).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(
                2,
                Type::Text,
                format!("unknown dataset kind '{}'", kind).into(),
            )
        })?,
        source_path: row.get(3)?,
        stored_path: row.get(4)?,
        row_count: row.get::<_, i64>(5)? as u64,
        column_count: row.get::<_, i64>(6)? as u64,
        metadata: json_column(7, &metadata)?,
        created_at: row.get(8)?,
    })
}

fn experiment_from_row(row: &Row<'_>) -> rusqlite::Result<Experiment> {
    let params_raw: String = row.get(3)?;
    let metrics_raw: String = row.get(4)?;
    Ok(Experiment {
        id: row.get(0)?,
        name: row.get(1)?,
        dataset_ref: row.get(2)?,
        params: scalar_column(3, &params_raw)?,
        metrics: scalar_column(4, &metrics_raw)?,
        created_at: row.get(5)?,
    })
}

fn usage_from_row(row: &Row<'_>) -> rusqlite::Result<UsageEvent> {
    Ok(UsageEvent {
        id: row.get(0)?,
        dataset_ref: row.get(1)?,
        action: row.get(2)?,
        created_at: row.get(3)?,
    })
}

use crate::core::db;
use crate::core::error::DatatraceError;
use crate::core::time;
use rusqlite::{Connection, TransactionBehavior};
use serde::{Deserialize, Serialize};
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// The single access path to the catalog database.
///
/// Every call opens a fresh connection, runs one short unit of work and
/// closes it again. Writes run inside a `BEGIN IMMEDIATE` transaction so
/// concurrent processes serialize on SQLite's own lock. Each call appends
/// one line to the operation log.
pub struct DbBroker {
    db_path: PathBuf,
    op_log_path: PathBuf,
    busy_timeout_secs: u64,
}

#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct BrokerEvent {
    pub ts: String,
    pub event_id: String,
    pub op: String,
    pub db_id: String,
    pub status: String,
}

impl DbBroker {
    pub fn new(db_path: &Path, op_log_path: &Path, busy_timeout_secs: u64) -> Self {
        Self {
            db_path: db_path.to_path_buf(),
            op_log_path: op_log_path.to_path_buf(),
            busy_timeout_secs,
        }
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Runs `f` against a plain connection. Used for queries.
    pub(crate) fn with_read<F, R>(&self, op_name: &str, f: F) -> Result<R, DatatraceError>
    where
        F: FnOnce(&Connection) -> Result<R, DatatraceError>,
    {
        let conn = db::db_connect(&self.db_path, self.busy_timeout_secs)?;
        let result = f(&conn);
        self.record(op_name, &result);
        result
    }

    /// Runs `f` inside an immediate transaction; commits only if `f` succeeds.
    pub(crate) fn with_write<F, R>(&self, op_name: &str, f: F) -> Result<R, DatatraceError>
    where
        F: FnOnce(&Connection) -> Result<R, DatatraceError>,
    {
        let result = self.run_in_tx(f);
        self.record(op_name, &result);
        result
    }

    fn run_in_tx<F, R>(&self, f: F) -> Result<R, DatatraceError>
    where
        F: FnOnce(&Connection) -> Result<R, DatatraceError>,
    {
        let mut conn = db::db_connect(&self.db_path, self.busy_timeout_secs)?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        let value = f(&tx)?;
        tx.commit()?;
        Ok(value)
    }

    fn record<R>(&self, op: &str, result: &Result<R, DatatraceError>) {
        let status = if result.is_ok() { "success" } else { "error" };
        debug!(op, status, "catalog op");
        if let Err(e) = self.log_event(op, status) {
            warn!(op, error = %e, "failed to append catalog op log");
        }
    }

    fn log_event(&self, op: &str, status: &str) -> Result<(), DatatraceError> {
        let ev = BrokerEvent {
            ts: time::now_rfc3339(),
            event_id: time::new_event_id(),
            op: op.to_string(),
            db_id: self
                .db_path
                .file_name()
                .unwrap_or_default()
                .to_string_lossy()
                .to_string(),
            status: status.to_string(),
        };

        let mut f = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.op_log_path)?;
        writeln!(f, "{}", serde_json::to_string(&ev)?)?;
        Ok(())
    }
}

/// Reads the operation log back, skipping lines that fail to parse.
pub fn read_op_log(op_log_path: &Path) -> Result<Vec<BrokerEvent>, DatatraceError> {
    if !op_log_path.exists() {
        return Ok(Vec::new());
    }
    let content = std::fs::read_to_string(op_log_path)?;
    Ok(content
        .lines()
        .filter(|l| !l.trim().is_empty())
        .filter_map(|l| serde_json::from_str(l).ok())
        .collect())
}

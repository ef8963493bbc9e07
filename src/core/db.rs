use crate::core::error::DatatraceError;
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

/// Opens a catalog connection with WAL journaling, foreign keys and a busy timeout.
pub fn db_connect(db_path: &Path, busy_timeout_secs: u64) -> Result<Connection, DatatraceError> {
    let conn = Connection::open(db_path)?;
    conn.busy_timeout(Duration::from_secs(busy_timeout_secs))?;
    conn.query_row("PRAGMA journal_mode=WAL;", [], |_| Ok(()))?;
    conn.execute("PRAGMA foreign_keys=ON;", [])?;
    Ok(conn)
}

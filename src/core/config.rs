//! Store configuration, read from an optional `datatrace.toml` in the store root.

use crate::core::error::DatatraceError;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_FILE_NAME: &str = "datatrace.toml";
pub const ROOT_ENV_VAR: &str = "DATATRACE_ROOT";
pub const DEFAULT_ROOT: &str = "datastore";

/// Length of the human-facing version id (hex chars of the content hash).
pub const VERSION_ID_LEN: usize = 8;

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
struct ConfigFile {
    chunk_size: usize,
    busy_timeout_secs: u64,
    tabular_extensions: Vec<String>,
    version_id_len: usize,
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            chunk_size: 8192,
            busy_timeout_secs: 5,
            tabular_extensions: vec!["csv".to_string(), "tsv".to_string()],
            version_id_len: VERSION_ID_LEN,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    /// Store root holding the catalog database and the object area.
    pub root: PathBuf,
    /// Read buffer size used when hashing and copying.
    pub chunk_size: usize,
    pub busy_timeout_secs: u64,
    /// Lowercase file extensions that get row/column statistics.
    pub tabular_extensions: Vec<String>,
}

impl Config {
    /// Defaults rooted at `root`, ignoring any config file.
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self::from_file(root.into(), ConfigFile::default())
    }

    /// Loads `<root>/datatrace.toml` if present. A missing file yields defaults.
    pub fn load(root: &Path) -> Result<Self, DatatraceError> {
        let path = root.join(CONFIG_FILE_NAME);
        if !path.exists() {
            return Ok(Self::with_root(root));
        }
        let content = fs::read_to_string(&path)?;
        let file: ConfigFile = toml::from_str(&content)
            .map_err(|e| DatatraceError::ConfigError(format!("{}: {}", path.display(), e)))?;
        if file.version_id_len != VERSION_ID_LEN {
            return Err(DatatraceError::ConfigError(format!(
                "version_id_len must be {}, got {}",
                VERSION_ID_LEN, file.version_id_len
            )));
        }
        if file.chunk_size == 0 {
            return Err(DatatraceError::ConfigError(
                "chunk_size must be greater than zero".to_string(),
            ));
        }
        Ok(Self::from_file(root.to_path_buf(), file))
    }

    /// Resolves the root from an explicit flag, then `DATATRACE_ROOT`, then `./datastore`.
    pub fn resolve_root(explicit: Option<PathBuf>) -> PathBuf {
        explicit
            .or_else(|| std::env::var_os(ROOT_ENV_VAR).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_ROOT))
    }

    pub fn is_tabular(&self, path: &Path) -> bool {
        path.extension()
            .and_then(|e| e.to_str())
            .map(|e| {
                let e = e.to_ascii_lowercase();
                self.tabular_extensions.iter().any(|t| *t == e)
            })
            .unwrap_or(false)
    }

    fn from_file(root: PathBuf, file: ConfigFile) -> Self {
        Self {
            root,
            chunk_size: file.chunk_size,
            busy_timeout_secs: file.busy_timeout_secs,
            tabular_extensions: file
                .tabular_extensions
                .into_iter()
                .map(|e| e.trim_start_matches('.').to_ascii_lowercase())
                .collect(),
        }
    }
}

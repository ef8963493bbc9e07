use crate::core::catalog::{Catalog, Dataset, DatasetKind, Upsert};
use crate::core::error::DatatraceError;
use crate::core::hasher::{self, ContentHasher};
use crate::core::tabular::{self, TableStats};
use crate::core::time;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Immutable, hash-keyed dataset storage.
///
/// Content lands under `<root>/objects/<content_hash>/`: a single file
/// keeps its file name inside that directory, a directory source becomes
/// the directory itself. Bytes are staged under `<root>/tmp/` and moved
/// into place with one rename before the catalog row is written.
pub struct VersionStore<'a> {
    catalog: &'a Catalog,
    hasher: ContentHasher,
}

#[derive(Debug, Clone, Serialize)]
pub struct VerifyReport {
    pub checked: usize,
    pub failures: Vec<String>,
}

impl VerifyReport {
    pub fn is_clean(&self) -> bool {
        self.failures.is_empty()
    }
}

impl<'a> VersionStore<'a> {
    pub fn new(catalog: &'a Catalog) -> Self {
        Self {
            catalog,
            hasher: ContentHasher::new(catalog.config().chunk_size),
        }
    }

    /// Versions `source` and returns its version id. Adding unchanged
    /// content again returns the existing id without copying anything.
    pub fn add(
        &self,
        source: &Path,
        metadata: Option<BTreeMap<String, String>>,
    ) -> Result<String, DatatraceError> {
        if !source.exists() {
            return Err(DatatraceError::NotFound(format!(
                "source path {}",
                source.display()
            )));
        }
        let source = fs::canonicalize(source)?;
        let kind = if source.is_dir() {
            DatasetKind::Directory
        } else {
            DatasetKind::File
        };

        let content_hash = self.hasher.hash_path(&source)?;
        let version_id = hasher::version_id(&content_hash).to_string();

        if let Some(existing) = self.catalog.get_dataset(&content_hash)? {
            debug!(%content_hash, "dataset already versioned");
            return Ok(existing.version_id);
        }

        let stored_path = self.store_content(&source, kind, &content_hash)?;

        let stats = match kind {
            DatasetKind::File if self.catalog.config().is_tabular(&stored_path) => {
                tabular::table_stats(&stored_path)
            }
            _ => TableStats::default(),
        };

        let record = Dataset {
            content_hash: content_hash.clone(),
            version_id: version_id.clone(),
            kind,
            source_path: source.to_string_lossy().to_string(),
            stored_path: stored_path.to_string_lossy().to_string(),
            row_count: stats.rows,
            column_count: stats.columns,
            metadata: metadata.unwrap_or_default(),
            created_at: time::now_rfc3339(),
        };

        match self.catalog.upsert_dataset(&record)? {
            Upsert::Inserted => info!(%version_id, kind = kind.as_str(), "dataset versioned"),
            Upsert::Unchanged => debug!(%version_id, "dataset registered concurrently"),
        }
        Ok(version_id)
    }

    /// All datasets, most recent first.
    pub fn list(&self) -> Result<Vec<Dataset>, DatatraceError> {
        self.catalog.list_datasets()
    }

    /// Resolves a version id or hash prefix to exactly one dataset.
    pub fn get(&self, reference: &str) -> Result<Dataset, DatatraceError> {
        self.catalog.find_dataset_by_prefix(reference)
    }

    /// Re-hashes every stored entry against its catalog row. Read-only.
    pub fn verify(&self) -> Result<VerifyReport, DatatraceError> {
        let datasets = self.catalog.list_datasets()?;
        let mut failures = Vec::new();

        for d in &datasets {
            let stored = Path::new(&d.stored_path);
            if !stored.exists() {
                failures.push(format!(
                    "Dataset {}: stored content missing at {}",
                    d.version_id, d.stored_path
                ));
                continue;
            }
            let digest = self.hasher.hash_path(stored)?;
            if digest != d.content_hash {
                failures.push(format!("Dataset {}: content hash mismatch", d.version_id));
            }
        }

        Ok(VerifyReport {
            checked: datasets.len(),
            failures,
        })
    }

    /// Puts the bytes of `source` under `objects/<hash>` and returns the
    /// stored path. An entry that already holds the content is reused as is,
    /// whatever name the file inside it carries.
    fn store_content(
        &self,
        source: &Path,
        kind: DatasetKind,
        content_hash: &str,
    ) -> Result<PathBuf, DatatraceError> {
        let entry_dir = self.catalog.objects_dir().join(content_hash);
        let stored_path = match kind {
            DatasetKind::File => entry_dir.join(source.file_name().ok_or_else(|| {
                DatatraceError::InvalidArgument(format!(
                    "source {} has no file name",
                    source.display()
                ))
            })?),
            DatasetKind::Directory => entry_dir.clone(),
        };

        if entry_dir.exists() {
            if let Some(existing) = self.valid_entry(&entry_dir, kind, content_hash) {
                debug!(%content_hash, "reusing stored object");
                return Ok(existing);
            }
            warn!(%content_hash, "discarding invalid object entry");
            fs::remove_dir_all(&entry_dir)?;
        }

        let staging = self
            .catalog
            .tmp_dir()
            .join(format!("{}.{}", content_hash, time::new_event_id()));
        fs::create_dir_all(&staging)?;

        let staged = match kind {
            DatasetKind::File => {
                let name = stored_path.file_name().unwrap_or_default();
                copy_synced(source, &staging.join(name))
            }
            DatasetKind::Directory => copy_tree(source, &staging),
        };
        if let Err(e) = staged {
            let _ = fs::remove_dir_all(&staging);
            return Err(e);
        }

        if let Err(e) = fs::rename(&staging, &entry_dir) {
            let _ = fs::remove_dir_all(&staging);
            // Another writer may have placed the same content first.
            if let Some(existing) = self.valid_entry(&entry_dir, kind, content_hash) {
                return Ok(existing);
            }
            return Err(e.into());
        }
        sync_dir(&self.catalog.objects_dir());

        Ok(stored_path)
    }

    /// The stored path inside `entry_dir` whose bytes hash to `content_hash`.
    fn valid_entry(
        &self,
        entry_dir: &Path,
        kind: DatasetKind,
        content_hash: &str,
    ) -> Option<PathBuf> {
        match kind {
            DatasetKind::Directory => {
                let digest = self.hasher.hash_tree(entry_dir).ok()?;
                (digest == content_hash).then(|| entry_dir.to_path_buf())
            }
            DatasetKind::File => {
                let mut files: Vec<PathBuf> = fs::read_dir(entry_dir)
                    .ok()?
                    .filter_map(|e| e.ok())
                    .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
                    .map(|e| e.path())
                    .collect();
                files.sort();
                files.into_iter().find(|p| {
                    matches!(self.hasher.hash_file(p), Ok(d) if d == content_hash)
                })
            }
        }
    }
}

fn copy_synced(from: &Path, to: &Path) -> Result<(), DatatraceError> {
    if let Some(parent) = to.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(from, to)?;
    File::open(to)?.sync_all()?;
    Ok(())
}

fn copy_tree(from: &Path, to: &Path) -> Result<(), DatatraceError> {
    for (_, file) in hasher::tree_files(from)? {
        let rel = file
            .strip_prefix(from)
            .map_err(|e| DatatraceError::InvalidArgument(e.to_string()))?;
        copy_synced(&file, &to.join(rel))?;
    }
    Ok(())
}

#[cfg(unix)]
fn sync_dir(dir: &Path) {
    if let Ok(f) = File::open(dir) {
        let _ = f.sync_all();
    }
}

#[cfg(not(unix))]
fn sync_dir(_dir: &Path) {}

pub fn schema() -> serde_json::Value {
    serde_json::json!({
        "name": "versions",
        "version": "0.1.0",
        "description": "Content-addressed dataset versioning",
        "commands": [
            { "name": "add", "parameters": ["path", "meta"] },
            { "name": "list", "description": "List versioned datasets, newest first" },
            { "name": "show", "parameters": ["ref"] },
            { "name": "verify", "description": "Re-hash stored content against the catalog" }
        ],
        "storage": ["catalog.db", "objects/"]
    })
}

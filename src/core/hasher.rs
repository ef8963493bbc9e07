//! Content digests for single files and directory trees.
//!
//! Both digests are SHA-256, hex encoded. A tree digest folds the sorted
//! `(relative path, file digest)` pairs of every regular file under the
//! root, so it depends only on bytes and relative layout, never on the
//! order the filesystem happens to enumerate entries in. Tree digests start
//! from a fixed tag, so no directory shares a digest with a file.

use crate::core::config::VERSION_ID_LEN;
use crate::core::error::DatatraceError;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::{Component, Path, PathBuf};
use walkdir::WalkDir;

pub const DEFAULT_CHUNK_SIZE: usize = 8192;

const TREE_DIGEST_TAG: &[u8] = b"tree\0";

#[derive(Debug, Clone, Copy)]
pub struct ContentHasher {
    chunk_size: usize,
}

impl Default for ContentHasher {
    fn default() -> Self {
        Self::new(DEFAULT_CHUNK_SIZE)
    }
}

impl ContentHasher {
    pub fn new(chunk_size: usize) -> Self {
        Self {
            chunk_size: chunk_size.max(1),
        }
    }

    /// Streams `path` through SHA-256 in fixed-size chunks.
    pub fn hash_file(&self, path: &Path) -> Result<String, DatatraceError> {
        let mut file = File::open(path)?;
        let mut hasher = Sha256::new();
        let mut buf = vec![0u8; self.chunk_size];
        loop {
            let n = file.read(&mut buf)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Digest of every regular file under `root`, in byte-wise relative path order.
    pub fn hash_tree(&self, root: &Path) -> Result<String, DatatraceError> {
        let mut hasher = Sha256::new();
        hasher.update(TREE_DIGEST_TAG);
        for (rel, path) in tree_files(root)? {
            hasher.update(&rel);
            hasher.update([0u8]);
            hasher.update(self.hash_file(&path)?.as_bytes());
        }
        Ok(format!("{:x}", hasher.finalize()))
    }

    /// Dispatches on whether `path` is a directory.
    pub fn hash_path(&self, path: &Path) -> Result<String, DatatraceError> {
        if path.is_dir() {
            self.hash_tree(path)
        } else {
            self.hash_file(path)
        }
    }
}

/// Regular files under `root` as `(relative path bytes, absolute path)`,
/// sorted by the relative path bytes. Components are joined with `/`.
pub fn tree_files(root: &Path) -> Result<Vec<(Vec<u8>, PathBuf)>, DatatraceError> {
    let mut files = Vec::new();
    for entry in WalkDir::new(root).follow_links(false) {
        let entry = entry?;
        if !entry.file_type().is_file() {
            continue;
        }
        let rel = entry
            .path()
            .strip_prefix(root)
            .map_err(|e| DatatraceError::InvalidArgument(e.to_string()))?;
        files.push((relative_key(rel), entry.path().to_path_buf()));
    }
    files.sort_by(|a, b| a.0.cmp(&b.0));
    Ok(files)
}

fn relative_key(rel: &Path) -> Vec<u8> {
    let mut key = Vec::new();
    for component in rel.components() {
        if let Component::Normal(part) = component {
            if !key.is_empty() {
                key.push(b'/');
            }
            key.extend_from_slice(part.as_encoded_bytes());
        }
    }
    key
}

/// The short human-facing id: the first eight hex chars of the digest.
pub fn version_id(content_hash: &str) -> &str {
    &content_hash[..content_hash.len().min(VERSION_ID_LEN)]
}

//! Append-only log writer shared by the broker's per-topic message log and
//! the collector's per-GPU telemetry log.
//!
//! One file per logical name (topic or GPU id); each writer keyed by name
//! is guarded by its own mutex so concurrent writers to distinct names never
//! contend. The file is opened in append+create mode on every write, which
//! is a deliberate simplification: the pipeline's expected write rate does
//! not warrant keeping file descriptors open across calls.

// Layer 1: Standard library imports
use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Path, PathBuf};

// Layer 2: Third-party crate imports
use dashmap::DashMap;
use parking_lot::Mutex;
use serde::Serialize;

// Layer 3: Internal module imports
use crate::error::StorageError;

/// Append-only, newline-delimited JSON log writer rooted at a directory.
///
/// Each distinct `name` passed to [`AppendLogWriter::append`] gets its own
/// file under `root` and its own write mutex, so that writes to different
/// names never block each other.
#[derive(Debug)]
pub struct AppendLogWriter {
    root: PathBuf,
    locks: DashMap<String, Mutex<()>>,
}

impl AppendLogWriter {
    /// Create a writer rooted at `root`. The directory is not created here;
    /// it is created lazily on first write via `create_dir_all`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            locks: DashMap::new(),
        }
    }

    /// Root directory this writer persists under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the backing file for `name`.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(format!("{name}.jsonl"))
    }

    /// Append `record` as one newline-delimited JSON line to the file for
    /// `name`, creating the file and its parent directory if necessary.
    pub fn append<T: Serialize>(&self, name: &str, record: &T) -> Result<(), StorageError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        let path = self.path_for(name);
        let lock = self
            .locks
            .entry(name.to_string())
            .or_insert_with(|| Mutex::new(()));
        let _guard = lock.lock();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::Open {
                path: parent.display().to_string(),
                source,
            })?;
        }

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| StorageError::Open {
                path: path.display().to_string(),
                source,
            })?;

        file.write_all(&line).map_err(|source| StorageError::Write {
            path: path.display().to_string(),
            source,
        })?;

        tracing::trace!(name, bytes = line.len(), "appended record to log");
        Ok(())
    }
}

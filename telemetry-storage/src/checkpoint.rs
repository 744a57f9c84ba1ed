//! Per-worker checkpoint persistence.
//!
//! A checkpoint is a named, monotonically-updated processed-message counter.
//! `CheckpointStore::update_processed_count` performs an additive
//! read-modify-write: a missing file is treated as a fresh checkpoint with
//! `processed_count = 0`.

// Layer 1: Standard library imports
use std::path::{Path, PathBuf};

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};

// Layer 3: Internal module imports
use crate::error::StorageError;

/// A persisted count of messages a named worker has processed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Checkpoint {
    /// Name of the worker this checkpoint tracks (e.g. `worker-0`).
    pub name: String,
    /// Total number of messages processed so far.
    pub processed_count: u64,
    /// Time of the last update.
    pub updated_at: DateTime<Utc>,
}

/// One-file-per-name checkpoint store rooted at a directory.
///
/// Writes are serialized through a single mutex: checkpoints are updated
/// at most every 100 messages per worker (see the collector), so this is not
/// a contended path.
#[derive(Debug)]
pub struct CheckpointStore {
    root: PathBuf,
    write_lock: Mutex<()>,
}

impl CheckpointStore {
    /// Create a store rooted at `root`.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// Root directory this store persists under.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Path of the backing file for `name`.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(name)
    }

    /// Load the checkpoint for `name`, or a zeroed checkpoint if none exists yet.
    pub fn load(&self, name: &str) -> Result<Checkpoint, StorageError> {
        let path = self.path_for(name);
        if !path.exists() {
            return Ok(Checkpoint {
                name: name.to_string(),
                processed_count: 0,
                updated_at: Utc::now(),
            });
        }

        let contents = std::fs::read_to_string(&path).map_err(|source| StorageError::Read {
            path: path.display().to_string(),
            source,
        })?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Add `delta` to the persisted `processed_count` for `name`, creating
    /// the checkpoint if it does not yet exist.
    pub fn update_processed_count(&self, name: &str, delta: u64) -> Result<Checkpoint, StorageError> {
        let _guard = self.write_lock.lock();

        let mut checkpoint = self.load(name)?;
        checkpoint.processed_count += delta;
        checkpoint.updated_at = Utc::now();

        let path = self.path_for(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|source| StorageError::Open {
                path: parent.display().to_string(),
                source,
            })?;
        }
        let body = serde_json::to_string(&checkpoint)?;
        std::fs::write(&path, body).map_err(|source| StorageError::Write {
            path: path.display().to_string(),
            source,
        })?;

        tracing::debug!(
            name,
            processed_count = checkpoint.processed_count,
            "persisted checkpoint"
        );
        Ok(checkpoint)
    }
}

//! Storage error types with context.
//!
//! Errors raised by the append-only log writer and checkpoint store.

// Layer 1: Standard library imports
use std::io;

// Layer 2: Third-party crate imports
use thiserror::Error;

/// Errors that can occur while persisting append logs or checkpoints.
#[derive(Debug, Error)]
pub enum StorageError {
    /// Failed to open or create the backing file for a log or checkpoint.
    #[error("failed to open storage file {path}: {source}")]
    Open {
        /// Path that failed to open.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Failed to write a record to an already-open file.
    #[error("failed to write to storage file {path}: {source}")]
    Write {
        /// Path that failed to write.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// Failed to read a checkpoint file that exists but is unreadable.
    #[error("failed to read checkpoint file {path}: {source}")]
    Read {
        /// Path that failed to read.
        path: String,
        /// Underlying I/O error.
        #[source]
        source: io::Error,
    },

    /// A record could not be serialized to its persisted form.
    #[error("failed to serialize record: {0}")]
    Serialize(#[from] serde_json::Error),
}

//! # telemetry-storage
//!
//! Append-only log writer and checkpoint store backing both the broker's
//! optional per-topic message log and the collector's per-GPU telemetry log
//! and per-worker checkpoints.
//!
//! Both writers use one file per logical name, guarded by a lock scoped to
//! that name, so concurrent writes to different names never block each
//! other.

pub mod append_log;
pub mod checkpoint;
pub mod error;

pub use append_log::AppendLogWriter;
pub use checkpoint::{Checkpoint, CheckpointStore};
pub use error::StorageError;

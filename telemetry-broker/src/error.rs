//! Broker error types with context.

// Layer 2: Third-party crate imports
use thiserror::Error;

/// Errors that can occur during broker operations.
///
/// Each variant carries the context needed to diagnose the failure without
/// forcing callers to inspect broker-internal state.
#[derive(Debug, Error)]
pub enum BrokerError {
    /// `publish` or `subscribe` was called after [`crate::Broker::close`].
    #[error("broker is closed")]
    Closed,

    /// Per-topic persistence was enabled and the append write failed.
    #[error("failed to persist message on topic {topic}: {source}")]
    Persistence {
        /// Topic the message was published to.
        topic: String,
        /// Underlying storage failure.
        #[source]
        source: telemetry_storage::StorageError,
    },
}

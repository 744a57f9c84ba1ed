//! Collector error types with context.

// Layer 2: Third-party crate imports
use thiserror::Error;

/// Errors that can occur while decoding or querying telemetry.
#[derive(Debug, Error)]
pub enum CollectorError {
    /// The incoming field bag had no field from which a `gpu_id` could be
    /// derived (`uuid`, `gpu_id`, or a numeric id to synthesize one from).
    #[error("telemetry message has no resolvable gpu_id")]
    UnresolvableGpuId,

    /// The message payload was not valid JSON.
    #[error("failed to parse telemetry payload: {0}")]
    InvalidPayload(#[from] serde_json::Error),
}

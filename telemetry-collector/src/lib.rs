//! # telemetry-collector
//!
//! A worker pool that consumes acknowledged messages from
//! [`telemetry_broker`], decodes a permissive field bag into a typed
//! [`Telemetry`] record, persists it to a per-GPU append-only log, indexes
//! it in a bounded in-memory ring, periodically checkpoints its progress,
//! and exposes the result over a small HTTP query surface.

pub mod config;
pub mod error;
pub mod http;
pub mod ring;
pub mod telemetry;
pub mod worker;

pub use config::{CollectorConfig, CollectorConfigBuilder};
pub use error::CollectorError;
pub use ring::{RingIndex, RingStats};
pub use telemetry::{decode, StreamerMessage, Telemetry};
pub use worker::Collector;

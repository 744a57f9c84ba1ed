//! # telemetry-broker
//!
//! A topic-based publish/subscribe broker with two subscriber classes
//! (payload-only and acknowledged), a pending-message table, ack-timeout
//! driven redelivery bounded by a retry cap, optional per-topic
//! persistence, and an admin/stats HTTP surface.
//!
//! The entire topic registry is protected by a single reader/writer lock
//! (see [`broker`] module docs) rather than the lock-free registry pattern
//! used elsewhere in this workspace's actor runtime, because the
//! queue/pending-table lockstep invariant is far simpler to keep sound
//! under one writer lock than under independently-locked collections.

pub mod broker;
pub mod config;
pub mod error;
pub mod http;
pub mod message;
pub(crate) mod topic;

pub use broker::{AckStream, Broker, PayloadStream, Snapshot, TopicStats, Unsubscribe};
pub use config::{BrokerConfig, BrokerConfigBuilder};
pub use error::BrokerError;
pub use message::{Ack, Message};
pub use topic::PendingMessage;

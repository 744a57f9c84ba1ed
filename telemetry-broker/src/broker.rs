//! The topic-based publish/subscribe broker.
//!
//! Concurrency model: a single [`parking_lot::RwLock`] guards the entire
//! topic registry and every [`TopicState`]'s collections (queue, pending
//! table, subscriber lists). Readers take the stats/accessor path; writers
//! take publish, subscribe, unsubscribe, acknowledgment, and the timeout
//! scan. Holding one coarse lock keeps the pending-message invariants
//! (queue/pending-table lockstep) trivially sound at the cost of contending
//! all topics on every write — acceptable given this broker's scale.

// Layer 1: Standard library imports
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

// Layer 2: Third-party crate imports
use chrono::Utc;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

// Layer 3: Internal module imports
use crate::config::{BrokerConfig, SUBSCRIBER_INBOX_CAPACITY, TIMEOUT_SCAN_INTERVAL};
use crate::error::BrokerError;
use crate::message::{Ack, Message};
use crate::topic::{insert_pending, remove_pending, AckSubscriber, PayloadSubscriber, PendingMessage, TopicState};
use telemetry_storage::AppendLogWriter;

/// Receiver handed to a payload-only subscriber.
pub type PayloadStream = mpsc::Receiver<Vec<u8>>;
/// Receiver handed to an acknowledged-class subscriber.
pub type AckStream = mpsc::Receiver<Message>;

#[derive(Serialize)]
struct PersistedRecord {
    timestamp: i64,
    payload: Vec<u8>,
}

struct BrokerInner {
    topics: RwLock<HashMap<String, TopicState>>,
    config: BrokerConfig,
    closed: AtomicBool,
    seq: AtomicU64,
    log_writer: Option<AppendLogWriter>,
    shutdown_tx: watch::Sender<bool>,
}

impl BrokerInner {
    fn next_message_id(&self, topic: &str) -> String {
        let n = self.seq.fetch_add(1, Ordering::Relaxed);
        format!("{topic}-{n}")
    }

    fn ack_message(self: &Arc<Self>, topic: &str, message_id: &str) {
        let mut topics = self.topics.write();
        if let Some(state) = topics.get_mut(topic) {
            if remove_pending(state, message_id).is_some() {
                tracing::trace!(topic, message_id, "message acknowledged");
            }
        }
    }
}

/// One subscriber class, used to address the right vector on unsubscribe.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SubscriberKind {
    Payload,
    Ack,
}

/// A handle that removes a subscriber from its topic when invoked.
///
/// Idempotent: a second call after the first is a no-op.
pub struct Unsubscribe {
    inner: Arc<BrokerInner>,
    topic: String,
    id: Uuid,
    kind: SubscriberKind,
    done: AtomicBool,
}

impl Unsubscribe {
    /// Remove this subscriber from its topic. Safe to call more than once.
    pub fn unsubscribe(&self) {
        if self.done.swap(true, Ordering::SeqCst) {
            return;
        }
        let mut topics = self.inner.topics.write();
        if let Some(state) = topics.get_mut(&self.topic) {
            match self.kind {
                SubscriberKind::Payload => state.payload_subscribers.retain(|s| s.id != self.id),
                SubscriberKind::Ack => state.ack_subscribers.retain(|s| s.id != self.id),
            }
        }
    }
}

/// Per-topic statistics returned by [`Broker::get_stats`].
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct TopicStats {
    /// Number of messages currently in the topic's pending queue.
    pub queue_size: usize,
    /// Total subscribers across both classes.
    pub subscriber_count: usize,
    /// Number of messages awaiting acknowledgment or retry exhaustion.
    pub pending_messages: usize,
}

/// A point-in-time snapshot of broker state.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct Snapshot {
    /// Per-topic statistics, keyed by topic name.
    pub topics: HashMap<String, TopicStats>,
}

/// Topic-based publish/subscribe broker with acknowledgment and redelivery.
#[derive(Clone)]
pub struct Broker {
    inner: Arc<BrokerInner>,
}

impl Broker {
    /// Construct a broker and start its acknowledgment-timeout worker.
    pub fn new(config: BrokerConfig) -> Self {
        let log_writer = config
            .persistence_enabled
            .then(|| AppendLogWriter::new(config.persistence_dir.clone()));
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let inner = Arc::new(BrokerInner {
            topics: RwLock::new(HashMap::new()),
            config,
            closed: AtomicBool::new(false),
            seq: AtomicU64::new(0),
            log_writer,
            shutdown_tx,
        });

        spawn_timeout_worker(Arc::clone(&inner), shutdown_rx);
        Self { inner }
    }

    /// Publish `payload` on `topic`, dispatching to every current subscriber.
    pub fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), BrokerError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::Closed);
        }

        if let Some(writer) = &self.inner.log_writer {
            let record = PersistedRecord {
                timestamp: Utc::now().timestamp(),
                payload: payload.clone(),
            };
            writer
                .append(topic, &record)
                .map_err(|source| BrokerError::Persistence {
                    topic: topic.to_string(),
                    source,
                })?;
        }

        let message_id = self.inner.next_message_id(topic);
        let inner = Arc::clone(&self.inner);
        let ack_topic = topic.to_string();
        let ack_id = message_id.clone();
        let ack = Ack::new(move || inner.ack_message(&ack_topic, &ack_id));

        let message = Message {
            payload: payload.clone(),
            ack,
        };

        let mut topics = self.inner.topics.write();
        let state = topics.entry(topic.to_string()).or_default();

        let pending = PendingMessage {
            message_id,
            topic: topic.to_string(),
            message: message.clone(),
            first_enqueued_at: Utc::now(),
            last_delivered_at: Utc::now(),
            retries: 0,
            queue_index: state.queue.len(),
        };
        insert_pending(state, pending);

        dispatch(state, &payload, &message);
        Ok(())
    }

    /// Subscribe to raw payloads on `topic`. Cannot acknowledge.
    pub fn subscribe(&self, topic: &str) -> Result<(PayloadStream, Unsubscribe), BrokerError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::Closed);
        }

        let (tx, rx) = mpsc::channel(SUBSCRIBER_INBOX_CAPACITY);
        let id = Uuid::new_v4();

        let mut topics = self.inner.topics.write();
        let state = topics.entry(topic.to_string()).or_default();

        for mid in state.queue.clone() {
            if let Some(pending) = state.pending.get(&mid) {
                let _ = tx.try_send(pending.message.payload.clone());
            }
        }
        state.payload_subscribers.push(PayloadSubscriber { id, sender: tx });

        Ok((
            rx,
            Unsubscribe {
                inner: Arc::clone(&self.inner),
                topic: topic.to_string(),
                id,
                kind: SubscriberKind::Payload,
                done: AtomicBool::new(false),
            },
        ))
    }

    /// Subscribe to acknowledged messages on `topic`.
    pub fn subscribe_with_ack(&self, topic: &str) -> Result<(AckStream, Unsubscribe), BrokerError> {
        if self.inner.closed.load(Ordering::SeqCst) {
            return Err(BrokerError::Closed);
        }

        let (tx, rx) = mpsc::channel(SUBSCRIBER_INBOX_CAPACITY);
        let id = Uuid::new_v4();

        let mut topics = self.inner.topics.write();
        let state = topics.entry(topic.to_string()).or_default();

        for mid in state.queue.clone() {
            if let Some(pending) = state.pending.get(&mid) {
                let _ = tx.try_send(pending.message.clone());
            }
        }
        state.ack_subscribers.push(AckSubscriber { id, sender: tx });

        Ok((
            rx,
            Unsubscribe {
                inner: Arc::clone(&self.inner),
                topic: topic.to_string(),
                id,
                kind: SubscriberKind::Ack,
                done: AtomicBool::new(false),
            },
        ))
    }

    /// Tear down the broker: stop the timeout worker and close every
    /// subscriber's inbox. Idempotent.
    pub fn close(&self) {
        if self.inner.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        let _ = self.inner.shutdown_tx.send(true);
        let mut topics = self.inner.topics.write();
        for state in topics.values_mut() {
            state.payload_subscribers.clear();
            state.ack_subscribers.clear();
        }
    }

    /// Point-in-time statistics for every topic.
    pub fn get_stats(&self) -> Snapshot {
        let topics = self.inner.topics.read();
        let mut snapshot = Snapshot::default();
        for (name, state) in topics.iter() {
            snapshot.topics.insert(
                name.clone(),
                TopicStats {
                    queue_size: state.queue.len(),
                    subscriber_count: state.subscriber_count(),
                    pending_messages: state.pending.len(),
                },
            );
        }
        snapshot
    }

    /// Names of every topic that has been published to or subscribed on.
    pub fn get_topics(&self) -> Vec<String> {
        self.inner.topics.read().keys().cloned().collect()
    }

    /// Current queue size for `topic`, or 0 if the topic does not exist.
    pub fn get_queue_size(&self, topic: &str) -> usize {
        self.inner
            .topics
            .read()
            .get(topic)
            .map(|s| s.queue.len())
            .unwrap_or(0)
    }

    /// Current subscriber count for `topic`, or 0 if the topic does not exist.
    pub fn get_subscriber_count(&self, topic: &str) -> usize {
        self.inner
            .topics
            .read()
            .get(topic)
            .map(|s| s.subscriber_count())
            .unwrap_or(0)
    }
}

/// Offer `payload`/`message` to every current subscriber of `state`,
/// non-blockingly. A full inbox silently drops the delivery; the timeout
/// worker is the sole redelivery mechanism for ack-class subscribers.
fn dispatch(state: &TopicState, payload: &[u8], message: &Message) {
    for sub in &state.payload_subscribers {
        let _ = sub.sender.try_send(payload.to_vec());
    }
    for sub in &state.ack_subscribers {
        let _ = sub.sender.try_send(message.clone());
    }
}

fn spawn_timeout_worker(inner: Arc<BrokerInner>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(TIMEOUT_SCAN_INTERVAL);
        loop {
            tokio::select! {
                _ = interval.tick() => scan_for_timeouts(&inner),
                _ = shutdown.changed() => {
                    if *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
    })
}

fn scan_for_timeouts(inner: &Arc<BrokerInner>) {
    let now = Utc::now();
    let ack_timeout = inner.config.ack_timeout;
    let max_retries = inner.config.max_retries;

    let mut topics = inner.topics.write();
    for state in topics.values_mut() {
        let expired: Vec<String> = state
            .pending
            .values()
            .filter(|pm| {
                now.signed_duration_since(pm.last_delivered_at)
                    .to_std()
                    .map(|elapsed| elapsed > ack_timeout)
                    .unwrap_or(false)
            })
            .map(|pm| pm.message_id.clone())
            .collect();

        for message_id in expired {
            let should_drop = {
                let Some(pm) = state.pending.get(&message_id) else {
                    continue;
                };
                pm.retries >= max_retries
            };

            if should_drop {
                remove_pending(state, &message_id);
                tracing::warn!(message_id, "dropping message after max retries");
                continue;
            }

            let Some((payload, message)) = state.pending.get_mut(&message_id).map(|pm| {
                pm.retries += 1;
                pm.last_delivered_at = now;
                (pm.message.payload.clone(), pm.message.clone())
            }) else {
                continue;
            };
            dispatch(state, &payload, &message);
            tracing::debug!(message_id, "redelivered message after ack timeout");
        }
    }
}

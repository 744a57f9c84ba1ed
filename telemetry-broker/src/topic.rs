//! Per-topic registry state.
//!
//! [`TopicState`] holds everything the broker's single reader/writer lock
//! protects for one topic: its subscribers, its ordered pending-message
//! queue, and the pending-message table keyed by id. The queue and the
//! table are kept in lockstep by [`remove_pending`]: a pending message
//! exists iff it is reachable from both.

// Layer 1: Standard library imports
use std::collections::HashMap;

// Layer 2: Third-party crate imports
use chrono::{DateTime, Utc};
use tokio::sync::mpsc;
use uuid::Uuid;

// Layer 3: Internal module imports
use crate::message::Message;

/// A message awaiting acknowledgment (or retry exhaustion) on a topic.
#[derive(Debug, Clone)]
pub struct PendingMessage {
    /// Unique id assigned to this message at publish time.
    pub message_id: String,
    /// Topic this message was published to.
    pub topic: String,
    /// The message as delivered to ack-class subscribers.
    pub message: Message,
    /// When the message was first published.
    pub first_enqueued_at: DateTime<Utc>,
    /// When the message was last (re)delivered.
    pub last_delivered_at: DateTime<Utc>,
    /// Number of redeliveries attempted so far.
    pub retries: u32,
    /// Current position of `message_id` in the topic's ordered queue.
    pub queue_index: usize,
}

/// A payload-only subscriber: receives raw bytes, cannot acknowledge.
pub(crate) struct PayloadSubscriber {
    pub id: Uuid,
    pub sender: mpsc::Sender<Vec<u8>>,
}

/// An acknowledged-class subscriber: receives the full message plus ack.
pub(crate) struct AckSubscriber {
    pub id: Uuid,
    pub sender: mpsc::Sender<Message>,
}

/// Registry state for a single topic, owned by the broker's single lock.
#[derive(Default)]
pub(crate) struct TopicState {
    pub payload_subscribers: Vec<PayloadSubscriber>,
    pub ack_subscribers: Vec<AckSubscriber>,
    /// Ordered message ids; position is the authoritative `queue_index`.
    pub queue: Vec<String>,
    pub pending: HashMap<String, PendingMessage>,
}

impl TopicState {
    pub fn subscriber_count(&self) -> usize {
        self.payload_subscribers.len() + self.ack_subscribers.len()
    }
}

/// Remove a pending message from both the queue and the pending table,
/// using swap-to-last-then-truncate so removal is O(1) given a known index.
///
/// Returns `None` if `message_id` is not (or no longer) pending: this makes
/// the caller's acknowledgment idempotent for free, since a second removal
/// attempt on an already-removed id is simply a no-op.
pub(crate) fn remove_pending(state: &mut TopicState, message_id: &str) -> Option<PendingMessage> {
    let removed = state.pending.remove(message_id)?;
    let index = removed.queue_index;
    let last = state.queue.len() - 1;
    state.queue.swap(index, last);
    state.queue.pop();

    if index < state.queue.len() {
        let moved_id = state.queue[index].clone();
        if let Some(moved) = state.pending.get_mut(&moved_id) {
            moved.queue_index = index;
        }
    }

    Some(removed)
}

/// Append a newly published message to the queue and pending table.
pub(crate) fn insert_pending(state: &mut TopicState, pending: PendingMessage) {
    state.queue.push(pending.message_id.clone());
    state.pending.insert(pending.message_id.clone(), pending);
}


#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod proptests {
    use super::*;
    use crate::message::Ack;
    use proptest::prelude::*;

    fn pending(id: &str, topic: &str, index: usize) -> PendingMessage {
        PendingMessage {
            message_id: id.to_string(),
            topic: topic.to_string(),
            message: Message {
                payload: vec![],
                ack: Ack::new(|| {}),
            },
            first_enqueued_at: Utc::now(),
            last_delivered_at: Utc::now(),
            retries: 0,
            queue_index: index,
        }
    }

    #[derive(Debug, Clone)]
    enum Op {
        Insert,
        Remove(usize),
    }

    fn op_strategy() -> impl Strategy<Value = Op> {
        prop_oneof![
            Just(Op::Insert),
            (0usize..64).prop_map(Op::Remove),
        ]
    }

    fn assert_lockstep(state: &TopicState) {
        let queue_ids: std::collections::HashSet<_> = state.queue.iter().cloned().collect();
        let pending_ids: std::collections::HashSet<_> = state.pending.keys().cloned().collect();
        assert_eq!(queue_ids, pending_ids);
        for (idx, id) in state.queue.iter().enumerate() {
            assert_eq!(state.pending[id].queue_index, idx);
        }
    }

    proptest! {
        /// For any interleaving of inserts and removes (by position modulo
        /// current queue length), the queue and pending table stay in
        /// lockstep: same id set, and every id's stored `queue_index`
        /// matches its actual position.
        #[test]
        fn queue_and_pending_always_agree(ops in prop::collection::vec(op_strategy(), 0..200)) {
            let mut state = TopicState::default();
            let mut next_id: usize = 0;

            for op in ops {
                match op {
                    Op::Insert => {
                        let id = format!("m-{next_id}");
                        next_id += 1;
                        let len = state.queue.len();
                        insert_pending(&mut state, pending(&id, "t", len));
                    }
                    Op::Remove(n) => {
                        if !state.queue.is_empty() {
                            let id = state.queue[n % state.queue.len()].clone();
                            remove_pending(&mut state, &id);
                        }
                    }
                }
                assert_lockstep(&state);
            }
        }
    }
}

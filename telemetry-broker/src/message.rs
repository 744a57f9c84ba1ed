//! Wire message type and the broker-owned acknowledgment handle.

// Layer 1: Standard library imports
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// An acknowledgment handle owned by the broker.
///
/// Invoking [`Ack::ack`] more than once is a no-op: only the first
/// invocation triggers the broker's internal bookkeeping (removal from the
/// pending-message table). Clones share the same underlying flag, so any
/// subscriber holding a clone of a delivered message's ack can acknowledge
/// it on behalf of all of them.
#[derive(Clone)]
pub struct Ack {
    triggered: Arc<AtomicBool>,
    callback: Arc<dyn Fn() + Send + Sync>,
}

impl Ack {
    /// Construct an ack handle that invokes `callback` on its first call.
    pub fn new(callback: impl Fn() + Send + Sync + 'static) -> Self {
        Self {
            triggered: Arc::new(AtomicBool::new(false)),
            callback: Arc::new(callback),
        }
    }

    /// Acknowledge the message. Idempotent: only the first call has effect.
    pub fn ack(&self) {
        if self.triggered.swap(true, Ordering::SeqCst) {
            return;
        }
        (self.callback)();
    }

    /// Whether this ack has already been triggered.
    pub fn is_acked(&self) -> bool {
        self.triggered.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for Ack {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ack")
            .field("acked", &self.is_acked())
            .finish()
    }
}

/// A message delivered to an acknowledged-class subscriber.
#[derive(Clone, Debug)]
pub struct Message {
    /// Opaque message payload.
    pub payload: Vec<u8>,
    /// Broker-owned acknowledgment handle.
    pub ack: Ack,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    #[test]
    fn ack_invokes_callback_once() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let ack = Ack::new(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });

        ack.ack();
        ack.ack();
        ack.ack();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn clones_share_triggered_state() {
        let calls = Arc::new(AtomicUsize::new(0));
        let calls_clone = Arc::clone(&calls);
        let ack = Ack::new(move || {
            calls_clone.fetch_add(1, Ordering::SeqCst);
        });
        let cloned = ack.clone();

        ack.ack();
        cloned.ack();

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(cloned.is_acked());
    }
}

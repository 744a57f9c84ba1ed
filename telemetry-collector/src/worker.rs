//! The worker pool: independent tasks consuming acknowledged broker
//! messages, decoding, persisting, and indexing telemetry.

// Layer 1: Standard library imports
use std::sync::Arc;

// Layer 2: Third-party crate imports
use parking_lot::Mutex;
use tokio::sync::watch;
use tokio::task::JoinHandle;

// Layer 3: Internal module imports
use crate::config::{CollectorConfig, CHECKPOINT_BATCH};
use crate::ring::RingIndex;
use crate::telemetry::decode;
use telemetry_broker::{Broker, Unsubscribe};
use telemetry_storage::{AppendLogWriter, CheckpointStore};

/// Owns the collector's worker pool, ring index, and persistence handles.
///
/// Each worker is an independent subscriber to the broker's ack stream —
/// there is no per-group load balancing, so every worker observes every
/// published message (mirroring the broker's fan-out-to-every-subscriber
/// delivery policy).
pub struct Collector {
    ring: Arc<RingIndex>,
    config: CollectorConfig,
    shutdown_tx: watch::Sender<bool>,
    handles: Mutex<Vec<JoinHandle<()>>>,
    unsubscribes: Mutex<Vec<Unsubscribe>>,
}

impl Collector {
    /// Start `config.workers` worker tasks against `broker`.
    pub fn start(broker: Broker, config: CollectorConfig) -> Result<Arc<Self>, telemetry_broker::BrokerError> {
        let ring = Arc::new(RingIndex::new(config.max_entries_per_gpu));
        let log_writer = Arc::new(AppendLogWriter::new(config.data_dir.clone()));
        let checkpoint_store = config
            .checkpoint_enabled
            .then(|| Arc::new(CheckpointStore::new(config.checkpoint_dir.clone())));

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let mut handles = Vec::with_capacity(config.workers);
        let mut unsubscribes = Vec::with_capacity(config.workers);

        for index in 0..config.workers {
            let name = format!("worker-{index}");
            let (stream, unsub) = broker.subscribe_with_ack(&config.mq_topic)?;
            unsubscribes.push(unsub);

            let handle = tokio::spawn(run_worker(
                name,
                stream,
                Arc::clone(&ring),
                Arc::clone(&log_writer),
                checkpoint_store.clone(),
                shutdown_rx.clone(),
            ));
            handles.push(handle);
        }

        Ok(Arc::new(Self {
            ring,
            config,
            shutdown_tx,
            handles: Mutex::new(handles),
            unsubscribes: Mutex::new(unsubscribes),
        }))
    }

    /// The ring index backing this collector's query surface.
    pub fn ring(&self) -> &Arc<RingIndex> {
        &self.ring
    }

    /// This collector's configuration.
    pub fn config(&self) -> &CollectorConfig {
        &self.config
    }

    /// Signal every worker to stop, unsubscribe from the broker, and wait
    /// for all worker tasks to exit.
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(true);

        for unsub in self.unsubscribes.lock().drain(..) {
            unsub.unsubscribe();
        }

        let handles = std::mem::take(&mut *self.handles.lock());
        for handle in handles {
            let _ = handle.await;
        }
    }
}

async fn run_worker(
    name: String,
    mut stream: telemetry_broker::AckStream,
    ring: Arc<RingIndex>,
    log_writer: Arc<AppendLogWriter>,
    checkpoint_store: Option<Arc<CheckpointStore>>,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut acked_since_checkpoint: u64 = 0;

    loop {
        tokio::select! {
            _ = shutdown.changed() => {
                if *shutdown.borrow() {
                    break;
                }
            }
            received = stream.recv() => {
                let Some(message) = received else {
                    break;
                };

                match decode(&message.payload) {
                    Ok(telemetry) => {
                        if let Err(err) = log_writer.append(&telemetry.gpu_id, &telemetry) {
                            tracing::warn!(
                                error = %err,
                                gpu_id = %telemetry.gpu_id,
                                "failed to persist telemetry log; continuing with in-memory index"
                            );
                        }

                        ring.store(telemetry);
                        message.ack.ack();
                        acked_since_checkpoint += 1;

                        if acked_since_checkpoint >= CHECKPOINT_BATCH {
                            if let Some(store) = &checkpoint_store {
                                if let Err(err) = store.update_processed_count(&name, acked_since_checkpoint) {
                                    tracing::warn!(error = %err, worker = %name, "failed to persist checkpoint");
                                }
                            }
                            acked_since_checkpoint = 0;
                        }
                    }
                    Err(err) => {
                        tracing::warn!(error = %err, worker = %name, "failed to decode telemetry message, leaving unacked");
                    }
                }
            }
        }
    }
}

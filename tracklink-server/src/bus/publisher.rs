use std::sync::Arc;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::warn;
use tracklink_core::OutboundRecord;

use super::BusProducer;

struct QueuedRecord {
    topic: &'static str,
    payload: Vec<u8>,
}

/// The single shared sink every session publishes through. `publish`
/// never blocks the caller's read loop: it enqueues onto a bounded
/// channel and returns immediately, dropping (with a log) on a full
/// channel or a dead bus-writer task rather than spawning a detached
/// task per publish.
#[derive(Clone)]
pub struct Publisher {
    tx: mpsc::Sender<QueuedRecord>,
}

impl Publisher {
    /// Spawn the bus-writer task that owns `producer` and drains the
    /// channel, returning the shared handle and a join handle for the
    /// writer task.
    pub fn spawn(producer: Arc<dyn BusProducer>, capacity: usize) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::channel::<QueuedRecord>(capacity);
        let handle = tokio::spawn(async move {
            while let Some(msg) = rx.recv().await {
                if let Err(e) = producer.send(msg.topic, msg.payload).await {
                    warn!(topic = msg.topic, error = %e, "bus send failed, dropping record");
                }
            }
        });
        (Self { tx }, handle)
    }

    /// Enrich-then-enqueue. `imei`/`timestamp` are already set by the
    /// normalizer on every [`OutboundRecord`] it builds; this only
    /// enforces the invariant that a record with no `imei` never reaches
    /// the bus, logging a warning and dropping it instead.
    pub fn publish(&self, record: OutboundRecord) {
        if record.imei().is_empty() {
            warn!(topic = record.topic(), "dropping record with no imei");
            return;
        }
        let topic = record.topic();
        let payload = match record.to_json_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(topic, error = %e, "failed to serialize record, dropping");
                return;
            }
        };
        match self.tx.try_send(QueuedRecord { topic, payload }) {
            Ok(()) => {}
            Err(mpsc::error::TrySendError::Full(_)) => {
                warn!(topic, "bus channel full, dropping record");
            }
            Err(mpsc::error::TrySendError::Closed(_)) => {
                warn!(topic, "bus writer task gone, dropping record");
            }
        }
    }
}

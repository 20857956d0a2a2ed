use async_trait::async_trait;
use tokio::sync::mpsc;

use super::BusProducer;
use crate::error::BusError;

/// Test double that forwards every send to an unbounded channel instead
/// of a real broker, so tests can assert on exactly what was published
/// without standing up a Kafka cluster.
pub struct RecordingBusProducer {
    tx: mpsc::UnboundedSender<(&'static str, Vec<u8>)>,
}

impl RecordingBusProducer {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<(&'static str, Vec<u8>)>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

#[async_trait]
impl BusProducer for RecordingBusProducer {
    async fn send(&self, topic: &'static str, payload: Vec<u8>) -> Result<(), BusError> {
        self.tx.send((topic, payload)).map_err(|_| BusError::Send("recording channel closed".into()))
    }
}

//! The message bus boundary. [`BusProducer`] is the seam tests substitute
//! a recording implementation at (captures everything published to an
//! `mpsc::UnboundedReceiver<Vec<u8>>` instead of touching a broker);
//! [`KafkaBusProducer`] is the production implementation.

mod kafka;
mod publisher;
mod recording;

pub use kafka::KafkaBusProducer;
pub use publisher::Publisher;
pub use recording::RecordingBusProducer;

use async_trait::async_trait;

use crate::error::BusError;

/// A sink for serialized records on a named topic. `send` must be safe to
/// call concurrently from the single bus-writer task that owns it — the
/// publisher never calls it from more than one task at a time, but the
/// trait itself makes no such promise to implementors.
#[async_trait]
pub trait BusProducer: Send + Sync {
    async fn send(&self, topic: &'static str, payload: Vec<u8>) -> Result<(), BusError>;
}

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::util::Timeout;

use super::BusProducer;
use crate::error::BusError;

/// Production bus producer built on `rdkafka`'s `FutureProducer`.
pub struct KafkaBusProducer {
    producer: FutureProducer,
}

impl KafkaBusProducer {
    pub fn new(brokers: &str) -> Result<Self, BusError> {
        let producer = ClientConfig::new()
            .set("bootstrap.servers", brokers)
            .set("message.timeout.ms", "5000")
            .create()
            .map_err(|e| BusError::Construct(e.to_string()))?;
        Ok(Self { producer })
    }
}

#[async_trait]
impl BusProducer for KafkaBusProducer {
    async fn send(&self, topic: &'static str, payload: Vec<u8>) -> Result<(), BusError> {
        let record: FutureRecord<'_, str, [u8]> = FutureRecord::to(topic).payload(&payload);
        self.producer
            .send(record, Timeout::After(Duration::from_secs(0)))
            .await
            .map(|_| ())
            .map_err(|(err, _owned)| BusError::Send(err.to_string()))
    }
}

//! Inventory event producer
//!
//! Publishes events in the same JSON shape the decoder accepts, keyed by
//! seller id so one seller's events stay on one partition.

use super::KafkaConnection;
use crate::error::PublishError;
use crate::events::InventoryEvent;
use async_trait::async_trait;
use rdkafka::producer::{FutureProducer, FutureRecord};
use std::time::Duration;
use tracing::{error, info};

#[async_trait]
pub trait EventPublisher: Send + Sync {
    async fn publish(&self, event: &InventoryEvent) -> Result<(), PublishError>;
}

pub struct InventoryEventProducer {
    producer: FutureProducer,
    topic: String,
    delivery_timeout: Duration,
}

impl InventoryEventProducer {
    pub fn new(connection: &KafkaConnection, topic: &str) -> Result<Self, PublishError> {
        let producer: FutureProducer = connection
            .client_config()
            .set("enable.idempotence", "true")
            .set("acks", "all")
            .set("message.timeout.ms", "30000")
            .create()
            .map_err(|e| PublishError::Config(e.to_string()))?;

        info!(topic = %topic, "Inventory event producer initialized");

        Ok(Self {
            producer,
            topic: topic.to_string(),
            delivery_timeout: Duration::from_secs(30),
        })
    }
}

#[async_trait]
impl EventPublisher for InventoryEventProducer {
    async fn publish(&self, event: &InventoryEvent) -> Result<(), PublishError> {
        let payload = serde_json::to_string(&event.to_wire())?;
        let key = event.seller_id().unwrap_or_default().to_string();

        let record = FutureRecord::to(&self.topic).key(&key).payload(&payload);

        match self.producer.send(record, self.delivery_timeout).await {
            Ok((partition, offset)) => {
                info!(
                    event = event.name(),
                    seller_id = %key,
                    partition = partition,
                    offset = offset,
                    "Published inventory event"
                );
                Ok(())
            }
            Err((err, _)) => {
                error!(
                    event = event.name(),
                    seller_id = %key,
                    error = %err,
                    "Failed to publish inventory event"
                );
                Err(PublishError::Delivery {
                    topic: self.topic.clone(),
                    message: err.to_string(),
                })
            }
        }
    }
}

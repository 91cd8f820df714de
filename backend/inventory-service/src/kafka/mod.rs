//! Event log integration
//!
//! - `source`: batch-pulling event sources (Kafka, in-memory channel)
//! - `consumer`: the consumer loop with reconnect and health state
//! - `producer`: publishing inventory events

pub mod consumer;
pub mod producer;
pub mod source;

pub use consumer::{ConsumerState, InventoryConsumer};
pub use producer::{EventPublisher, InventoryEventProducer};
pub use source::{
    ChannelEventSender, ChannelEventSource, ChannelSourceProbe, EventSource, KafkaEventSource,
    KafkaSourceConfig, RawEvent,
};

use crate::config::Config;
use rdkafka::ClientConfig;

/// Connection settings shared by consumers and producers, including SASL
/// for the Event Hubs Kafka endpoint
#[derive(Debug, Clone, Default)]
pub struct KafkaConnection {
    pub brokers: String,
    pub security_protocol: Option<String>,
    pub sasl_mechanism: Option<String>,
    pub sasl_username: Option<String>,
    pub sasl_password: Option<String>,
}

impl KafkaConnection {
    pub fn from_config(config: &Config) -> Self {
        Self {
            brokers: config.kafka_brokers.clone(),
            security_protocol: config.kafka_security_protocol.clone(),
            sasl_mechanism: config.kafka_sasl_mechanism.clone(),
            sasl_username: config.kafka_sasl_username.clone(),
            sasl_password: config.kafka_sasl_password.clone(),
        }
    }

    pub fn client_config(&self) -> ClientConfig {
        let mut client = ClientConfig::new();
        client.set("bootstrap.servers", &self.brokers);

        if let Some(protocol) = &self.security_protocol {
            client.set("security.protocol", protocol);
        }
        if let Some(mechanism) = &self.sasl_mechanism {
            client.set("sasl.mechanism", mechanism);
        }
        if let (Some(username), Some(password)) = (&self.sasl_username, &self.sasl_password) {
            client.set("sasl.username", username);
            client.set("sasl.password", password);
        }
        client
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sasl_settings_are_applied() {
        let connection = KafkaConnection {
            brokers: "ns.servicebus.windows.net:9093".into(),
            security_protocol: Some("SASL_SSL".into()),
            sasl_mechanism: Some("PLAIN".into()),
            sasl_username: Some("$ConnectionString".into()),
            sasl_password: Some("Endpoint=sb://ns/".into()),
        };
        let client = connection.client_config();
        assert_eq!(client.get("security.protocol"), Some("SASL_SSL"));
        assert_eq!(client.get("sasl.mechanism"), Some("PLAIN"));
        assert_eq!(client.get("sasl.username"), Some("$ConnectionString"));
    }

    #[test]
    fn test_plaintext_by_default() {
        let client = KafkaConnection {
            brokers: "localhost:9092".into(),
            ..Default::default()
        }
        .client_config();
        assert_eq!(client.get("bootstrap.servers"), Some("localhost:9092"));
        assert_eq!(client.get("security.protocol"), None);
    }
}

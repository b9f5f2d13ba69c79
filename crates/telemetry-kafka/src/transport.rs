//! [`Transport`] implementation over a shared rdkafka producer.

use crate::error::KafkaTransportError;
use async_trait::async_trait;
use device_simulator::{Transport, TransportFactory};
use rdkafka::message::{Header, OwnedHeaders};
use rdkafka::producer::{FutureProducer, FutureRecord};
use rdkafka::ClientConfig;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// How long a send may wait for room in the producer queue.
pub const SEND_TIMEOUT: Duration = Duration::from_secs(30);

const BOOTSTRAP_SERVERS: &str = "bootstrap.servers";

/// A record waiting to be produced.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KafkaMessage {
    pub payload: Vec<u8>,
    pub headers: Vec<(String, String)>,
    pub key: Option<String>,
}

impl KafkaMessage {
    fn owned_headers(&self) -> OwnedHeaders {
        self.headers
            .iter()
            .fold(OwnedHeaders::new_with_capacity(self.headers.len()), |acc, (key, value)| {
                acc.insert(Header {
                    key,
                    value: Some(value.as_bytes()),
                })
            })
    }
}

/// Builds one [`KafkaTransport`] per device, all sharing a producer.
#[derive(Clone)]
pub struct KafkaTransportFactory {
    producer: FutureProducer,
    topic: Arc<str>,
}

impl KafkaTransportFactory {
    /// Create the shared producer from librdkafka connection properties.
    pub fn new(
        properties: &BTreeMap<String, String>,
        topic: &str,
    ) -> Result<Self, KafkaTransportError> {
        if topic.trim().is_empty() {
            return Err(KafkaTransportError::MissingTopic);
        }
        if !properties.contains_key(BOOTSTRAP_SERVERS) {
            return Err(KafkaTransportError::MissingBootstrapServers);
        }

        let mut config = ClientConfig::new();
        for (key, value) in properties {
            config.set(key, value);
        }
        let producer: FutureProducer = config.create().map_err(KafkaTransportError::Create)?;

        info!(topic, servers = %properties[BOOTSTRAP_SERVERS], "Created Kafka producer");
        Ok(Self {
            producer,
            topic: Arc::from(topic),
        })
    }

    /// Topic every device publishes to.
    pub fn topic(&self) -> &str {
        &self.topic
    }
}

impl TransportFactory for KafkaTransportFactory {
    type Transport = KafkaTransport;
    type Error = std::convert::Infallible;

    fn create(&self, device_id: &str) -> Result<Self::Transport, Self::Error> {
        Ok(KafkaTransport {
            device_id: device_id.to_string(),
            producer: self.producer.clone(),
            topic: Arc::clone(&self.topic),
        })
    }
}

/// Per-device handle onto the shared producer.
pub struct KafkaTransport {
    device_id: String,
    producer: FutureProducer,
    topic: Arc<str>,
}

#[async_trait]
impl Transport for KafkaTransport {
    type Message = KafkaMessage;
    type Error = KafkaTransportError;

    async fn open(&mut self) -> Result<(), Self::Error> {
        // The producer connects lazily on first send
        debug!(device_id = %self.device_id, topic = %self.topic, "Kafka transport ready");
        Ok(())
    }

    fn build_message(&self, payload: Vec<u8>) -> Self::Message {
        KafkaMessage {
            payload,
            ..Default::default()
        }
    }

    fn set_property(&self, message: &mut Self::Message, key: &str, value: &str) {
        message.headers.push((key.to_string(), value.to_string()));
    }

    fn set_partition_key(&self, message: &mut Self::Message, key: &str) {
        message.key = Some(key.to_string());
    }

    async fn send(
        &self,
        message: &Self::Message,
        cancel: &CancellationToken,
    ) -> Result<(), Self::Error> {
        let mut record = FutureRecord::to(&self.topic)
            .payload(&message.payload)
            .headers(message.owned_headers());
        if let Some(key) = &message.key {
            record = record.key(key.as_bytes());
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(KafkaTransportError::Cancelled),
            result = self.producer.send(record, SEND_TIMEOUT) => result
                .map(|_| ())
                .map_err(|(source, _)| KafkaTransportError::Delivery {
                    topic: self.topic.to_string(),
                    source,
                }),
        }
    }

    fn is_transient(&self, error: &Self::Error) -> bool {
        error.is_transient()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rdkafka::message::Headers;

    fn properties() -> BTreeMap<String, String> {
        BTreeMap::from([(
            "bootstrap.servers".to_string(),
            "localhost:9092".to_string(),
        )])
    }

    #[test]
    fn test_missing_bootstrap_servers_rejected() {
        let result = KafkaTransportFactory::new(&BTreeMap::new(), "telemetry");
        assert!(matches!(
            result,
            Err(KafkaTransportError::MissingBootstrapServers)
        ));
    }

    #[test]
    fn test_empty_topic_rejected() {
        let result = KafkaTransportFactory::new(&properties(), " ");
        assert!(matches!(result, Err(KafkaTransportError::MissingTopic)));
    }

    #[test]
    fn test_headers_follow_properties() {
        let message = KafkaMessage {
            payload: b"{}".to_vec(),
            headers: vec![
                ("myPropertyKey".to_string(), "My Property Value".to_string()),
                ("device".to_string(), "sim000001".to_string()),
            ],
            key: None,
        };
        let headers = message.owned_headers();
        assert_eq!(headers.count(), 2);
        let first = headers.get(0);
        assert_eq!(first.key, "myPropertyKey");
        assert_eq!(first.value, Some(&b"My Property Value"[..]));
        assert_eq!(headers.get(1).value, Some(&b"sim000001"[..]));
    }

    #[tokio::test]
    async fn test_properties_and_key_land_on_message() {
        // Creating a producer does not contact the broker
        let factory = KafkaTransportFactory::new(&properties(), "telemetry").unwrap();
        let transport = factory.create("sim000001").unwrap();

        let mut message = transport.build_message(b"payload".to_vec());
        transport.set_property(&mut message, "a", "b");
        transport.set_partition_key(&mut message, "sim000001");

        assert_eq!(message.payload, b"payload");
        assert_eq!(message.headers, vec![("a".to_string(), "b".to_string())]);
        assert_eq!(message.key.as_deref(), Some("sim000001"));
        assert_eq!(factory.topic(), "telemetry");
    }
}

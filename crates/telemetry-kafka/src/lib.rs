//! Kafka transport for the IoT telemetry simulator.
//!
//! All devices share one [`rdkafka::producer::FutureProducer`] and publish to
//! a single topic. Message properties become Kafka record headers and the
//! partition key becomes the record key.

pub mod error;
pub mod transport;

// Re-exports for convenience
pub use error::KafkaTransportError;
pub use transport::{KafkaMessage, KafkaTransport, KafkaTransportFactory, SEND_TIMEOUT};

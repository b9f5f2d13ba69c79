use rdkafka::error::{KafkaError, RDKafkaErrorCode};

/// Errors raised by the Kafka transport.
#[derive(Debug, thiserror::Error)]
pub enum KafkaTransportError {
    /// No `bootstrap.servers` among the connection properties
    #[error("Kafka connection properties must include bootstrap.servers")]
    MissingBootstrapServers,

    /// Topic was empty
    #[error("Kafka topic must not be empty")]
    MissingTopic,

    /// Producer could not be created from the connection properties
    #[error("Failed to create Kafka producer: {0}")]
    Create(#[source] KafkaError),

    /// Delivery failed
    #[error("Failed to deliver message to topic '{topic}': {source}")]
    Delivery {
        topic: String,
        #[source]
        source: KafkaError,
    },

    /// Send gave up because the run was cancelled
    #[error("Send cancelled")]
    Cancelled,
}

impl KafkaTransportError {
    /// Whether the underlying broker error is worth an immediate retry.
    pub fn is_transient(&self) -> bool {
        match self {
            KafkaTransportError::Delivery { source, .. } => {
                source.rdkafka_error_code().is_some_and(is_transient_code)
            }
            _ => false,
        }
    }
}

fn is_transient_code(code: RDKafkaErrorCode) -> bool {
    matches!(
        code,
        RDKafkaErrorCode::QueueFull
            | RDKafkaErrorCode::MessageTimedOut
            | RDKafkaErrorCode::RequestTimedOut
            | RDKafkaErrorCode::BrokerTransportFailure
            | RDKafkaErrorCode::AllBrokersDown
            | RDKafkaErrorCode::NetworkException
            | RDKafkaErrorCode::LeaderNotAvailable
            | RDKafkaErrorCode::NotLeaderForPartition
            | RDKafkaErrorCode::NotEnoughReplicas
    )
}

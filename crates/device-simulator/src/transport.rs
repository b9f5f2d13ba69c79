//! Transport seam between the device loop and a physical message sink.

use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

/// A message sink for one simulated device.
///
/// Implementations decide their own connection sharing; the device loop only
/// requires that a single device never has two sends in flight, which it
/// guarantees itself.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Transport-specific message envelope
    type Message: Send + Sync;

    /// Transport error
    type Error: std::error::Error + Send + Sync + 'static;

    /// Open the connection. Called once before the first send.
    async fn open(&mut self) -> Result<(), Self::Error>;

    /// Wrap payload bytes into a message.
    fn build_message(&self, payload: Vec<u8>) -> Self::Message;

    /// Attach a string property (header) to a message.
    fn set_property(&self, message: &mut Self::Message, key: &str, value: &str);

    /// Attach a partition key to a message. Ignored by default.
    fn set_partition_key(&self, _message: &mut Self::Message, _key: &str) {}

    /// Send one message. Implementations should give up promptly once
    /// `cancel` fires.
    async fn send(&self, message: &Self::Message, cancel: &CancellationToken)
        -> Result<(), Self::Error>;

    /// Whether an error may be retried without backoff.
    fn is_transient(&self, error: &Self::Error) -> bool;
}

/// Creates one transport per device.
pub trait TransportFactory {
    /// Transport produced by this factory
    type Transport: Transport;

    /// Factory error
    type Error: std::error::Error + Send + Sync + 'static;

    /// Create the transport for `device_id`.
    fn create(&self, device_id: &str) -> Result<Self::Transport, Self::Error>;
}

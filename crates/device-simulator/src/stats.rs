//! Statistics sink fed by every device.

/// Counters incremented by the device loop and send policy.
///
/// Shared by all devices, so implementations must be cheap and thread-safe.
pub trait StatsSink: Send + Sync {
    /// A device opened its transport.
    fn increment_connected(&self);

    /// A device sent its full message count.
    fn increment_completed(&self);

    /// A message was sent successfully.
    fn increment_sent(&self);

    /// A send attempt failed.
    fn increment_error(&self);
}

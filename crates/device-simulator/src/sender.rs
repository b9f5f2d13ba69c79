//! Retry and send policy for one pacing iteration.
//!
//! One message is built per iteration and the same message is retried. A
//! transient failure is retried after a yield, any other failure after a
//! fixed backoff. Exhausted attempts are absorbed into the error counter.

use crate::device::Device;
use crate::stats::StatsSink;
use crate::transport::Transport;
use rand::Rng;
use std::time::Duration;
use telemetry_payload::PayloadError;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Maximum attempts per message (reset by a duplicate send).
pub const MAX_SEND_ATTEMPTS: u32 = 3;

/// Wait after a non-transient send failure.
pub const NON_TRANSIENT_BACKOFF: Duration = Duration::from_millis(5000);

/// Error type for building or sending one message.
#[derive(Debug, thiserror::Error)]
pub enum SendError {
    /// Cancellation observed while sending or backing off
    #[error("Send cancelled")]
    Cancelled,

    /// Payload selection failed
    #[error("Payload error: {0}")]
    Payload(#[from] PayloadError),

    /// Rendered header is not a flat JSON object
    #[error("Invalid header '{header}': {source}")]
    Header {
        header: String,
        #[source]
        source: serde_json::Error,
    },
}

/// Result of one send cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendOutcome {
    /// Delivered (possibly several times through duplicates)
    Sent,
    /// Every attempt failed; failures were counted
    Exhausted,
}

/// Parse a rendered header into message properties.
///
/// `null` values are skipped. Non-string values are attached as compact JSON.
pub fn parse_header(header: &str) -> Result<Vec<(String, String)>, SendError> {
    let map: serde_json::Map<String, serde_json::Value> =
        serde_json::from_str(header).map_err(|source| SendError::Header {
            header: header.to_string(),
            source,
        })?;

    Ok(map
        .into_iter()
        .filter_map(|(key, value)| match value {
            serde_json::Value::Null => None,
            serde_json::Value::String(s) => Some((key, s)),
            other => Some((key, other.to_string())),
        })
        .collect())
}

/// Sleep for `delay` unless cancelled first. Returns `false` on cancellation.
pub(crate) async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        biased;
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

impl<T: Transport> Device<T> {
    /// Build one message and deliver it under the retry policy.
    pub async fn send_message(
        &mut self,
        stats: &dyn StatsSink,
        cancel: &CancellationToken,
    ) -> Result<SendOutcome, SendError> {
        let message = self.build_message()?;

        let mut attempt = 1;
        while attempt <= MAX_SEND_ATTEMPTS {
            let result = self.transport.send(&message, cancel).await;
            match result {
                Ok(()) => {
                    stats.increment_sent();
                    if self.should_duplicate() {
                        attempt = 1;
                        continue;
                    }
                    return Ok(SendOutcome::Sent);
                }
                Err(error) => {
                    stats.increment_error();
                    let transient = self.transport.is_transient(&error);
                    debug!(
                        device_id = %self.id,
                        attempt,
                        transient,
                        error = %error,
                        "Send attempt failed"
                    );

                    if cancel.is_cancelled() {
                        return Err(SendError::Cancelled);
                    }
                    if transient {
                        tokio::task::yield_now().await;
                    } else if !sleep_or_cancel(NON_TRANSIENT_BACKOFF, cancel).await {
                        return Err(SendError::Cancelled);
                    }
                }
            }
            attempt += 1;
        }

        Ok(SendOutcome::Exhausted)
    }

    /// Select and generate the payload, then apply header and partition key.
    fn build_message(&mut self) -> Result<T::Message, SendError> {
        let (bytes, next) = self
            .plan
            .payloads
            .generate(&self.id, &self.snapshot, &mut self.rng)?;
        if let Some(next) = next {
            self.snapshot = next;
        }

        let mut message = self.transport.build_message(bytes);

        if let Some(header) = &self.plan.header {
            let rendered = header.render(&self.snapshot);
            if !rendered.trim().is_empty() {
                for (key, value) in parse_header(&rendered)? {
                    self.transport.set_property(&mut message, &key, &value);
                }
            }
        }

        if let Some(partition_key) = &self.plan.partition_key {
            let key = partition_key.render(&self.snapshot);
            if !key.trim().is_empty() {
                self.transport.set_partition_key(&mut message, &key);
            }
        }

        Ok(message)
    }

    fn should_duplicate(&mut self) -> bool {
        let every = self.plan.duplicate_every;
        every > 0 && self.rng.gen_range(0..every) == 0
    }
}

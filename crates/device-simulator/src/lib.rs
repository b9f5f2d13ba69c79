//! Device pacing loop and send policy for the IoT telemetry simulator.
//!
//! Each [`Device`] runs as its own tokio task. Per iteration it selects and
//! generates a payload, delivers it through its [`Transport`] under the
//! retry policy, then sleeps until the next scheduled send. All devices share
//! one [`SimulationPlan`], one [`StatsSink`] and one cancellation token.
//!
//! ```text
//!  Device::start ─► open ─► jitter ─┬─► send_message ─► sleep ─┐
//!                                   └──────────────────────────┘
//!                                      (message_count times)
//! ```

pub mod device;
pub mod plan;
pub mod sender;
pub mod stats;
pub mod transport;

// Re-exports for convenience
pub use device::{create_device, Device, DeviceError, DeviceState, PACING_RESET_ITERATIONS};
pub use plan::{IntervalSchedule, SimulationPlan};
pub use sender::{parse_header, SendError, SendOutcome, MAX_SEND_ATTEMPTS, NON_TRANSIENT_BACKOFF};
pub use stats::StatsSink;
pub use transport::{Transport, TransportFactory};

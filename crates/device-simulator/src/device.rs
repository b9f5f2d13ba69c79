//! Simulated device and its pacing loop.
//!
//! A device opens its transport once, waits a random jitter below its first
//! interval, then sends `message_count` messages (forever when not
//! positive). Pacing tracks the target cumulative elapsed time against a
//! monotonic clock, so per-message overhead does not add up.

use crate::plan::SimulationPlan;
use crate::sender::{sleep_or_cancel, SendError};
use crate::stats::StatsSink;
use crate::transport::{Transport, TransportFactory};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use telemetry_core::Snapshot;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

/// Iterations after which the pacing clock is restarted.
pub const PACING_RESET_ITERATIONS: u64 = 1000;

/// Lifecycle state of a device.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceState {
    NotStarted,
    Connecting,
    Running,
    Completed,
    Cancelled,
    Failed,
}

impl fmt::Display for DeviceState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DeviceState::NotStarted => write!(f, "not-started"),
            DeviceState::Connecting => write!(f, "connecting"),
            DeviceState::Running => write!(f, "running"),
            DeviceState::Completed => write!(f, "completed"),
            DeviceState::Cancelled => write!(f, "cancelled"),
            DeviceState::Failed => write!(f, "failed"),
        }
    }
}

/// Error type for device failures caught at the loop boundary.
#[derive(Debug, thiserror::Error)]
pub enum DeviceError {
    /// Transport could not be opened
    #[error("Failed to open transport: {0}")]
    Open(String),

    /// Message could not be built
    #[error(transparent)]
    Send(#[from] SendError),
}

/// One simulated device.
pub struct Device<T: Transport> {
    pub(crate) id: String,
    pub(crate) transport: T,
    pub(crate) plan: Arc<SimulationPlan>,
    pub(crate) rng: StdRng,
    pub(crate) snapshot: Snapshot,
    state: DeviceState,
}

/// Create a device, wiring its transport through the factory.
pub fn create_device<F: TransportFactory>(
    factory: &F,
    device_id: &str,
    plan: Arc<SimulationPlan>,
) -> Result<Device<F::Transport>, F::Error> {
    let transport = factory.create(device_id)?;
    Ok(Device::new(device_id, transport, plan))
}

impl<T: Transport> Device<T> {
    /// Create a device with an entropy-seeded RNG.
    pub fn new(device_id: impl Into<String>, transport: T, plan: Arc<SimulationPlan>) -> Self {
        let id = device_id.into();
        Self {
            snapshot: Snapshot::for_device(id.clone()),
            id,
            transport,
            plan,
            rng: StdRng::from_entropy(),
            state: DeviceState::NotStarted,
        }
    }

    /// Seed the device RNG for reproducible output.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = StdRng::seed_from_u64(seed);
        self
    }

    /// Device id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Current lifecycle state.
    pub fn state(&self) -> DeviceState {
        self.state
    }

    /// Latest snapshot of generated values.
    pub fn snapshot(&self) -> &Snapshot {
        &self.snapshot
    }

    /// Spawn the device loop. The task resolves to the final state.
    pub fn start(
        self,
        stats: Arc<dyn StatsSink>,
        cancel: CancellationToken,
    ) -> JoinHandle<DeviceState> {
        tokio::spawn(async move { self.run(stats.as_ref(), &cancel).await })
    }

    /// Run the device loop to completion on the current task.
    pub async fn run(mut self, stats: &dyn StatsSink, cancel: &CancellationToken) -> DeviceState {
        let state = match self.run_loop(stats, cancel).await {
            Ok(state) => state,
            Err(e) => {
                error!(device_id = %self.id, error = %e, "Device failed");
                DeviceState::Failed
            }
        };
        self.transition(state);
        state
    }

    async fn run_loop(
        &mut self,
        stats: &dyn StatsSink,
        cancel: &CancellationToken,
    ) -> Result<DeviceState, DeviceError> {
        self.transition(DeviceState::Connecting);
        let opened = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(DeviceState::Cancelled),
            result = self.transport.open() => result,
        };
        opened.map_err(|e| DeviceError::Open(e.to_string()))?;
        stats.increment_connected();
        self.transition(DeviceState::Running);

        let intervals = self.plan.intervals.for_device(&self.id).to_vec();
        let first = intervals.first().copied().unwrap_or(0);
        if first > 0 {
            let jitter = Duration::from_millis(self.rng.gen_range(0..first));
            if !sleep_or_cancel(jitter, cancel).await {
                return Ok(DeviceState::Cancelled);
            }
        }

        let message_count = self.plan.message_count;
        let mut clock = Instant::now();
        let mut target = Duration::ZERO;
        let mut iteration: u64 = 0;

        while message_count <= 0 || iteration < message_count.unsigned_abs() {
            if cancel.is_cancelled() {
                return Ok(DeviceState::Cancelled);
            }

            match self.send_message(stats, cancel).await {
                Ok(_) => {}
                Err(SendError::Cancelled) => return Ok(DeviceState::Cancelled),
                Err(e) => return Err(e.into()),
            }

            iteration += 1;
            if iteration % PACING_RESET_ITERATIONS == 0 {
                clock = Instant::now();
                target = Duration::ZERO;
            }

            let interval = intervals[((iteration - 1) % intervals.len() as u64) as usize];
            target += Duration::from_millis(interval);
            let delay = target.saturating_sub(clock.elapsed());
            if !sleep_or_cancel(delay, cancel).await {
                return Ok(DeviceState::Cancelled);
            }
        }

        stats.increment_completed();
        info!(device_id = %self.id, messages = iteration, "Device completed");
        Ok(DeviceState::Completed)
    }

    fn transition(&mut self, state: DeviceState) {
        debug!(device_id = %self.id, from = %self.state, to = %state, "Device state change");
        self.state = state;
    }
}

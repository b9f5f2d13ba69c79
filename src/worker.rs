//! Simulation worker: creates the devices, runs them and reports.

use crate::config::RunnerConfig;
use crate::console::ConsoleFactory;
use crate::stats::RunnerStats;
use crate::{RunOpts, TransportKind};
use anyhow::Context;
use device_simulator::{create_device, DeviceState, SimulationPlan, StatsSink, TransportFactory};
use futures::stream::{FuturesUnordered, StreamExt};
use std::sync::Arc;
use std::time::Duration;
use telemetry_kafka::KafkaTransportFactory;
use tokio::task::JoinError;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

/// How long devices get to stop once the run is cancelled.
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_millis(5000);

/// Outcome of a simulation run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub devices: usize,
    pub completed: usize,
    pub cancelled: usize,
    pub failed: usize,
    /// Devices still running when the shutdown wait ran out
    pub abandoned: usize,
    pub sent: u64,
    pub errors: u64,
}

impl RunSummary {
    fn record(&mut self, result: Result<DeviceState, JoinError>) {
        let state = result.unwrap_or_else(|e| {
            error!(error = %e, "Device task panicked");
            DeviceState::Failed
        });
        match state {
            DeviceState::Completed => self.completed += 1,
            DeviceState::Cancelled => self.cancelled += 1,
            _ => self.failed += 1,
        }
    }
}

/// Runs one device task per device id against a transport factory.
pub struct SimulationWorker<F: TransportFactory> {
    factory: F,
    plan: Arc<SimulationPlan>,
    device_ids: Vec<String>,
    seed: Option<u64>,
    stats: Arc<RunnerStats>,
}

impl<F: TransportFactory> SimulationWorker<F> {
    pub fn new(factory: F, plan: SimulationPlan, device_ids: Vec<String>) -> Self {
        Self {
            factory,
            plan: Arc::new(plan),
            device_ids,
            seed: None,
            stats: Arc::new(RunnerStats::new()),
        }
    }

    /// Seed device RNGs with `seed + ordinal`.
    pub fn with_seed(mut self, seed: Option<u64>) -> Self {
        self.seed = seed;
        self
    }

    /// Shared statistics.
    pub fn stats(&self) -> Arc<RunnerStats> {
        Arc::clone(&self.stats)
    }

    /// Start every device and wait for them to finish. After `cancel`
    /// fires, devices get [`SHUTDOWN_TIMEOUT`] to stop before they are
    /// abandoned.
    pub async fn run(self, cancel: CancellationToken) -> anyhow::Result<RunSummary> {
        let mut devices = Vec::with_capacity(self.device_ids.len());
        for (ordinal, device_id) in self.device_ids.iter().enumerate() {
            let device = create_device(&self.factory, device_id, Arc::clone(&self.plan))
                .with_context(|| format!("Failed to create transport for device {device_id}"))?;
            devices.push(match self.seed {
                Some(seed) => device.with_seed(seed.wrapping_add(ordinal as u64)),
                None => device,
            });
        }

        let sink: Arc<dyn StatsSink> = self.stats.clone();
        let handles: Vec<_> = devices
            .into_iter()
            .map(|device| device.start(Arc::clone(&sink), cancel.clone()))
            .collect();

        let mut summary = RunSummary {
            devices: handles.len(),
            ..Default::default()
        };

        let mut pending: FuturesUnordered<_> = handles.into_iter().collect();
        let deadline = async {
            cancel.cancelled().await;
            tokio::time::sleep(SHUTDOWN_TIMEOUT).await;
        };
        tokio::pin!(deadline);

        loop {
            tokio::select! {
                biased;
                next = pending.next() => match next {
                    Some(result) => summary.record(result),
                    None => break,
                },
                _ = &mut deadline => {
                    summary.abandoned = pending.len();
                    warn!(
                        timeout_ms = SHUTDOWN_TIMEOUT.as_millis() as u64,
                        abandoned = summary.abandoned,
                        "Devices did not stop in time, abandoning them"
                    );
                    break;
                }
            }
        }

        summary.sent = self.stats.sent();
        summary.errors = self.stats.errors();
        self.stats.log_summary();
        Ok(summary)
    }
}

/// Log the startup banner.
pub fn log_banner(config: &RunnerConfig, device_ids: &[String]) {
    let first = device_ids.first().map(String::as_str).unwrap_or_default();
    let last = device_ids.last().map(String::as_str).unwrap_or_default();
    info!("Starting simulator v{}", env!("CARGO_PKG_VERSION"));
    info!("Device count = {}", config.device_count);
    info!("Device prefix = {}", config.device_prefix);
    info!("Device 0-last = ({first}-{last})");
    info!("Device index = {}", config.device_index);
    info!("Message count = {}", config.message_count);
    info!("Interval = {}ms", config.interval);
    info!("Template = {}", config.payloads.description());
    info!(
        "Header = {}",
        config.header.as_ref().map(|h| h.text()).unwrap_or_default()
    );
}

/// Load the configuration, pick the transport and run the simulation.
pub async fn run(opts: RunOpts, cancel: CancellationToken) -> anyhow::Result<RunSummary> {
    let config = RunnerConfig::load(&opts).context("Failed to load configuration")?;
    let plan = config.plan().context("Invalid configuration")?;
    let device_ids = config.device_ids();
    log_banner(&config, &device_ids);

    let transport = config.transport_kind()?;
    info!(transport = %transport, devices = device_ids.len(), "Starting devices");

    match transport {
        TransportKind::Kafka => {
            let (properties, topic) = config
                .kafka_settings()
                .context("Kafka transport selected without Kafka settings")?;
            let factory = KafkaTransportFactory::new(properties, topic)
                .context("Failed to set up Kafka transport")?;
            SimulationWorker::new(factory, plan, device_ids)
                .with_seed(config.seed)
                .run(cancel)
                .await
        }
        TransportKind::Console => {
            SimulationWorker::new(ConsoleFactory::stdout(), plan, device_ids)
                .with_seed(config.seed)
                .run(cancel)
                .await
        }
    }
}

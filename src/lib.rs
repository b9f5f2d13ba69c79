//! IoT Telemetry Simulator
//!
//! Simulates many devices sending templated telemetry at a controlled rate.
//! Devices share one payload set, one header template and one set of
//! statistics counters; each device keeps its own generated values, random
//! source and pacing clock.
//!
//! # Architecture
//!
//! ```text
//! RunOpts + config file ─► RunnerConfig ─► SimulationPlan ─┐
//!                                                          ▼
//!              SimulationWorker ── create_device ──► Device × N ──► Transport
//!                     │                                 │          (kafka, console)
//!                     └──────────── RunnerStats ◄───────┘
//! ```
//!
//! # CLI Usage
//!
//! ```bash
//! # 10 devices printing to stdout
//! iot-telemetry-simulator --transport console --device-count 10
//!
//! # Kafka with a configuration file
//! iot-telemetry-simulator --config-file simulator.json \
//!   --kafka-connection-properties '{"bootstrap.servers":"localhost:9092"}' \
//!   --kafka-topic telemetry
//! ```

use clap::{Parser, ValueEnum};
use std::path::PathBuf;

pub mod config;
pub mod console;
pub mod stats;
pub mod worker;

// Re-exports for convenience
pub use config::{ConfigError, RunnerConfig};
pub use console::{ConsoleFactory, ConsoleTransport};
pub use stats::RunnerStats;
pub use worker::{run, RunSummary, SimulationWorker, SHUTDOWN_TIMEOUT};

/// Transport used to deliver messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum TransportKind {
    /// Kafka broker producer
    Kafka,
    /// One line per message on stdout
    Console,
}

impl std::fmt::Display for TransportKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportKind::Kafka => write!(f, "kafka"),
            TransportKind::Console => write!(f, "console"),
        }
    }
}

/// Simulation options. Every option can also be set from the environment
/// variable named after its configuration key.
#[derive(Parser, Clone, Debug, Default)]
pub struct RunOpts {
    /// JSON configuration file
    #[arg(long, env = "CONFIG_FILE")]
    pub config_file: Option<PathBuf>,

    /// Transport used to deliver messages (default: kafka when
    /// KafkaConnectionProperties is set)
    #[arg(long, value_enum)]
    pub transport: Option<TransportKind>,

    /// Seed for reproducible runs; each device uses seed + ordinal
    #[arg(long)]
    pub seed: Option<u64>,

    /// Number of simulated devices
    #[arg(long, env = "DeviceCount")]
    pub device_count: Option<u32>,

    /// First device number
    #[arg(long, env = "DeviceIndex")]
    pub device_index: Option<u32>,

    /// Device id prefix
    #[arg(long, env = "DevicePrefix")]
    pub device_prefix: Option<String>,

    /// Explicit device ids separated by ';' or ','
    #[arg(long, env = "DeviceList")]
    pub device_list: Option<String>,

    /// Messages per device; 0 or negative sends forever
    #[arg(long, env = "MessageCount", allow_negative_numbers = true)]
    pub message_count: Option<i64>,

    /// Interval between messages in milliseconds
    #[arg(long, env = "Interval", allow_negative_numbers = true)]
    pub interval: Option<i64>,

    /// Per-device interval lists as JSON, e.g. {"sim000001":[100,500]}
    #[arg(long, env = "Intervals")]
    pub intervals: Option<String>,

    /// Resend a successful message when a draw in [0, N) is zero
    #[arg(long, env = "DuplicateEvery", allow_negative_numbers = true)]
    pub duplicate_every: Option<i64>,

    /// Default payload template
    #[arg(long, env = "Template")]
    pub template: Option<String>,

    /// Header template, rendered to a flat JSON object of properties
    #[arg(long, env = "Header")]
    pub header: Option<String>,

    /// Partition key template
    #[arg(long, env = "PartitionKey")]
    pub partition_key: Option<String>,

    /// Variable definitions as a JSON array
    #[arg(long, env = "Variables")]
    pub variables: Option<String>,

    /// Payload distribution, e.g. "fixSize(10, 12) template(90, default)"
    #[arg(long, env = "PayloadDistribution")]
    pub payload_distribution: Option<String>,

    /// librdkafka properties as a JSON object
    #[arg(long, env = "KafkaConnectionProperties")]
    pub kafka_connection_properties: Option<String>,

    /// Kafka topic
    #[arg(long, env = "KafkaTopic")]
    pub kafka_topic: Option<String>,
}

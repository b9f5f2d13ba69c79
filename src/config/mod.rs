//! Runner configuration.
//!
//! Settings come from an optional JSON file and from CLI flags or their
//! environment variables, flags winning over the file. [`RunnerConfig::load`]
//! resolves them into variables, templates and a payload set;
//! [`RunnerConfig::ensure_is_valid`] checks everything that must hold before
//! any device starts.

pub mod file;
mod loader;

pub use file::{ConfigFile, DeviceListSource, InlineJson, PayloadEntry, PayloadKind};

use crate::TransportKind;
use device_simulator::{IntervalSchedule, SimulationPlan};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::Arc;
use telemetry_core::VariableError;
use telemetry_generator::{CompiledTemplate, TemplateError, VariableGenerator};
use telemetry_payload::{PayloadError, PayloadSet};

/// Payload template used when none is configured.
pub const DEFAULT_TEMPLATE: &str =
    r#"{"deviceId": "$.DeviceId", "time": "$.Time", "counter": $.Counter}"#;

pub const DEFAULT_DEVICE_PREFIX: &str = "sim";
pub const DEFAULT_DEVICE_INDEX: u32 = 1;
pub const DEFAULT_DEVICE_COUNT: u32 = 1;
pub const DEFAULT_MESSAGE_COUNT: i64 = 10;
pub const DEFAULT_INTERVAL_MS: i64 = 1000;

const BOOTSTRAP_SERVERS: &str = "bootstrap.servers";

/// Error type for configuration loading and validation.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// Configuration file could not be read
    #[error("Failed to read configuration file {path:?}: {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// Configuration file is not valid JSON
    #[error("Failed to parse configuration file {path:?}: {source}")]
    ParseFile {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// A JSON-valued setting could not be parsed
    #[error("Failed to parse {key} from '{value}': {source}")]
    ParseValue {
        key: &'static str,
        value: String,
        #[source]
        source: serde_json::Error,
    },

    /// Invalid variable definitions
    #[error("Invalid variables: {0}")]
    Variables(#[from] VariableError),

    /// Invalid payload definitions
    #[error("Invalid payloads: {0}")]
    Payload(#[from] PayloadError),

    /// A template failed to compile
    #[error("Invalid {key} template: {source}")]
    Template {
        key: String,
        #[source]
        source: TemplateError,
    },

    /// `template(W, name)` refers to a missing key
    #[error("Could not find template with name '{0}'")]
    UnknownTemplate(String),

    /// Malformed entry in the `Payloads` list
    #[error("Invalid entry {index} in Payloads: {reason}")]
    InvalidPayload { index: usize, reason: String },

    /// No transport selected
    #[error("No transport configured: set KafkaConnectionProperties or --transport console")]
    NoTransport,

    /// Console selected while Kafka is configured
    #[error("Exactly one transport must be configured, but console was selected and KafkaConnectionProperties is set")]
    ConflictingTransport,

    #[error("KafkaConnectionProperties is required")]
    MissingKafkaProperties,

    #[error("KafkaTopic is required")]
    MissingKafkaTopic,

    #[error("KafkaConnectionProperties should contain at least a value for bootstrap.servers")]
    MissingBootstrapServers,

    /// A duration setting is zero or negative
    #[error("{0} must be greater than zero")]
    NotPositive(String),

    #[error("DuplicateEvery must be greater than or equal to zero")]
    NegativeDuplicateEvery,

    /// A numeric setting does not fit its range
    #[error("{key} is out of range: {value}")]
    OutOfRange { key: &'static str, value: i64 },

    /// Device count resolved to zero
    #[error("At least one device is required")]
    NoDevices,
}

/// Resolved runner configuration.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    /// Explicitly selected transport
    pub transport: Option<TransportKind>,
    pub kafka_connection_properties: Option<BTreeMap<String, String>>,
    pub kafka_topic: Option<String>,

    /// Device id prefix; empty when a device list is given
    pub device_prefix: String,
    pub device_index: u32,
    pub device_count: u32,
    /// Explicit device ids, overriding prefix, index and count
    pub device_list: Vec<String>,

    /// Messages per device; 0 or negative sends forever
    pub message_count: i64,
    /// Default interval in milliseconds
    pub interval: i64,
    /// Per-device interval lists in milliseconds
    pub intervals: BTreeMap<String, Vec<i64>>,
    pub duplicate_every: i64,

    pub generator: Arc<VariableGenerator>,
    pub payloads: Arc<PayloadSet>,
    pub header: Option<Arc<CompiledTemplate>>,
    pub partition_key: Option<Arc<CompiledTemplate>>,

    /// Base seed for per-device RNGs
    pub seed: Option<u64>,
}

impl RunnerConfig {
    /// Transport to use, explicit or inferred from the Kafka settings.
    pub fn transport_kind(&self) -> Result<TransportKind, ConfigError> {
        let kafka_configured = self.kafka_connection_properties.is_some();
        match self.transport {
            Some(TransportKind::Console) if kafka_configured => {
                Err(ConfigError::ConflictingTransport)
            }
            Some(kind) => Ok(kind),
            None if kafka_configured => Ok(TransportKind::Kafka),
            None if is_set(self.kafka_topic.as_deref()) => Err(ConfigError::MissingKafkaProperties),
            None => Err(ConfigError::NoTransport),
        }
    }

    /// Check every setting that must hold before devices start.
    pub fn ensure_is_valid(&self) -> Result<(), ConfigError> {
        if self.transport_kind()? == TransportKind::Kafka {
            let properties = self
                .kafka_connection_properties
                .as_ref()
                .ok_or(ConfigError::MissingKafkaProperties)?;
            if !is_set(self.kafka_topic.as_deref()) {
                return Err(ConfigError::MissingKafkaTopic);
            }
            if !is_set(properties.get(BOOTSTRAP_SERVERS).map(String::as_str)) {
                return Err(ConfigError::MissingBootstrapServers);
            }
        }

        if self.interval <= 0 {
            return Err(ConfigError::NotPositive("Interval".to_string()));
        }
        for (device_id, intervals) in &self.intervals {
            if intervals.iter().any(|&ms| ms <= 0) {
                return Err(ConfigError::NotPositive(format!(
                    "Every interval for device '{device_id}'"
                )));
            }
        }

        if self.duplicate_every < 0 {
            return Err(ConfigError::NegativeDuplicateEvery);
        }
        if u32::try_from(self.duplicate_every).is_err() {
            return Err(ConfigError::OutOfRange {
                key: "DuplicateEvery",
                value: self.duplicate_every,
            });
        }

        let device_ids = self.device_ids();
        if device_ids.is_empty() {
            return Err(ConfigError::NoDevices);
        }
        self.payloads.validate_for_devices(&device_ids)?;
        Ok(())
    }

    /// Device ids: the device list, or `prefix + 6-digit number` counting
    /// up from the device index.
    pub fn device_ids(&self) -> Vec<String> {
        if !self.device_list.is_empty() {
            return self.device_list.clone();
        }
        let first = u64::from(self.device_index);
        (first..first + u64::from(self.device_count))
            .map(|n| format!("{}{n:06}", self.device_prefix))
            .collect()
    }

    /// Kafka topic and connection properties, when Kafka is configured.
    pub fn kafka_settings(&self) -> Option<(&BTreeMap<String, String>, &str)> {
        Some((
            self.kafka_connection_properties.as_ref()?,
            self.kafka_topic.as_deref()?,
        ))
    }

    /// Shared plan for all devices. Validates the configuration first.
    pub fn plan(&self) -> Result<SimulationPlan, ConfigError> {
        self.ensure_is_valid()?;

        let intervals = self.intervals.iter().fold(
            IntervalSchedule::fixed(self.interval.unsigned_abs()),
            |schedule, (device_id, intervals)| {
                schedule.with_device(
                    device_id.clone(),
                    intervals.iter().map(|ms| ms.unsigned_abs()).collect(),
                )
            },
        );
        let duplicate_every =
            u32::try_from(self.duplicate_every).map_err(|_| ConfigError::OutOfRange {
                key: "DuplicateEvery",
                value: self.duplicate_every,
            })?;

        Ok(SimulationPlan {
            payloads: Arc::clone(&self.payloads),
            header: self.header.clone(),
            partition_key: self.partition_key.clone(),
            duplicate_every,
            message_count: self.message_count,
            intervals,
        })
    }
}

pub(crate) fn is_set(value: Option<&str>) -> bool {
    value.is_some_and(|v| !v.trim().is_empty())
}

//! The immutable simulation plan shared by every device.

use std::collections::HashMap;
use std::sync::Arc;
use telemetry_generator::CompiledTemplate;
use telemetry_payload::PayloadSet;

/// Message intervals in milliseconds, with optional per-device overrides.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntervalSchedule {
    default: Vec<u64>,
    per_device: HashMap<String, Vec<u64>>,
}

impl IntervalSchedule {
    /// A single fixed interval for every device.
    pub fn fixed(interval_ms: u64) -> Self {
        Self {
            default: vec![interval_ms],
            per_device: HashMap::new(),
        }
    }

    /// Set a repeating interval list for one device.
    ///
    /// An empty list leaves the device on the default interval.
    pub fn with_device(mut self, device_id: impl Into<String>, intervals_ms: Vec<u64>) -> Self {
        if !intervals_ms.is_empty() {
            self.per_device.insert(device_id.into(), intervals_ms);
        }
        self
    }

    /// Interval list for a device; never empty.
    pub fn for_device(&self, device_id: &str) -> &[u64] {
        self.per_device
            .get(device_id)
            .map_or(self.default.as_slice(), Vec::as_slice)
    }

    /// The default interval list.
    pub fn default_intervals(&self) -> &[u64] {
        &self.default
    }

    /// Iterate over per-device overrides.
    pub fn overrides(&self) -> impl Iterator<Item = (&str, &[u64])> {
        self.per_device
            .iter()
            .map(|(id, intervals)| (id.as_str(), intervals.as_slice()))
    }
}

/// Everything a device needs besides its transport.
#[derive(Debug, Clone)]
pub struct SimulationPlan {
    /// Payload definitions
    pub payloads: Arc<PayloadSet>,

    /// Header template rendered into message properties
    pub header: Option<Arc<CompiledTemplate>>,

    /// Partition key template
    pub partition_key: Option<Arc<CompiledTemplate>>,

    /// Duplicate probability denominator (0 disables duplicates)
    pub duplicate_every: u32,

    /// Messages per device; 0 or negative sends forever
    pub message_count: i64,

    /// Interval schedule
    pub intervals: IntervalSchedule,
}

impl SimulationPlan {
    /// Plan with the given payloads, 10 messages at 1000 ms and no extras.
    pub fn new(payloads: PayloadSet) -> Self {
        Self {
            payloads: Arc::new(payloads),
            header: None,
            partition_key: None,
            duplicate_every: 0,
            message_count: 10,
            intervals: IntervalSchedule::fixed(1000),
        }
    }

    pub fn with_header(mut self, header: CompiledTemplate) -> Self {
        self.header = Some(Arc::new(header));
        self
    }

    pub fn with_partition_key(mut self, partition_key: CompiledTemplate) -> Self {
        self.partition_key = Some(Arc::new(partition_key));
        self
    }

    pub fn with_duplicate_every(mut self, duplicate_every: u32) -> Self {
        self.duplicate_every = duplicate_every;
        self
    }

    pub fn with_message_count(mut self, message_count: i64) -> Self {
        self.message_count = message_count;
        self
    }

    pub fn with_intervals(mut self, intervals: IntervalSchedule) -> Self {
        self.intervals = intervals;
        self
    }

    /// Whether devices send without a message limit.
    pub fn is_unbounded(&self) -> bool {
        self.message_count <= 0
    }
}

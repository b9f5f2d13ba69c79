//! Per-device value snapshots.
//!
//! A `Snapshot` is the immutable named-value map produced by one generation
//! step. The variable generator reads the previous snapshot and returns a new
//! one; nothing mutates a snapshot after it is built.

use crate::builtins::{DEVICE_ID, ITERATION_NUMBER};
use crate::values::TelemetryValue;
use std::collections::HashMap;

/// Immutable map of variable name to value for one device iteration.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    values: HashMap<String, TelemetryValue>,
}

impl Snapshot {
    /// Create a builder for a new snapshot.
    pub fn builder() -> SnapshotBuilder {
        SnapshotBuilder::default()
    }

    /// Seed snapshot carrying only the device id.
    ///
    /// It has no iteration number, so the first generation step from it is
    /// iteration 0.
    pub fn for_device(device_id: impl Into<String>) -> Self {
        Self::builder()
            .set(DEVICE_ID, TelemetryValue::Text(device_id.into()))
            .build()
    }

    /// Get a value by name.
    pub fn get(&self, name: &str) -> Option<&TelemetryValue> {
        self.values.get(name)
    }

    /// Check whether a value is present.
    pub fn contains(&self, name: &str) -> bool {
        self.values.contains_key(name)
    }

    /// Iteration number of this snapshot, if it was produced by a generator.
    pub fn iteration_number(&self) -> Option<u64> {
        self.get(ITERATION_NUMBER)
            .and_then(TelemetryValue::as_i64)
            .and_then(|n| u64::try_from(n).ok())
    }

    /// Device id carried by this snapshot.
    pub fn device_id(&self) -> Option<&TelemetryValue> {
        self.get(DEVICE_ID)
    }

    /// Number of values in the snapshot.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Check if the snapshot holds no values.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Iterate over all names and values.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &TelemetryValue)> {
        self.values.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl FromIterator<(String, TelemetryValue)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, TelemetryValue)>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}

/// Builder for [`Snapshot`].
#[derive(Debug, Default)]
pub struct SnapshotBuilder {
    values: HashMap<String, TelemetryValue>,
}

impl SnapshotBuilder {
    /// Create a builder with room for `capacity` values.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            values: HashMap::with_capacity(capacity),
        }
    }

    /// Set a value, consuming and returning the builder.
    pub fn set(mut self, name: impl Into<String>, value: impl Into<TelemetryValue>) -> Self {
        self.values.insert(name.into(), value.into());
        self
    }

    /// Set a value in place.
    pub fn insert(&mut self, name: impl Into<String>, value: impl Into<TelemetryValue>) {
        self.values.insert(name.into(), value.into());
    }

    /// Get a value already set on this builder.
    pub fn get(&self, name: &str) -> Option<&TelemetryValue> {
        self.values.get(name)
    }

    /// Finish building.
    pub fn build(self) -> Snapshot {
        Snapshot {
            values: self.values,
        }
    }
}

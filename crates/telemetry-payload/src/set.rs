//! Weighted payload set.
//!
//! Definitions are kept sorted by descending weight (stable, so equal
//! weights keep their configured order). Definitions pinned to a device id
//! are indexed separately and never take part in the weighted walk.

use crate::definition::PayloadDefinition;
use crate::error::PayloadError;
use rand::Rng;
use std::collections::HashMap;
use telemetry_core::Snapshot;
use tracing::warn;

/// Total weight the unpinned definitions are expected to reach.
pub const FULL_WEIGHT: u32 = 100;

/// Immutable, shared set of payload definitions.
#[derive(Debug, Clone)]
pub struct PayloadSet {
    /// All definitions, descending weight
    definitions: Vec<PayloadDefinition>,
    /// Device id to index into `definitions`
    pinned: HashMap<String, usize>,
    /// Cumulative thresholds of unpinned definitions: (threshold, index)
    thresholds: Vec<(u32, usize)>,
}

impl PayloadSet {
    /// Build a payload set.
    pub fn new(mut definitions: Vec<PayloadDefinition>) -> Result<Self, PayloadError> {
        if definitions.is_empty() {
            return Err(PayloadError::NoPayloads);
        }
        definitions.sort_by(|a, b| b.weight().cmp(&a.weight()));

        let mut pinned = HashMap::new();
        let mut thresholds = Vec::new();
        let mut cumulative = 0;

        for (index, definition) in definitions.iter().enumerate() {
            match definition.device_id() {
                Some(device_id) => {
                    if pinned.insert(device_id.to_string(), index).is_some() {
                        return Err(PayloadError::DuplicatePinnedDevice(device_id.to_string()));
                    }
                }
                None => {
                    cumulative += definition.weight();
                    thresholds.push((cumulative, index));
                }
            }
        }

        if definitions.len() > 1 && cumulative != FULL_WEIGHT {
            warn!(
                total = cumulative,
                "Payload percentage distribution is not equal to 100"
            );
        }

        Ok(Self {
            definitions,
            pinned,
            thresholds,
        })
    }

    /// All definitions in selection order.
    pub fn definitions(&self) -> &[PayloadDefinition] {
        &self.definitions
    }

    /// Number of definitions.
    pub fn len(&self) -> usize {
        self.definitions.len()
    }

    /// Check if the set is empty (never true for a built set).
    pub fn is_empty(&self) -> bool {
        self.definitions.is_empty()
    }

    /// Sum of unpinned weights.
    pub fn unpinned_weight(&self) -> u32 {
        self.thresholds.last().map_or(0, |(t, _)| *t)
    }

    /// Check that every listed device can always be served.
    ///
    /// Fails when more than one definition exists, the unpinned weights sum
    /// below 100 and at least one device is not pinned, since such a device
    /// would eventually draw past the last threshold.
    pub fn validate_for_devices<S: AsRef<str>>(&self, device_ids: &[S]) -> Result<(), PayloadError> {
        let total = self.unpinned_weight();
        if self.definitions.len() <= 1 || total >= FULL_WEIGHT {
            return Ok(());
        }
        match device_ids
            .iter()
            .map(|id| id.as_ref())
            .find(|id| !self.pinned.contains_key(*id))
        {
            Some(device_id) => Err(PayloadError::IncompleteDistribution {
                total,
                device_id: device_id.to_string(),
            }),
            None => Ok(()),
        }
    }

    /// Choose the payload for a device.
    pub fn select<R: Rng>(&self, device_id: &str, rng: &mut R) -> Result<&PayloadDefinition, PayloadError> {
        if let Some(definition) = self.fixed_choice(device_id) {
            return Ok(definition);
        }
        self.select_with_draw(rng.gen_range(1..=FULL_WEIGHT))
    }

    /// Weighted walk for a draw in `1..=100`.
    pub fn select_with_draw(&self, draw: u32) -> Result<&PayloadDefinition, PayloadError> {
        self.thresholds
            .iter()
            .find(|(threshold, _)| *threshold >= draw)
            .map(|(_, index)| &self.definitions[*index])
            .ok_or_else(|| PayloadError::InvalidDistribution {
                draw,
                total: self.unpinned_weight(),
            })
    }

    /// Select a payload and produce its bytes and the next snapshot.
    pub fn generate<R: Rng>(
        &self,
        device_id: &str,
        previous: &Snapshot,
        rng: &mut R,
    ) -> Result<(Vec<u8>, Option<Snapshot>), PayloadError> {
        let definition = self.select(device_id, rng)?;
        Ok(definition.generate(previous, rng))
    }

    /// Comma-separated descriptions of all definitions.
    pub fn description(&self) -> String {
        self.definitions
            .iter()
            .map(PayloadDefinition::description)
            .collect::<Vec<_>>()
            .join(",")
    }

    /// Single definition or pinned match, bypassing the draw.
    fn fixed_choice(&self, device_id: &str) -> Option<&PayloadDefinition> {
        if self.definitions.len() == 1 {
            return self.definitions.first();
        }
        self.pinned.get(device_id).map(|index| &self.definitions[*index])
    }
}

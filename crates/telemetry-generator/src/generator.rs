//! Variable generator producing the next snapshot from the previous one.

use crate::generators::{self, builtins as gen_builtins, Generated};
use chrono::{DateTime, Utc};
use rand::Rng;
use std::collections::HashSet;
use telemetry_core::builtins::{self, ITERATION_NUMBER};
use telemetry_core::{SequenceEntry, Snapshot, SnapshotBuilder, TelemetryValue, VariableMode, VariableSet};
use tracing::warn;

/// Generates per-device value snapshots.
///
/// The generator holds no per-device state: everything that must survive
/// between iterations lives in the snapshot passed to [`next`](Self::next),
/// so one generator is shared by every device using the same payload.
#[derive(Debug, Clone)]
pub struct VariableGenerator {
    /// Validated variable definitions
    variables: VariableSet,
    /// Host name, read once
    machine_name: String,
    /// Variable names plus built-in names
    known_names: Vec<String>,
}

impl VariableGenerator {
    /// Create a generator for the given variables.
    pub fn new(variables: VariableSet) -> Self {
        let known_names = variables
            .variables()
            .iter()
            .map(|v| v.name().to_string())
            .chain(builtins::ALL.iter().map(|n| n.to_string()))
            .collect();

        Self {
            variables,
            machine_name: gen_builtins::machine_name(),
            known_names,
        }
    }

    /// Override the `MachineName` built-in.
    pub fn with_machine_name(mut self, machine_name: impl Into<String>) -> Self {
        self.machine_name = machine_name.into();
        self
    }

    /// Every name a template may reference: variables and built-ins.
    pub fn known_names(&self) -> &[String] {
        &self.known_names
    }

    /// Get the variable set.
    pub fn variables(&self) -> &VariableSet {
        &self.variables
    }

    /// Produce the next snapshot at the current time.
    pub fn next<R: Rng>(&self, previous: Option<&Snapshot>, rng: &mut R) -> Snapshot {
        self.next_at(previous, rng, Utc::now())
    }

    /// Produce the next snapshot for a given instant.
    pub fn next_at<R: Rng>(
        &self,
        previous: Option<&Snapshot>,
        rng: &mut R,
        now: DateTime<Utc>,
    ) -> Snapshot {
        let iteration = previous
            .and_then(Snapshot::iteration_number)
            .map_or(0, |n| n.saturating_add(1));

        let mut builder =
            SnapshotBuilder::with_capacity(builtins::ALL.len() + self.variables.len());
        self.set_builtins(&mut builder, previous, iteration, now, rng);

        let chosen = self.chosen_references(iteration);

        for variable in self.variables.variables() {
            if variable.is_sequence() {
                continue;
            }
            let name = variable.name();
            let prior = previous.and_then(|p| p.get(name));

            // Referenced variables only move when a chosen entry points at them
            if self.variables.is_referenced(name) && !chosen.contains(name) {
                if let Some(prior) = prior {
                    builder.insert(name, prior.clone());
                }
                continue;
            }

            match generators::generate_for_mode(variable.mode(), prior, rng) {
                Some(Generated::Value(value)) => builder.insert(name, value),
                Some(Generated::SkippedCounter) => {
                    warn!(
                        variable = %name,
                        previous = ?prior,
                        "Counter state is not an integer, skipping update"
                    );
                }
                None => {}
            }
        }

        for variable in self.variables.variables() {
            let VariableMode::Sequence { entries } = variable.mode() else {
                continue;
            };
            let entry = &entries[sequence_index(iteration, entries.len())];
            let value = match entry {
                SequenceEntry::Literal(value) => value.clone(),
                SequenceEntry::Reference { name, literal } => builder
                    .get(name)
                    .cloned()
                    .unwrap_or_else(|| TelemetryValue::Text(literal.clone())),
            };
            builder.insert(variable.name(), value);
        }

        builder.build()
    }

    fn set_builtins<R: Rng>(
        &self,
        builder: &mut SnapshotBuilder,
        previous: Option<&Snapshot>,
        iteration: u64,
        now: DateTime<Utc>,
        rng: &mut R,
    ) {
        builder.insert(builtins::TIME, gen_builtins::format_utc(&now));
        builder.insert(builtins::LOCAL_TIME, gen_builtins::format_local(&now));
        builder.insert(builtins::EPOCH, gen_builtins::epoch_seconds(&now));
        builder.insert(builtins::TICKS, gen_builtins::ticks(&now));
        builder.insert(builtins::GUID, gen_builtins::guid(rng));
        builder.insert(builtins::MACHINE_NAME, self.machine_name.as_str());
        builder.insert(
            ITERATION_NUMBER,
            i64::try_from(iteration).unwrap_or(i64::MAX),
        );
        if let Some(device_id) = previous.and_then(Snapshot::device_id) {
            builder.insert(builtins::DEVICE_ID, device_id.clone());
        }
    }

    /// Names referenced by the sequence entries selected for `iteration`.
    fn chosen_references(&self, iteration: u64) -> HashSet<&str> {
        self.variables
            .variables()
            .iter()
            .filter_map(|v| match v.mode() {
                VariableMode::Sequence { entries } if !entries.is_empty() => {
                    entries[sequence_index(iteration, entries.len())].reference()
                }
                _ => None,
            })
            .collect()
    }
}

fn sequence_index(iteration: u64, len: usize) -> usize {
    (iteration % len as u64) as usize
}

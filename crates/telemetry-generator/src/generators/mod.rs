//! Individual value generators for each variable mode and for the built-ins.

pub mod builtins;
pub mod counter;
pub mod numeric;
pub mod string;

use rand::seq::SliceRandom;
use rand::Rng;
use telemetry_core::{TelemetryValue, VariableMode};

/// Outcome of generating one non-sequence variable.
#[derive(Debug, Clone, PartialEq)]
pub enum Generated {
    /// A fresh value
    Value(TelemetryValue),
    /// Previous counter state was not an integer; no update emitted
    SkippedCounter,
}

/// Generate the next value for a non-sequence mode.
///
/// Returns `None` for sequence modes, which are resolved in a later pass,
/// and for an empty enumeration.
pub fn generate_for_mode<R: Rng>(
    mode: &VariableMode,
    previous: Option<&TelemetryValue>,
    rng: &mut R,
) -> Option<Generated> {
    let generated = match mode {
        VariableMode::Counter { min, max, step } => {
            match counter::next_counter(previous, *min, *max, *step) {
                Some(value) => Generated::Value(TelemetryValue::Int(value)),
                None => Generated::SkippedCounter,
            }
        }
        VariableMode::RandomInt { range } => {
            Generated::Value(TelemetryValue::Int(numeric::random_int(rng, *range)))
        }
        VariableMode::RandomDouble { range } => {
            Generated::Value(TelemetryValue::Double(numeric::random_double(rng, *range)))
        }
        VariableMode::RandomString { length } => {
            Generated::Value(TelemetryValue::Text(string::random_alphanumeric(rng, *length)))
        }
        VariableMode::OneOf { values } => Generated::Value(values.choose(rng).cloned()?),
        VariableMode::Sequence { .. } => return None,
    };
    Some(generated)
}

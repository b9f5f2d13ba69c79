//! Counter variable generator.

use telemetry_core::TelemetryValue;

/// Compute the next counter value.
///
/// The first value (no previous) is `min`, or 1 when unset. Afterwards the
/// counter advances by `step` (default 1) and wraps back to the start value
/// once it would exceed `max`. Returns `None` when the previous value is not
/// an integer.
pub fn next_counter(
    previous: Option<&TelemetryValue>,
    min: Option<i64>,
    max: Option<i64>,
    step: Option<i64>,
) -> Option<i64> {
    let start = min.unwrap_or(1);
    let Some(previous) = previous else {
        return Some(start);
    };

    let candidate = previous.as_i64()?.saturating_add(step.unwrap_or(1));
    match max {
        Some(max) if candidate > max => Some(start),
        _ => Some(candidate),
    }
}

//! Built-in value generators (time, ticks, GUID, host name).

use chrono::{DateTime, Local, Utc};
use rand::Rng;

/// Ticks (100 ns units) between 0001-01-01T00:00:00Z and the Unix epoch.
pub const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

const TICKS_PER_SECOND: i64 = 10_000_000;

/// Sub-second part of `time` as 7 digits of 100 ns.
fn fraction_ticks(time: &DateTime<impl chrono::TimeZone>) -> u32 {
    // Leap seconds report nanos past 1e9
    (time.timestamp_subsec_nanos() % 1_000_000_000) / 100
}

/// Format a UTC instant as RFC 3339 with 7 fractional digits and a `Z` suffix.
pub fn format_utc(now: &DateTime<Utc>) -> String {
    format!(
        "{}.{:07}Z",
        now.format("%Y-%m-%dT%H:%M:%S"),
        fraction_ticks(now)
    )
}

/// Format an instant in the local time zone, RFC 3339 with 7 fractional digits.
pub fn format_local(now: &DateTime<Utc>) -> String {
    let local = now.with_timezone(&Local);
    format!(
        "{}.{:07}{}",
        local.format("%Y-%m-%dT%H:%M:%S"),
        fraction_ticks(&local),
        local.format("%:z")
    )
}

/// Unix epoch seconds.
pub fn epoch_seconds(now: &DateTime<Utc>) -> i64 {
    now.timestamp()
}

/// 100 ns ticks since 0001-01-01T00:00:00Z.
pub fn ticks(now: &DateTime<Utc>) -> i64 {
    now.timestamp()
        .saturating_mul(TICKS_PER_SECOND)
        .saturating_add(i64::from(fraction_ticks(now)))
        .saturating_add(UNIX_EPOCH_TICKS)
}

/// Random UUID v4 drawn from the provided RNG.
pub fn guid<R: Rng>(rng: &mut R) -> String {
    let mut bytes = [0u8; 16];
    rng.fill(&mut bytes);

    // Version 4, RFC 4122 variant
    bytes[6] = (bytes[6] & 0x0f) | 0x40;
    bytes[8] = (bytes[8] & 0x3f) | 0x80;

    uuid::Uuid::from_bytes(bytes).hyphenated().to_string()
}

/// Host name of this process, or `unknown` when it cannot be read.
pub fn machine_name() -> String {
    hostname::get()
        .ok()
        .and_then(|h| h.into_string().ok())
        .unwrap_or_else(|| "unknown".to_string())
}

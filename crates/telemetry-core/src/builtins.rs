//! Reserved value names that every generated snapshot carries.

/// Current UTC time, RFC 3339.
pub const TIME: &str = "Time";
/// Current local time, RFC 3339 with offset.
pub const LOCAL_TIME: &str = "LocalTime";
/// Unix epoch seconds.
pub const EPOCH: &str = "Epoch";
/// 100-nanosecond ticks since 0001-01-01T00:00:00.
pub const TICKS: &str = "Ticks";
/// Device identifier, carried forward from the previous snapshot.
pub const DEVICE_ID: &str = "DeviceId";
/// Random UUID v4.
pub const GUID: &str = "Guid";
/// Host name of the simulator process.
pub const MACHINE_NAME: &str = "MachineName";
/// 0-based generation step number.
pub const ITERATION_NUMBER: &str = "IterationNumber";

/// All reserved names.
pub const ALL: [&str; 8] = [
    TIME,
    LOCAL_TIME,
    EPOCH,
    TICKS,
    DEVICE_ID,
    GUID,
    MACHINE_NAME,
    ITERATION_NUMBER,
];

/// Check whether a name is reserved.
pub fn is_builtin(name: &str) -> bool {
    ALL.contains(&name)
}

//! Core types for the IoT telemetry simulator.
//!
//! This crate provides the foundational types shared by the generator,
//! payload and device crates:
//!
//! - [`TelemetryValue`] - a single generated value with invariant text form
//! - [`Snapshot`] - the immutable per-device value map threaded between
//!   generation steps
//! - [`VariableDefinition`] / [`VariableSet`] - variable configuration and
//!   its validated form
//! - [`builtins`] - reserved value names present in every snapshot
//!
//! # Architecture
//!
//! ```text
//! telemetry-core (this crate)
//!    │
//!    ├─── telemetry-generator  (variable generator, template renderer)
//!    │
//!    ├─── telemetry-payload    (payload definitions and selection)
//!    │
//!    └─── device-simulator     (pacing loop and send policy)
//! ```

pub mod builtins;
pub mod snapshot;
pub mod values;
pub mod variables;

// Re-exports for convenience
pub use snapshot::{Snapshot, SnapshotBuilder};
pub use values::TelemetryValue;
pub use variables::{
    SequenceEntry, Variable, VariableDefinition, VariableError, VariableMode, VariableSet,
};

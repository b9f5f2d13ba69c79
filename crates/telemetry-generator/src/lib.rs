//! Variable generator and template renderer for the IoT telemetry simulator.
//!
//! The [`VariableGenerator`] turns a device's previous [`Snapshot`] into the
//! next one. It is a pure function of the previous snapshot and the RNG the
//! caller supplies, so a device only needs to hold on to its latest snapshot.
//! The [`CompiledTemplate`] renders a snapshot into payload text.
//!
//! # Architecture
//!
//! ```text
//!   previous Snapshot ──┐
//!                       ▼
//!          ┌──────────────────────┐
//!          │  VariableGenerator   │  built-ins, counters, randoms,
//!          │                      │  enumerations, sequences
//!          └──────────┬───────────┘
//!                     ▼
//!               next Snapshot ──► CompiledTemplate::render ──► String
//! ```
//!
//! # Example
//!
//! ```rust
//! use rand::rngs::StdRng;
//! use rand::SeedableRng;
//! use telemetry_core::{Snapshot, VariableDefinition, VariableSet};
//! use telemetry_generator::{CompiledTemplate, VariableGenerator};
//!
//! let defs = VariableDefinition::list_from_json(r#"[{"name":"Counter"}]"#).unwrap();
//! let generator = VariableGenerator::new(VariableSet::new(&defs).unwrap());
//! let template =
//!     CompiledTemplate::compile(r#"{"counter": $.Counter}"#, generator.known_names()).unwrap();
//!
//! let mut rng = StdRng::seed_from_u64(42);
//! let seed = Snapshot::for_device("sim000001");
//! let snapshot = generator.next(Some(&seed), &mut rng);
//! assert_eq!(template.render(&snapshot), r#"{"counter": 1}"#);
//! ```
//!
//! [`Snapshot`]: telemetry_core::Snapshot

pub mod generator;
pub mod generators;
pub mod template;

// Re-exports for convenience
pub use generator::VariableGenerator;
pub use template::{CompiledTemplate, TemplateError};

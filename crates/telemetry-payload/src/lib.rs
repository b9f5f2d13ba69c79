//! Payload definitions and weighted payload selection.
//!
//! A [`PayloadSet`] holds every payload a simulation can send. Each
//! [`PayloadDefinition`] has a weight in `1..=100`, an optional pinned device
//! id and either static bytes or a template/generator pair. Per message the
//! set picks one definition for the sending device and produces its bytes.
//!
//! ```text
//! select(device_id)
//!   ├─ single definition ──────────────► it
//!   ├─ device pinned ──────────────────► pinned definition
//!   └─ draw r in 1..=100 ──► first unpinned definition whose
//!                            cumulative weight >= r
//! ```

pub mod definition;
pub mod distribution;
pub mod error;
pub mod set;

// Re-exports for convenience
pub use definition::{PayloadContent, PayloadDefinition};
pub use distribution::{parse_distribution, DistributionEntry, DistributionSource, TemplateRef};
pub use error::PayloadError;
pub use set::PayloadSet;

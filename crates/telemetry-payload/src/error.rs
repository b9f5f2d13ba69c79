//! Payload error types.

use telemetry_generator::TemplateError;

/// Error type for payload building and selection.
#[derive(Debug, thiserror::Error)]
pub enum PayloadError {
    /// Weight outside 1..=100
    #[error("Payload weight must be between 1 and 100, got {0}")]
    InvalidWeight(u32),

    /// Payload set built without definitions
    #[error("At least one payload definition is required")]
    NoPayloads,

    /// Two definitions pinned to the same device
    #[error("More than one payload is pinned to device '{0}'")]
    DuplicatePinnedDevice(String),

    /// Weighted walk found no definition for the draw
    #[error("Invalid payload distribution: draw {draw} exceeds total weight {total}")]
    InvalidDistribution { draw: u32, total: u32 },

    /// Unpinned devices would hit a gap in the weighted walk
    #[error(
        "Payload weights for unpinned devices sum to {total}, must reach 100 (unpinned device: {device_id})"
    )]
    IncompleteDistribution { total: u32, device_id: String },

    /// Malformed payload distribution entry
    #[error("Invalid payload distribution entry '{entry}': {reason}")]
    DistributionSyntax { entry: String, reason: String },

    /// Template compilation error
    #[error("Template error: {0}")]
    Template(#[from] TemplateError),
}

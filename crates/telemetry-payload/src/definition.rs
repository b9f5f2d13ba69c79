//! Payload definitions.

use crate::error::PayloadError;
use rand::Rng;
use std::fmt;
use std::sync::Arc;
use telemetry_core::Snapshot;
use telemetry_generator::{CompiledTemplate, VariableGenerator};

/// Content of a payload.
#[derive(Debug, Clone)]
pub enum PayloadContent {
    /// Static bytes sent as-is
    Fixed(Vec<u8>),
    /// Template rendered from a freshly generated snapshot
    Templated {
        template: Arc<CompiledTemplate>,
        generator: Arc<VariableGenerator>,
    },
}

/// A weighted payload, optionally pinned to one device.
#[derive(Debug, Clone)]
pub struct PayloadDefinition {
    weight: u32,
    device_id: Option<String>,
    content: PayloadContent,
}

impl PayloadDefinition {
    /// Create a definition, validating the weight.
    pub fn new(weight: u32, content: PayloadContent) -> Result<Self, PayloadError> {
        if !(1..=100).contains(&weight) {
            return Err(PayloadError::InvalidWeight(weight));
        }
        Ok(Self {
            weight,
            device_id: None,
            content,
        })
    }

    /// Create a static payload.
    pub fn fixed(weight: u32, bytes: Vec<u8>) -> Result<Self, PayloadError> {
        Self::new(weight, PayloadContent::Fixed(bytes))
    }

    /// Create a templated payload.
    pub fn templated(
        weight: u32,
        template: Arc<CompiledTemplate>,
        generator: Arc<VariableGenerator>,
    ) -> Result<Self, PayloadError> {
        Self::new(
            weight,
            PayloadContent::Templated {
                template,
                generator,
            },
        )
    }

    /// Pin this payload to a device id.
    pub fn pinned_to(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn weight(&self) -> u32 {
        self.weight
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    pub fn content(&self) -> &PayloadContent {
        &self.content
    }

    /// Produce payload bytes.
    ///
    /// A templated payload generates the next snapshot from `previous` and
    /// returns it alongside the bytes. A static payload returns `None`,
    /// leaving the device's snapshot unchanged.
    pub fn generate<R: Rng>(&self, previous: &Snapshot, rng: &mut R) -> (Vec<u8>, Option<Snapshot>) {
        match &self.content {
            PayloadContent::Fixed(bytes) => (bytes.clone(), None),
            PayloadContent::Templated {
                template,
                generator,
            } => {
                let next = generator.next(Some(previous), rng);
                let text = template.render(&next);
                (text.into_bytes(), Some(next))
            }
        }
    }

    /// Human-readable description for startup logging.
    pub fn description(&self) -> String {
        self.to_string()
    }
}

impl fmt::Display for PayloadDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.content {
            PayloadContent::Fixed(bytes) => write!(f, "Fix: {} bytes", bytes.len())?,
            PayloadContent::Templated { template, .. } => write!(f, "Template: {template}")?,
        }
        if let Some(device_id) = &self.device_id {
            write!(f, " (device {device_id})")?;
        }
        Ok(())
    }
}

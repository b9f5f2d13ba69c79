//! Variable definitions.
//!
//! A [`VariableDefinition`] is the configuration-facing description of one
//! named variable (deserialized from JSON). [`VariableSet::new`] validates a
//! list of definitions and resolves each into a [`Variable`] with exactly one
//! [`VariableMode`]. Sequence reference lists are scanned once here and kept
//! on the resolved variable.

use crate::builtins;
use crate::values::TelemetryValue;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Prefix marking a reference to another variable.
pub const REFERENCE_PREFIX: &str = "$.";

/// Error type for variable definition validation.
#[derive(Debug, thiserror::Error)]
pub enum VariableError {
    /// Variable name is empty or blank
    #[error("Variable name must not be empty")]
    EmptyName,

    /// Two definitions share a name
    #[error("Duplicate variable name: {0}")]
    DuplicateName(String),

    /// Definition uses a reserved built-in name
    #[error("Variable name is reserved: {0}")]
    ReservedName(String),

    /// Sequence variable without values
    #[error("Sequence variable '{0}' requires a non-empty values list")]
    EmptySequence(String),

    /// Error parsing definitions
    #[error("Failed to parse variables: {0}")]
    Parse(#[from] serde_json::Error),
}

/// Configuration-facing variable definition.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VariableDefinition {
    /// Unique variable name
    pub name: String,

    /// Random integer mode
    #[serde(default)]
    pub random: bool,

    /// Random double mode
    #[serde(default)]
    pub random_double: bool,

    /// Sequence mode (cycles through `values` by iteration number)
    #[serde(default)]
    pub sequence: bool,

    /// Lower bound (counter start, random lower bound)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<i64>,

    /// Upper bound (counter wrap point, random upper bound)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<i64>,

    /// Counter increment
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step: Option<i64>,

    /// Length of a random alphanumeric string
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub custom_length_string: Option<usize>,

    /// Literal list for enumerated and sequence modes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub values: Option<Vec<serde_json::Value>>,
}

impl VariableDefinition {
    /// Plain counter definition.
    pub fn counter(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// Parse a JSON array of definitions.
    pub fn list_from_json(json: &str) -> Result<Vec<Self>, VariableError> {
        Ok(serde_json::from_str(json)?)
    }

    fn has_values(&self) -> bool {
        self.values.as_ref().is_some_and(|v| !v.is_empty())
    }
}

/// One entry of a sequence list.
#[derive(Debug, Clone, PartialEq)]
pub enum SequenceEntry {
    /// Literal value emitted as-is
    Literal(TelemetryValue),
    /// `$.Name` reference to another variable's value from this iteration
    Reference {
        /// Referenced variable name (without the prefix)
        name: String,
        /// Original literal text, emitted when the reference is unresolved
        literal: String,
    },
}

impl SequenceEntry {
    fn parse(value: &serde_json::Value) -> Self {
        match value {
            serde_json::Value::String(s) if s.starts_with(REFERENCE_PREFIX) => Self::Reference {
                name: s[REFERENCE_PREFIX.len()..].to_string(),
                literal: s.clone(),
            },
            other => Self::Literal(TelemetryValue::from_json(other)),
        }
    }

    /// Referenced name, if this entry is a reference.
    pub fn reference(&self) -> Option<&str> {
        match self {
            Self::Reference { name, .. } => Some(name),
            Self::Literal(_) => None,
        }
    }
}

/// Resolved generation mode of a variable.
#[derive(Debug, Clone, PartialEq)]
pub enum VariableMode {
    /// Incrementing counter with optional wraparound
    Counter {
        min: Option<i64>,
        max: Option<i64>,
        step: Option<i64>,
    },
    /// Uniform integer in `[min, max)`, unbounded when `None`
    RandomInt { range: Option<(i64, i64)> },
    /// Uniform double in `[min, max]`, unit draw when `None`
    RandomDouble { range: Option<(f64, f64)> },
    /// Alphanumeric string of fixed length
    RandomString { length: usize },
    /// One literal chosen uniformly
    OneOf { values: Vec<TelemetryValue> },
    /// Cyclic list indexed by iteration number
    Sequence { entries: Vec<SequenceEntry> },
}

/// A validated variable.
#[derive(Debug, Clone, PartialEq)]
pub struct Variable {
    name: String,
    mode: VariableMode,
    references: Vec<String>,
}

impl Variable {
    fn resolve(def: &VariableDefinition) -> Result<Self, VariableError> {
        let values = def.values.as_deref().unwrap_or_default();

        let mode = if def.sequence {
            if values.is_empty() {
                return Err(VariableError::EmptySequence(def.name.clone()));
            }
            VariableMode::Sequence {
                entries: values.iter().map(SequenceEntry::parse).collect(),
            }
        } else if def.random {
            let range = match (def.min, def.max) {
                (Some(min), Some(max)) if max > min => Some((min, max)),
                _ => None,
            };
            VariableMode::RandomInt { range }
        } else if def.random_double {
            let range = match (def.min, def.max) {
                (Some(min), Some(max)) if max >= min => Some((min as f64, max as f64)),
                _ => None,
            };
            VariableMode::RandomDouble { range }
        } else if let Some(length) = def.custom_length_string {
            VariableMode::RandomString { length }
        } else if def.has_values() {
            VariableMode::OneOf {
                values: values.iter().map(TelemetryValue::from_json).collect(),
            }
        } else {
            VariableMode::Counter {
                min: def.min,
                max: def.max,
                step: def.step,
            }
        };

        let references = match &mode {
            VariableMode::Sequence { entries } => entries
                .iter()
                .filter_map(|e| e.reference().map(str::to_string))
                .collect(),
            _ => Vec::new(),
        };

        Ok(Self {
            name: def.name.clone(),
            mode,
            references,
        })
    }

    /// Variable name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Resolved mode.
    pub fn mode(&self) -> &VariableMode {
        &self.mode
    }

    /// Check if this is a sequence variable.
    pub fn is_sequence(&self) -> bool {
        matches!(self.mode, VariableMode::Sequence { .. })
    }

    /// Names referenced by this variable's sequence entries, in list order.
    ///
    /// Empty for non-sequence variables.
    pub fn referenced_names(&self) -> &[String] {
        &self.references
    }
}

/// Validated, ordered set of variables.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct VariableSet {
    variables: Vec<Variable>,
    referenced: HashSet<String>,
}

impl VariableSet {
    /// Validate definitions and resolve them into variables.
    pub fn new(definitions: &[VariableDefinition]) -> Result<Self, VariableError> {
        let mut seen = HashSet::with_capacity(definitions.len());
        let mut variables = Vec::with_capacity(definitions.len());

        for def in definitions {
            if def.name.trim().is_empty() {
                return Err(VariableError::EmptyName);
            }
            if builtins::is_builtin(&def.name) {
                return Err(VariableError::ReservedName(def.name.clone()));
            }
            if !seen.insert(def.name.as_str()) {
                return Err(VariableError::DuplicateName(def.name.clone()));
            }
            variables.push(Variable::resolve(def)?);
        }

        let referenced = variables
            .iter()
            .flat_map(|v| v.referenced_names().iter().cloned())
            .collect();

        Ok(Self {
            variables,
            referenced,
        })
    }

    /// Default set: a single `Counter` starting at 1 with step 1.
    pub fn default_counter() -> Self {
        let def = VariableDefinition {
            name: "Counter".to_string(),
            min: Some(1),
            step: Some(1),
            ..Default::default()
        };
        // A single well-formed counter always resolves.
        Self::new(std::slice::from_ref(&def)).unwrap_or_default()
    }

    /// All variables in declaration order.
    pub fn variables(&self) -> &[Variable] {
        &self.variables
    }

    /// Look up a variable by name.
    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.variables.iter().find(|v| v.name == name)
    }

    /// Check whether any sequence references `name`.
    pub fn is_referenced(&self, name: &str) -> bool {
        self.referenced.contains(name)
    }

    /// Number of variables.
    pub fn len(&self) -> usize {
        self.variables.len()
    }

    /// Check if the set is empty.
    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_definitions() {
        let json = r#"[
            {"name":"Value", "sequence":true, "values":["$.Counter", "true"]},
            {"name":"Counter"},
            {"name":"Temp", "random":true, "min":10, "max":30},
            {"name":"Code", "customLengthString":8}
        ]"#;
        let defs = VariableDefinition::list_from_json(json).unwrap();
        let set = VariableSet::new(&defs).unwrap();

        assert_eq!(set.len(), 4);
        let value = &set.variables()[0];
        assert!(value.is_sequence());
        assert_eq!(value.referenced_names(), ["Counter".to_string()]);
        assert!(set.is_referenced("Counter"));
        assert!(!set.is_referenced("Temp"));

        assert_eq!(
            set.get("Temp").unwrap().mode(),
            &VariableMode::RandomInt {
                range: Some((10, 30))
            }
        );
        assert_eq!(
            set.get("Code").unwrap().mode(),
            &VariableMode::RandomString { length: 8 }
        );
        assert_eq!(
            set.get("Counter").unwrap().mode(),
            &VariableMode::Counter {
                min: None,
                max: None,
                step: None
            }
        );
    }

    #[test]
    fn test_random_with_inverted_bounds_is_unbounded() {
        let def = VariableDefinition {
            name: "R".to_string(),
            random: true,
            min: Some(5),
            max: Some(5),
            ..Default::default()
        };
        let set = VariableSet::new(&[def]).unwrap();
        assert_eq!(
            set.variables()[0].mode(),
            &VariableMode::RandomInt { range: None }
        );
    }

    #[test]
    fn test_values_without_sequence_is_one_of() {
        let defs =
            VariableDefinition::list_from_json(r#"[{"name":"S","values":["a", 2]}]"#).unwrap();
        let set = VariableSet::new(&defs).unwrap();
        assert_eq!(
            set.variables()[0].mode(),
            &VariableMode::OneOf {
                values: vec![TelemetryValue::text("a"), TelemetryValue::Int(2)]
            }
        );
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let defs = vec![VariableDefinition::counter("A"), VariableDefinition::counter("A")];
        assert!(matches!(
            VariableSet::new(&defs),
            Err(VariableError::DuplicateName(name)) if name == "A"
        ));
    }

    #[test]
    fn test_reserved_name_rejected() {
        let defs = vec![VariableDefinition::counter("DeviceId")];
        assert!(matches!(
            VariableSet::new(&defs),
            Err(VariableError::ReservedName(_))
        ));
    }

    #[test]
    fn test_empty_sequence_rejected() {
        let def = VariableDefinition {
            name: "Seq".to_string(),
            sequence: true,
            values: Some(vec![]),
            ..Default::default()
        };
        assert!(matches!(
            VariableSet::new(&[def]),
            Err(VariableError::EmptySequence(_))
        ));
    }

    #[test]
    fn test_default_counter() {
        let set = VariableSet::default_counter();
        assert_eq!(
            set.variables()[0].mode(),
            &VariableMode::Counter {
                min: Some(1),
                max: None,
                step: Some(1)
            }
        );
    }
}

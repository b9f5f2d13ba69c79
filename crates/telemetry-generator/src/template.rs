//! Compiled text templates with `$.Name` placeholders.
//!
//! A template is compiled once against the set of known names and rendered
//! many times. Compilation splits the text into literal fragments and
//! variable slots, matching the longest known name first so that `$.var11`
//! is never read as `$.var1` followed by `1`.

use std::fmt::{self, Write};
use telemetry_core::variables::REFERENCE_PREFIX;
use telemetry_core::Snapshot;

/// Error type for template compilation.
#[derive(Debug, thiserror::Error)]
pub enum TemplateError {
    /// Template text is empty or whitespace
    #[error("Template text must not be empty")]
    Empty,
}

#[derive(Debug, Clone, PartialEq)]
enum Segment {
    Literal(String),
    Slot(String),
}

/// An immutable, precompiled template.
#[derive(Debug, Clone, PartialEq)]
pub struct CompiledTemplate {
    text: String,
    segments: Vec<Segment>,
    literal_len: usize,
}

impl CompiledTemplate {
    /// Compile `text` against the names that may appear as placeholders.
    pub fn compile<S: AsRef<str>>(text: &str, known_names: &[S]) -> Result<Self, TemplateError> {
        if text.trim().is_empty() {
            return Err(TemplateError::Empty);
        }

        let mut names: Vec<&str> = known_names
            .iter()
            .map(|n| n.as_ref())
            .filter(|n| !n.is_empty())
            .collect();
        names.sort_by(|a, b| b.len().cmp(&a.len()).then_with(|| a.cmp(b)));
        names.dedup();

        let mut segments = Vec::new();
        let mut literal_start = 0;
        let mut pos = 0;

        while let Some(offset) = text[pos..].find(REFERENCE_PREFIX) {
            let at = pos + offset;
            let name_start = at + REFERENCE_PREFIX.len();
            pos = name_start;

            let Some(name) = names
                .iter()
                .find(|name| text[name_start..].starts_with(**name))
            else {
                continue;
            };

            if at > literal_start {
                segments.push(Segment::Literal(text[literal_start..at].to_string()));
            }
            segments.push(Segment::Slot((*name).to_string()));
            pos = name_start + name.len();
            literal_start = pos;
        }
        if literal_start < text.len() {
            segments.push(Segment::Literal(text[literal_start..].to_string()));
        }

        let literal_len = segments
            .iter()
            .map(|s| match s {
                Segment::Literal(l) => l.len(),
                Segment::Slot(_) => 0,
            })
            .sum();

        Ok(Self {
            text: text.to_string(),
            segments,
            literal_len,
        })
    }

    /// Render the template from a snapshot.
    pub fn render(&self, snapshot: &Snapshot) -> String {
        let mut out = String::with_capacity(self.literal_len + 16 * self.slot_count());
        self.render_into(snapshot, &mut out);
        out
    }

    /// Render the template, appending to `out`.
    ///
    /// Slots without a value in the snapshot are written back as `$.name`.
    pub fn render_into(&self, snapshot: &Snapshot, out: &mut String) {
        for segment in &self.segments {
            match segment {
                Segment::Literal(literal) => out.push_str(literal),
                Segment::Slot(name) => match snapshot.get(name) {
                    // Writing into a String cannot fail
                    Some(value) => {
                        let _ = write!(out, "{value}");
                    }
                    None => {
                        out.push_str(REFERENCE_PREFIX);
                        out.push_str(name);
                    }
                },
            }
        }
    }

    /// Original template text.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Names of the variables this template substitutes, in order of appearance.
    pub fn slot_names(&self) -> impl Iterator<Item = &str> {
        self.segments.iter().filter_map(|s| match s {
            Segment::Slot(name) => Some(name.as_str()),
            Segment::Literal(_) => None,
        })
    }

    fn slot_count(&self) -> usize {
        self.slot_names().count()
    }
}

impl fmt::Display for CompiledTemplate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.text)
    }
}

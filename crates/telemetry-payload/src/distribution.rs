//! Payload distribution strings.
//!
//! A distribution string lists payloads with their weights, for example
//! `fixSize(10, 12) template(25, default) fix(65, aaaaBBBBBCCC)`. Supported
//! entries:
//!
//! - `fixSize(W, N)` - N zero bytes
//! - `fix(W, BASE64)` - decoded bytes
//! - `template(W)` / `template(W, default)` - the default template
//! - `template(W, NAME)` - template text stored under configuration key NAME
//!
//! Entry types are case-insensitive and a `%` after the weight is ignored.

use crate::error::PayloadError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};

/// Template referenced by a `template(...)` entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TemplateRef {
    /// The configured or built-in default template
    Default,
    /// A template stored under a configuration key
    Named(String),
}

/// Source of payload content for one entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DistributionSource {
    /// Zero-filled payload of the given size
    FixSize(usize),
    /// Decoded static bytes
    Fix(Vec<u8>),
    /// Templated payload
    Template(TemplateRef),
}

/// One parsed entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistributionEntry {
    pub weight: u32,
    pub source: DistributionSource,
}

impl DistributionEntry {
    /// Bytes of a static entry, `None` for templates.
    pub fn fixed_bytes(&self) -> Option<Vec<u8>> {
        match &self.source {
            DistributionSource::FixSize(size) => Some(vec![0; *size]),
            DistributionSource::Fix(bytes) => Some(bytes.clone()),
            DistributionSource::Template(_) => None,
        }
    }
}

fn is_separator(c: char) -> bool {
    c.is_whitespace() || c == ',' || c == ';'
}

fn syntax(entry: &str, reason: impl Into<String>) -> PayloadError {
    PayloadError::DistributionSyntax {
        entry: entry.to_string(),
        reason: reason.into(),
    }
}

/// Parse a distribution string into entries, in the order written.
pub fn parse_distribution(text: &str) -> Result<Vec<DistributionEntry>, PayloadError> {
    let mut entries = Vec::new();
    let mut rest = text.trim_start_matches(is_separator);

    while !rest.is_empty() {
        let open = rest
            .find('(')
            .ok_or_else(|| syntax(rest, "expected '('"))?;
        let close = rest[open..]
            .find(')')
            .map(|i| open + i)
            .ok_or_else(|| syntax(rest, "expected ')'"))?;

        let entry = &rest[..=close];
        let kind = rest[..open].trim();
        let args: Vec<&str> = rest[open + 1..close]
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .collect();

        entries.push(parse_entry(entry, kind, &args)?);
        rest = rest[close + 1..].trim_start_matches(is_separator);
    }

    Ok(entries)
}

fn parse_entry(entry: &str, kind: &str, args: &[&str]) -> Result<DistributionEntry, PayloadError> {
    let raw_weight = args
        .first()
        .ok_or_else(|| syntax(entry, "missing weight"))?;
    let weight = raw_weight
        .replace('%', "")
        .trim()
        .parse::<u32>()
        .map_err(|e| syntax(entry, format!("invalid weight '{raw_weight}': {e}")))?;

    let source = match kind.to_ascii_lowercase().as_str() {
        "fixsize" => {
            let [_, size] = args else {
                return Err(syntax(entry, "expected fixSize(weight, size)"));
            };
            let size = size
                .parse::<usize>()
                .map_err(|e| syntax(entry, format!("invalid size '{size}': {e}")))?;
            DistributionSource::FixSize(size)
        }
        "fix" => {
            let [_, encoded] = args else {
                return Err(syntax(entry, "expected fix(weight, base64)"));
            };
            let bytes = BASE64
                .decode(encoded)
                .map_err(|e| syntax(entry, format!("invalid base64 payload: {e}")))?;
            DistributionSource::Fix(bytes)
        }
        "template" => match args {
            [_] => DistributionSource::Template(TemplateRef::Default),
            [_, name] if name.eq_ignore_ascii_case("default") => {
                DistributionSource::Template(TemplateRef::Default)
            }
            [_, name] => DistributionSource::Template(TemplateRef::Named(name.to_string())),
            _ => return Err(syntax(entry, "expected template(weight[, name])")),
        },
        other => return Err(syntax(entry, format!("unknown payload type '{other}'"))),
    };

    Ok(DistributionEntry { weight, source })
}

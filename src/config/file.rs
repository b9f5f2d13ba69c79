//! JSON configuration file format.
//!
//! Keys use the PascalCase names of the configuration settings, the same
//! names accepted as environment variables. Keys not listed here are kept in
//! [`ConfigFile::extra`] so `template(W, name)` entries can refer to them.

use super::ConfigError;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::Path;

/// A value given either as a string or as inline JSON.
///
/// Inline JSON is serialized back to compact text, so `"Template": {"v": 1}`
/// and `"Template": "{\"v\":1}"` are equivalent.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum InlineJson {
    Text(String),
    Json(serde_json::Value),
}

impl InlineJson {
    pub fn into_text(self) -> String {
        match self {
            InlineJson::Text(text) => text,
            InlineJson::Json(value) => value.to_string(),
        }
    }
}

/// A device list given as a delimited string or as an array.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum DeviceListSource {
    Text(String),
    List(Vec<String>),
}

impl DeviceListSource {
    /// Device ids, splitting text on `;` and `,` and dropping blanks.
    pub fn into_ids(self) -> Vec<String> {
        match self {
            DeviceListSource::Text(text) => split_device_list(&text),
            DeviceListSource::List(ids) => ids
                .into_iter()
                .map(|id| id.trim().to_string())
                .filter(|id| !id.is_empty())
                .collect(),
        }
    }
}

pub(crate) fn split_device_list(text: &str) -> Vec<String> {
    text.split([';', ','])
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(str::to_string)
        .collect()
}

/// Kind of an entry in the `Payloads` list.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PayloadKind {
    #[serde(alias = "Template")]
    Template,
    #[serde(alias = "Fix")]
    Fix,
}

/// An entry in the `Payloads` list.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PayloadEntry {
    #[serde(rename = "type")]
    pub kind: PayloadKind,

    /// Device the payload is pinned to
    #[serde(default)]
    pub device_id: Option<String>,

    /// Weight, defaults to 100
    #[serde(default)]
    pub distribution: Option<u32>,

    /// Template text for `template` entries (defaults to the default template)
    #[serde(default)]
    pub template: Option<InlineJson>,

    /// Payload text for `fix` entries
    #[serde(default)]
    pub value: Option<InlineJson>,
}

/// Parsed configuration file. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ConfigFile {
    pub device_count: Option<u32>,
    pub device_index: Option<u32>,
    pub device_prefix: Option<String>,
    pub device_list: Option<DeviceListSource>,
    pub message_count: Option<i64>,
    pub interval: Option<i64>,
    pub intervals: Option<BTreeMap<String, Vec<i64>>>,
    pub duplicate_every: Option<i64>,
    pub template: Option<InlineJson>,
    pub header: Option<InlineJson>,
    pub partition_key: Option<String>,
    pub variables: Option<InlineJson>,
    pub payload_distribution: Option<String>,
    pub payloads: Option<Vec<PayloadEntry>>,
    pub kafka_connection_properties: Option<InlineJson>,
    pub kafka_topic: Option<String>,

    /// Any other key, available to named templates
    #[serde(flatten)]
    pub extra: BTreeMap<String, serde_json::Value>,
}

impl ConfigFile {
    /// Read and parse a configuration file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::ReadFile {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&content).map_err(|source| ConfigError::ParseFile {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Text stored under an extra key, if any.
    pub fn extra_text(&self, key: &str) -> Option<String> {
        match self.extra.get(key)? {
            serde_json::Value::Null => None,
            serde_json::Value::String(text) => Some(text.clone()),
            other => Some(other.to_string()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_file() {
        let file: ConfigFile = serde_json::from_str(
            r#"{
                "DeviceCount": 3,
                "MessageCount": 0,
                "Interval": 500,
                "Intervals": {"sim000001": [100, 200]},
                "Variables": [{"name": "Counter", "min": 1}],
                "Template": {"value": "$.Counter"},
                "PayloadDistribution": "template(100, mytemplate)",
                "mytemplate": "{\"custom\": $.Counter}",
                "KafkaConnectionProperties": {"bootstrap.servers": "localhost:9092"}
            }"#,
        )
        .unwrap();

        assert_eq!(file.device_count, Some(3));
        assert_eq!(file.message_count, Some(0));
        assert_eq!(file.interval, Some(500));
        assert_eq!(file.intervals.clone().unwrap()["sim000001"], vec![100, 200]);
        assert_eq!(
            file.template.clone().unwrap().into_text(),
            r#"{"value":"$.Counter"}"#
        );
        assert_eq!(
            file.extra_text("mytemplate").as_deref(),
            Some(r#"{"custom": $.Counter}"#)
        );
        assert!(matches!(file.variables, Some(InlineJson::Json(_))));
        assert!(file.kafka_connection_properties.is_some());
    }

    #[test]
    fn test_device_list_forms() {
        let text = DeviceListSource::Text("a; b,,c ".to_string());
        assert_eq!(text.into_ids(), vec!["a", "b", "c"]);

        let list = DeviceListSource::List(vec!["x".to_string(), " ".to_string()]);
        assert_eq!(list.into_ids(), vec!["x"]);
    }

    #[test]
    fn test_payload_entries() {
        let file: ConfigFile = serde_json::from_str(
            r#"{
                "Payloads": [
                    {"type": "template", "deviceId": "device0001", "template": {"value": "$.Value"}},
                    {"type": "fix", "deviceId": "device0002", "value": "{\"value\":\"myfixvalue\"}"},
                    {"type": "Template", "distribution": 40}
                ]
            }"#,
        )
        .unwrap();

        let payloads = file.payloads.unwrap();
        assert_eq!(payloads.len(), 3);
        assert_eq!(payloads[0].kind, PayloadKind::Template);
        assert_eq!(payloads[0].device_id.as_deref(), Some("device0001"));
        assert_eq!(payloads[1].kind, PayloadKind::Fix);
        assert_eq!(payloads[2].kind, PayloadKind::Template);
        assert_eq!(payloads[2].distribution, Some(40));
        assert!(payloads[2].template.is_none());
    }

    #[test]
    fn test_unknown_keys_are_kept() {
        let file: ConfigFile =
            serde_json::from_str(r#"{"other": {"a": 1}, "blank": null}"#).unwrap();
        assert_eq!(file.extra_text("other").as_deref(), Some(r#"{"a":1}"#));
        assert_eq!(file.extra_text("blank"), None);
        assert_eq!(file.extra_text("missing"), None);
    }
}

//! Resolution of file and CLI settings into a [`RunnerConfig`].

use super::file::{split_device_list, ConfigFile, InlineJson, PayloadKind};
use super::{
    ConfigError, RunnerConfig, DEFAULT_DEVICE_COUNT, DEFAULT_DEVICE_INDEX,
    DEFAULT_DEVICE_PREFIX, DEFAULT_INTERVAL_MS, DEFAULT_MESSAGE_COUNT, DEFAULT_TEMPLATE,
};
use crate::RunOpts;
use serde::de::DeserializeOwned;
use std::sync::Arc;
use telemetry_core::{VariableDefinition, VariableSet};
use telemetry_generator::{CompiledTemplate, VariableGenerator};
use telemetry_payload::set::FULL_WEIGHT;
use telemetry_payload::{
    parse_distribution, DistributionSource, PayloadDefinition, PayloadSet, TemplateRef,
};
use tracing::{debug, warn};

impl RunnerConfig {
    /// Load the configuration file named by `opts` (if any) and apply the
    /// CLI and environment overrides.
    pub fn load(opts: &RunOpts) -> Result<Self, ConfigError> {
        let file = match &opts.config_file {
            Some(path) => {
                debug!(path = ?path, "Reading configuration file");
                ConfigFile::from_path(path)?
            }
            None => ConfigFile::default(),
        };
        Self::from_sources(opts, &file)
    }

    /// Resolve settings from already-parsed sources. `opts` wins over `file`.
    pub fn from_sources(opts: &RunOpts, file: &ConfigFile) -> Result<Self, ConfigError> {
        let variables = load_variables(
            opts.variables
                .clone()
                .or_else(|| file.variables.clone().map(InlineJson::into_text)),
        )?;
        let generator = Arc::new(VariableGenerator::new(variables));

        let payloads = load_payloads(opts, file, &generator)?;
        let header = optional_template(
            "Header",
            opts.header
                .clone()
                .or_else(|| file.header.clone().map(InlineJson::into_text)),
            &generator,
        )?;
        let partition_key = optional_template(
            "PartitionKey",
            opts.partition_key
                .clone()
                .or_else(|| file.partition_key.clone()),
            &generator,
        )?;

        let mut device_prefix = opts
            .device_prefix
            .clone()
            .or_else(|| file.device_prefix.clone())
            .unwrap_or_else(|| DEFAULT_DEVICE_PREFIX.to_string());
        let mut device_count = opts
            .device_count
            .or(file.device_count)
            .unwrap_or(DEFAULT_DEVICE_COUNT);
        let device_list = match &opts.device_list {
            Some(text) => split_device_list(text),
            None => file
                .device_list
                .clone()
                .map(|list| list.into_ids())
                .unwrap_or_default(),
        };
        if !device_list.is_empty() {
            device_count = u32::try_from(device_list.len()).unwrap_or(u32::MAX);
            device_prefix.clear();
        }

        let kafka_connection_properties = match &opts.kafka_connection_properties {
            Some(text) => parse_json_setting("KafkaConnectionProperties", text)?,
            None => match file.kafka_connection_properties.clone() {
                Some(value) => {
                    parse_json_setting("KafkaConnectionProperties", &value.into_text())?
                }
                None => None,
            },
        };
        let intervals = match &opts.intervals {
            Some(text) => parse_json_setting("Intervals", text)?,
            None => file.intervals.clone(),
        }
        .unwrap_or_default();

        Ok(Self {
            transport: opts.transport,
            kafka_connection_properties,
            kafka_topic: opts.kafka_topic.clone().or_else(|| file.kafka_topic.clone()),
            device_prefix,
            device_index: opts
                .device_index
                .or(file.device_index)
                .unwrap_or(DEFAULT_DEVICE_INDEX),
            device_count,
            device_list,
            message_count: opts
                .message_count
                .or(file.message_count)
                .unwrap_or(DEFAULT_MESSAGE_COUNT),
            interval: opts
                .interval
                .or(file.interval)
                .unwrap_or(DEFAULT_INTERVAL_MS),
            intervals,
            duplicate_every: opts.duplicate_every.or(file.duplicate_every).unwrap_or(0),
            generator,
            payloads: Arc::new(payloads),
            header,
            partition_key,
            seed: opts.seed,
        })
    }
}

/// Parse a JSON-valued setting. Blank text means "not set".
fn parse_json_setting<T: DeserializeOwned>(
    key: &'static str,
    text: &str,
) -> Result<Option<T>, ConfigError> {
    if text.trim().is_empty() {
        return Ok(None);
    }
    serde_json::from_str(text)
        .map(Some)
        .map_err(|source| ConfigError::ParseValue {
            key,
            value: text.to_string(),
            source,
        })
}

fn load_variables(raw: Option<String>) -> Result<VariableSet, ConfigError> {
    match raw.filter(|text| !text.trim().is_empty()) {
        Some(text) => {
            let definitions = VariableDefinition::list_from_json(&text)?;
            Ok(VariableSet::new(&definitions)?)
        }
        None => {
            warn!("No custom telemetry variables found");
            Ok(VariableSet::default_counter())
        }
    }
}

fn compile(
    key: &str,
    text: &str,
    generator: &VariableGenerator,
) -> Result<CompiledTemplate, ConfigError> {
    CompiledTemplate::compile(text, generator.known_names()).map_err(|source| {
        ConfigError::Template {
            key: key.to_string(),
            source,
        }
    })
}

fn optional_template(
    key: &str,
    text: Option<String>,
    generator: &VariableGenerator,
) -> Result<Option<Arc<CompiledTemplate>>, ConfigError> {
    match text.filter(|t| !t.trim().is_empty()) {
        Some(text) => Ok(Some(Arc::new(compile(key, &text, generator)?))),
        None => Ok(None),
    }
}

/// Text of a named template: a file key first, then an environment variable.
fn named_template(file: &ConfigFile, name: &str) -> Option<String> {
    file.extra_text(name)
        .or_else(|| std::env::var(name).ok())
        .filter(|text| !text.trim().is_empty())
}

fn load_payloads(
    opts: &RunOpts,
    file: &ConfigFile,
    generator: &Arc<VariableGenerator>,
) -> Result<PayloadSet, ConfigError> {
    let configured_template = opts
        .template
        .clone()
        .or_else(|| file.template.clone().map(InlineJson::into_text))
        .filter(|text| !text.trim().is_empty());
    let is_builtin_default = configured_template.is_none();
    let default_template = Arc::new(compile(
        "Template",
        configured_template.as_deref().unwrap_or(DEFAULT_TEMPLATE),
        generator,
    )?);

    let mut definitions = Vec::new();

    for (index, entry) in file.payloads.iter().flatten().enumerate() {
        let weight = entry.distribution.unwrap_or(FULL_WEIGHT);
        let definition = match entry.kind {
            PayloadKind::Template => {
                let template = match entry
                    .template
                    .clone()
                    .map(InlineJson::into_text)
                    .filter(|text| !text.trim().is_empty())
                {
                    Some(text) => Arc::new(compile(&format!("Payloads[{index}]"), &text, generator)?),
                    None => Arc::clone(&default_template),
                };
                PayloadDefinition::templated(weight, template, Arc::clone(generator))?
            }
            PayloadKind::Fix => {
                let value = entry
                    .value
                    .clone()
                    .map(InlineJson::into_text)
                    .ok_or_else(|| ConfigError::InvalidPayload {
                        index,
                        reason: "fix payload requires a value".to_string(),
                    })?;
                PayloadDefinition::fixed(weight, value.into_bytes())?
            }
        };

        definitions.push(match entry.device_id.as_deref().map(str::trim) {
            Some(device_id) if !device_id.is_empty() => definition.pinned_to(device_id),
            _ => definition,
        });
    }

    let distribution = opts
        .payload_distribution
        .clone()
        .or_else(|| file.payload_distribution.clone());
    if let Some(distribution) = distribution.filter(|text| !text.trim().is_empty()) {
        for entry in parse_distribution(&distribution)? {
            let definition = match entry.fixed_bytes() {
                Some(bytes) => PayloadDefinition::fixed(entry.weight, bytes)?,
                None => {
                    let template = match &entry.source {
                        DistributionSource::Template(TemplateRef::Named(name)) => {
                            let text = named_template(file, name)
                                .ok_or_else(|| ConfigError::UnknownTemplate(name.clone()))?;
                            Arc::new(compile(name, &text, generator)?)
                        }
                        _ => Arc::clone(&default_template),
                    };
                    PayloadDefinition::templated(entry.weight, template, Arc::clone(generator))?
                }
            };
            definitions.push(definition);
        }
    }

    if definitions.is_empty() {
        if is_builtin_default {
            warn!("Using default telemetry template");
        }
        definitions.push(PayloadDefinition::templated(
            FULL_WEIGHT,
            default_template,
            Arc::clone(generator),
        )?);
    }

    Ok(PayloadSet::new(definitions)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TransportKind;
    use telemetry_payload::PayloadContent;

    fn console_opts() -> RunOpts {
        RunOpts {
            transport: Some(TransportKind::Console),
            ..Default::default()
        }
    }

    fn load(opts: &RunOpts, file_json: &str) -> Result<RunnerConfig, ConfigError> {
        let file: ConfigFile = serde_json::from_str(file_json).unwrap();
        RunnerConfig::from_sources(opts, &file)
    }

    fn weights(config: &RunnerConfig) -> Vec<u32> {
        config
            .payloads
            .definitions()
            .iter()
            .map(|d| d.weight())
            .collect()
    }

    fn fixed_bytes(definition: &PayloadDefinition) -> Option<&[u8]> {
        match definition.content() {
            PayloadContent::Fixed(bytes) => Some(bytes),
            PayloadContent::Templated { .. } => None,
        }
    }

    #[test]
    fn test_defaults() {
        let config = load(&console_opts(), "{}").unwrap();

        assert_eq!(config.device_prefix, "sim");
        assert_eq!(config.device_index, 1);
        assert_eq!(config.device_count, 1);
        assert_eq!(config.message_count, 10);
        assert_eq!(config.interval, 1000);
        assert_eq!(config.duplicate_every, 0);
        assert!(config.header.is_none());
        assert_eq!(config.device_ids(), vec!["sim000001"]);
        assert!(config.generator.variables().get("Counter").is_some());

        assert_eq!(weights(&config), vec![100]);
        assert_eq!(
            config.payloads.description(),
            format!("Template: {DEFAULT_TEMPLATE}")
        );
        config.ensure_is_valid().unwrap();
    }

    #[test]
    fn test_cli_overrides_file() {
        let opts = RunOpts {
            device_count: Some(5),
            interval: Some(250),
            ..console_opts()
        };
        let config = load(&opts, r#"{"DeviceCount": 2, "Interval": 100, "MessageCount": 7}"#)
            .unwrap();
        assert_eq!(config.device_count, 5);
        assert_eq!(config.interval, 250);
        assert_eq!(config.message_count, 7);
    }

    #[test]
    fn test_device_ids_from_prefix_and_index() {
        let opts = RunOpts {
            device_prefix: Some("dev".to_string()),
            device_index: Some(9),
            device_count: Some(3),
            ..console_opts()
        };
        let config = load(&opts, "{}").unwrap();
        assert_eq!(
            config.device_ids(),
            vec!["dev000009", "dev000010", "dev000011"]
        );
    }

    #[test]
    fn test_device_list_overrides_count_and_prefix() {
        let opts = RunOpts {
            device_list: Some("device0001;device0002,device0003".to_string()),
            device_count: Some(10),
            ..console_opts()
        };
        let config = load(&opts, "{}").unwrap();
        assert_eq!(config.device_count, 3);
        assert_eq!(config.device_prefix, "");
        assert_eq!(
            config.device_ids(),
            vec!["device0001", "device0002", "device0003"]
        );
    }

    #[test]
    fn test_distribution_ordering_and_sizes() {
        let opts = RunOpts {
            payload_distribution: Some(
                "fixSize(10, 12) template(25, default) fix(65, aaaaBBBBBCCC)".to_string(),
            ),
            ..console_opts()
        };
        let config = load(&opts, "{}").unwrap();
        let definitions = config.payloads.definitions();

        assert_eq!(weights(&config), vec![65, 25, 10]);
        assert_eq!(fixed_bytes(&definitions[0]).map(<[u8]>::len), Some(9));
        assert!(fixed_bytes(&definitions[1]).is_none());
        assert_eq!(fixed_bytes(&definitions[2]), Some(&[0u8; 12][..]));
    }

    #[test]
    fn test_fix_payloads_decode_base64() {
        let opts = RunOpts {
            payload_distribution: Some("fix(10, MTA=) template(25, default) fix(65, NjU=)".to_string()),
            ..console_opts()
        };
        let config = load(&opts, "{}").unwrap();
        let definitions = config.payloads.definitions();
        assert_eq!(fixed_bytes(&definitions[0]), Some(&b"65"[..]));
        assert_eq!(fixed_bytes(&definitions[2]), Some(&b"10"[..]));
    }

    #[test]
    fn test_named_template_from_file_key() {
        let opts = RunOpts {
            payload_distribution: Some("template(49, mytemplate) template(51)".to_string()),
            ..console_opts()
        };
        let config = load(&opts, r#"{"mytemplate": "{\"custom\": $.Counter}"}"#).unwrap();
        let descriptions: Vec<String> = config
            .payloads
            .definitions()
            .iter()
            .map(|d| d.description())
            .collect();
        assert_eq!(
            descriptions,
            vec![
                format!("Template: {DEFAULT_TEMPLATE}"),
                r#"Template: {"custom": $.Counter}"#.to_string(),
            ]
        );
    }

    #[test]
    fn test_unknown_named_template_is_fatal() {
        let opts = RunOpts {
            payload_distribution: Some("template(100, no_such_template_key_xyz)".to_string()),
            ..console_opts()
        };
        let result = load(&opts, "{}");
        assert!(matches!(result, Err(ConfigError::UnknownTemplate(name)) if name == "no_such_template_key_xyz"));
    }

    #[test]
    fn test_malformed_distribution_is_fatal() {
        let opts = RunOpts {
            payload_distribution: Some("fix(10, !!notbase64)".to_string()),
            ..console_opts()
        };
        assert!(matches!(load(&opts, "{}"), Err(ConfigError::Payload(_))));
    }

    #[test]
    fn test_payload_list_with_pinned_devices() {
        let config = load(
            &console_opts(),
            r#"{
                "Variables": [{"name": "Value", "sequence": true, "values": ["$.Counter", "true"]},
                              {"name": "Counter", "min": 1}],
                "Payloads": [
                    {"type": "template", "template": {"a": "b", "value": "$.Value"}},
                    {"type": "template", "deviceId": "device0001", "template": {"value": "$.Value"}},
                    {"type": "fix", "deviceId": "device0002", "value": {"value": "myfixvalue"}}
                ]
            }"#,
        )
        .unwrap();

        let definitions = config.payloads.definitions();
        assert_eq!(definitions.len(), 3);
        let pinned: Vec<Option<&str>> = definitions.iter().map(|d| d.device_id()).collect();
        assert_eq!(pinned, vec![None, Some("device0001"), Some("device0002")]);
        assert_eq!(
            fixed_bytes(&definitions[2]),
            Some(&br#"{"value":"myfixvalue"}"#[..])
        );
    }

    #[test]
    fn test_fix_entry_without_value_is_rejected() {
        let result = load(&console_opts(), r#"{"Payloads": [{"type": "fix"}]}"#);
        assert!(matches!(
            result,
            Err(ConfigError::InvalidPayload { index: 0, .. })
        ));
    }

    #[test]
    fn test_variables_from_flag_string() {
        let opts = RunOpts {
            variables: Some(r#"[{"name": "Temp", "random": true, "min": 10, "max": 30}]"#.to_string()),
            ..console_opts()
        };
        let config = load(&opts, "{}").unwrap();
        assert!(config.generator.variables().get("Temp").is_some());
        assert!(config.generator.variables().get("Counter").is_none());
    }

    #[test]
    fn test_duplicate_variable_is_fatal() {
        let opts = RunOpts {
            variables: Some(r#"[{"name": "A"}, {"name": "A"}]"#.to_string()),
            ..console_opts()
        };
        assert!(matches!(load(&opts, "{}"), Err(ConfigError::Variables(_))));
    }

    #[test]
    fn test_header_template() {
        let config = load(&console_opts(), r#"{"Header": {"k": "v"}}"#).unwrap();
        let header = config.header.unwrap();
        assert_eq!(header.text(), r#"{"k":"v"}"#);
    }

    #[test]
    fn test_per_device_intervals() {
        let opts = RunOpts {
            intervals: Some(r#"{"sim000001": [10000]}"#.to_string()),
            ..console_opts()
        };
        let config = load(&opts, r#"{"Interval": 500}"#).unwrap();
        let plan = config.plan().unwrap();
        assert_eq!(plan.intervals.for_device("sim000001"), &[10000]);
        assert_eq!(plan.intervals.for_device("sim000002"), &[500]);
    }

    #[test]
    fn test_kafka_settings_validation() {
        let opts = RunOpts {
            kafka_connection_properties: Some(r#"{"bootstrap.servers": "localhost:9092"}"#.to_string()),
            ..Default::default()
        };
        let config = load(&opts, "{}").unwrap();
        assert_eq!(config.transport_kind().unwrap(), TransportKind::Kafka);
        assert!(matches!(
            config.ensure_is_valid(),
            Err(ConfigError::MissingKafkaTopic)
        ));

        let opts = RunOpts {
            kafka_topic: Some("telemetry".to_string()),
            ..opts
        };
        let config = load(&opts, "{}").unwrap();
        config.ensure_is_valid().unwrap();
        let (properties, topic) = config.kafka_settings().unwrap();
        assert_eq!(properties["bootstrap.servers"], "localhost:9092");
        assert_eq!(topic, "telemetry");
    }

    #[test]
    fn test_missing_bootstrap_servers() {
        let opts = RunOpts {
            kafka_connection_properties: Some(r#"{"client.id": "sim"}"#.to_string()),
            kafka_topic: Some("telemetry".to_string()),
            ..Default::default()
        };
        let config = load(&opts, "{}").unwrap();
        assert!(matches!(
            config.ensure_is_valid(),
            Err(ConfigError::MissingBootstrapServers)
        ));
    }

    #[test]
    fn test_transport_selection_errors() {
        let config = load(&RunOpts::default(), "{}").unwrap();
        assert!(matches!(config.ensure_is_valid(), Err(ConfigError::NoTransport)));

        let opts = RunOpts {
            kafka_topic: Some("telemetry".to_string()),
            ..Default::default()
        };
        let config = load(&opts, "{}").unwrap();
        assert!(matches!(
            config.ensure_is_valid(),
            Err(ConfigError::MissingKafkaProperties)
        ));

        let opts = RunOpts {
            kafka_connection_properties: Some(r#"{"bootstrap.servers": "b:9092"}"#.to_string()),
            ..console_opts()
        };
        let config = load(&opts, "{}").unwrap();
        assert!(matches!(
            config.ensure_is_valid(),
            Err(ConfigError::ConflictingTransport)
        ));
    }

    #[test]
    fn test_invalid_kafka_properties_json() {
        let opts = RunOpts {
            kafka_connection_properties: Some("not json".to_string()),
            ..Default::default()
        };
        assert!(matches!(
            load(&opts, "{}"),
            Err(ConfigError::ParseValue { key: "KafkaConnectionProperties", .. })
        ));
    }

    #[test]
    fn test_interval_and_duplicate_validation() {
        let opts = RunOpts {
            interval: Some(0),
            ..console_opts()
        };
        let config = load(&opts, "{}").unwrap();
        assert!(matches!(config.ensure_is_valid(), Err(ConfigError::NotPositive(_))));

        let config = load(&console_opts(), r#"{"Intervals": {"sim000001": [100, -1]}}"#).unwrap();
        assert!(matches!(config.ensure_is_valid(), Err(ConfigError::NotPositive(_))));

        let opts = RunOpts {
            duplicate_every: Some(-1),
            ..console_opts()
        };
        let config = load(&opts, "{}").unwrap();
        assert!(matches!(
            config.ensure_is_valid(),
            Err(ConfigError::NegativeDuplicateEvery)
        ));
    }

    #[test]
    fn test_incomplete_distribution_fails_at_startup() {
        let opts = RunOpts {
            payload_distribution: Some("fixSize(30, 4) template(20)".to_string()),
            ..console_opts()
        };
        let config = load(&opts, "{}").unwrap();
        assert!(matches!(
            config.ensure_is_valid(),
            Err(ConfigError::Payload(_))
        ));
    }

    #[test]
    fn test_zero_devices_rejected() {
        let opts = RunOpts {
            device_count: Some(0),
            ..console_opts()
        };
        let config = load(&opts, "{}").unwrap();
        assert!(matches!(config.ensure_is_valid(), Err(ConfigError::NoDevices)));
    }
}

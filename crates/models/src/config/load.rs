use super::{DefaultConfig, DefaultsDocument, OverrideConfig, Selector};
use schemars::JsonSchema;
use serde::de::DeserializeOwned;

#[derive(thiserror::Error, Debug)]
pub enum ConfigError {
    #[error("[{name}]: failed to parse config document")]
    Parse {
        name: String,
        #[source]
        detail: serde_yaml::Error,
    },
    #[error("[{name}]: config is not valid. {detail} (at '{location}')")]
    Schema {
        name: String,
        location: String,
        detail: String,
    },
    #[error("[{name}]: config is not valid")]
    Decode {
        name: String,
        #[source]
        detail: serde_json::Error,
    },
    #[error("[{name}]: config is not valid. {section}[{index}] {detail}")]
    Selector {
        name: String,
        section: &'static str,
        index: usize,
        detail: String,
    },
}

/// JSON schema of a default configuration document.
pub fn defaults_schema() -> serde_json::Value {
    schema_of::<DefaultsDocument>()
}

/// JSON schema of an override configuration document.
pub fn overrides_schema() -> serde_json::Value {
    schema_of::<OverrideConfig>()
}

/// Load a YAML or JSON default configuration document named `name`,
/// and apply built-in defaults to every field it omits.
pub fn load_defaults(name: &str, content: &[u8]) -> Result<DefaultConfig, ConfigError> {
    let doc: DefaultsDocument = parse_and_validate(name, content)?;
    Ok(DefaultConfig::from(&doc))
}

/// Load a YAML or JSON override configuration document named `name`.
pub fn load_overrides(name: &str, content: &[u8]) -> Result<OverrideConfig, ConfigError> {
    let doc: OverrideConfig = parse_and_validate(name, content)?;

    let OverrideConfig {
        lambda_functions,
        sqs_queues,
        api_gateway_paths,
        step_functions,
    } = &doc;

    check_selectors(name, "lambdaFunctions", lambda_functions)?;
    check_selectors(name, "sqsQueues", sqs_queues)?;
    check_selectors(name, "apiGatewayPaths", api_gateway_paths)?;
    check_selectors(name, "stepFunctions", step_functions)?;

    Ok(doc)
}

fn schema_of<T: JsonSchema>() -> serde_json::Value {
    serde_json::to_value(schemars::schema_for!(T)).expect("schema serializes to JSON")
}

fn parse_and_validate<T>(name: &str, content: &[u8]) -> Result<T, ConfigError>
where
    T: DeserializeOwned + JsonSchema,
{
    // YAML is a superset of JSON, so this parses either.
    let dom: serde_json::Value =
        serde_yaml::from_slice(content).map_err(|detail| ConfigError::Parse {
            name: name.to_string(),
            detail,
        })?;

    if let Err(err) = jsonschema::validate(&schema_of::<T>(), &dom) {
        return Err(ConfigError::Schema {
            name: name.to_string(),
            location: err.instance_path.to_string(),
            detail: err.to_string(),
        });
    }

    serde_json::from_value(dom).map_err(|detail| ConfigError::Decode {
        name: name.to_string(),
        detail,
    })
}

fn check_selectors<S: Selector>(
    name: &str,
    section: &'static str,
    entries: &[S],
) -> Result<(), ConfigError> {
    for (index, entry) in entries.iter().enumerate() {
        if let Err(detail) = entry.check() {
            return Err(ConfigError::Selector {
                name: name.to_string(),
                section,
                index,
                detail,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_load_yaml_defaults() {
        let config = load_defaults(
            "defaults.yaml",
            br#"
lambda:
  errorRate:
    enabled: true
    threshold: 0.05
sqs:
  messageAge:
    enabled: true
"#,
        )
        .unwrap();

        assert!(config.lambda.error_rate.enabled);
        assert_eq!(config.lambda.error_rate.threshold, 0.05);
        assert_eq!(config.lambda.error_rate.evaluation_periods, 5);
        assert!(!config.lambda.throttle_count.enabled);
        assert!(config.sqs.message_age.enabled);
        assert_eq!(config.sqs.message_age.threshold, 600000.0);
    }

    #[test]
    fn test_empty_json_document_is_all_defaults() {
        let config = load_defaults("defaults.json", b"{}").unwrap();
        assert_eq!(config, DefaultConfig::default());
    }

    #[test]
    fn test_out_of_range_threshold_is_rejected() {
        let err = load_defaults(
            "defaults.json",
            br#"{"lambda": {"errorRate": {"threshold": 1.5}}}"#,
        )
        .unwrap_err();

        assert!(matches!(err, ConfigError::Schema { .. }), "{err:?}");
        assert!(err.to_string().starts_with("[defaults.json]: config is not valid."));

        let err = load_defaults(
            "defaults.json",
            br#"{"stepFunctions": {"failedCount": {"threshold": 0}}}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Schema { .. }), "{err:?}");
    }

    #[test]
    fn test_unknown_section_is_rejected() {
        let err = load_defaults("defaults.json", br#"{"dynamodb": {}}"#).unwrap_err();
        assert!(matches!(err, ConfigError::Schema { .. }), "{err:?}");
    }

    #[test]
    fn test_override_selectors_are_exclusive() {
        let overrides = load_overrides(
            "overrides.yaml",
            br#"
lambdaFunctions:
  - functionName: hello
    dlqErrorCount:
      enabled: false
apiGatewayPaths:
  - path: /
    p90: { enabled: false }
"#,
        )
        .unwrap();
        assert_eq!(overrides.lambda_functions.len(), 1);
        assert_eq!(overrides.api_gateway_paths[0].path, "/");

        let err = load_overrides(
            "overrides.yaml",
            br#"
sqsQueues:
  - logicalId: Queue
  - logicalId: Other
    queueName: other
"#,
        )
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "[overrides.yaml]: config is not valid. sqsQueues[1] must set only one of logicalId or queueName"
        );
    }

    #[test]
    fn test_path_is_required() {
        let err = load_overrides(
            "overrides.json",
            br#"{"apiGatewayPaths": [{"p90": {"enabled": false}}]}"#,
        )
        .unwrap_err();
        assert!(matches!(err, ConfigError::Schema { .. }), "{err:?}");
    }

    #[test]
    fn test_malformed_document() {
        let err = load_overrides("overrides.yaml", b"lambdaFunctions: [").unwrap_err();
        assert!(matches!(err, ConfigError::Parse { .. }), "{err:?}");
    }
}

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

mod load;
pub use load::{
    defaults_schema, load_defaults, load_overrides, overrides_schema, ConfigError,
};

const ONE_SECOND_MS: f64 = 1000.0;
const ONE_MINUTE_MS: f64 = 60.0 * ONE_SECOND_MS;

/// Overlay applies the fields which are present in `self` onto `target`,
/// retaining fields of `target` which `self` doesn't set.
pub trait Overlay<T> {
    fn overlay(&self, target: &mut T);
}

/// Selector identifies the resources to which an override entry applies.
pub trait Selector {
    /// Does this entry select the resource having `logical_id`,
    /// and optionally a kind-specific natural name?
    fn selects(&self, logical_id: &str, natural_name: Option<&str>) -> bool;

    /// Verify the entry identifies its resource in exactly one way.
    fn check(&self) -> Result<(), String>;
}

/// AlarmConfig is the resolved configuration of one kind of alarm.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AlarmConfig {
    pub enabled: bool,
    pub threshold: f64,
    pub evaluation_periods: u32,
}

impl AlarmConfig {
    pub fn disabled(threshold: f64, evaluation_periods: u32) -> Self {
        Self {
            enabled: false,
            threshold,
            evaluation_periods,
        }
    }
}

/// Partial configuration of an alarm having a whole-number threshold,
/// such as a count or a duration in milliseconds.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CountPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 1))]
    pub threshold: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 1))]
    pub evaluation_periods: Option<u32>,
}

/// Partial configuration of an alarm having a threshold which is a
/// ratio between zero and one.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct RatioPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 0.0, max = 1.0))]
    pub threshold: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[schemars(range(min = 1))]
    pub evaluation_periods: Option<u32>,
}

impl Overlay<AlarmConfig> for CountPatch {
    fn overlay(&self, target: &mut AlarmConfig) {
        if let Some(enabled) = self.enabled {
            target.enabled = enabled;
        }
        if let Some(threshold) = self.threshold {
            target.threshold = threshold as f64;
        }
        if let Some(periods) = self.evaluation_periods {
            target.evaluation_periods = periods;
        }
    }
}

impl Overlay<AlarmConfig> for RatioPatch {
    fn overlay(&self, target: &mut AlarmConfig) {
        if let Some(enabled) = self.enabled {
            target.enabled = enabled;
        }
        if let Some(threshold) = self.threshold {
            target.threshold = threshold;
        }
        if let Some(periods) = self.evaluation_periods {
            target.evaluation_periods = periods;
        }
    }
}

// alarm_section! declares the configuration of a resource kind:
// * A resolved $Section having an AlarmConfig for each kind of alarm,
//   defaulted to a disabled alarm with the given threshold and periods.
// * A $Patch of the section, as it's written in a defaults document.
// * An $Override entry, being a $Patch plus the fields which select
//   the resource(s) it applies to.
macro_rules! alarm_section {
    (
        $(#[$meta:meta])*
        section $Section:ident, patch $Patch:ident, override $Override:ident {
            $( $(#[$smeta:meta])* $select:ident : $SelectTy:ty, )*
        }
        alarms {
            $( $(#[$fmeta:meta])* $field:ident : $PatchTy:ident = ($threshold:expr, $periods:expr), )*
        }
    ) => {
        $(#[$meta])*
        #[derive(Serialize, Debug, Clone, PartialEq)]
        #[serde(rename_all = "camelCase")]
        pub struct $Section {
            $( $(#[$fmeta])* pub $field: AlarmConfig, )*
        }

        impl Default for $Section {
            fn default() -> Self {
                Self {
                    $( $field: AlarmConfig::disabled($threshold, $periods), )*
                }
            }
        }

        $(#[$meta])*
        #[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, JsonSchema)]
        #[serde(deny_unknown_fields, rename_all = "camelCase")]
        pub struct $Patch {
            $(
                $(#[$fmeta])*
                #[serde(default, skip_serializing_if = "Option::is_none")]
                pub $field: Option<$PatchTy>,
            )*
        }

        alarm_section!(@overlay $Patch => $Section { $($field)* });

        #[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, JsonSchema)]
        #[serde(deny_unknown_fields, rename_all = "camelCase")]
        pub struct $Override {
            $( $(#[$smeta])* pub $select: $SelectTy, )*
            $(
                $(#[$fmeta])*
                #[serde(default, skip_serializing_if = "Option::is_none")]
                pub $field: Option<$PatchTy>,
            )*
        }

        alarm_section!(@overlay $Override => $Section { $($field)* });
    };

    // Overlay each alarm of $Ty which is present onto its $Section field.
    (@overlay $Ty:ident => $Section:ident { $($field:ident)* }) => {
        impl Overlay<$Section> for $Ty {
            fn overlay(&self, target: &mut $Section) {
                $(
                    if let Some(patch) = &self.$field {
                        patch.overlay(&mut target.$field);
                    }
                )*
            }
        }
    };
}

alarm_section! {
    /// Alarms of compute functions (AWS::Lambda::Function).
    section LambdaConfig, patch LambdaPatch, override FunctionOverride {
        /// Logical ID of the function within the template.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        logical_id: Option<String>,
        /// Physical name (FunctionName) of the function.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        function_name: Option<String>,
    }
    alarms {
        /// Ratio of errors to invocations.
        error_rate: RatioPatch = (0.01, 5),
        /// Count of throttled invocations.
        throttle_count: CountPatch = (1.0, 1),
        /// Count of failures to deliver to the dead-letter target.
        dlq_error_count: CountPatch = (1.0, 1),
        /// Maximum age, in milliseconds, of stream records when read.
        iterator_age: CountPatch = (ONE_MINUTE_MS, 5),
    }
}

alarm_section! {
    /// Alarms of queues (AWS::SQS::Queue).
    section SqsConfig, patch SqsPatch, override QueueOverride {
        /// Logical ID of the queue within the template.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        logical_id: Option<String>,
        /// Physical name (QueueName) of the queue.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        queue_name: Option<String>,
    }
    alarms {
        /// Maximum age, in milliseconds, of the oldest queued message.
        message_age: CountPatch = (10.0 * ONE_MINUTE_MS, 1),
    }
}

alarm_section! {
    /// Alarms of state machines (AWS::StepFunctions::StateMachine).
    section StepFunctionsConfig, patch StepFunctionsPatch, override StateMachineOverride {
        /// Logical ID of the state machine within the template.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        logical_id: Option<String>,
        /// Physical name (StateMachineName) of the state machine.
        #[serde(default, skip_serializing_if = "Option::is_none")]
        state_machine_name: Option<String>,
    }
    alarms {
        /// Count of failed executions.
        failed_count: CountPatch = (1.0, 1),
        /// Count of throttled executions.
        throttle_count: CountPatch = (1.0, 1),
        /// Count of timed-out executions.
        timed_out_count: CountPatch = (1.0, 1),
    }
}

alarm_section! {
    /// Alarms of each route (path and method) of an HTTP API
    /// (AWS::ApiGateway::RestApi).
    section ApiGatewayConfig, patch ApiGatewayPatch, override PathOverride {
        /// Request path of the route, such as "/user/{userId}".
        path: String,
    }
    alarms {
        /// 90th percentile latency, in milliseconds.
        p90: CountPatch = (ONE_SECOND_MS, 5),
        /// 95th percentile latency, in milliseconds.
        p95: CountPatch = (3.0 * ONE_SECOND_MS, 5),
        /// 99th percentile latency, in milliseconds.
        p99: CountPatch = (5.0 * ONE_SECOND_MS, 5),
        /// Ratio of 4xx responses to all requests.
        status4xx_rate: RatioPatch = (0.05, 5),
        /// Ratio of 5xx responses to all requests.
        status5xx_rate: RatioPatch = (0.01, 5),
        /// Ratio of successful responses to all requests,
        /// which alarms when it falls below the threshold.
        status2xx_rate: RatioPatch = (0.99, 5),
    }
}

fn exactly_one(logical_id: &Option<String>, name: &Option<String>, field: &str) -> Result<(), String> {
    match (logical_id, name) {
        (Some(_), None) | (None, Some(_)) => Ok(()),
        (Some(_), Some(_)) => Err(format!("must set only one of logicalId or {field}")),
        (None, None) => Err(format!("must set one of logicalId or {field}")),
    }
}

fn select(logical_id: &Option<String>, name: &Option<String>, id: &str, natural: Option<&str>) -> bool {
    logical_id.as_deref() == Some(id) || (name.is_some() && name.as_deref() == natural)
}

impl Selector for FunctionOverride {
    fn selects(&self, logical_id: &str, natural_name: Option<&str>) -> bool {
        select(&self.logical_id, &self.function_name, logical_id, natural_name)
    }
    fn check(&self) -> Result<(), String> {
        exactly_one(&self.logical_id, &self.function_name, "functionName")
    }
}

impl Selector for QueueOverride {
    fn selects(&self, logical_id: &str, natural_name: Option<&str>) -> bool {
        select(&self.logical_id, &self.queue_name, logical_id, natural_name)
    }
    fn check(&self) -> Result<(), String> {
        exactly_one(&self.logical_id, &self.queue_name, "queueName")
    }
}

impl Selector for StateMachineOverride {
    fn selects(&self, logical_id: &str, natural_name: Option<&str>) -> bool {
        select(
            &self.logical_id,
            &self.state_machine_name,
            logical_id,
            natural_name,
        )
    }
    fn check(&self) -> Result<(), String> {
        exactly_one(
            &self.logical_id,
            &self.state_machine_name,
            "stateMachineName",
        )
    }
}

// Routes have no logical ID of their own, and are selected only by path.
impl Selector for PathOverride {
    fn selects(&self, _logical_id: &str, natural_name: Option<&str>) -> bool {
        natural_name == Some(self.path.as_str())
    }
    fn check(&self) -> Result<(), String> {
        if self.path.is_empty() {
            Err("path must not be empty".to_string())
        } else {
            Ok(())
        }
    }
}

/// DefaultConfig is the fully-defaulted configuration of every resource kind.
#[derive(Serialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct DefaultConfig {
    pub lambda: LambdaConfig,
    pub sqs: SqsConfig,
    pub api_gateway: ApiGatewayConfig,
    pub step_functions: StepFunctionsConfig,
}

/// DefaultsDocument is a default configuration as it's authored,
/// where every omitted field takes its built-in default.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct DefaultsDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lambda: Option<LambdaPatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sqs: Option<SqsPatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_gateway: Option<ApiGatewayPatch>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub step_functions: Option<StepFunctionsPatch>,
}

impl Overlay<DefaultConfig> for DefaultsDocument {
    fn overlay(&self, target: &mut DefaultConfig) {
        let DefaultsDocument {
            lambda,
            sqs,
            api_gateway,
            step_functions,
        } = self;

        if let Some(patch) = lambda {
            patch.overlay(&mut target.lambda);
        }
        if let Some(patch) = sqs {
            patch.overlay(&mut target.sqs);
        }
        if let Some(patch) = api_gateway {
            patch.overlay(&mut target.api_gateway);
        }
        if let Some(patch) = step_functions {
            patch.overlay(&mut target.step_functions);
        }
    }
}

impl From<&DefaultsDocument> for DefaultConfig {
    fn from(doc: &DefaultsDocument) -> Self {
        let mut config = DefaultConfig::default();
        doc.overlay(&mut config);
        config
    }
}

/// OverrideConfig holds ordered override entries of each resource kind.
/// The first entry which selects a resource is applied to it.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq, JsonSchema)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct OverrideConfig {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub lambda_functions: Vec<FunctionOverride>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub sqs_queues: Vec<QueueOverride>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub api_gateway_paths: Vec<PathOverride>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub step_functions: Vec<StateMachineOverride>,
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builtin_defaults_are_disabled() {
        let config = DefaultConfig::default();

        assert_eq!(
            serde_json::to_value(&config.sqs).unwrap(),
            json!({"messageAge": {"enabled": false, "threshold": 600000.0, "evaluationPeriods": 1}}),
        );
        assert_eq!(config.lambda.iterator_age.threshold, 60000.0);
        assert_eq!(config.api_gateway.status2xx_rate.threshold, 0.99);
        assert!(!config.step_functions.timed_out_count.enabled);
    }

    #[test]
    fn test_overlay_retains_absent_fields() {
        let doc: DefaultsDocument = serde_json::from_value(json!({
            "lambda": {
                "errorRate": {"enabled": true},
                "iteratorAge": {"enabled": true, "threshold": 1000, "evaluationPeriods": 2},
            },
        }))
        .unwrap();
        let config = DefaultConfig::from(&doc);

        assert_eq!(
            config.lambda.error_rate,
            AlarmConfig {
                enabled: true,
                threshold: 0.01,
                evaluation_periods: 5
            }
        );
        assert_eq!(
            config.lambda.iterator_age,
            AlarmConfig {
                enabled: true,
                threshold: 1000.0,
                evaluation_periods: 2
            }
        );
        // Sections which aren't mentioned are untouched.
        assert_eq!(config.sqs, SqsConfig::default());
        assert_eq!(config.lambda.throttle_count, AlarmConfig::disabled(1.0, 1));
    }

    #[test]
    fn test_patch_and_override_overlay_alike() {
        let alarms = json!({
            "p95": {"threshold": 250},
            "status4xxRate": {"enabled": true, "evaluationPeriods": 3},
        });
        let patch: ApiGatewayPatch = serde_json::from_value(alarms.clone()).unwrap();

        let mut entry = alarms;
        entry["path"] = json!("/user");
        let entry: PathOverride = serde_json::from_value(entry).unwrap();

        let (mut from_patch, mut from_entry) =
            (ApiGatewayConfig::default(), ApiGatewayConfig::default());
        patch.overlay(&mut from_patch);
        entry.overlay(&mut from_entry);

        assert_eq!(from_patch, from_entry);
        assert_eq!(from_patch.p95.threshold, 250.0);
        assert!(from_patch.status4xx_rate.enabled);
        assert_eq!(from_patch.status4xx_rate.evaluation_periods, 3);
        assert_eq!(from_patch.p90, ApiGatewayConfig::default().p90);
    }

    #[test]
    fn test_override_entries_select_resources() {
        let overrides: OverrideConfig = serde_json::from_value(json!({
            "lambdaFunctions": [
                {"logicalId": "HelloFunction", "errorRate": {"enabled": false}},
                {"functionName": "world"},
            ],
            "apiGatewayPaths": [{"path": "/", "p90": {"enabled": false}}],
        }))
        .unwrap();

        let [hello, world] = overrides.lambda_functions.as_slice() else {
            panic!("expected two entries");
        };
        assert!(hello.selects("HelloFunction", Some("hello")));
        assert!(!hello.selects("WorldFunction", Some("world")));
        assert!(world.selects("WorldFunction", Some("world")));
        assert!(!world.selects("WorldFunction", None));
        assert!(hello.check().is_ok() && world.check().is_ok());

        let root = &overrides.api_gateway_paths[0];
        assert!(root.selects("", Some("/")));
        assert!(!root.selects("", Some("/user")));

        let both = FunctionOverride {
            logical_id: Some("A".to_string()),
            function_name: Some("a".to_string()),
            ..Default::default()
        };
        assert_eq!(
            both.check().unwrap_err(),
            "must set only one of logicalId or functionName"
        );
        assert!(FunctionOverride::default().check().is_err());
    }

    #[test]
    fn test_unknown_fields_are_rejected() {
        let err = serde_json::from_value::<DefaultsDocument>(json!({
            "lambda": {"errorRate": {"enabled": true, "treshold": 0.5}},
        }))
        .unwrap_err();
        assert!(err.to_string().contains("unknown field `treshold`"), "{err}");
    }
}

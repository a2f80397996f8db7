use super::{metric, Error, Generated, Notify, Target};
use models::{
    AlarmMetric, BasicStatistic, Comparison, DefaultConfig, Dimension, Expr, Fragment,
    LambdaConfig, Metric, MetricQuery, OverrideConfig,
};

const RESOURCE_TYPE: &str = "AWS::Lambda::Function";
const NAMESPACE: &str = "AWS/Lambda";

/// Alarms of compute functions.
pub struct Lambda;

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionSubject {
    pub logical_id: String,
    /// Physical name of the function, if the fragment names it.
    pub function_name: Option<String>,
    /// Does the function declare a dead-letter target?
    pub has_dlq: bool,
}

impl Target for Lambda {
    type Subject = FunctionSubject;
    type Config = LambdaConfig;

    const STACK_ID: &'static str = "NestedStackLambdaAlarms";

    fn subjects(&self, fragment: &Fragment) -> Result<Vec<FunctionSubject>, Error> {
        Ok(super::find(fragment, RESOURCE_TYPE)
            .into_iter()
            .map(|(logical_id, resource)| FunctionSubject {
                logical_id: logical_id.to_string(),
                function_name: resource.property_str("/FunctionName").map(str::to_string),
                has_dlq: resource.property("/DeadLetterConfig/TargetArn").is_some(),
            })
            .collect())
    }

    fn resolve(
        &self,
        subject: &FunctionSubject,
        defaults: &DefaultConfig,
        overrides: &OverrideConfig,
    ) -> LambdaConfig {
        super::resolve(
            &defaults.lambda,
            &overrides.lambda_functions,
            &subject.logical_id,
            subject.function_name.as_deref(),
        )
    }

    fn generate(
        &self,
        subject: &FunctionSubject,
        config: &LambdaConfig,
        notify: &Notify,
    ) -> Generated {
        let FunctionSubject {
            logical_id,
            function_name: _,
            has_dlq,
        } = subject;
        let LambdaConfig {
            error_rate,
            throttle_count,
            dlq_error_count,
            iterator_age,
        } = config;

        let param = format!("{logical_id}Name");
        let function = Expr::reference(&param);
        let dimensions = || vec![Dimension::new("FunctionName", function.clone())];
        let name = |template: String| Expr::sub(template, "functionName", function.clone());

        let mut out = Generated::default();

        if error_rate.enabled {
            tracing::debug!(%logical_id, "generating lambda error rate alarm...");

            let count = |id, label| {
                MetricQuery::count(
                    id,
                    label,
                    Metric {
                        dimensions: dimensions(),
                        metric_name: label,
                        namespace: NAMESPACE,
                    },
                )
            };
            let metrics = vec![
                count("invocations", "Invocations"),
                count("errors", "Errors"),
                MetricQuery::expression("errorRate", "Error Rate (%)", "errors / invocations"),
            ];

            out.alarms.insert(
                format!("{logical_id}ErrorRateAlarm"),
                metric::alarm(
                    name(format!(
                        "Lambda [${{functionName}}]: error rate > {}% over the last {} mins",
                        metric::percent(error_rate.threshold),
                        error_rate.evaluation_periods,
                    )),
                    Comparison::GreaterThanThreshold,
                    AlarmMetric::Math { metrics },
                    error_rate,
                    notify,
                ),
            );
        }

        if throttle_count.enabled {
            tracing::debug!(%logical_id, "generating lambda throttle count alarm...");

            out.alarms.insert(
                format!("{logical_id}ThrottleCountAlarm"),
                metric::alarm(
                    name(format!(
                        "Lambda [${{functionName}}]: throttle count > {} over the last {} mins",
                        metric::display(throttle_count.threshold),
                        throttle_count.evaluation_periods,
                    )),
                    Comparison::GreaterThanThreshold,
                    metric::basic(NAMESPACE, "Throttles", BasicStatistic::Sum, dimensions()),
                    throttle_count,
                    notify,
                ),
            );
        }

        // Without a dead-letter target there are no delivery errors to count.
        if *has_dlq && dlq_error_count.enabled {
            tracing::debug!(%logical_id, "generating lambda DLQ error count alarm...");

            out.alarms.insert(
                format!("{logical_id}DlqErrorCountAlarm"),
                metric::alarm(
                    name(format!(
                        "Lambda [${{functionName}}]: DLQ error count > {} over the last {} mins",
                        metric::display(dlq_error_count.threshold),
                        dlq_error_count.evaluation_periods,
                    )),
                    Comparison::GreaterThanThreshold,
                    metric::basic(
                        NAMESPACE,
                        "DeadLetterErrors",
                        BasicStatistic::Sum,
                        dimensions(),
                    ),
                    dlq_error_count,
                    notify,
                ),
            );
        }

        if iterator_age.enabled {
            tracing::debug!(%logical_id, "generating lambda iterator age alarm...");

            out.alarms.insert(
                format!("{logical_id}IteratorAgeAlarm"),
                metric::alarm(
                    name(format!(
                        "Lambda [${{functionName}}]: iterator age > {}ms over the last {} mins",
                        metric::display(iterator_age.threshold),
                        iterator_age.evaluation_periods,
                    )),
                    Comparison::GreaterThanThreshold,
                    metric::basic(NAMESPACE, "IteratorAge", BasicStatistic::Maximum, dimensions()),
                    iterator_age,
                    notify,
                ),
            );
        }

        if !out.alarms.is_empty() {
            out.parameter(
                param,
                format!("Name of the Lambda function identified as {logical_id} in the parent stack"),
                Expr::reference(logical_id),
            );
        }
        out
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use serde_json::json;

    fn enable_all(config: &mut LambdaConfig) {
        config.error_rate.enabled = true;
        config.throttle_count.enabled = true;
        config.dlq_error_count.enabled = true;
        config.iterator_age.enabled = true;
    }

    fn fragment() -> Fragment {
        serde_json::from_value(json!({
            "Resources": {
                "HelloFunction": {
                    "Type": "AWS::Lambda::Function",
                    "Properties": {
                        "FunctionName": "hello",
                        "DeadLetterConfig": {"TargetArn": {"Fn::GetAtt": ["Dlq", "Arn"]}},
                    },
                },
                "WorldFunction": {"Type": "AWS::Lambda::Function", "Properties": {}},
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_subjects() {
        assert_eq!(
            Lambda.subjects(&fragment()).unwrap(),
            vec![
                FunctionSubject {
                    logical_id: "HelloFunction".to_string(),
                    function_name: Some("hello".to_string()),
                    has_dlq: true,
                },
                FunctionSubject {
                    logical_id: "WorldFunction".to_string(),
                    function_name: None,
                    has_dlq: false,
                },
            ]
        );
    }

    #[test]
    fn test_dlq_alarm_requires_dead_letter_target() {
        let mut config = LambdaConfig::default();
        enable_all(&mut config);

        let subjects = Lambda.subjects(&fragment()).unwrap();
        let notify = Notify::default();

        let hello = Lambda.generate(&subjects[0], &config, &notify);
        assert_eq!(
            hello.alarms.keys().collect::<Vec<_>>(),
            vec![
                "HelloFunctionDlqErrorCountAlarm",
                "HelloFunctionErrorRateAlarm",
                "HelloFunctionIteratorAgeAlarm",
                "HelloFunctionThrottleCountAlarm",
            ]
        );

        let world = Lambda.generate(&subjects[1], &config, &notify);
        assert_eq!(world.alarms.len(), 3);
        assert!(!world.alarms.contains_key("WorldFunctionDlqErrorCountAlarm"));
    }

    #[test]
    fn test_no_alarms_no_parameters() {
        let subjects = Lambda.subjects(&fragment()).unwrap();
        let out = Lambda.generate(&subjects[0], &LambdaConfig::default(), &Notify::default());

        assert!(out.alarms.is_empty());
        assert!(out.parameters.is_empty());
        assert!(out.values.is_empty());
    }

    #[test]
    fn test_error_rate_alarm() {
        let mut config = LambdaConfig::default();
        config.error_rate.enabled = true;

        let subjects = Lambda.subjects(&fragment()).unwrap();
        let out = Lambda.generate(&subjects[0], &config, &Notify::default());

        let alarm = serde_json::to_value(&out.alarms["HelloFunctionErrorRateAlarm"]).unwrap();
        let name = json!({"Fn::Sub": [
            "Lambda [${functionName}]: error rate > 1% over the last 5 mins",
            {"functionName": {"Ref": "HelloFunctionName"}},
        ]});
        let stat = |name: &str| json!({
            "Metric": {
                "Dimensions": [{"Name": "FunctionName", "Value": {"Ref": "HelloFunctionName"}}],
                "MetricName": name,
                "Namespace": "AWS/Lambda",
            },
            "Period": 60,
            "Stat": "Sum",
            "Unit": "Count",
        });

        pretty_assertions::assert_eq!(
            alarm,
            json!({
                "Type": "AWS::CloudWatch::Alarm",
                "Properties": {
                    "AlarmActions": [{"Ref": "TopicArn"}],
                    "AlarmDescription": name,
                    "AlarmName": name,
                    "ComparisonOperator": "GreaterThanThreshold",
                    "Metrics": [
                        {"Id": "invocations", "Label": "Invocations", "MetricStat": stat("Invocations"), "ReturnData": false},
                        {"Id": "errors", "Label": "Errors", "MetricStat": stat("Errors"), "ReturnData": false},
                        {"Id": "errorRate", "Label": "Error Rate (%)", "Expression": "errors / invocations", "ReturnData": true},
                    ],
                    "EvaluationPeriods": 5,
                    "Threshold": 0.01,
                    "TreatMissingData": "notBreaching",
                }
            })
        );

        assert_eq!(
            serde_json::to_value(&out.values).unwrap(),
            json!({"HelloFunctionName": {"Ref": "HelloFunction"}})
        );
        assert_eq!(
            out.parameters["HelloFunctionName"].description,
            "Name of the Lambda function identified as HelloFunction in the parent stack"
        );
    }

    #[test]
    fn test_iterator_age_alarm() {
        let mut config = LambdaConfig::default();
        config.iterator_age.enabled = true;

        let subjects = Lambda.subjects(&fragment()).unwrap();
        let out = Lambda.generate(&subjects[1], &config, &Notify::default());

        pretty_assertions::assert_eq!(
            serde_json::to_value(&out.alarms["WorldFunctionIteratorAgeAlarm"]).unwrap()["Properties"],
            json!({
                "AlarmActions": [{"Ref": "TopicArn"}],
                "AlarmDescription": {"Fn::Sub": [
                    "Lambda [${functionName}]: iterator age > 60000ms over the last 5 mins",
                    {"functionName": {"Ref": "WorldFunctionName"}},
                ]},
                "AlarmName": {"Fn::Sub": [
                    "Lambda [${functionName}]: iterator age > 60000ms over the last 5 mins",
                    {"functionName": {"Ref": "WorldFunctionName"}},
                ]},
                "ComparisonOperator": "GreaterThanThreshold",
                "Dimensions": [{"Name": "FunctionName", "Value": {"Ref": "WorldFunctionName"}}],
                "MetricName": "IteratorAge",
                "Namespace": "AWS/Lambda",
                "Statistic": "Maximum",
                "Period": 60,
                "EvaluationPeriods": 5,
                "Threshold": 60000.0,
            })
        );
    }
}

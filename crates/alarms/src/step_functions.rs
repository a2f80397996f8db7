use super::{metric, Error, Generated, Notify, Target};
use models::{
    config::AlarmConfig, BasicStatistic, Comparison, DefaultConfig, Dimension, Expr, Fragment,
    OverrideConfig, StepFunctionsConfig,
};

const RESOURCE_TYPE: &str = "AWS::StepFunctions::StateMachine";

/// Alarms of workflow state machines.
pub struct StepFunctions;

#[derive(Debug, Clone, PartialEq)]
pub struct StateMachineSubject {
    pub logical_id: String,
    pub state_machine_name: Option<String>,
}

impl Target for StepFunctions {
    type Subject = StateMachineSubject;
    type Config = StepFunctionsConfig;

    const STACK_ID: &'static str = "NestedStackStepFunctionsAlarms";

    fn subjects(&self, fragment: &Fragment) -> Result<Vec<StateMachineSubject>, Error> {
        Ok(super::find(fragment, RESOURCE_TYPE)
            .into_iter()
            .map(|(logical_id, resource)| StateMachineSubject {
                logical_id: logical_id.to_string(),
                state_machine_name: resource
                    .property_str("/StateMachineName")
                    .map(str::to_string),
            })
            .collect())
    }

    fn resolve(
        &self,
        subject: &StateMachineSubject,
        defaults: &DefaultConfig,
        overrides: &OverrideConfig,
    ) -> StepFunctionsConfig {
        super::resolve(
            &defaults.step_functions,
            &overrides.step_functions,
            &subject.logical_id,
            subject.state_machine_name.as_deref(),
        )
    }

    fn generate(
        &self,
        subject: &StateMachineSubject,
        config: &StepFunctionsConfig,
        notify: &Notify,
    ) -> Generated {
        let logical_id = &subject.logical_id;
        let StepFunctionsConfig {
            failed_count,
            throttle_count,
            timed_out_count,
        } = config;

        // The name is for display, while metrics are dimensioned by ARN.
        let name_param = format!("{logical_id}Name");
        let arn_param = format!("{logical_id}Arn");

        let mut out = Generated::default();

        for (suffix, metric_name, config) in [
            ("FailedCountAlarm", "ExecutionsFailed", failed_count),
            ("ThrottleCountAlarm", "ExecutionThrottled", throttle_count),
            ("TimedOutCountAlarm", "ExecutionsTimedOut", timed_out_count),
        ] {
            if !config.enabled {
                continue;
            }
            tracing::debug!(%logical_id, metric_name, "generating step functions alarm...");

            out.alarms.insert(
                format!("{logical_id}{suffix}"),
                count_alarm(&name_param, &arn_param, metric_name, config, notify),
            );
        }

        if !out.alarms.is_empty() {
            out.parameter(
                name_param,
                format!("Name of the state machine identified as {logical_id} in the parent stack"),
                Expr::get_att(logical_id, "Name"),
            );
            out.parameter(
                arn_param,
                format!("ARN of the state machine identified as {logical_id} in the parent stack"),
                Expr::reference(logical_id),
            );
        }
        out
    }
}

fn count_alarm(
    name_param: &str,
    arn_param: &str,
    metric_name: &str,
    config: &AlarmConfig,
    notify: &Notify,
) -> models::Alarm {
    metric::alarm(
        Expr::sub(
            format!(
                "State Machine [${{stateMachineName}}]: {metric_name} > {} in the last {} minute",
                metric::display(config.threshold),
                config.evaluation_periods,
            ),
            "stateMachineName",
            Expr::reference(name_param),
        ),
        Comparison::GreaterThanThreshold,
        metric::basic(
            "AWS/States",
            metric_name,
            BasicStatistic::Sum,
            vec![Dimension::new("StateMachineArn", Expr::reference(arn_param))],
        ),
        config,
        notify,
    )
}

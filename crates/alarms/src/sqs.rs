use super::{metric, Error, Generated, Notify, Target};
use models::{
    BasicStatistic, Comparison, DefaultConfig, Dimension, Expr, Fragment, OverrideConfig,
    SqsConfig,
};

const RESOURCE_TYPE: &str = "AWS::SQS::Queue";

/// Alarms of message queues.
pub struct Sqs;

#[derive(Debug, Clone, PartialEq)]
pub struct QueueSubject {
    pub logical_id: String,
    pub queue_name: Option<String>,
}

impl Target for Sqs {
    type Subject = QueueSubject;
    type Config = SqsConfig;

    const STACK_ID: &'static str = "NestedStackSqsAlarms";

    fn subjects(&self, fragment: &Fragment) -> Result<Vec<QueueSubject>, Error> {
        Ok(super::find(fragment, RESOURCE_TYPE)
            .into_iter()
            .map(|(logical_id, resource)| QueueSubject {
                logical_id: logical_id.to_string(),
                queue_name: resource.property_str("/QueueName").map(str::to_string),
            })
            .collect())
    }

    fn resolve(
        &self,
        subject: &QueueSubject,
        defaults: &DefaultConfig,
        overrides: &OverrideConfig,
    ) -> SqsConfig {
        super::resolve(
            &defaults.sqs,
            &overrides.sqs_queues,
            &subject.logical_id,
            subject.queue_name.as_deref(),
        )
    }

    fn generate(&self, subject: &QueueSubject, config: &SqsConfig, notify: &Notify) -> Generated {
        let logical_id = &subject.logical_id;
        let SqsConfig { message_age } = config;

        let param = format!("{logical_id}Name");
        let queue = Expr::reference(&param);

        let mut out = Generated::default();

        if message_age.enabled {
            tracing::debug!(%logical_id, "generating SQS message age alarm...");

            out.alarms.insert(
                format!("{logical_id}MessageAgeAlarm"),
                metric::alarm(
                    Expr::sub(
                        format!(
                            "SQS [${{queueName}}]: message age > {}ms over the last {} mins",
                            metric::display(message_age.threshold),
                            message_age.evaluation_periods,
                        ),
                        "queueName",
                        queue.clone(),
                    ),
                    Comparison::GreaterThanThreshold,
                    metric::basic(
                        "AWS/SQS",
                        "ApproximateAgeOfOldestMessage",
                        BasicStatistic::Maximum,
                        vec![Dimension::new("QueueName", queue)],
                    ),
                    message_age,
                    notify,
                ),
            );
        }

        if !out.alarms.is_empty() {
            out.parameter(
                param,
                format!("Name of the SQS queue identified as {logical_id} in the parent stack"),
                Expr::get_att(logical_id, "QueueName"),
            );
        }
        out
    }
}

use super::{Generated, Notify};
use models::{Alarm, Expr, NestedTemplate, Parameter};
use std::collections::BTreeMap;

/// Composed is a nested template of alarms, and the values which its
/// parent binds to the template's parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct Composed {
    pub template: NestedTemplate,
    pub values: BTreeMap<String, Expr>,
}

/// Composer accumulates the Generated alarms of one kind of resource
/// into a single nested template.
pub struct Composer {
    notify: Notify,
    alarms: BTreeMap<String, Alarm>,
    parameters: BTreeMap<String, Parameter>,
    values: BTreeMap<String, Expr>,
}

impl Composer {
    pub fn new(notify: Notify) -> Self {
        Self {
            notify,
            alarms: BTreeMap::new(),
            parameters: BTreeMap::new(),
            values: BTreeMap::new(),
        }
    }

    /// Merge alarms and parameters of `generated`.
    /// Where alarm keys collide, the last write wins.
    pub fn extend(&mut self, generated: Generated) {
        let Generated {
            alarms,
            parameters,
            values,
        } = generated;

        for (key, alarm) in alarms {
            if self.alarms.insert(key.clone(), alarm).is_some() {
                tracing::warn!(%key, "generated alarm name collides with another; keeping the last");
            }
        }
        self.parameters.extend(parameters);
        self.values.extend(values);
    }

    /// Finish the nested template, or return None if there are no alarms.
    /// The notification parameter is added to every non-empty template.
    pub fn finish(self) -> Option<Composed> {
        let Self {
            notify: Notify { parameter, value },
            alarms,
            mut parameters,
            mut values,
        } = self;

        if alarms.is_empty() {
            return None;
        }
        parameters.insert(
            parameter.clone(),
            Parameter::string("The ARN for the SNS topic for the CloudWatch Alarms"),
        );
        values.insert(parameter, value);

        Some(Composed {
            template: NestedTemplate::new(alarms, parameters),
            values,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{FunctionSubject, Lambda, Target};
    use models::LambdaConfig;
    use serde_json::json;

    fn generated(logical_id: &str) -> Generated {
        let mut config = LambdaConfig::default();
        config.throttle_count.enabled = true;

        Lambda.generate(
            &FunctionSubject {
                logical_id: logical_id.to_string(),
                function_name: None,
                has_dlq: false,
            },
            &config,
            &Notify::default(),
        )
    }

    #[test]
    fn test_empty_composes_to_none() {
        let mut composer = Composer::new(Notify::default());
        composer.extend(Generated::default());
        assert!(composer.finish().is_none());
    }

    #[test]
    fn test_merge_and_notify_parameter() {
        let mut composer = Composer::new(Notify::default());
        composer.extend(generated("A"));
        composer.extend(generated("B"));
        // Same key: last write wins.
        composer.extend(generated("B"));

        let Composed { template, values } = composer.finish().unwrap();

        assert_eq!(
            template.resources.keys().collect::<Vec<_>>(),
            vec!["AThrottleCountAlarm", "BThrottleCountAlarm"]
        );
        assert_eq!(
            template.parameters.keys().collect::<Vec<_>>(),
            vec!["AName", "BName", "TopicArn"]
        );
        assert_eq!(
            serde_json::to_value(&values).unwrap(),
            json!({
                "AName": {"Ref": "A"},
                "BName": {"Ref": "B"},
                "TopicArn": {"Ref": "MacroParamTopicArn"},
            })
        );

        let doc = serde_json::to_value(&template).unwrap();
        assert_eq!(doc["AWSTemplateFormatVersion"], "2010-09-09");
        assert_eq!(doc["Description"], "Nested stack with auto-generated Alarms");
        assert_eq!(
            doc["Parameters"]["TopicArn"],
            json!({
                "Type": "String",
                "Description": "The ARN for the SNS topic for the CloudWatch Alarms",
            })
        );
    }
}

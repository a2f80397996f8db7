use models::{DefaultConfig, Expr, Fragment, OverrideConfig, Resource};
use std::collections::BTreeMap;

mod api_gateway;
mod compose;
mod lambda;
mod locate;
mod metric;
mod paths;
mod publish;
mod resolve;
mod sqs;
mod step_functions;

pub use api_gateway::{ApiGateway, RouteSubject};
pub use compose::{Composed, Composer};
pub use lambda::{FunctionSubject, Lambda};
pub use locate::{find, find_first};
pub use paths::{reconstruct_path, routes, Route};
pub use publish::{DirectoryPublisher, MemoryPublisher, Publisher};
pub use resolve::resolve;
pub use sqs::{QueueSubject, Sqs};
pub use step_functions::{StateMachineSubject, StepFunctions};

/// Parameter of the parent fragment which must hold the ARN of the
/// topic notified by every generated alarm.
pub const TOPIC_ARN_PARAM: &str = "MacroParamTopicArn";

#[derive(thiserror::Error, Debug)]
pub enum Error {
    #[error(
        "You must declare a CloudFormation parameter [{0}]. \
        It should be the ARN to an SNS topic, to be used by the generated CloudWatch alarms."
    )]
    MissingTopicParameter(&'static str),
    #[error("resource {0} is referenced but is not defined")]
    UnknownResource(String),
    #[error("resource {resource} is missing required property {property}")]
    MissingProperty {
        resource: String,
        property: &'static str,
    },
    #[error("resource {resource} has an unexpected {property}: {value}")]
    UnexpectedShape {
        resource: String,
        property: &'static str,
        value: serde_json::Value,
    },
    #[error("resource {0} is part of a cycle of ParentId references")]
    PathCycle(String),
    #[error("fragment already has a resource named {0}")]
    ResourceExists(&'static str),
    #[error("failed to publish the {stack} template")]
    Publish {
        stack: &'static str,
        #[source]
        detail: anyhow::Error,
    },
}

/// Notify identifies the topic to which every generated alarm sends
/// its notifications. It's a parameter of each nested template,
/// bound to `value` by the parent fragment.
#[derive(Debug, Clone, PartialEq)]
pub struct Notify {
    pub parameter: String,
    pub value: Expr,
}

impl Default for Notify {
    fn default() -> Self {
        Self {
            parameter: "TopicArn".to_string(),
            value: Expr::reference(TOPIC_ARN_PARAM),
        }
    }
}

impl Notify {
    pub fn actions(&self) -> Vec<Expr> {
        vec![Expr::reference(&self.parameter)]
    }
}

/// Generated alarms of a single subject, and the parameters they reference.
/// Parameters are only ever generated alongside at least one alarm.
#[derive(Debug, Default)]
pub struct Generated {
    pub alarms: BTreeMap<String, models::Alarm>,
    pub parameters: BTreeMap<String, models::Parameter>,
    pub values: BTreeMap<String, Expr>,
}

impl Generated {
    /// Declare a string parameter of the nested template, and the value
    /// which the parent fragment binds to it.
    pub fn parameter(&mut self, name: impl Into<String>, description: String, value: Expr) {
        let name = name.into();
        self.parameters
            .insert(name.clone(), models::Parameter::string(description));
        self.values.insert(name, value);
    }
}

/// Target is a kind of resource for which alarms are generated.
pub trait Target {
    /// Subject of generated alarms, such as a function or an API route.
    type Subject;
    /// Configuration resolved for each Subject.
    type Config;

    /// Logical ID of the nested stack within the parent fragment.
    const STACK_ID: &'static str;

    /// Discover subjects of this Target within the fragment.
    /// No subjects is a normal outcome.
    fn subjects(&self, fragment: &Fragment) -> Result<Vec<Self::Subject>, Error>;

    /// Resolve the configuration of a subject from defaults and overrides.
    fn resolve(
        &self,
        subject: &Self::Subject,
        defaults: &DefaultConfig,
        overrides: &OverrideConfig,
    ) -> Self::Config;

    /// Generate the enabled alarms of a subject.
    fn generate(&self, subject: &Self::Subject, config: &Self::Config, notify: &Notify)
        -> Generated;
}

/// Compose the nested template of all alarms of Target `target`,
/// or None if the fragment produces no alarms for it.
pub fn compose<T: Target>(
    target: &T,
    fragment: &Fragment,
    defaults: &DefaultConfig,
    overrides: &OverrideConfig,
    notify: &Notify,
) -> Result<Option<Composed>, Error> {
    let subjects = target.subjects(fragment)?;
    let mut composer = Composer::new(notify.clone());

    for subject in &subjects {
        let config = target.resolve(subject, defaults, overrides);
        composer.extend(target.generate(subject, &config, notify));
    }
    Ok(composer.finish())
}

/// Compose and publish the nested template of `target`, returning the
/// resource which references it from the parent fragment.
pub async fn create_alarms<T: Target, P: Publisher>(
    target: &T,
    fragment: &Fragment,
    defaults: &DefaultConfig,
    overrides: &OverrideConfig,
    notify: &Notify,
    publisher: &P,
) -> Result<Option<Resource>, Error> {
    let Some(Composed { template, values }) =
        compose(target, fragment, defaults, overrides, notify)?
    else {
        return Ok(None);
    };

    tracing::debug!(
        stack = T::STACK_ID,
        alarms = template.resources.len(),
        parameters = ?template.parameters.keys().collect::<Vec<_>>(),
        "publishing nested stack..."
    );

    let url = publisher
        .publish(&template)
        .await
        .map_err(|detail| Error::Publish {
            stack: T::STACK_ID,
            detail,
        })?;

    tracing::debug!(stack = T::STACK_ID, %url, "published nested stack");

    Ok(Some(models::nested_stack(&url, &values)))
}

/// Transform `fragment` by adding a nested stack of generated alarms
/// for each kind of resource that produces any. Other parts of the
/// fragment are returned unchanged.
pub async fn transform<P: Publisher>(
    fragment: &Fragment,
    defaults: &DefaultConfig,
    overrides: &OverrideConfig,
    publisher: &P,
) -> Result<Fragment, Error> {
    if !fragment.parameters.contains_key(TOPIC_ARN_PARAM) {
        return Err(Error::MissingTopicParameter(TOPIC_ARN_PARAM));
    }
    let notify = Notify::default();

    // Kinds are independent, and are spliced only once all have succeeded.
    let (step_functions, sqs, lambda, api_gateway) = futures::try_join!(
        create_alarms(&StepFunctions, fragment, defaults, overrides, &notify, publisher),
        create_alarms(&Sqs, fragment, defaults, overrides, &notify, publisher),
        create_alarms(&Lambda, fragment, defaults, overrides, &notify, publisher),
        create_alarms(&ApiGateway, fragment, defaults, overrides, &notify, publisher),
    )?;

    let mut out = fragment.clone();

    for (stack_id, stack) in [
        (StepFunctions::STACK_ID, step_functions),
        (Sqs::STACK_ID, sqs),
        (Lambda::STACK_ID, lambda),
        (ApiGateway::STACK_ID, api_gateway),
    ] {
        let Some(stack) = stack else { continue };

        if out.resources.contains_key(stack_id) {
            return Err(Error::ResourceExists(stack_id));
        }
        out.resources.insert(stack_id.to_string(), stack);
    }

    Ok(out)
}

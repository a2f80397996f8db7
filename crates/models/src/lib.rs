mod cfn;
pub mod config;
mod fragment;
mod template;

pub use cfn::Expr;
pub use config::{
    AlarmConfig, ApiGatewayConfig, DefaultConfig, LambdaConfig, OverrideConfig, SqsConfig,
    StepFunctionsConfig,
};
pub use fragment::{Fragment, FragmentError, Resource};
pub use template::{
    nested_stack, Alarm, AlarmMetric, AlarmProperties, BasicStatistic, Comparison, Dimension,
    Metric, MetricQuery, MetricStat, MissingData, NestedTemplate, Parameter, QuerySource,
    SingleMetric, Statistic, PERIOD_SECONDS,
};

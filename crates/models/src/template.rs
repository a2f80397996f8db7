use super::{Expr, Resource};
use serde::Serialize;
use std::collections::BTreeMap;
use url::Url;

/// Period, in seconds, over which every metric is aggregated.
pub const PERIOD_SECONDS: u32 = 60;

/// NestedTemplate is a self-contained template of generated alarms,
/// which is deployable given values of its parameters.
#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct NestedTemplate {
    #[serde(rename = "AWSTemplateFormatVersion")]
    pub format_version: &'static str,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Resources")]
    pub resources: BTreeMap<String, Alarm>,
    #[serde(rename = "Parameters")]
    pub parameters: BTreeMap<String, Parameter>,
}

impl NestedTemplate {
    pub const FORMAT_VERSION: &'static str = "2010-09-09";

    pub fn new(resources: BTreeMap<String, Alarm>, parameters: BTreeMap<String, Parameter>) -> Self {
        Self {
            format_version: Self::FORMAT_VERSION,
            description: "Nested stack with auto-generated Alarms".to_string(),
            resources,
            parameters,
        }
    }
}

/// Parameter declaration of a NestedTemplate.
#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
#[serde(rename_all = "PascalCase")]
pub struct Parameter {
    #[serde(rename = "Type")]
    pub type_: &'static str,
    pub description: String,
}

impl Parameter {
    pub fn string(description: impl Into<String>) -> Self {
        Self {
            type_: "String",
            description: description.into(),
        }
    }
}

/// Build the resource which references a published NestedTemplate from
/// its parent fragment, binding `values` to the template's parameters.
pub fn nested_stack(template_url: &Url, values: &BTreeMap<String, Expr>) -> Resource {
    Resource::new(
        "AWS::CloudFormation::Stack",
        serde_json::json!({
            "TemplateURL": template_url.as_str(),
            "Parameters": values,
        }),
    )
}

/// Alarm is a metric alarm definition.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(tag = "Type", rename = "AWS::CloudWatch::Alarm")]
pub struct Alarm {
    #[serde(rename = "Properties")]
    pub properties: AlarmProperties,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct AlarmProperties {
    pub alarm_actions: Vec<Expr>,
    pub alarm_description: Expr,
    pub alarm_name: Expr,
    pub comparison_operator: Comparison,
    #[serde(flatten)]
    pub metric: AlarmMetric,
    pub evaluation_periods: u32,
    pub threshold: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub treat_missing_data: Option<MissingData>,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    GreaterThanThreshold,
    LessThanThreshold,
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum MissingData {
    NotBreaching,
}

/// AlarmMetric is the basis of an alarm: either a single metric,
/// or an expression over named sub-metrics.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(untagged)]
pub enum AlarmMetric {
    Single(SingleMetric),
    Math {
        #[serde(rename = "Metrics")]
        metrics: Vec<MetricQuery>,
    },
}

impl AlarmMetric {
    pub fn is_math(&self) -> bool {
        matches!(self, AlarmMetric::Math { .. })
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct SingleMetric {
    pub dimensions: Vec<Dimension>,
    pub metric_name: String,
    pub namespace: &'static str,
    #[serde(flatten)]
    pub statistic: Statistic,
    pub period: u32,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub enum Statistic {
    #[serde(rename = "Statistic")]
    Basic(BasicStatistic),
    /// Percentile statistic, such as "p90".
    #[serde(rename = "ExtendedStatistic")]
    Extended(String),
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub enum BasicStatistic {
    Sum,
    Maximum,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Dimension {
    pub name: &'static str,
    pub value: Expr,
}

impl Dimension {
    pub fn new(name: &'static str, value: impl Into<Expr>) -> Self {
        Self {
            name,
            value: value.into(),
        }
    }
}

/// MetricQuery is a named sub-metric or expression of a math alarm.
#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct MetricQuery {
    pub id: &'static str,
    pub label: &'static str,
    #[serde(flatten)]
    pub source: QuerySource,
    pub return_data: bool,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub enum QuerySource {
    MetricStat(MetricStat),
    Expression(&'static str),
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct MetricStat {
    pub metric: Metric,
    pub period: u32,
    pub stat: BasicStatistic,
    pub unit: &'static str,
}

#[derive(Serialize, Debug, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Metric {
    pub dimensions: Vec<Dimension>,
    pub metric_name: &'static str,
    pub namespace: &'static str,
}

impl MetricQuery {
    /// Sum of a Count-unit metric, which is input to an expression.
    pub fn count(id: &'static str, label: &'static str, metric: Metric) -> Self {
        Self {
            id,
            label,
            source: QuerySource::MetricStat(MetricStat {
                metric,
                period: PERIOD_SECONDS,
                stat: BasicStatistic::Sum,
                unit: "Count",
            }),
            return_data: false,
        }
    }

    /// Expression over other queries, which is the alarm's metric.
    pub fn expression(id: &'static str, label: &'static str, expression: &'static str) -> Self {
        Self {
            id,
            label,
            source: QuerySource::Expression(expression),
            return_data: true,
        }
    }
}

use super::Notify;
use models::config::AlarmConfig;
use models::{
    Alarm, AlarmMetric, AlarmProperties, BasicStatistic, Comparison, Dimension, Expr, MissingData,
    SingleMetric, Statistic, PERIOD_SECONDS,
};

/// Build an alarm over `metric` from its resolved `config`.
/// The alarm's name doubles as its description.
/// Alarms over an expression don't breach on missing data, as a subject
/// which sees no traffic has no defined rate.
pub fn alarm(
    name: Expr,
    comparison: Comparison,
    metric: AlarmMetric,
    config: &AlarmConfig,
    notify: &Notify,
) -> Alarm {
    let treat_missing_data = metric.is_math().then_some(MissingData::NotBreaching);

    Alarm {
        properties: AlarmProperties {
            alarm_actions: notify.actions(),
            alarm_description: name.clone(),
            alarm_name: name,
            comparison_operator: comparison,
            metric,
            evaluation_periods: config.evaluation_periods,
            threshold: config.threshold,
            treat_missing_data,
        },
    }
}

/// A single metric aggregated with a basic statistic.
pub fn basic(
    namespace: &'static str,
    metric_name: &str,
    stat: BasicStatistic,
    dimensions: Vec<Dimension>,
) -> AlarmMetric {
    single(namespace, metric_name, Statistic::Basic(stat), dimensions)
}

pub fn single(
    namespace: &'static str,
    metric_name: &str,
    statistic: Statistic,
    dimensions: Vec<Dimension>,
) -> AlarmMetric {
    AlarmMetric::Single(SingleMetric {
        dimensions,
        metric_name: metric_name.to_string(),
        namespace,
        statistic,
        period: PERIOD_SECONDS,
    })
}

/// Format a threshold for display within an alarm name.
pub fn display(threshold: f64) -> String {
    // Display of f64 omits a trailing ".0".
    format!("{}", round(threshold))
}

/// Format a ratio threshold as a percentage for display, without the '%'.
pub fn percent(ratio: f64) -> String {
    display(ratio * 100.0)
}

// Round away the binary noise of decimal arithmetic, such as 0.07 * 100.
fn round(value: f64) -> f64 {
    (value * 1e6).round() / 1e6
}

use super::{metric, Error, Generated, Notify, Route, Target};
use models::{
    config::AlarmConfig, AlarmMetric, ApiGatewayConfig, Comparison, DefaultConfig, Dimension,
    Expr, Fragment, Metric, MetricQuery, OverrideConfig, Statistic,
};

const RESOURCE_TYPE: &str = "AWS::ApiGateway::RestApi";
const NAMESPACE: &str = "AWS/ApiGateway";
const STAGE_PARAM: &str = "MacroParamStage";

/// Alarms of each route of a REST API.
pub struct ApiGateway;

#[derive(Debug, Clone, PartialEq)]
pub struct RouteSubject {
    /// Logical ID of the API which serves the route.
    pub api_id: String,
    pub route: Route,
    /// Value of the API's name within the parent fragment.
    pub api_name: Expr,
}

impl Target for ApiGateway {
    type Subject = RouteSubject;
    type Config = ApiGatewayConfig;

    const STACK_ID: &'static str = "NestedStackApiGatewayAlarms";

    fn subjects(&self, fragment: &Fragment) -> Result<Vec<RouteSubject>, Error> {
        let Some((api_id, api)) = super::find_first(fragment, RESOURCE_TYPE) else {
            return Ok(Vec::new());
        };

        // Use the physical name of the API if it's given.
        let api_name = api
            .property("/Name")
            .map(Expr::parse)
            .unwrap_or_else(|| Expr::reference("AWS::StackName"));

        Ok(super::routes(api_id, api, fragment)?
            .into_iter()
            .map(|route| RouteSubject {
                api_id: api_id.to_string(),
                route,
                api_name: api_name.clone(),
            })
            .collect())
    }

    fn resolve(
        &self,
        subject: &RouteSubject,
        defaults: &DefaultConfig,
        overrides: &OverrideConfig,
    ) -> ApiGatewayConfig {
        super::resolve(
            &defaults.api_gateway,
            &overrides.api_gateway_paths,
            &subject.api_id,
            Some(subject.route.path.as_str()),
        )
    }

    fn generate(
        &self,
        subject: &RouteSubject,
        config: &ApiGatewayConfig,
        notify: &Notify,
    ) -> Generated {
        let Route { path, method } = &subject.route;
        let ApiGatewayConfig {
            p90,
            p95,
            p99,
            status4xx_rate,
            status5xx_rate,
            status2xx_rate,
        } = config;

        let alarms = RouteAlarms {
            path,
            method,
            notify,
        };
        let prefix = format!("{}{}", path_name(path), title_case(method));

        let mut out = Generated::default();

        for (percentile, suffix, config) in [
            ("p90", "P90LatencyAlarm", p90),
            ("p95", "P95LatencyAlarm", p95),
            ("p99", "P99LatencyAlarm", p99),
        ] {
            if config.enabled {
                tracing::debug!(%path, %method, percentile, "generating API Gateway latency alarm...");
                out.alarms.insert(
                    format!("{prefix}{suffix}"),
                    alarms.latency(percentile, config),
                );
            }
        }

        if status4xx_rate.enabled {
            tracing::debug!(%path, %method, "generating API Gateway 4xx error rate alarm...");
            out.alarms.insert(
                format!("{prefix}4xxAlarm"),
                alarms.error_rate(ErrorClass::Client, status4xx_rate),
            );
        }
        if status5xx_rate.enabled {
            tracing::debug!(%path, %method, "generating API Gateway 5xx error rate alarm...");
            out.alarms.insert(
                format!("{prefix}5xxAlarm"),
                alarms.error_rate(ErrorClass::Server, status5xx_rate),
            );
        }
        if status2xx_rate.enabled {
            tracing::debug!(%path, %method, "generating API Gateway 2xx success rate alarm...");
            out.alarms.insert(
                format!("{prefix}2xxAlarm"),
                alarms.success_rate(status2xx_rate),
            );
        }

        if !out.alarms.is_empty() {
            out.parameter(
                "Stage",
                "The name of the API Gateway deployment stage".to_string(),
                Expr::reference(STAGE_PARAM),
            );
            out.parameter(
                "ApiName",
                "The name of the API".to_string(),
                subject.api_name.clone(),
            );
        }
        out
    }
}

/// Name of a path for use within alarm keys: non-alphanumeric characters
/// are removed, and each segment begins in upper case.
/// "/user/{userId}" becomes "UserUserId", and "/" becomes "".
fn path_name(path: &str) -> String {
    path.split('/')
        .map(|segment| {
            let segment: String = segment.chars().filter(char::is_ascii_alphanumeric).collect();
            upper_first(&segment)
        })
        .collect()
}

// "GET" becomes "Get".
fn title_case(method: &str) -> String {
    upper_first(&method.to_ascii_lowercase())
}

fn upper_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_ascii_uppercase().to_string() + chars.as_str(),
        None => String::new(),
    }
}

enum ErrorClass {
    Client,
    Server,
}

// Builds the alarms of a single route.
struct RouteAlarms<'a> {
    path: &'a str,
    method: &'a str,
    notify: &'a Notify,
}

impl RouteAlarms<'_> {
    fn dimensions(&self) -> Vec<Dimension> {
        vec![
            Dimension::new("ApiName", Expr::reference("ApiName")),
            Dimension::new("Resource", self.path),
            Dimension::new("Method", self.method),
            Dimension::new("Stage", Expr::reference("Stage")),
        ]
    }

    fn name(&self, condition: String, config: &AlarmConfig) -> Expr {
        Expr::sub(
            format!(
                "API Gateway [{}:${{apiName}}{}]: {condition} over the last {} mins",
                self.method, self.path, config.evaluation_periods,
            ),
            "apiName",
            Expr::reference("ApiName"),
        )
    }

    fn count(&self, id: &'static str, label: &'static str, metric_name: &'static str) -> MetricQuery {
        MetricQuery::count(
            id,
            label,
            Metric {
                dimensions: self.dimensions(),
                metric_name,
                namespace: NAMESPACE,
            },
        )
    }

    fn latency(&self, percentile: &str, config: &AlarmConfig) -> models::Alarm {
        metric::alarm(
            self.name(
                format!("{percentile} latency > {}ms", metric::display(config.threshold)),
                config,
            ),
            Comparison::GreaterThanThreshold,
            metric::single(
                NAMESPACE,
                "Latency",
                Statistic::Extended(percentile.to_string()),
                self.dimensions(),
            ),
            config,
            self.notify,
        )
    }

    fn error_rate(&self, class: ErrorClass, config: &AlarmConfig) -> models::Alarm {
        let (class, id, metric_name, label, rate_label, expression) = match class {
            ErrorClass::Client => (
                "4xx",
                "error4xx",
                "4XXError",
                "4XX Error",
                "4XX Rate (%)",
                "error4xx / count",
            ),
            ErrorClass::Server => (
                "5xx",
                "error5xx",
                "5XXError",
                "5XX Error",
                "5XX Rate (%)",
                "error5xx / count",
            ),
        };
        let metrics = vec![
            self.count("count", "Count", "Count"),
            self.count(id, label, metric_name),
            MetricQuery::expression("errorRate", rate_label, expression),
        ];

        metric::alarm(
            self.name(
                format!("{class} rate > {}%", metric::percent(config.threshold)),
                config,
            ),
            Comparison::GreaterThanThreshold,
            AlarmMetric::Math { metrics },
            config,
            self.notify,
        )
    }

    fn success_rate(&self, config: &AlarmConfig) -> models::Alarm {
        let metrics = vec![
            self.count("count", "Count", "Count"),
            self.count("error4xx", "4XX Error", "4XXError"),
            self.count("error5xx", "5XX Error", "5XXError"),
            MetricQuery::expression(
                "rate2xx",
                "2XX Rate (%)",
                "(count - error4xx - error5xx) / count",
            ),
        ];

        metric::alarm(
            self.name(
                format!("2xx rate < {}%", metric::percent(config.threshold)),
                config,
            ),
            Comparison::LessThanThreshold,
            AlarmMetric::Math { metrics },
            config,
            self.notify,
        )
    }
}

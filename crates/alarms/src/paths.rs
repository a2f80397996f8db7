use super::Error;
use models::{Expr, Fragment, Resource};
use serde_json::Value;
use std::collections::BTreeSet;

/// Route is a request path and HTTP method served by an API.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct Route {
    pub path: String,
    pub method: String,
}

const METHOD_TYPE: &str = "AWS::ApiGateway::Method";
const ANY_METHOD: &str = "x-amazon-apigateway-any-method";
const VERBS: &[&str] = &["get", "put", "post", "delete", "options", "head", "patch"];

/// Enumerate the routes of REST API `api_id`, in sorted order.
///
/// If the API embeds an OpenAPI body, routes are read from its `paths`.
/// Otherwise every method resource of the fragment is a route, having the
/// path of its linked chain of path-part resources.
pub fn routes(api_id: &str, api: &Resource, fragment: &Fragment) -> Result<Vec<Route>, Error> {
    let mut routes = match api.property("/Body") {
        Some(body) => inline_routes(api_id, body)?,
        None => linked_routes(fragment)?,
    };
    routes.sort();
    routes.dedup();

    Ok(routes)
}

fn inline_routes(api_id: &str, body: &Value) -> Result<Vec<Route>, Error> {
    let unexpected = |value: &Value| Error::UnexpectedShape {
        resource: api_id.to_string(),
        property: "Body",
        value: value.clone(),
    };
    let paths = body
        .get("paths")
        .and_then(Value::as_object)
        .ok_or_else(|| unexpected(body))?;

    let mut out = Vec::new();

    for (path, item) in paths {
        let item = item.as_object().ok_or_else(|| unexpected(item))?;

        // Path items may also hold `parameters`, `summary` and other
        // non-operation keys, which aren't routes.
        for key in item.keys() {
            let method = if key == ANY_METHOD {
                "ANY".to_string()
            } else if VERBS.contains(&key.to_ascii_lowercase().as_str()) {
                key.to_ascii_uppercase()
            } else {
                continue;
            };

            out.push(Route {
                path: join_path([path.as_str()]),
                method,
            });
        }
    }
    Ok(out)
}

fn linked_routes(fragment: &Fragment) -> Result<Vec<Route>, Error> {
    let mut out = Vec::new();

    for (logical_id, method) in super::find(fragment, METHOD_TYPE) {
        let http_method = method
            .property_str("/HttpMethod")
            .ok_or_else(|| Error::MissingProperty {
                resource: logical_id.to_string(),
                property: "HttpMethod",
            })?;
        let resource_id = method
            .property("/ResourceId")
            .ok_or_else(|| Error::MissingProperty {
                resource: logical_id.to_string(),
                property: "ResourceId",
            })?;

        out.push(Route {
            path: reconstruct_path(logical_id, resource_id, fragment)?,
            method: http_method.to_ascii_uppercase(),
        });
    }
    Ok(out)
}

/// Reconstruct the request path of method `method_id`, having `resource_id`.
///
/// Each path resource is `{"Ref": id}` of a resource having a `PathPart`
/// and a `ParentId`. The walk ends at a `Fn::GetAtt` of the API's
/// `RootResourceId`, which is the "/" path.
pub fn reconstruct_path(
    method_id: &str,
    resource_id: &Value,
    fragment: &Fragment,
) -> Result<String, Error> {
    let mut segments = Vec::new();
    let mut visited = BTreeSet::new();

    // Resource and property which holds the current reference.
    let mut holder = method_id.to_string();
    let mut property = "ResourceId";
    let mut current = resource_id;

    loop {
        let id = match Expr::parse(current) {
            Expr::GetAtt(_, attribute) if attribute == "RootResourceId" => break,
            Expr::Ref(id) => id,
            _ => {
                return Err(Error::UnexpectedShape {
                    resource: holder,
                    property,
                    value: current.clone(),
                })
            }
        };

        if !visited.insert(id.clone()) {
            return Err(Error::PathCycle(id));
        }
        let Some(resource) = fragment.resources.get(&id) else {
            return Err(Error::UnknownResource(id));
        };

        let part = match resource.property("/PathPart") {
            Some(Value::String(part)) => part,
            Some(other) => {
                return Err(Error::UnexpectedShape {
                    resource: id,
                    property: "PathPart",
                    value: other.clone(),
                })
            }
            None => {
                return Err(Error::MissingProperty {
                    resource: id,
                    property: "PathPart",
                })
            }
        };
        segments.push(part.as_str());

        current = resource
            .property("/ParentId")
            .ok_or_else(|| Error::MissingProperty {
                resource: id.clone(),
                property: "ParentId",
            })?;
        holder = id;
        property = "ParentId";
    }

    segments.reverse();

    Ok(join_path(segments))
}

/// Join path `parts` into an absolute path, dropping empty segments.
fn join_path<'p>(parts: impl IntoIterator<Item = &'p str>) -> String {
    let segments: Vec<&str> = parts
        .into_iter()
        .flat_map(|part| part.split('/'))
        .filter(|segment| !segment.is_empty())
        .collect();

    format!("/{}", segments.join("/"))
}

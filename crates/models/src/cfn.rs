use serde::ser::{Serialize, SerializeMap, Serializer};
use serde_json::Value;
use std::collections::BTreeMap;

/// Expr is a template value which is either a literal, or an intrinsic
/// function which is resolved only where the template is deployed.
#[derive(Debug, Clone, PartialEq)]
pub enum Expr {
    /// Literal JSON value, passed through as-is.
    Literal(Value),
    /// `{"Ref": name}` of a parameter or resource.
    Ref(String),
    /// `{"Fn::GetAtt": [resource, attribute]}`.
    GetAtt(String, String),
    /// `{"Fn::Sub": [template, variables]}`.
    Sub(String, BTreeMap<String, Expr>),
}

impl Expr {
    pub fn reference(name: impl Into<String>) -> Self {
        Self::Ref(name.into())
    }

    pub fn get_att(resource: impl Into<String>, attribute: impl Into<String>) -> Self {
        Self::GetAtt(resource.into(), attribute.into())
    }

    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    /// Build a `Fn::Sub` which binds a single `variable`.
    pub fn sub(template: impl Into<String>, variable: &str, value: Expr) -> Self {
        Self::Sub(
            template.into(),
            [(variable.to_string(), value)].into_iter().collect(),
        )
    }

    /// Parse a JSON value which may be a `Ref` or `Fn::GetAtt` intrinsic.
    /// Anything else is a Literal.
    pub fn parse(value: &Value) -> Self {
        let Some(obj) = value.as_object().filter(|o| o.len() == 1) else {
            return Self::Literal(value.clone());
        };

        if let Some(Value::String(name)) = obj.get("Ref") {
            return Self::Ref(name.clone());
        }
        match obj.get("Fn::GetAtt") {
            Some(Value::Array(parts)) => {
                if let [Value::String(resource), Value::String(attribute)] = parts.as_slice() {
                    return Self::get_att(resource, attribute);
                }
            }
            // Short form "Resource.Attribute".
            Some(Value::String(dotted)) => {
                if let Some((resource, attribute)) = dotted.split_once('.') {
                    return Self::get_att(resource, attribute);
                }
            }
            _ => {}
        }
        Self::Literal(value.clone())
    }
}

impl Serialize for Expr {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Expr::Literal(value) => value.serialize(serializer),
            Expr::Ref(name) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Ref", name)?;
                map.end()
            }
            Expr::GetAtt(resource, attribute) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Fn::GetAtt", &[resource, attribute])?;
                map.end()
            }
            Expr::Sub(template, variables) => {
                let mut map = serializer.serialize_map(Some(1))?;
                map.serialize_entry("Fn::Sub", &(template, variables))?;
                map.end()
            }
        }
    }
}

impl From<&str> for Expr {
    fn from(s: &str) -> Self {
        Self::Literal(Value::String(s.to_string()))
    }
}

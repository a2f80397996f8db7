use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

/// Fragment is a declarative template of cloud resources, keyed on their
/// logical identifiers. Sections other than `Parameters` and `Resources`
/// are carried through without interpretation.
#[derive(Serialize, Deserialize, Debug, Default, Clone, PartialEq)]
#[serde(rename_all = "PascalCase")]
pub struct Fragment {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub parameters: BTreeMap<String, Value>,
    #[serde(default)]
    pub resources: BTreeMap<String, Resource>,
    #[serde(flatten)]
    pub rest: BTreeMap<String, Value>,
}

/// Resource of a Fragment.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct Resource {
    #[serde(rename = "Type")]
    pub type_: String,
    #[serde(
        rename = "Properties",
        default,
        skip_serializing_if = "Value::is_null"
    )]
    pub properties: Value,
    // Other resource attributes (DependsOn, Condition, Metadata, ...).
    #[serde(flatten)]
    pub rest: BTreeMap<String, Value>,
}

/// Intrinsic functions which may be written in YAML short form,
/// as `!Name value` rather than `{"Fn::Name": value}`.
const SHORT_FORMS: &[&str] = &[
    "And",
    "Base64",
    "Cidr",
    "Equals",
    "FindInMap",
    "GetAZs",
    "GetAtt",
    "If",
    "ImportValue",
    "Join",
    "Length",
    "Not",
    "Or",
    "Select",
    "Split",
    "Sub",
    "ToJsonString",
    "Transform",
];

#[derive(thiserror::Error, Debug)]
pub enum FragmentError {
    #[error("failed to parse fragment")]
    Parse(#[source] serde_yaml::Error),
    #[error("unsupported YAML tag {0} in fragment")]
    UnknownTag(String),
    #[error("!GetAtt {0:?} is not of the form 'Resource.Attribute'")]
    GetAtt(String),
}

impl Fragment {
    /// Parse a YAML or JSON fragment. Intrinsic functions written in
    /// short form (`!Ref`, `!GetAtt`, `!Sub`, ...) are expanded to their
    /// long, JSON form.
    pub fn from_yaml(content: &[u8]) -> Result<Self, FragmentError> {
        let mut dom: serde_yaml::Value =
            serde_yaml::from_slice(content).map_err(FragmentError::Parse)?;
        expand_short_forms(&mut dom)?;
        serde_yaml::from_value(dom).map_err(FragmentError::Parse)
    }
}

fn expand_short_forms(value: &mut serde_yaml::Value) -> Result<(), FragmentError> {
    use serde_yaml::Value as Yaml;

    match value {
        Yaml::Sequence(items) => {
            for item in items.iter_mut() {
                expand_short_forms(item)?;
            }
        }
        Yaml::Mapping(map) => {
            for (_, item) in map.iter_mut() {
                expand_short_forms(item)?;
            }
        }
        Yaml::Tagged(tagged) => {
            let tag = tagged.tag.to_string();
            let mut inner = std::mem::replace(&mut tagged.value, Yaml::Null);
            expand_short_forms(&mut inner)?;

            let name = tag.trim_start_matches('!');
            let (key, inner) = match (name, inner) {
                ("Ref" | "Condition", inner) => (name.to_string(), inner),
                ("GetAtt", Yaml::String(dotted)) => match dotted.split_once('.') {
                    Some((resource, attribute)) => (
                        "Fn::GetAtt".to_string(),
                        Yaml::Sequence(vec![
                            Yaml::String(resource.to_string()),
                            Yaml::String(attribute.to_string()),
                        ]),
                    ),
                    None => return Err(FragmentError::GetAtt(dotted)),
                },
                (name, inner) if SHORT_FORMS.contains(&name) => (format!("Fn::{name}"), inner),
                _ => return Err(FragmentError::UnknownTag(tag.clone())),
            };

            let mut map = serde_yaml::Mapping::new();
            map.insert(Yaml::String(key), inner);
            *value = Yaml::Mapping(map);
        }
        _ => {}
    }
    Ok(())
}

impl Resource {
    pub fn new(type_: impl Into<String>, properties: Value) -> Self {
        Self {
            type_: type_.into(),
            properties,
            rest: BTreeMap::new(),
        }
    }

    /// Fetch the property at JSON pointer `ptr`, relative to Properties.
    pub fn property(&self, ptr: &str) -> Option<&Value> {
        self.properties.pointer(ptr).filter(|v| !v.is_null())
    }

    /// Fetch the string property at `ptr`, if it exists and is a string.
    pub fn property_str(&self, ptr: &str) -> Option<&str> {
        self.property(ptr).and_then(Value::as_str)
    }
}

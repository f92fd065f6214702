//! The canonical resource envelope and the collection type built on it.
//!
//! Every managed object is an envelope of four fields:
//!
//! ```yaml
//! apiVersion: grafana.integrations.grafana.com/v1alpha1
//! kind: Dashboard
//! metadata:
//!   name: my-dashboard
//!   folder: general
//! spec:
//!   title: My dashboard
//! ```
//!
//! `metadata` and `spec` are kept as ordered maps of [`serde_json::Value`],
//! so the core stays agnostic of any kind's payload while still giving
//! typed accessors that fail with an error instead of panicking.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{GristError, Result};

/// An ordered string-keyed map of tree values.
pub type Map = serde_json::Map<String, Value>;

const KIND: &str = "kind";
const METADATA: &str = "metadata";
const SPEC: &str = "spec";
const NAME: &str = "name";

/// Returns true if the tree is a map carrying `kind`, `metadata` and `spec`.
///
/// Detection only looks at key presence; [`validate_envelope`] decides
/// whether the values are usable.
pub fn detect_envelope(tree: &Value) -> bool {
    match tree.as_object() {
        Some(map) => map.contains_key(KIND) && map.contains_key(METADATA) && map.contains_key(SPEC),
        None => false,
    }
}

/// Checks that a tree can be wrapped as a [`Resource`].
///
/// Every field is checked independently and all problems are reported
/// together in one [`GristError::InvalidEnvelope`].
pub fn validate_envelope(tree: &Value) -> Result<()> {
    let problems = envelope_problems(tree);
    if problems.is_empty() {
        Ok(())
    } else {
        Err(GristError::InvalidEnvelope { problems })
    }
}

fn envelope_problems(tree: &Value) -> Vec<String> {
    let map = match tree.as_object() {
        Some(map) => map,
        None => return vec![format!("expected an object, found {}", type_name(tree))],
    };

    let mut problems = Vec::new();

    match map.get(KIND) {
        None => problems.push("missing attribute \"kind\"".to_string()),
        Some(Value::String(kind)) if kind.is_empty() => {
            problems.push("attribute \"kind\" must not be empty".to_string())
        }
        Some(Value::String(_)) => {}
        Some(other) => problems.push(format!(
            "attribute \"kind\" must be a string, found {}",
            type_name(other)
        )),
    }

    match map.get(METADATA) {
        None => problems.push("missing attribute \"metadata\"".to_string()),
        Some(Value::Object(metadata)) => match metadata.get(NAME) {
            None => problems.push("missing attribute \"metadata.name\"".to_string()),
            Some(Value::String(name)) if name.is_empty() => {
                problems.push("attribute \"metadata.name\" must not be empty".to_string())
            }
            Some(Value::String(_)) => {}
            Some(other) => problems.push(format!(
                "attribute \"metadata.name\" must be a string, found {}",
                type_name(other)
            )),
        },
        Some(other) => problems.push(format!(
            "attribute \"metadata\" must be an object, found {}",
            type_name(other)
        )),
    }

    match map.get(SPEC) {
        None => problems.push("missing attribute \"spec\"".to_string()),
        Some(Value::Object(spec)) if spec.is_empty() => {
            problems.push("attribute \"spec\" must not be empty".to_string())
        }
        Some(Value::Object(_)) => {}
        Some(other) => problems.push(format!(
            "attribute \"spec\" must be an object, found {}",
            type_name(other)
        )),
    }

    problems
}

/// Human-readable name of a value's type, for error messages.
pub(crate) fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "list",
        Value::Object(_) => "object",
    }
}

/// A single declaratively managed object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Resource {
    /// Provider group and version, `<group>/<version>`.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub api_version: String,

    /// The kind of resource; the key into the registry.
    pub kind: String,

    /// Resource metadata. Always carries `name`.
    pub metadata: Map,

    /// The kind-specific payload.
    pub spec: Map,
}

impl Resource {
    /// Creates a resource with the given name and spec.
    pub fn new(
        api_version: impl Into<String>,
        kind: impl Into<String>,
        name: impl Into<String>,
        spec: Map,
    ) -> Self {
        let mut metadata = Map::new();
        metadata.insert(NAME.to_string(), Value::String(name.into()));
        Self {
            api_version: api_version.into(),
            kind: kind.into(),
            metadata,
            spec,
        }
    }

    /// Validates a tree and wraps it without copying its maps.
    pub fn from_value(tree: Value) -> Result<Self> {
        validate_envelope(&tree)?;

        let mut map = match tree {
            Value::Object(map) => map,
            other => {
                return Err(GristError::InvalidEnvelope {
                    problems: vec![format!("expected an object, found {}", type_name(&other))],
                })
            }
        };

        let api_version = match map.remove("apiVersion") {
            Some(Value::String(api_version)) => api_version,
            _ => String::new(),
        };
        let kind = match map.remove(KIND) {
            Some(Value::String(kind)) => kind,
            _ => String::new(),
        };
        let metadata = match map.remove(METADATA) {
            Some(Value::Object(metadata)) => metadata,
            _ => Map::new(),
        };
        let spec = match map.remove(SPEC) {
            Some(Value::Object(spec)) => spec,
            _ => Map::new(),
        };

        Ok(Self {
            api_version,
            kind,
            metadata,
            spec,
        })
    }

    pub fn kind(&self) -> &str {
        &self.kind
    }

    pub fn api_version(&self) -> &str {
        &self.api_version
    }

    /// Returns `metadata.name`.
    pub fn name(&self) -> &str {
        self.get_metadata(NAME).unwrap_or_default()
    }

    /// The key used to look this resource up during resolution: `<kind>:<name>`.
    pub fn key(&self) -> String {
        format!("{}:{}", self.kind, self.name())
    }

    /// Returns a string metadata field.
    pub fn get_metadata(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).and_then(Value::as_str)
    }

    pub fn has_metadata(&self, key: &str) -> bool {
        self.metadata.contains_key(key)
    }

    pub fn set_metadata(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.metadata.insert(key.into(), Value::String(value.into()));
    }

    pub fn spec(&self) -> &Map {
        &self.spec
    }

    pub fn spec_mut(&mut self) -> &mut Map {
        &mut self.spec
    }

    /// Returns a spec value, failing if the key is absent.
    pub fn get_spec_value(&self, key: &str) -> Result<&Value> {
        self.spec.get(key).ok_or_else(|| GristError::SpecKeyMissing {
            key: key.to_string(),
        })
    }

    pub fn set_spec_value(&mut self, key: impl Into<String>, value: Value) {
        self.spec.insert(key.into(), value);
    }

    /// Returns a spec string, failing if the key is absent or not a string.
    pub fn get_spec_string(&self, key: &str) -> Result<&str> {
        self.get_spec_value(key)?
            .as_str()
            .ok_or_else(|| GristError::SpecWrongType {
                key: key.to_string(),
                expected: "string",
            })
    }

    pub fn set_spec_string(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.spec.insert(key.into(), Value::String(value.into()));
    }

    /// Removes a spec key, returning its previous value.
    pub fn delete_spec_key(&mut self, key: &str) -> Option<Value> {
        self.spec.remove(key)
    }

    /// The envelope as a tree.
    pub fn to_value(&self) -> Result<Value> {
        serde_json::to_value(self).map_err(|e| GristError::Serialize(e.to_string()))
    }

    pub fn to_yaml(&self) -> Result<String> {
        serde_yaml::to_string(self).map_err(|e| GristError::Serialize(e.to_string()))
    }

    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| GristError::Serialize(e.to_string()))
    }
}

/// A reference slot inside a composable resource's template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
    /// Dotted path below `spec.template` where a `{kind, name}` pointer is expected.
    pub path: String,
}

impl Reference {
    pub fn new(path: impl Into<String>) -> Self {
        Self { path: path.into() }
    }
}

/// Static description of a kind, used by the resolver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KindDescriptor {
    pub kind: String,
    /// The kind a composable resource expands into.
    pub resolved_kind: Option<String>,
    /// Where pointers to other resources may appear.
    pub references: Vec<Reference>,
}

impl KindDescriptor {
    /// A plain, non-composable kind.
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            resolved_kind: None,
            references: Vec::new(),
        }
    }

    /// A kind whose template expands into `resolved_kind`.
    pub fn composable(
        kind: impl Into<String>,
        resolved_kind: impl Into<String>,
        references: Vec<Reference>,
    ) -> Self {
        Self {
            kind: kind.into(),
            resolved_kind: Some(resolved_kind.into()),
            references,
        }
    }

    pub fn is_composable(&self) -> bool {
        self.resolved_kind
            .as_deref()
            .map(|k| !k.is_empty())
            .unwrap_or(false)
    }
}

/// An ordered collection of resources.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Resources(Vec<Resource>);

impl Resources {
    pub fn new() -> Self {
        Self(Vec::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Resource> {
        self.0.iter()
    }

    pub fn push(&mut self, resource: Resource) {
        self.0.push(resource);
    }

    /// Appends another collection, keeping order.
    pub fn merge(&mut self, other: Resources) {
        self.0.extend(other.0);
    }

    /// Keeps the resources matching a predicate.
    pub fn filter<F>(self, predicate: F) -> Self
    where
        F: Fn(&Resource) -> bool,
    {
        Self(self.0.into_iter().filter(|r| predicate(r)).collect())
    }

    /// Keeps the resources whose `<kind>/<name>` matches any target glob.
    pub fn matching(self, targets: &[String]) -> Self {
        self.filter(|r| crate::registry::resource_matches_target(r.kind(), r.name(), targets))
    }

    /// Resources of one kind, in order.
    pub fn of_kind(&self, kind: &str) -> Vec<&Resource> {
        self.0.iter().filter(|r| r.kind() == kind).collect()
    }

    /// Looks a resource up by kind and name.
    pub fn find(&self, kind: &str, name: &str) -> Option<&Resource> {
        self.0.iter().find(|r| r.kind() == kind && r.name() == name)
    }

    pub fn as_slice(&self) -> &[Resource] {
        &self.0
    }

    pub fn into_vec(self) -> Vec<Resource> {
        self.0
    }
}

impl From<Vec<Resource>> for Resources {
    fn from(resources: Vec<Resource>) -> Self {
        Self(resources)
    }
}

impl FromIterator<Resource> for Resources {
    fn from_iter<I: IntoIterator<Item = Resource>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl IntoIterator for Resources {
    type Item = Resource;
    type IntoIter = std::vec::IntoIter<Resource>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.into_iter()
    }
}

impl<'a> IntoIterator for &'a Resources {
    type Item = &'a Resource;
    type IntoIter = std::slice::Iter<'a, Resource>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

// ============================================================================
// Tests
// ============================================================================

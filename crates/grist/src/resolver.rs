//! Expansion of composable resources.
//!
//! A composable kind declares a `resolved_kind` and a list of reference
//! paths. Its `spec.template` is copied node by node; wherever the path of a
//! node matches a declared reference, the node is read as a
//! `{kind, name, properties?}` pointer and replaced by the referenced
//! resource's resolved spec, with `properties` merged over it.
//!
//! Reference paths are matched against the template as written. A
//! substituted subtree is already resolved and is never walked again, so a
//! pointer-shaped value inside it is left alone even if its path would
//! match one of the parent's references.

use std::collections::HashMap;

use serde_json::Value;

use crate::error::{GristError, Result};
use crate::registry::Registry;
use crate::resource::{type_name, KindDescriptor, Map, Reference, Resource, Resources};
use crate::tree::TreePath;

const TEMPLATE: &str = "template";
const PROPERTIES: &str = "properties";

/// Resolves composable resources against a fixed set of candidates.
pub struct Resolver<'r> {
    registry: &'r Registry,
    /// Every resource available as a reference target, keyed by `<kind>:<name>`.
    context: HashMap<String, Resource>,
}

impl<'r> Resolver<'r> {
    /// Builds a resolver whose reference targets are `context`.
    pub fn new(registry: &'r Registry, context: &Resources) -> Self {
        let context = context
            .iter()
            .map(|resource| (resource.key(), resource.clone()))
            .collect();
        Self { registry, context }
    }

    /// Number of resources available as reference targets.
    pub fn context_len(&self) -> usize {
        self.context.len()
    }

    /// Expands every composable resource and passes the others through.
    ///
    /// Stops at the first failure; nothing is returned for the batch.
    pub fn resolve_all(&self, resources: Resources) -> Result<Resources> {
        resources
            .into_iter()
            .map(|resource| {
                if self.is_composable(resource.kind()) {
                    self.resolve(&resource)
                } else {
                    Ok(resource)
                }
            })
            .collect()
    }

    /// Expands one resource. Non-composable resources come back unchanged.
    pub fn resolve(&self, resource: &Resource) -> Result<Resource> {
        let _span = tracing::debug_span!("resolve", resource = %resource.key()).entered();
        let mut visiting = Vec::new();
        let resolved = self.resolve_resource(resource, &mut visiting)?;
        if resolved.kind() != resource.kind() {
            log::debug!("Resolved {} into {}", resource.key(), resolved.key());
        }
        Ok(resolved)
    }

    fn is_composable(&self, kind: &str) -> bool {
        self.registry
            .descriptor(kind)
            .map(|d| d.is_composable())
            .unwrap_or(false)
    }

    fn descriptor(&self, kind: &str) -> KindDescriptor {
        self.registry
            .descriptor(kind)
            .unwrap_or_else(|| KindDescriptor::new(kind))
    }

    fn resolve_resource(&self, resource: &Resource, visiting: &mut Vec<String>) -> Result<Resource> {
        let descriptor = self.descriptor(resource.kind());
        let resolved_kind = match descriptor.resolved_kind.as_deref() {
            Some(kind) if !kind.is_empty() => kind.to_string(),
            _ => return Ok(resource.clone()),
        };

        let key = resource.key();
        if let Some(pos) = visiting.iter().position(|k| *k == key) {
            let mut chain = visiting[pos..].to_vec();
            chain.push(key);
            return Err(GristError::ReferenceCycle { chain });
        }

        let template = match resource.spec().get(TEMPLATE) {
            Some(template @ Value::Object(_)) => template,
            _ => {
                return Err(GristError::MissingTemplate {
                    kind: resource.kind().to_string(),
                    name: resource.name().to_string(),
                })
            }
        };

        visiting.push(key);
        let substituted =
            self.substitute(template, &TreePath::root(), &descriptor.references, visiting)?;
        visiting.pop();

        let spec = match substituted {
            Value::Object(spec) => spec,
            _ => Map::new(),
        };

        let api_version = self
            .registry
            .get_handler(&resolved_kind)
            .map(|h| h.api_version().to_string())
            .unwrap_or_else(|_| resource.api_version().to_string());

        Ok(Resource {
            api_version,
            kind: resolved_kind,
            metadata: resource.metadata.clone(),
            spec,
        })
    }

    fn substitute(
        &self,
        node: &Value,
        path: &TreePath,
        references: &[Reference],
        visiting: &mut Vec<String>,
    ) -> Result<Value> {
        if !path.is_root() && !node.is_null() && references.iter().any(|r| path.matches(&r.path)) {
            return self.follow(node, path, visiting);
        }

        match node {
            Value::Object(map) => {
                let mut out = Map::new();
                for (key, child) in map {
                    let child = self.substitute(child, &path.key(key.as_str()), references, visiting)?;
                    out.insert(key.clone(), child);
                }
                Ok(Value::Object(out))
            }
            Value::Array(items) => items
                .iter()
                .enumerate()
                .map(|(i, item)| self.substitute(item, &path.index(i), references, visiting))
                .collect::<Result<Vec<_>>>()
                .map(Value::Array),
            scalar => Ok(scalar.clone()),
        }
    }

    /// Replaces a pointer node with the referenced resource's resolved spec.
    fn follow(&self, node: &Value, path: &TreePath, visiting: &mut Vec<String>) -> Result<Value> {
        let pointer = node.as_object().ok_or_else(|| GristError::InvalidReference {
            path: path.dotted(),
            message: format!("expected a {{kind, name}} object, found {}", type_name(node)),
        })?;

        let field = |name: &str| {
            pointer
                .get(name)
                .and_then(Value::as_str)
                .filter(|s| !s.is_empty())
                .ok_or_else(|| GristError::InvalidReference {
                    path: path.dotted(),
                    message: format!("attribute \"{}\" must be a non-empty string", name),
                })
        };
        let kind = field("kind")?;
        let name = field("name")?;

        let target = self
            .context
            .get(&format!("{}:{}", kind, name))
            .ok_or_else(|| GristError::ReferenceNotFound {
                kind: kind.to_string(),
                name: name.to_string(),
            })?;

        let mut spec = self.resolve_resource(target, visiting)?.spec;

        match pointer.get(PROPERTIES) {
            Some(Value::Object(properties)) => {
                for (key, value) in properties {
                    spec.insert(key.clone(), value.clone());
                }
            }
            None | Some(Value::Null) => {}
            Some(other) => {
                return Err(GristError::InvalidReference {
                    path: path.dotted(),
                    message: format!(
                        "attribute \"properties\" must be an object, found {}",
                        type_name(other)
                    ),
                })
            }
        }

        Ok(Value::Object(spec))
    }
}

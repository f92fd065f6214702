//! Recovers envelopes nested anywhere inside a rendered tree.
//!
//! Template output usually groups resources under arbitrary keys:
//!
//! ```yaml
//! dashboards:
//!   foo: {kind: Dashboard, metadata: {name: foo}, spec: {...}}
//!   bar: {kind: Dashboard, metadata: {name: bar}, spec: {...}}
//! ```
//!
//! The walker descends depth first through maps (keys sorted) and lists
//! (in order). A map that validates as an envelope is captured and not
//! descended into. `null` values are skipped. Reaching any other scalar
//! means no envelope was found on that branch, which is reported together
//! with the nearest enclosing object and why that object was rejected.

use serde_json::Value;

use crate::error::{GristError, Result};
use crate::resource::{type_name, validate_envelope, Map, Resource, Resources};
use crate::tree::TreePath;

/// Collects every envelope in `tree`, in deterministic order.
pub fn walk(tree: &Value) -> Result<Resources> {
    let mut found = Resources::new();
    Walker { found: &mut found }.visit(tree, &TreePath::root(), None)?;
    Ok(found)
}

/// The closest map above the node being visited.
#[derive(Clone, Copy)]
struct Enclosing<'a> {
    object: &'a Map,
    tree: &'a Value,
}

struct Walker<'o> {
    found: &'o mut Resources,
}

impl Walker<'_> {
    fn visit<'a>(
        &mut self,
        node: &'a Value,
        path: &TreePath,
        enclosing: Option<Enclosing<'a>>,
    ) -> Result<()> {
        match node {
            Value::Null => Ok(()),
            Value::Object(map) => {
                if validate_envelope(node).is_ok() {
                    log::trace!("Found envelope at {}", path);
                    self.found.push(Resource::from_value(node.clone())?);
                    return Ok(());
                }

                let here = Some(Enclosing { object: map, tree: node });
                let mut keys: Vec<&String> = map.keys().collect();
                keys.sort();
                for key in keys {
                    self.visit(&map[key.as_str()], &path.key(key.as_str()), here)?;
                }
                Ok(())
            }
            Value::Array(items) => {
                for (i, item) in items.iter().enumerate() {
                    self.visit(item, &path.index(i), enclosing)?;
                }
                Ok(())
            }
            scalar => Err(primitive_reached(path, scalar, enclosing)),
        }
    }
}

fn primitive_reached(path: &TreePath, scalar: &Value, enclosing: Option<Enclosing<'_>>) -> GristError {
    let (reason, object) = match enclosing {
        Some(Enclosing { object, tree }) => {
            let reason = match validate_envelope(tree) {
                Err(err) => err.to_string(),
                Ok(()) => "object is a valid envelope".to_string(),
            };
            let object = serde_yaml::to_string(object).unwrap_or_else(|e| e.to_string());
            (reason, object)
        }
        None => (
            format!("expected an object or list, found {}", type_name(scalar)),
            scalar.to_string(),
        ),
    };

    GristError::PrimitiveReached {
        path: path.to_string(),
        reason,
        object,
    }
}

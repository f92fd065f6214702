//! Builders for resources and registries.

#![allow(dead_code)]

use serde_json::{json, Value};

use grist::{Handler, Map, Registry, Resource};

/// Converts a `json!` object into a spec map.
pub fn spec(value: Value) -> Map {
    value.as_object().cloned().expect("spec must be a JSON object")
}

pub fn resource(kind: &str, name: &str, spec_value: Value) -> Resource {
    Resource::new("memory.grist.dev/v1", kind, name, spec(spec_value))
}

pub fn folder(name: &str, title: &str) -> Resource {
    resource("DashboardFolder", name, json!({ "title": title }))
}

/// `{kind, name}` pointer used inside composable templates.
pub fn pointer(kind: &str, name: &str) -> Value {
    json!({ "kind": kind, "name": name })
}

/// YAML envelope text for a fixture file.
pub fn envelope_yaml(kind: &str, name: &str, spec_yaml: &str) -> String {
    let mut out = format!("apiVersion: memory.grist.dev/v1\nkind: {}\nmetadata:\n  name: {}\nspec:\n", kind, name);
    for line in spec_yaml.lines() {
        out.push_str("  ");
        out.push_str(line);
        out.push('\n');
    }
    out
}

/// Builds a registry, registering handlers in the given order.
pub fn registry_with(handlers: Vec<Box<dyn Handler>>) -> Registry {
    let mut registry = Registry::new();
    for handler in handlers {
        registry.register(handler).expect("kinds are unique");
    }
    registry
}

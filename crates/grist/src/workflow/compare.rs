//! Serialisation and text comparison of resources.
//!
//! Resources are always compared through their serialised form, never as
//! maps, so that ordering and number formatting cannot cause false
//! differences.

use serde_json::Value;
use similar::TextDiff;

use crate::error::{GristError, Result};
use crate::handler::FileType;
use crate::resource::Resource;

/// Serialises a resource for display or for writing to disk.
///
/// With `only_spec` only the `spec` mapping is written, which the parsers
/// accept back as a bare spec.
pub fn encode(resource: &Resource, filetype: FileType, only_spec: bool) -> Result<String> {
    if only_spec {
        let spec = Value::Object(resource.spec().clone());
        return match filetype {
            FileType::Yaml => {
                serde_yaml::to_string(&spec).map_err(|e| GristError::Serialize(e.to_string()))
            }
            FileType::Json => serde_json::to_string_pretty(&spec)
                .map(|s| s + "\n")
                .map_err(|e| GristError::Serialize(e.to_string())),
        };
    }

    match filetype {
        FileType::Yaml => resource.to_yaml(),
        FileType::Json => resource.to_json().map(|s| s + "\n"),
    }
}

/// The result of comparing two normalised resources.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Comparison {
    Equal,
    /// Unified diff from the remote copy to the local one.
    Different(String),
}

impl Comparison {
    pub fn is_equal(&self) -> bool {
        matches!(self, Comparison::Equal)
    }
}

/// Compares two resources through their YAML form.
pub fn compare(remote: &Resource, local: &Resource) -> Result<Comparison> {
    let remote = remote.to_yaml()?;
    let local = local.to_yaml()?;
    if remote == local {
        return Ok(Comparison::Equal);
    }
    Ok(Comparison::Different(unified_diff(&remote, &local)))
}

/// Unified diff with `Remote` and `Local` headers.
pub fn unified_diff(remote: &str, local: &str) -> String {
    TextDiff::from_lines(remote, local)
        .unified_diff()
        .context_radius(3)
        .header("Remote", "Local")
        .to_string()
}

//! The contract between the core and kind-specific remote handlers.
//!
//! The core owns parsing, comparison and reporting; a [`Handler`] owns
//! everything that depends on one kind: identity, normalisation of
//! server-managed fields, and the remote calls themselves.

use std::fmt;
use std::ops::BitOr;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde_json::Value;

use crate::error::Result;
use crate::resource::{KindDescriptor, Resource, Resources};

static RE_UNSAFE_FILE_CHARS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("static regex is valid"));

/// On-disk serialisation format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FileType {
    #[default]
    Yaml,
    Json,
}

impl FileType {
    /// File extension without the dot.
    pub fn extension(&self) -> &'static str {
        match self {
            FileType::Yaml => "yaml",
            FileType::Json => "json",
        }
    }

    /// Maps an extension (without the dot) to a file type.
    pub fn from_extension(ext: &str) -> Option<Self> {
        match ext.to_lowercase().as_str() {
            "yaml" | "yml" => Some(FileType::Yaml),
            "json" => Some(FileType::Json),
            _ => None,
        }
    }
}

impl fmt::Display for FileType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.extension())
    }
}

impl FromStr for FileType {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        FileType::from_extension(s).ok_or_else(|| format!("Unknown output format: {}", s))
    }
}

/// Optional operations a handler supports.
///
/// Handlers declare what they can do up front instead of the workflow
/// probing for it at runtime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Capabilities(u8);

impl Capabilities {
    pub const NONE: Capabilities = Capabilities(0);
    /// `list_remote` enumerates remote UIDs.
    pub const LIST_REMOTE: Capabilities = Capabilities(1);
    /// Remote resources can be pulled to disk.
    pub const PULL: Capabilities = Capabilities(1 << 1);

    pub const fn union(self, other: Capabilities) -> Capabilities {
        Capabilities(self.0 | other.0)
    }

    pub const fn contains(self, other: Capabilities) -> bool {
        self.0 & other.0 == other.0
    }
}

impl BitOr for Capabilities {
    type Output = Capabilities;

    fn bitor(self, rhs: Capabilities) -> Capabilities {
        self.union(rhs)
    }
}

/// Replaces characters that are unsafe in file names with `_`.
pub fn sanitize_file_name(name: &str) -> String {
    RE_UNSAFE_FILE_CHARS.replace_all(name, "_").into_owned()
}

/// Kind-specific collaborator implementing identity, normalisation and remote I/O.
///
/// Remote operations signal a missing resource with
/// [`GristError::NotFound`](crate::GristError::NotFound); any other error
/// aborts the command that triggered it.
pub trait Handler: Send + Sync {
    /// Provider group and version stamped on synthesised resources.
    fn api_version(&self) -> &str;

    /// The kind this handler is registered under.
    fn kind(&self) -> &str;

    /// Composition metadata for the resolver.
    fn descriptor(&self) -> KindDescriptor {
        KindDescriptor::new(self.kind())
    }

    fn capabilities(&self) -> Capabilities {
        Capabilities::LIST_REMOTE | Capabilities::PULL
    }

    /// Relative path of the canonical on-disk file for a resource.
    ///
    /// Defaults to `<kind>/<folder>/<uid>.<ext>` for folder-scoped kinds and
    /// `<kind>/<uid>.<ext>` otherwise, all lowercased and sanitised.
    fn resource_file_path(&self, resource: &Resource, filetype: FileType) -> String {
        let uid = self
            .get_uid(resource)
            .unwrap_or_else(|_| resource.name().to_string());
        let dir = sanitize_file_name(&self.kind().to_lowercase());
        let file = format!("{}.{}", sanitize_file_name(&uid), filetype.extension());
        match resource.get_metadata("folder") {
            Some(folder) if self.uses_folders() => {
                format!("{}/{}/{}", dir, sanitize_file_name(folder), file)
            }
            _ => format!("{}/{}", dir, file),
        }
    }

    /// Turns one parsed envelope into the resources it stands for.
    ///
    /// A handler may explode one node into several (for example a rule
    /// file holding many groups).
    fn parse(&self, resource: Resource) -> Result<Resources> {
        Ok(vec![resource].into())
    }

    /// Strips server-only fields before comparison.
    fn unprepare(&self, resource: &Resource) -> Resource {
        resource.clone()
    }

    /// Injects server-only fields from the existing remote copy before pushing.
    fn prepare(&self, _existing: Option<&Resource>, resource: &Resource) -> Resource {
        resource.clone()
    }

    /// The resource's remote identity.
    fn get_uid(&self, resource: &Resource) -> Result<String> {
        Ok(resource.name().to_string())
    }

    /// The identity of a resource that has no envelope metadata yet.
    fn get_spec_uid(&self, resource: &Resource) -> Result<String> {
        resource.get_spec_string("uid").map(str::to_string)
    }

    /// Fetches a remote resource by UID.
    fn get_by_uid(&self, uid: &str) -> Result<Resource>;

    /// Fetches the remote counterpart of a local resource.
    fn get_remote(&self, resource: &Resource) -> Result<Resource> {
        let uid = self.get_uid(resource)?;
        self.get_by_uid(&uid)
    }

    /// Lists every remote UID of this kind.
    fn list_remote(&self) -> Result<Vec<String>>;

    fn add(&self, resource: &Resource) -> Result<()>;

    fn update(&self, existing: &Resource, resource: &Resource) -> Result<()>;

    /// Kind-specific checks run before any remote call.
    fn validate(&self, _resource: &Resource) -> Result<()> {
        Ok(())
    }

    /// Orders resources of this kind for dispatch (e.g. parents first).
    fn sort(&self, resources: Resources) -> Resources {
        resources
    }

    /// Whether resources of this kind live inside a folder.
    fn uses_folders(&self) -> bool {
        false
    }

    /// Recognises a bare spec of this kind (no envelope).
    fn detect(&self, _tree: &Value) -> bool {
        false
    }
}

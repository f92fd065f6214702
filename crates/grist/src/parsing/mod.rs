//! Turning files into resources.
//!
//! Each [`Parser`] decodes one file format into raw trees; [`parse_any`]
//! decides what each tree is (an envelope, a bare spec, or a container of
//! envelopes) and hands the result to the kind's handler. [`Loader`] ties the
//! parsers together for files and directories.

mod json;
mod template;
mod yaml;

pub use json::JsonParser;
pub use template::{JsonnetCommand, Renderer, TemplateParser};
pub use yaml::YamlParser;

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::Value;
use walkdir::WalkDir;

use crate::error::{GristError, Result};
use crate::registry::Registry;
use crate::resource::{detect_envelope, validate_envelope, Resource, Resources};
use crate::walker;

/// Settings shared by every parser.
#[derive(Debug, Clone, Default)]
pub struct ParseOptions {
    /// Kind assumed for a bare spec no handler recognises.
    pub default_resource_kind: Option<String>,
    /// Folder assigned to bare specs of folder-scoped kinds.
    pub default_folder_uid: Option<String>,
    /// `kind/name` globs; empty keeps everything.
    pub targets: Vec<String>,
}

impl ParseOptions {
    pub fn with_targets(mut self, targets: Vec<String>) -> Self {
        self.targets = targets;
        self
    }
}

/// A file format.
pub trait Parser: Send + Sync {
    /// Short name used in log lines.
    fn name(&self) -> &'static str;

    /// Whether this parser handles the file, judged by extension.
    fn accept(&self, path: &Path) -> bool;

    /// Decodes a file into zero or more raw trees.
    fn decode(&self, path: &Path) -> Result<Vec<Value>>;

    /// Decodes a file and turns every tree into resources.
    fn parse(&self, path: &Path, registry: &Registry, options: &ParseOptions) -> Result<Resources> {
        let mut resources = Resources::new();
        for tree in self.decode(path)? {
            resources.merge(parse_any(registry, tree, options)?);
        }
        log::debug!(
            "{} parser read {} resource(s) from {}",
            self.name(),
            resources.len(),
            path.display()
        );
        Ok(resources)
    }
}

/// Returns true if the path's extension is one of `extensions` (case-insensitive).
pub(crate) fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|ext| extensions.iter().any(|want| ext.eq_ignore_ascii_case(want)))
        .unwrap_or(false)
}

pub(crate) fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| GristError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })
}

/// Interprets one decoded tree.
///
/// 1. A top-level envelope is validated, wrapped and passed to its handler.
/// 2. A map with neither `kind` nor `metadata` is a bare spec. Its kind comes
///    from [`Registry::detect`] or else the default kind; its name from the
///    handler's `get_spec_uid`.
/// 3. Anything else is searched for nested envelopes with the walker.
pub fn parse_any(registry: &Registry, tree: Value, options: &ParseOptions) -> Result<Resources> {
    if detect_envelope(&tree) {
        let resource = Resource::from_value(tree)?;
        return dispatch(registry, resource);
    }

    if is_spec_only(&tree) {
        let kind = registry
            .detect(&tree)
            .map(str::to_string)
            .or_else(|| options.default_resource_kind.clone());
        if let Some(kind) = kind {
            let resource = synthesize(registry, &kind, tree, options)?;
            return dispatch(registry, resource);
        }
    }

    let mut resources = Resources::new();
    for resource in walker::walk(&tree)? {
        resources.merge(dispatch(registry, resource)?);
    }
    Ok(resources)
}

fn is_spec_only(tree: &Value) -> bool {
    tree.as_object()
        .map(|map| !map.contains_key("kind") && !map.contains_key("metadata"))
        .unwrap_or(false)
}

/// Builds an envelope around a bare spec.
fn synthesize(registry: &Registry, kind: &str, tree: Value, options: &ParseOptions) -> Result<Resource> {
    let handler = registry.get_handler(kind)?;
    let spec = match tree {
        Value::Object(map) => map,
        _ => return Err(GristError::InvalidEnvelope {
            problems: vec!["a bare spec must be an object".to_string()],
        }),
    };

    let mut resource = Resource::new(handler.api_version(), kind, "", spec);
    let uid = handler.get_spec_uid(&resource)?;
    resource.set_metadata("name", uid.as_str());
    validate_envelope(&resource.to_value()?)?;

    if handler.uses_folders() {
        match &options.default_folder_uid {
            Some(folder) => resource.set_metadata("folder", folder.as_str()),
            None => {
                return Err(GristError::MissingFolder {
                    kind: kind.to_string(),
                    name: uid,
                })
            }
        }
    }

    log::debug!("Treating bare spec as {}", resource.key());
    Ok(resource)
}

fn dispatch(registry: &Registry, mut resource: Resource) -> Result<Resources> {
    let handler = registry.get_handler(resource.kind())?;
    if resource.api_version.is_empty() {
        resource.api_version = handler.api_version().to_string();
    }
    handler.parse(resource)
}

/// Parses files and directories with a set of parsers.
pub struct Loader<'r> {
    registry: &'r Registry,
    options: ParseOptions,
    parsers: Vec<Box<dyn Parser>>,
}

impl<'r> Loader<'r> {
    /// Creates a loader that understands JSON and YAML.
    pub fn new(registry: &'r Registry, options: ParseOptions) -> Self {
        Self {
            registry,
            options,
            parsers: vec![Box::new(JsonParser), Box::new(YamlParser)],
        }
    }

    /// Adds support for rendered templates.
    pub fn with_renderer(self, renderer: Box<dyn Renderer>) -> Self {
        self.with_parser(Box::new(TemplateParser::new(renderer)))
    }

    pub fn with_parser(mut self, parser: Box<dyn Parser>) -> Self {
        self.parsers.push(parser);
        self
    }

    pub fn options(&self) -> &ParseOptions {
        &self.options
    }

    pub fn registry(&self) -> &Registry {
        self.registry
    }

    /// Whether any parser accepts the file.
    pub fn accepts(&self, path: &Path) -> bool {
        self.parsers.iter().any(|p| p.accept(path))
    }

    /// Parses a file or a directory, keeping resources that match the targets.
    pub fn parse_path(&self, path: &Path) -> Result<Resources> {
        let resources = if path.is_dir() {
            self.parse_directory(path)?
        } else {
            self.parse_file(path)?
        };
        Ok(resources.matching(&self.options.targets))
    }

    /// Parses one file with the first parser that accepts it.
    pub fn parse_file(&self, path: &Path) -> Result<Resources> {
        let parser = self
            .parsers
            .iter()
            .find(|p| p.accept(path))
            .ok_or_else(|| GristError::UnsupportedFormat(path.to_path_buf()))?;
        parser.parse(path, self.registry, &self.options)
    }

    /// Parses every accepted file below a directory, in file-name order.
    ///
    /// Hidden files and directories are skipped; files no parser accepts
    /// are ignored.
    pub fn parse_directory(&self, dir: &Path) -> Result<Resources> {
        let mut resources = Resources::new();
        for path in self.files_in(dir)? {
            resources.merge(self.parse_file(&path)?);
        }
        Ok(resources)
    }

    fn files_in(&self, dir: &Path) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();
        let walker = WalkDir::new(dir)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !is_hidden(e.file_name()));

        for entry in walker {
            let entry = entry.map_err(|e| GristError::ReadDirectory {
                path: dir.to_path_buf(),
                source: e.into(),
            })?;
            if !entry.file_type().is_file() {
                continue;
            }
            if self.accepts(entry.path()) {
                files.push(entry.into_path());
            } else {
                log::debug!("Skipping unsupported file {}", entry.path().display());
            }
        }
        Ok(files)
    }
}

fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_str().map(|s| s.starts_with('.')).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;
    use crate::handler::Handler;
    use serde_json::json;
    use std::fs;
    use tempfile::TempDir;

    struct Dashboards;

    impl Handler for Dashboards {
        fn api_version(&self) -> &str {
            "test/v1"
        }

        fn kind(&self) -> &str {
            "Dashboard"
        }

        fn get_by_uid(&self, uid: &str) -> Result<Resource> {
            Err(GristError::not_found("Dashboard", uid))
        }

        fn list_remote(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        fn add(&self, _resource: &Resource) -> Result<()> {
            Ok(())
        }

        fn update(&self, _existing: &Resource, _resource: &Resource) -> Result<()> {
            Ok(())
        }

        fn uses_folders(&self) -> bool {
            true
        }

        fn detect(&self, tree: &Value) -> bool {
            ["panels", "title", "schemaVersion"]
                .iter()
                .all(|k| tree.get(*k).is_some())
        }
    }

    struct Groups;

    impl Handler for Groups {
        fn api_version(&self) -> &str {
            "test/v1"
        }

        fn kind(&self) -> &str {
            "RuleGroup"
        }

        fn get_by_uid(&self, uid: &str) -> Result<Resource> {
            Err(GristError::not_found("RuleGroup", uid))
        }

        fn list_remote(&self) -> Result<Vec<String>> {
            Ok(Vec::new())
        }

        fn add(&self, _resource: &Resource) -> Result<()> {
            Ok(())
        }

        fn update(&self, _existing: &Resource, _resource: &Resource) -> Result<()> {
            Ok(())
        }

        // One file per namespace, exploded into one resource per group.
        fn parse(&self, resource: Resource) -> Result<Resources> {
            let groups = resource.get_spec_value("groups")?.as_array().cloned().unwrap_or_default();
            groups
                .into_iter()
                .map(|group| {
                    let name = group["name"].as_str().unwrap_or_default().to_string();
                    let spec = group.as_object().cloned().unwrap_or_default();
                    Ok(Resource::new(resource.api_version(), "RuleGroup", name, spec))
                })
                .collect()
        }
    }

    fn registry() -> Registry {
        let mut registry = Registry::new();
        registry.register(Box::new(Dashboards)).unwrap();
        registry.register(Box::new(Groups)).unwrap();
        registry
    }

    fn options() -> ParseOptions {
        ParseOptions {
            default_folder_uid: Some("general".to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_envelope_fills_api_version() {
        let registry = registry();
        let tree = json!({"kind": "Dashboard", "metadata": {"name": "d"}, "spec": {"title": "D"}});
        let resources = parse_any(&registry, tree, &options()).unwrap();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources.as_slice()[0].api_version(), "test/v1");
    }

    #[test]
    fn test_handler_may_explode_resource() {
        let registry = registry();
        let tree = json!({
            "apiVersion": "test/v1",
            "kind": "RuleGroup",
            "metadata": {"name": "ns"},
            "spec": {"groups": [{"name": "a"}, {"name": "b"}]}
        });
        let resources = parse_any(&registry, tree, &options()).unwrap();
        let names: Vec<&str> = resources.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_unknown_kind_is_an_error() {
        let registry = registry();
        let tree = json!({"kind": "Nope", "metadata": {"name": "n"}, "spec": {"a": 1}});
        assert!(matches!(
            parse_any(&registry, tree, &options()),
            Err(GristError::UnknownKind(_))
        ));
    }

    #[test]
    fn test_bare_spec_is_detected() {
        let registry = registry();
        let tree = json!({"uid": "abc", "title": "T", "panels": [], "schemaVersion": 39});
        let resources = parse_any(&registry, tree, &options()).unwrap();
        let resource = &resources.as_slice()[0];
        assert_eq!(resource.key(), "Dashboard:abc");
        assert_eq!(resource.get_metadata("folder"), Some("general"));
        assert_eq!(resource.get_spec_string("title").unwrap(), "T");
    }

    #[test]
    fn test_bare_spec_with_empty_uid_is_rejected() {
        let registry = registry();
        let tree = json!({"uid": "", "title": "T", "panels": [], "schemaVersion": 39});
        let err = parse_any(&registry, tree, &options()).unwrap_err();
        assert!(matches!(err, GristError::InvalidEnvelope { .. }));
        assert!(err.to_string().contains("\"metadata.name\" must not be empty"));
    }

    #[test]
    fn test_bare_spec_needs_folder() {
        let registry = registry();
        let tree = json!({"uid": "abc", "title": "T", "panels": [], "schemaVersion": 39});
        let result = parse_any(&registry, tree, &ParseOptions::default());
        assert!(matches!(result, Err(GristError::MissingFolder { .. })));
    }

    #[test]
    fn test_bare_spec_falls_back_to_default_kind() {
        let registry = registry();
        let opts = ParseOptions {
            default_resource_kind: Some("Dashboard".to_string()),
            ..options()
        };
        let resources = parse_any(&registry, json!({"uid": "x", "title": "only"}), &opts).unwrap();
        assert_eq!(resources.as_slice()[0].key(), "Dashboard:x");
    }

    #[test]
    fn test_container_falls_back_to_walker() {
        let registry = registry();
        let tree = json!({
            "kind": "container",
            "dashboards": {
                "b": {"kind": "Dashboard", "metadata": {"name": "b"}, "spec": {"title": "B"}},
                "a": {"kind": "Dashboard", "metadata": {"name": "a"}, "spec": {"title": "A"}}
            }
        });
        let result = parse_any(&registry, tree, &options());
        // "kind" is a scalar on the walked path.
        assert!(matches!(result, Err(GristError::PrimitiveReached { .. })));

        let tree = json!({
            "dashboards": {
                "b": {"kind": "Dashboard", "metadata": {"name": "b"}, "spec": {"title": "B"}},
                "a": {"kind": "Dashboard", "metadata": {"name": "a"}, "spec": {"title": "A"}}
            }
        });
        let resources = parse_any(&registry, tree, &options()).unwrap();
        let names: Vec<&str> = resources.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_directory_skips_hidden_and_unsupported() {
        let dir = TempDir::new().unwrap();
        let envelope = |name: &str| {
            format!(
                "kind: Dashboard\nmetadata:\n  name: {}\n  folder: general\nspec:\n  title: {}\n",
                name, name
            )
        };
        fs::create_dir_all(dir.path().join("sub")).unwrap();
        fs::create_dir_all(dir.path().join(".hidden")).unwrap();
        fs::write(dir.path().join("b.yaml"), envelope("b")).unwrap();
        fs::write(dir.path().join("sub/a.yml"), envelope("a")).unwrap();
        fs::write(dir.path().join(".hidden/c.yaml"), envelope("c")).unwrap();
        fs::write(dir.path().join(".d.yaml"), envelope("d")).unwrap();
        fs::write(dir.path().join("README.md"), "# notes").unwrap();

        let registry = registry();
        let loader = Loader::new(&registry, options());
        let resources = loader.parse_path(dir.path()).unwrap();
        let names: Vec<&str> = resources.iter().map(|r| r.name()).collect();
        assert_eq!(names, vec!["b", "a"]);
    }

    #[test]
    fn test_targets_filter_results() {
        let dir = TempDir::new().unwrap();
        fs::write(
            dir.path().join("all.yaml"),
            "kind: Dashboard\nmetadata: {name: keep}\nspec: {title: K}\n---\nkind: Dashboard\nmetadata: {name: drop}\nspec: {title: D}\n",
        )
        .unwrap();

        let registry = registry();
        let loader = Loader::new(
            &registry,
            options().with_targets(vec!["Dashboard/keep".to_string()]),
        );
        let resources = loader.parse_path(&dir.path().join("all.yaml")).unwrap();
        assert_eq!(resources.len(), 1);
        assert_eq!(resources.as_slice()[0].name(), "keep");
    }

    #[test]
    fn test_unsupported_file() {
        let registry = registry();
        let loader = Loader::new(&registry, options());
        assert!(matches!(
            loader.parse_file(Path::new("notes.txt")),
            Err(GristError::UnsupportedFormat(_))
        ));
    }
}

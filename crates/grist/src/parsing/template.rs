use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::Value;

use super::{has_extension, Parser};
use crate::error::{GristError, Result};

/// Evaluates a template file into a tree.
///
/// The template language itself is opaque to grist; a renderer only has to
/// hand back the JSON tree the template produces.
pub trait Renderer: Send + Sync {
    fn render(&self, path: &Path) -> Result<Value>;
}

/// Renders jsonnet by running an external `jsonnet` binary.
#[derive(Debug, Clone)]
pub struct JsonnetCommand {
    binary: PathBuf,
    import_paths: Vec<PathBuf>,
}

impl JsonnetCommand {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
            import_paths: Vec::new(),
        }
    }

    /// Library search paths, passed as `-J <path>` in order.
    pub fn with_import_paths(mut self, paths: impl IntoIterator<Item = impl Into<PathBuf>>) -> Self {
        self.import_paths = paths.into_iter().map(Into::into).collect();
        self
    }

    pub fn import_paths(&self) -> &[PathBuf] {
        &self.import_paths
    }

    fn command(&self, path: &Path) -> Command {
        let mut command = Command::new(&self.binary);
        for import in &self.import_paths {
            command.arg("-J").arg(import);
        }
        command.arg(path);
        command
    }
}

impl Default for JsonnetCommand {
    fn default() -> Self {
        Self::new("jsonnet").with_import_paths(["vendor", "lib", "."])
    }
}

impl Renderer for JsonnetCommand {
    fn render(&self, path: &Path) -> Result<Value> {
        log::debug!("Rendering {} with {}", path.display(), self.binary.display());

        let output = self.command(path).output().map_err(|e| GristError::Render {
            path: path.to_path_buf(),
            message: format!("failed to run {}: {}", self.binary.display(), e),
        })?;

        if !output.status.success() {
            return Err(GristError::Render {
                path: path.to_path_buf(),
                message: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        serde_json::from_slice(&output.stdout).map_err(|e| GristError::ParseJson {
            path: path.to_path_buf(),
            message: e.to_string(),
        })
    }
}

/// Template files, rendered to a single tree before interpretation.
pub struct TemplateParser {
    renderer: Box<dyn Renderer>,
}

impl TemplateParser {
    pub fn new(renderer: Box<dyn Renderer>) -> Self {
        Self { renderer }
    }
}

impl Parser for TemplateParser {
    fn name(&self) -> &'static str {
        "template"
    }

    fn accept(&self, path: &Path) -> bool {
        has_extension(path, &["jsonnet", "libsonnet"])
    }

    fn decode(&self, path: &Path) -> Result<Vec<Value>> {
        Ok(vec![self.renderer.render(path)?])
    }
}

use std::path::Path;

use serde::Deserialize;
use serde_json::Value;

use super::{has_extension, read_file, Parser};
use crate::error::{GristError, Result};

/// YAML files, possibly holding several `---` separated documents.
#[derive(Debug, Default, Clone, Copy)]
pub struct YamlParser;

impl Parser for YamlParser {
    fn name(&self) -> &'static str {
        "yaml"
    }

    fn accept(&self, path: &Path) -> bool {
        has_extension(path, &["yaml", "yml"])
    }

    fn decode(&self, path: &Path) -> Result<Vec<Value>> {
        let content = read_file(path)?;
        let mut trees = Vec::new();

        for document in serde_yaml::Deserializer::from_str(&content) {
            let tree = Value::deserialize(document).map_err(|e| GristError::ParseYaml {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
            // Empty documents (a trailing `---`, a comment-only file) carry nothing.
            if !tree.is_null() {
                trees.push(tree);
            }
        }

        Ok(trees)
    }
}

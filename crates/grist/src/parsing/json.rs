use std::path::Path;

use serde_json::Value;

use super::{has_extension, read_file, Parser};
use crate::error::{GristError, Result};

/// Plain JSON files, one tree per file.
#[derive(Debug, Default, Clone, Copy)]
pub struct JsonParser;

impl Parser for JsonParser {
    fn name(&self) -> &'static str {
        "json"
    }

    fn accept(&self, path: &Path) -> bool {
        has_extension(path, &["json"])
    }

    fn decode(&self, path: &Path) -> Result<Vec<Value>> {
        let content = read_file(path)?;
        let tree = serde_json::from_str(&content).map_err(|e| GristError::ParseJson {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        Ok(vec![tree])
    }
}

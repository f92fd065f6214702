//! CLI configuration.
//!
//! Looked up in order: `--config`, `$GRIST_CONFIG`, `./grist.yaml`, then
//! `<user config dir>/grist/config.yaml`. Environment variables override the
//! file and command line flags override both.

use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use grist::FileType;

pub const CONFIG_ENV: &str = "GRIST_CONFIG";
pub const REMOTE_DIR_ENV: &str = "GRIST_REMOTE_DIR";
pub const DEFAULT_KIND_ENV: &str = "GRIST_DEFAULT_KIND";
pub const DEFAULT_FOLDER_ENV: &str = "GRIST_DEFAULT_FOLDER";
pub const OUTPUT_FORMAT_ENV: &str = "GRIST_OUTPUT_FORMAT";

const LOCAL_CONFIG: &str = "grist.yaml";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default, deny_unknown_fields)]
pub struct Config {
    /// Directory backing the bundled remote store.
    pub remote_dir: PathBuf,
    pub default_resource_kind: Option<String>,
    pub default_folder_uid: Option<String>,
    /// `yaml` or `json`.
    pub output_format: String,
    /// Library search paths for jsonnet.
    pub jsonnet_paths: Vec<PathBuf>,
    pub jsonnet_binary: PathBuf,
    pub only_spec: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            remote_dir: PathBuf::from(".grist/remote"),
            default_resource_kind: None,
            default_folder_uid: None,
            output_format: "yaml".to_string(),
            jsonnet_paths: vec![
                PathBuf::from("vendor"),
                PathBuf::from("lib"),
                PathBuf::from("."),
            ],
            jsonnet_binary: PathBuf::from("jsonnet"),
            only_spec: false,
        }
    }
}

impl Config {
    /// Finds, reads and validates the configuration.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let mut config = match Self::locate(explicit)? {
            Some(path) => {
                log::debug!("Loading configuration from {}", path.display());
                Self::from_file(&path)?
            }
            None => Self::default(),
        };
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    /// Reads one configuration file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))
    }

    fn locate(explicit: Option<&Path>) -> Result<Option<PathBuf>> {
        if let Some(path) = explicit {
            if !path.is_file() {
                bail!("Config file not found: {}", path.display());
            }
            return Ok(Some(path.to_path_buf()));
        }

        if let Ok(path) = env::var(CONFIG_ENV) {
            let path = PathBuf::from(path);
            if !path.is_file() {
                bail!("Config file from ${} not found: {}", CONFIG_ENV, path.display());
            }
            return Ok(Some(path));
        }

        let local = PathBuf::from(LOCAL_CONFIG);
        if local.is_file() {
            return Ok(Some(local));
        }

        Ok(user_config_path().filter(|p| p.is_file()))
    }

    fn apply_env(&mut self) {
        if let Ok(dir) = env::var(REMOTE_DIR_ENV) {
            self.remote_dir = PathBuf::from(dir);
        }
        if let Ok(kind) = env::var(DEFAULT_KIND_ENV) {
            self.default_resource_kind = Some(kind);
        }
        if let Ok(folder) = env::var(DEFAULT_FOLDER_ENV) {
            self.default_folder_uid = Some(folder);
        }
        if let Ok(format) = env::var(OUTPUT_FORMAT_ENV) {
            self.output_format = format;
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.filetype()?;
        if self.remote_dir.as_os_str().is_empty() {
            bail!("remoteDir must not be empty");
        }
        if self.jsonnet_binary.as_os_str().is_empty() {
            bail!("jsonnetBinary must not be empty");
        }
        Ok(())
    }

    pub fn filetype(&self) -> Result<FileType> {
        match self.output_format.parse() {
            Ok(filetype) => Ok(filetype),
            Err(e) => bail!("{} (expected yaml or json)", e),
        }
    }
}

/// `<user config dir>/grist/config.yaml`, if the platform has one.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|p| p.join("grist").join("config.yaml"))
}

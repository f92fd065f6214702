//! A remote backed by a local directory.
//!
//! Each kind keeps one JSON envelope per UID under
//! `<root>/<kind lowercase>/<uid>.json`. The store behaves like a server:
//! it assigns `id` and `version` on create and bumps `version` on update.
//!
//! `DashboardTemplate` is composable: its `spec.template` is a dashboard
//! whose `panels.*` entries point at `Panel` resources, and it resolves
//! into a `Dashboard` before anything reaches the store.

use std::fs;
use std::path::{Path, PathBuf};

use serde_json::{json, Value};

use grist::{
    sanitize_file_name, GristError, Handler, KindDescriptor, Reference, Registry,
    Resource, Resources, Result,
};

pub const API_VERSION: &str = "grist.dev/v1alpha1";

/// Fields the store owns; never compared.
const SERVER_FIELDS: [&str; 2] = ["id", "version"];

/// The kinds the store knows how to hold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreKind {
    DashboardFolder,
    Panel,
    DashboardTemplate,
    Dashboard,
    Datasource,
}

impl StoreKind {
    pub fn name(&self) -> &'static str {
        match self {
            StoreKind::DashboardFolder => "DashboardFolder",
            StoreKind::Panel => "Panel",
            StoreKind::DashboardTemplate => "DashboardTemplate",
            StoreKind::Dashboard => "Dashboard",
            StoreKind::Datasource => "Datasource",
        }
    }

    /// Spec keys that identify a bare spec of this kind.
    fn detect_keys(&self) -> &'static [&'static str] {
        match self {
            StoreKind::DashboardFolder | StoreKind::Panel | StoreKind::DashboardTemplate => &[],
            StoreKind::Dashboard => &["panels", "title", "schemaVersion"],
            StoreKind::Datasource => &["type", "access", "url"],
        }
    }
}

/// Builds a registry with every store kind, folders first.
pub fn registry(root: &Path) -> Result<Registry> {
    let mut registry = Registry::new();
    for kind in [
        StoreKind::DashboardFolder,
        StoreKind::Panel,
        StoreKind::DashboardTemplate,
        StoreKind::Dashboard,
        StoreKind::Datasource,
    ] {
        registry.register(Box::new(StoreHandler::new(root, kind)))?;
    }
    Ok(registry)
}

pub struct StoreHandler {
    kind: StoreKind,
    dir: PathBuf,
}

impl StoreHandler {
    pub fn new(root: &Path, kind: StoreKind) -> Self {
        Self {
            kind,
            dir: root.join(kind.name().to_lowercase()),
        }
    }

    fn path_for(&self, uid: &str) -> PathBuf {
        self.dir.join(format!("{}.json", sanitize_file_name(uid)))
    }

    fn write(&self, uid: &str, resource: &Resource) -> Result<()> {
        let path = self.path_for(uid);
        fs::create_dir_all(&self.dir).map_err(|e| GristError::WriteFile {
            path: self.dir.clone(),
            source: e,
        })?;
        fs::write(&path, resource.to_json()?).map_err(|e| GristError::WriteFile { path, source: e })
    }

    fn next_id(&self) -> Result<u64> {
        let mut max = 0;
        for uid in self.list_remote()? {
            let id = self
                .get_by_uid(&uid)?
                .get_spec_value("id")
                .ok()
                .and_then(Value::as_u64)
                .unwrap_or(0);
            max = max.max(id);
        }
        Ok(max + 1)
    }

    fn remote_error(&self, uid: &str, message: impl Into<String>) -> GristError {
        GristError::Remote {
            kind: self.kind.name().to_string(),
            uid: uid.to_string(),
            message: message.into(),
        }
    }
}

impl Handler for StoreHandler {
    fn api_version(&self) -> &str {
        API_VERSION
    }

    fn kind(&self) -> &str {
        self.kind.name()
    }

    fn descriptor(&self) -> KindDescriptor {
        match self.kind {
            StoreKind::DashboardTemplate => KindDescriptor::composable(
                self.kind.name(),
                StoreKind::Dashboard.name(),
                vec![Reference::new("panels.*")],
            ),
            _ => KindDescriptor::new(self.kind.name()),
        }
    }

    fn unprepare(&self, resource: &Resource) -> Resource {
        let mut resource = resource.clone();
        for field in SERVER_FIELDS {
            resource.delete_spec_key(field);
        }
        resource
    }

    fn prepare(&self, existing: Option<&Resource>, resource: &Resource) -> Resource {
        let mut resource = resource.clone();
        if let Some(existing) = existing {
            for field in SERVER_FIELDS {
                if let Ok(value) = existing.get_spec_value(field) {
                    resource.set_spec_value(field, value.clone());
                }
            }
        }
        resource
    }

    fn get_by_uid(&self, uid: &str) -> Result<Resource> {
        let path = self.path_for(uid);
        if !path.is_file() {
            return Err(GristError::not_found(self.kind.name(), uid));
        }
        let content = fs::read_to_string(&path).map_err(|e| GristError::ReadFile {
            path: path.clone(),
            source: e,
        })?;
        let tree: Value = serde_json::from_str(&content).map_err(|e| GristError::ParseJson {
            path,
            message: e.to_string(),
        })?;
        Resource::from_value(tree)
    }

    fn list_remote(&self) -> Result<Vec<String>> {
        if !self.dir.is_dir() {
            return Ok(Vec::new());
        }
        let entries = fs::read_dir(&self.dir).map_err(|e| GristError::ReadDirectory {
            path: self.dir.clone(),
            source: e,
        })?;

        let mut uids = Vec::new();
        for entry in entries {
            let path = entry
                .map_err(|e| GristError::ReadDirectory {
                    path: self.dir.clone(),
                    source: e,
                })?
                .path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                uids.push(stem.to_string());
            }
        }
        uids.sort();
        Ok(uids)
    }

    fn add(&self, resource: &Resource) -> Result<()> {
        let uid = self.get_uid(resource)?;
        if self.path_for(&uid).exists() {
            return Err(self.remote_error(&uid, "already exists"));
        }
        let mut stored = resource.clone();
        stored.set_spec_value("id", json!(self.next_id()?));
        stored.set_spec_value("version", json!(1));
        self.write(&uid, &stored)?;
        log::debug!("Stored new {}.{}", self.kind(), uid);
        Ok(())
    }

    fn update(&self, existing: &Resource, resource: &Resource) -> Result<()> {
        let uid = self.get_uid(resource)?;
        let version = existing
            .get_spec_value("version")
            .ok()
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let mut stored = resource.clone();
        stored.set_spec_value("version", json!(version + 1));
        self.write(&uid, &stored)
    }

    fn validate(&self, resource: &Resource) -> Result<()> {
        if let Ok(uid) = resource.get_spec_value("uid") {
            if uid.as_str() != Some(resource.name()) {
                return Err(GristError::Validation {
                    kind: self.kind().to_string(),
                    uid: resource.name().to_string(),
                    message: format!("spec.uid {} does not match metadata.name", uid),
                });
            }
        }
        if self.uses_folders() && !resource.has_metadata("folder") {
            return Err(GristError::MissingFolder {
                kind: self.kind().to_string(),
                name: resource.name().to_string(),
            });
        }
        Ok(())
    }

    fn sort(&self, resources: Resources) -> Resources {
        match self.kind {
            StoreKind::DashboardFolder => parents_first(resources),
            _ => resources,
        }
    }

    fn uses_folders(&self) -> bool {
        self.kind == StoreKind::Dashboard
    }

    fn detect(&self, tree: &Value) -> bool {
        let keys = self.kind.detect_keys();
        !keys.is_empty() && keys.iter().all(|key| tree.get(*key).is_some())
    }
}

/// Orders folders so every parent named by `spec.parentUid` precedes its children.
///
/// Parents outside the batch are assumed to exist. Folders caught in a
/// parent cycle keep their input order at the end.
fn parents_first(resources: Resources) -> Resources {
    let names: Vec<String> = resources.iter().map(|r| r.name().to_string()).collect();
    let mut placed: Vec<String> = Vec::new();
    let mut pending = resources.into_vec();
    let mut sorted = Resources::new();

    loop {
        let before = pending.len();
        let mut waiting = Vec::new();
        for folder in pending {
            let ready = match folder.get_spec_string("parentUid") {
                Ok(parent) => !names.iter().any(|n| n == parent) || placed.iter().any(|p| p == parent),
                Err(_) => true,
            };
            if ready {
                placed.push(folder.name().to_string());
                sorted.push(folder);
            } else {
                waiting.push(folder);
            }
        }

        if waiting.is_empty() {
            break;
        }
        if waiting.len() == before {
            log::warn!("Folder parents form a cycle; applying the rest in file order");
            sorted.merge(waiting.into());
            break;
        }
        pending = waiting;
    }
    sorted
}

//! An in-memory remote.
//!
//! `MemoryHandler` behaves like a typical server-backed handler: the remote
//! assigns `id` and `version` on create, bumps `version` on update, and both
//! are stripped again before comparison.

#![allow(dead_code)]

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use serde_json::{json, Value};

use grist::{
    Capabilities, GristError, Handler, KindDescriptor, Notifier, Outcome, Resource, Resources,
    Result,
};

/// Shared view of a `MemoryHandler`'s remote, kept by the test after the
/// handler is moved into a registry.
#[derive(Clone, Default)]
pub struct MemoryRemote {
    store: Arc<Mutex<BTreeMap<String, Resource>>>,
    calls: Arc<Mutex<Vec<String>>>,
}

impl MemoryRemote {
    pub fn get(&self, uid: &str) -> Option<Resource> {
        self.store.lock().unwrap().get(uid).cloned()
    }

    pub fn len(&self) -> usize {
        self.store.lock().unwrap().len()
    }

    /// Stores a resource directly, as if created by someone else.
    pub fn insert(&self, uid: &str, resource: Resource) {
        self.store.lock().unwrap().insert(uid.to_string(), resource);
    }

    /// Changes a remote resource behind grist's back.
    pub fn edit(&self, uid: &str, f: impl FnOnce(&mut Resource)) {
        let mut store = self.store.lock().unwrap();
        let resource = store.get_mut(uid).expect("resource exists remotely");
        f(resource);
    }

    /// Remote calls in order, e.g. `add:x`, `update:x`.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }
}

pub struct MemoryHandler {
    kind: String,
    remote: MemoryRemote,
    descriptor: Option<KindDescriptor>,
    capabilities: Capabilities,
    uses_folders: bool,
    detect_keys: Vec<String>,
    parent_key: Option<String>,
    fail_on: Option<String>,
}

impl MemoryHandler {
    pub fn new(kind: &str) -> Self {
        Self {
            kind: kind.to_string(),
            remote: MemoryRemote::default(),
            descriptor: None,
            capabilities: Capabilities::LIST_REMOTE | Capabilities::PULL,
            uses_folders: false,
            detect_keys: Vec::new(),
            parent_key: None,
            fail_on: None,
        }
    }

    pub fn remote(&self) -> MemoryRemote {
        self.remote.clone()
    }

    pub fn composable(mut self, descriptor: KindDescriptor) -> Self {
        self.descriptor = Some(descriptor);
        self
    }

    pub fn capabilities(mut self, capabilities: Capabilities) -> Self {
        self.capabilities = capabilities;
        self
    }

    pub fn folders(mut self) -> Self {
        self.uses_folders = true;
        self
    }

    /// Recognise bare specs carrying all of these keys.
    pub fn detect_by(mut self, keys: &[&str]) -> Self {
        self.detect_keys = keys.iter().map(|k| k.to_string()).collect();
        self
    }

    /// Sort parents first using this spec key as the parent UID.
    pub fn parents_by(mut self, key: &str) -> Self {
        self.parent_key = Some(key.to_string());
        self
    }

    /// Make every remote write for this UID fail.
    pub fn fail_on(mut self, uid: &str) -> Self {
        self.fail_on = Some(uid.to_string());
        self
    }

    fn check_failure(&self, uid: &str) -> Result<()> {
        if self.fail_on.as_deref() == Some(uid) {
            return Err(GristError::Remote {
                kind: self.kind.clone(),
                uid: uid.to_string(),
                message: "server returned 500".to_string(),
            });
        }
        Ok(())
    }
}

impl Handler for MemoryHandler {
    fn api_version(&self) -> &str {
        "memory.grist.dev/v1"
    }

    fn kind(&self) -> &str {
        &self.kind
    }

    fn descriptor(&self) -> KindDescriptor {
        self.descriptor
            .clone()
            .unwrap_or_else(|| KindDescriptor::new(self.kind.as_str()))
    }

    fn capabilities(&self) -> Capabilities {
        self.capabilities
    }

    fn unprepare(&self, resource: &Resource) -> Resource {
        let mut resource = resource.clone();
        resource.delete_spec_key("id");
        resource.delete_spec_key("version");
        resource
    }

    fn prepare(&self, existing: Option<&Resource>, resource: &Resource) -> Resource {
        let mut resource = resource.clone();
        if let Some(existing) = existing {
            for key in ["id", "version"] {
                if let Ok(value) = existing.get_spec_value(key) {
                    resource.set_spec_value(key, value.clone());
                }
            }
        }
        resource
    }

    fn get_by_uid(&self, uid: &str) -> Result<Resource> {
        self.remote
            .get(uid)
            .ok_or_else(|| GristError::not_found(self.kind.as_str(), uid))
    }

    fn list_remote(&self) -> Result<Vec<String>> {
        Ok(self.remote.store.lock().unwrap().keys().cloned().collect())
    }

    fn add(&self, resource: &Resource) -> Result<()> {
        let uid = self.get_uid(resource)?;
        self.check_failure(&uid)?;
        self.remote.record(format!("add:{}", uid));

        let mut stored = resource.clone();
        let id = self.remote.len() as u64 + 1;
        stored.set_spec_value("id", json!(id));
        stored.set_spec_value("version", json!(1));
        self.remote.insert(&uid, stored);
        Ok(())
    }

    fn update(&self, existing: &Resource, resource: &Resource) -> Result<()> {
        let uid = self.get_uid(resource)?;
        self.check_failure(&uid)?;
        self.remote.record(format!("update:{}", uid));

        let version = existing
            .get_spec_value("version")
            .ok()
            .and_then(Value::as_u64)
            .unwrap_or(0);
        let mut stored = resource.clone();
        stored.set_spec_value("version", json!(version + 1));
        self.remote.insert(&uid, stored);
        Ok(())
    }

    fn validate(&self, resource: &Resource) -> Result<()> {
        if let Ok(uid) = resource.get_spec_string("uid") {
            if uid != resource.name() {
                return Err(GristError::Validation {
                    kind: self.kind.clone(),
                    uid: resource.name().to_string(),
                    message: format!("spec.uid '{}' does not match metadata.name", uid),
                });
            }
        }
        Ok(())
    }

    fn sort(&self, resources: Resources) -> Resources {
        let key = match &self.parent_key {
            Some(key) => key.clone(),
            None => return resources,
        };

        // Repeatedly emit resources whose parent is already placed or unknown.
        let mut pending = resources.into_vec();
        let names: Vec<String> = pending.iter().map(|r| r.name().to_string()).collect();
        let mut placed: Vec<String> = Vec::new();
        let mut sorted = Resources::new();
        while !pending.is_empty() {
            let before = pending.len();
            let mut rest = Vec::new();
            for resource in pending {
                let ready = match resource.get_spec_string(&key) {
                    Ok(parent) => !names.iter().any(|n| n == parent) || placed.iter().any(|p| p == parent),
                    Err(_) => true,
                };
                if ready {
                    placed.push(resource.name().to_string());
                    sorted.push(resource);
                } else {
                    rest.push(resource);
                }
            }
            if rest.len() == before {
                for resource in rest {
                    sorted.push(resource);
                }
                break;
            }
            pending = rest;
        }
        sorted
    }

    fn uses_folders(&self) -> bool {
        self.uses_folders
    }

    fn detect(&self, tree: &Value) -> bool {
        !self.detect_keys.is_empty() && self.detect_keys.iter().all(|k| tree.get(k).is_some())
    }
}

/// A notifier that keeps every outcome for later assertions.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    outcomes: Arc<Mutex<Vec<Outcome>>>,
    warnings: Arc<Mutex<Vec<String>>>,
}

impl RecordingNotifier {
    pub fn outcomes(&self) -> Vec<Outcome> {
        self.outcomes.lock().unwrap().clone()
    }

    pub fn warnings(&self) -> Vec<String> {
        self.warnings.lock().unwrap().clone()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, outcome: &Outcome) {
        self.outcomes.lock().unwrap().push(outcome.clone());
    }

    fn warn(&self, message: &str) {
        self.warnings.lock().unwrap().push(message.to_string());
    }
}

//! Get, list, show, diff, apply, pull and export.
//!
//! The workflow owns comparison, idempotence and reporting. Everything that
//! depends on a kind, including every remote call, goes through that kind's
//! [`Handler`]. Resources are processed one at a time, in order.

mod compare;
mod notifier;

pub use compare::{compare, encode, unified_diff, Comparison};
pub use notifier::{Event, LogNotifier, NoopNotifier, Notifier, Outcome, Report};

use std::fs;
use std::path::Path;

use crate::error::{GristError, Result};
use crate::handler::{Capabilities, FileType, Handler};
use crate::registry::{resource_matches_target, Registry};
use crate::resource::{Resource, Resources};

/// One entry of a local or remote listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListEntry {
    pub api_version: String,
    pub kind: String,
    pub uid: String,
}

/// A resource rendered for display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Rendered {
    /// `<kind>.<uid>`.
    pub title: String,
    pub content: String,
}

/// Splits `<kind>.<uid>` at the first dot, so composite UIDs keep theirs.
pub fn split_uid(id: &str) -> Result<(&str, &str)> {
    match id.split_once('.') {
        Some((kind, uid)) if !kind.is_empty() && !uid.is_empty() => Ok((kind, uid)),
        _ => Err(GristError::InvalidUid(id.to_string())),
    }
}

/// Runs commands against the handlers of one registry.
pub struct Workflow<'r> {
    registry: &'r Registry,
    notifier: Box<dyn Notifier + 'r>,
    filetype: FileType,
    only_spec: bool,
}

impl<'r> Workflow<'r> {
    pub fn new(registry: &'r Registry) -> Self {
        Self {
            registry,
            notifier: Box::new(LogNotifier),
            filetype: FileType::default(),
            only_spec: false,
        }
    }

    pub fn with_notifier(mut self, notifier: Box<dyn Notifier + 'r>) -> Self {
        self.notifier = notifier;
        self
    }

    /// Format used by Show, Pull and Export.
    pub fn with_filetype(mut self, filetype: FileType) -> Self {
        self.filetype = filetype;
        self
    }

    /// Write only `spec` in Show, Pull and Export.
    pub fn with_only_spec(mut self, only_spec: bool) -> Self {
        self.only_spec = only_spec;
        self
    }

    pub fn registry(&self) -> &Registry {
        self.registry
    }

    pub fn filetype(&self) -> FileType {
        self.filetype
    }

    /// Fetches one remote resource by `<kind>.<uid>`.
    pub fn get(&self, id: &str) -> Result<Resource> {
        let (kind, uid) = split_uid(id)?;
        let handler = self.registry.get_handler(kind)?;
        let remote = handler.get_by_uid(uid)?;
        Ok(handler.unprepare(&remote))
    }

    /// Renders a fetched resource in the configured format.
    pub fn render(&self, resource: &Resource) -> Result<String> {
        encode(resource, self.filetype, self.only_spec)
    }

    /// Lists the UIDs of local resources.
    pub fn list(&self, resources: &Resources) -> Result<Vec<ListEntry>> {
        resources
            .iter()
            .map(|resource| {
                let handler = self.registry.get_handler(resource.kind())?;
                Ok(ListEntry {
                    api_version: handler.api_version().to_string(),
                    kind: resource.kind().to_string(),
                    uid: handler.get_uid(resource)?,
                })
            })
            .collect()
    }

    /// Lists remote UIDs of every handler matching the targets.
    ///
    /// Handlers that cannot list their remote are skipped with a warning.
    pub fn list_remote(&self, targets: &[String]) -> Result<Vec<ListEntry>> {
        let mut entries = Vec::new();
        for handler in self.handlers_for(targets, Capabilities::LIST_REMOTE, "listing") {
            let mut uids = handler.list_remote()?;
            uids.sort();
            entries.extend(
                uids.into_iter()
                    .filter(|uid| resource_matches_target(handler.kind(), uid, targets))
                    .map(|uid| ListEntry {
                        api_version: handler.api_version().to_string(),
                        kind: handler.kind().to_string(),
                        uid,
                    }),
            );
        }
        Ok(entries)
    }

    /// Renders local resources as the remote would see them.
    pub fn show(&self, resources: &Resources) -> Result<Vec<Rendered>> {
        resources
            .iter()
            .map(|resource| {
                let handler = self.registry.get_handler(resource.kind())?;
                let uid = handler.get_uid(resource)?;
                Ok(Rendered {
                    title: format!("{}.{}", resource.kind(), uid),
                    content: self.render(&handler.unprepare(resource))?,
                })
            })
            .collect()
    }

    /// Compares every local resource with its remote copy. Never writes.
    pub fn diff(&self, resources: &Resources) -> Result<Report> {
        let mut report = Report::new();
        for resource in resources {
            let handler = self.registry.get_handler(resource.kind())?;
            let uid = handler.get_uid(resource)?;
            let _span = tracing::info_span!("diff", kind = %resource.kind(), uid = %uid).entered();

            handler.validate(resource)?;
            let outcome = match handler.get_remote(resource) {
                Err(e) if e.is_not_found() => Outcome::new(resource.kind(), uid, Event::NotFound),
                Err(e) => return Err(e),
                Ok(remote) => match self.compare_with_remote(handler, &remote, resource)? {
                    Comparison::Equal => Outcome::new(resource.kind(), uid, Event::NoDifferences),
                    Comparison::Different(diff) => {
                        Outcome::new(resource.kind(), uid, Event::ChangesDetected).with_diff(diff)
                    }
                },
            };
            self.record(&mut report, outcome);
        }
        Ok(report)
    }

    /// Creates or updates every resource whose remote copy differs.
    ///
    /// Resources go in handler order (see [`Registry::sort`]). A failure does
    /// not stop the remaining resources, but the first failure is returned
    /// once all of them have been attempted.
    pub fn apply(&self, resources: Resources) -> Result<Report> {
        let mut report = Report::new();
        let mut first_error = None;

        for resource in self.registry.sort(resources) {
            match self.apply_one(&resource) {
                Ok(outcome) => self.record(&mut report, outcome),
                Err(e) => {
                    log::error!("Failed to apply {}: {}", resource.key(), e);
                    first_error.get_or_insert(e);
                }
            }
        }

        match first_error {
            Some(e) => Err(e),
            None => Ok(report),
        }
    }

    fn apply_one(&self, resource: &Resource) -> Result<Outcome> {
        let handler = self.registry.get_handler(resource.kind())?;
        let uid = handler.get_uid(resource)?;
        let _span = tracing::info_span!("apply", kind = %resource.kind(), uid = %uid).entered();

        handler.validate(resource)?;
        match handler.get_remote(resource) {
            Err(e) if e.is_not_found() => {
                handler.add(&handler.prepare(None, resource))?;
                Ok(Outcome::new(resource.kind(), uid, Event::Added))
            }
            Err(e) => Err(e),
            Ok(remote) => {
                if self.compare_with_remote(handler, &remote, resource)?.is_equal() {
                    return Ok(Outcome::new(resource.kind(), uid, Event::NoDifferences));
                }
                handler.update(&remote, &handler.prepare(Some(&remote), resource))?;
                Ok(Outcome::new(resource.kind(), uid, Event::Updated))
            }
        }
    }

    /// Writes every remote resource matching the targets below `dir`.
    ///
    /// Existing files are overwritten; local files with no remote
    /// counterpart are left alone.
    pub fn pull(&self, dir: &Path, targets: &[String]) -> Result<Report> {
        ensure_directory(dir)?;

        let mut report = Report::new();
        for handler in self.handlers_for(targets, Capabilities::LIST_REMOTE | Capabilities::PULL, "pulling") {
            let mut uids = handler.list_remote()?;
            uids.sort();
            for uid in uids {
                if !resource_matches_target(handler.kind(), &uid, targets) {
                    continue;
                }
                let remote = match handler.get_by_uid(&uid) {
                    Ok(remote) => remote,
                    Err(e) if e.is_not_found() => {
                        log::debug!("{}.{} disappeared while pulling", handler.kind(), uid);
                        continue;
                    }
                    Err(e) => return Err(e),
                };

                let resource = handler.unprepare(&remote);
                let path = dir.join(handler.resource_file_path(&resource, self.filetype));
                write_file(&path, &self.render(&resource)?)?;
                self.record(&mut report, Outcome::new(handler.kind(), uid, Event::Pulled));
            }
        }
        Ok(report)
    }

    /// Writes local resources below `dir`, touching only files whose content changed.
    pub fn export(&self, resources: &Resources, dir: &Path) -> Result<Report> {
        ensure_directory(dir)?;

        let mut report = Report::new();
        for resource in resources {
            let handler = self.registry.get_handler(resource.kind())?;
            let uid = handler.get_uid(resource)?;
            let normalized = handler.unprepare(resource);
            let content = self.render(&normalized)?;
            let path = dir.join(handler.resource_file_path(&normalized, self.filetype));

            let event = match fs::read_to_string(&path) {
                Ok(existing) if existing == content => Event::Unchanged,
                _ => {
                    write_file(&path, &content)?;
                    Event::Exported
                }
            };
            self.record(&mut report, Outcome::new(resource.kind(), uid, event));
        }
        Ok(report)
    }

    fn compare_with_remote(
        &self,
        handler: &dyn Handler,
        remote: &Resource,
        local: &Resource,
    ) -> Result<Comparison> {
        let local = handler.unprepare(&handler.prepare(Some(remote), local));
        let remote = handler.unprepare(remote);
        compare(&remote, &local)
    }

    fn handlers_for<'a>(
        &'a self,
        targets: &'a [String],
        needed: Capabilities,
        action: &'a str,
    ) -> impl Iterator<Item = &'a dyn Handler> + 'a {
        self.registry
            .handlers()
            .filter(move |h| self.registry.handler_matches_target(*h, targets))
            .filter(move |h| {
                let capable = h.capabilities().contains(needed);
                if !capable {
                    self.notifier
                        .warn(&format!("{} does not support {}, skipping", h.kind(), action));
                }
                capable
            })
    }

    fn record(&self, report: &mut Report, outcome: Outcome) {
        self.notifier.notify(&outcome);
        report.push(outcome);
    }
}

fn ensure_directory(dir: &Path) -> Result<()> {
    if dir.exists() && !dir.is_dir() {
        return Err(GristError::NotADirectory(dir.to_path_buf()));
    }
    fs::create_dir_all(dir).map_err(|e| GristError::WriteFile {
        path: dir.to_path_buf(),
        source: e,
    })
}

fn write_file(path: &Path, content: &str) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| GristError::WriteFile {
            path: parent.to_path_buf(),
            source: e,
        })?;
    }
    fs::write(path, content).map_err(|e| GristError::WriteFile {
        path: path.to_path_buf(),
        source: e,
    })?;
    log::debug!("Wrote {}", path.display());
    Ok(())
}

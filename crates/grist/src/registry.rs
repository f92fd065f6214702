//! Lookup from kind name to handler, plus target matching.
//!
//! A [`Registry`] is built once per command and passed by reference to the
//! parsers, the resolver and the workflow. There is no global instance.

use std::collections::HashMap;

use glob::Pattern;
use serde_json::Value;

use crate::error::{GristError, Result};
use crate::handler::Handler;
use crate::resource::{KindDescriptor, Resource, Resources};

/// Returns true if `<kind>/<name>` matches any target glob, or if there are no targets.
pub fn resource_matches_target(kind: &str, name: &str, targets: &[String]) -> bool {
    if targets.is_empty() {
        return true;
    }
    let key = format!("{}/{}", kind, name);
    targets.iter().any(|target| glob_matches(target, &key))
}

/// Checks that every target is a usable glob of the form `kind/name`.
pub fn validate_targets(targets: &[String]) -> Result<()> {
    for target in targets {
        if !target.contains('/') {
            return Err(GristError::InvalidTarget {
                pattern: target.clone(),
                reason: "expected <kind>/<name>".to_string(),
            });
        }
        Pattern::new(target).map_err(|e| GristError::InvalidTarget {
            pattern: target.clone(),
            reason: e.to_string(),
        })?;
    }
    Ok(())
}

fn glob_matches(pattern: &str, candidate: &str) -> bool {
    match Pattern::new(pattern) {
        Ok(p) => p.matches(candidate),
        Err(_) => pattern == candidate,
    }
}

/// The set of handlers known to one invocation.
#[derive(Default)]
pub struct Registry {
    /// Handlers in registration order.
    handlers: Vec<Box<dyn Handler>>,
    /// Kind name to position in `handlers`.
    index: HashMap<String, usize>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a handler under its kind.
    pub fn register(&mut self, handler: Box<dyn Handler>) -> Result<()> {
        let kind = handler.kind().to_string();
        if self.index.contains_key(&kind) {
            return Err(GristError::DuplicateHandler(kind));
        }
        log::debug!("Registered handler for kind {}", kind);
        self.index.insert(kind, self.handlers.len());
        self.handlers.push(handler);
        Ok(())
    }

    /// Returns the handler for a kind.
    pub fn get_handler(&self, kind: &str) -> Result<&dyn Handler> {
        self.index
            .get(kind)
            .map(|&i| self.handlers[i].as_ref())
            .ok_or_else(|| GristError::UnknownKind(kind.to_string()))
    }

    /// Handlers in registration order.
    pub fn handlers(&self) -> impl Iterator<Item = &dyn Handler> {
        self.handlers.iter().map(|h| h.as_ref())
    }

    pub fn kinds(&self) -> Vec<&str> {
        self.handlers.iter().map(|h| h.kind()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Composition metadata for a kind, if it is registered.
    pub fn descriptor(&self, kind: &str) -> Option<KindDescriptor> {
        self.get_handler(kind).ok().map(|h| h.descriptor())
    }

    /// Identifies the kind of a bare spec.
    ///
    /// Every handler is asked; the first one in registration order that
    /// recognises the tree wins. When more than one matches, the others are
    /// named in a warning.
    pub fn detect(&self, tree: &Value) -> Option<&str> {
        let matches: Vec<&str> = self
            .handlers
            .iter()
            .filter(|h| h.detect(tree))
            .map(|h| h.kind())
            .collect();

        if matches.len() > 1 {
            log::warn!(
                "Spec matches several kinds ({}); using {}",
                matches.join(", "),
                matches[0]
            );
        }

        matches.first().copied()
    }

    /// Returns true if any target names this handler's kind.
    pub fn handler_matches_target(&self, handler: &dyn Handler, targets: &[String]) -> bool {
        if targets.is_empty() {
            return true;
        }
        targets.iter().any(|target| {
            let kind_pattern = target.split('/').next().unwrap_or(target);
            glob_matches(kind_pattern, handler.kind())
        })
    }

    /// Orders resources for dispatch.
    ///
    /// Kinds come in registration order, each kind ordered by its handler's
    /// own `sort`. Resources of unregistered kinds keep their relative order
    /// at the end.
    pub fn sort(&self, resources: Resources) -> Resources {
        let mut groups: Vec<Vec<Resource>> = vec![Vec::new(); self.handlers.len()];
        let mut unknown = Vec::new();

        for resource in resources {
            match self.index.get(resource.kind()) {
                Some(&i) => groups[i].push(resource),
                None => unknown.push(resource),
            }
        }

        let mut sorted = Resources::new();
        for (handler, group) in self.handlers.iter().zip(groups) {
            if !group.is_empty() {
                sorted.merge(handler.sort(group.into()));
            }
        }
        sorted.merge(unknown.into());
        sorted
    }
}

impl std::fmt::Debug for Registry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Registry")
            .field("kinds", &self.kinds())
            .finish()
    }
}

// ============================================================================
// Tests
// ============================================================================

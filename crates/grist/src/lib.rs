//! Declarative resource engine.
//!
//! grist reads resource definitions from JSON, YAML and rendered templates,
//! expands composable resources, and reconciles the result against a remote
//! through kind-specific [`Handler`]s:
//!
//! - [`parsing`]: files and directories to [`Resources`]
//! - [`walker`]: envelopes nested inside rendered trees
//! - [`resolver`]: composable resources expanded from references
//! - [`workflow`]: get, list, show, diff, apply, pull and export
//! - [`watch`]: re-run on file changes

pub mod error;
pub mod handler;
pub mod parsing;
pub mod registry;
pub mod resolver;
pub mod resource;
pub mod tree;
pub mod walker;
pub mod watch;
pub mod workflow;

pub use error::{GristError, Result};
pub use handler::{sanitize_file_name, Capabilities, FileType, Handler};
pub use parsing::{parse_any, JsonnetCommand, Loader, ParseOptions, Parser, Renderer};
pub use registry::{resource_matches_target, validate_targets, Registry};
pub use resolver::Resolver;
pub use resource::{
    detect_envelope, validate_envelope, KindDescriptor, Map, Reference, Resource, Resources,
};
pub use tree::{Segment, TreePath};
pub use watch::Watcher;
pub use workflow::{
    split_uid, Event, ListEntry, LogNotifier, NoopNotifier, Notifier, Outcome, Rendered, Report,
    Workflow,
};

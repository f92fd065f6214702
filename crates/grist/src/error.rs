//! Error types for parsing, resolution and reconciliation.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while parsing, resolving or reconciling resources.
#[derive(Error, Debug)]
pub enum GristError {
    #[error("Failed to read directory '{path}': {source}")]
    ReadDirectory {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to read file '{path}': {source}")]
    ReadFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write file '{path}': {source}")]
    WriteFile {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse JSON in '{path}': {message}")]
    ParseJson { path: PathBuf, message: String },

    #[error("Failed to parse YAML in '{path}': {message}")]
    ParseYaml { path: PathBuf, message: String },

    #[error("Failed to render template '{path}': {message}")]
    Render { path: PathBuf, message: String },

    #[error("No parser accepts '{0}'")]
    UnsupportedFormat(PathBuf),

    #[error("Failed to serialize resource: {0}")]
    Serialize(String),

    #[error("Invalid resource envelope: {}", problems.join("; "))]
    InvalidEnvelope { problems: Vec<String> },

    #[error("found invalid object (at {path}): {reason}\n\n{object}")]
    PrimitiveReached {
        path: String,
        reason: String,
        object: String,
    },

    #[error("Spec key '{key}' is missing")]
    SpecKeyMissing { key: String },

    #[error("Spec key '{key}' is not a {expected}")]
    SpecWrongType { key: String, expected: &'static str },

    #[error("Unknown resource kind: {0}")]
    UnknownKind(String),

    #[error("Handler for kind '{0}' is already registered")]
    DuplicateHandler(String),

    #[error("Resource not found: {kind}/{uid}")]
    NotFound { kind: String, uid: String },

    #[error("{kind} '{name}' requires a folder but none was given and no default folder is set")]
    MissingFolder { kind: String, name: String },

    #[error("Invalid UID '{0}': expected <kind>.<uid>")]
    InvalidUid(String),

    #[error("Invalid target pattern '{pattern}': {reason}")]
    InvalidTarget { pattern: String, reason: String },

    #[error("Referenced resource not found: {kind}/{name}")]
    ReferenceNotFound { kind: String, name: String },

    #[error("Invalid reference at '{path}': {message}")]
    InvalidReference { path: String, message: String },

    #[error("Reference cycle detected: {}", chain.join(" -> "))]
    ReferenceCycle { chain: Vec<String> },

    #[error("Composable {kind} '{name}' has no object at spec.template")]
    MissingTemplate { kind: String, name: String },

    #[error("'{0}' must be a directory")]
    NotADirectory(PathBuf),

    #[error("Validation failed for {kind}/{uid}: {message}")]
    Validation {
        kind: String,
        uid: String,
        message: String,
    },

    #[error("Remote call failed for {kind}/{uid}: {message}")]
    Remote {
        kind: String,
        uid: String,
        message: String,
    },

    #[error("Watch error: {0}")]
    Watch(String),
}

impl GristError {
    /// Returns true for the "resource does not exist remotely" signal.
    ///
    /// Diff, Apply and Pull treat this as a normal outcome rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, GristError::NotFound { .. })
    }

    /// Builds the not-found signal for a handler lookup.
    pub fn not_found(kind: impl Into<String>, uid: impl Into<String>) -> Self {
        GristError::NotFound {
            kind: kind.into(),
            uid: uid.into(),
        }
    }
}

/// Result type for grist operations.
pub type Result<T> = std::result::Result<T, GristError>;

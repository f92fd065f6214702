//! Re-running a command whenever files under a directory change.

use std::fs;
use std::path::{Component, Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode};
use notify_debouncer_mini::{new_debouncer, Debouncer};

use crate::error::{GristError, Result};

const DEFAULT_DEBOUNCE: Duration = Duration::from_millis(500);
const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Watches a directory and calls back once per debounced batch of changes.
///
/// Every callback is a complete re-run; there is no incremental work and
/// batches that arrive while a callback runs are handled after it returns.
pub struct Watcher {
    dir: PathBuf,
    debounce: Duration,
    shutdown: Arc<AtomicBool>,
}

impl Watcher {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            debounce: DEFAULT_DEBOUNCE,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// A flag that stops [`Watcher::watch`] when set, e.g. from a signal handler.
    pub fn shutdown_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.shutdown)
    }

    /// Signals the watcher to stop.
    pub fn stop(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Blocks until stopped, calling `on_change` after each batch of changes.
    ///
    /// Errors returned by `on_change` are logged and watching continues.
    pub fn watch<F>(&self, mut on_change: F) -> Result<()>
    where
        F: FnMut(&[PathBuf]) -> Result<()>,
    {
        if !self.dir.is_dir() {
            return Err(GristError::NotADirectory(self.dir.clone()));
        }
        // Events carry absolute, resolved paths.
        let dir = fs::canonicalize(&self.dir).map_err(|e| GristError::ReadDirectory {
            path: self.dir.clone(),
            source: e,
        })?;

        let (tx, rx) = std::sync::mpsc::channel();
        let mut debouncer: Debouncer<RecommendedWatcher> =
            new_debouncer(self.debounce, tx).map_err(|e| GristError::Watch(e.to_string()))?;
        debouncer
            .watcher()
            .watch(&dir, RecursiveMode::Recursive)
            .map_err(|e| GristError::Watch(e.to_string()))?;

        log::info!("Watching {} for changes", dir.display());

        loop {
            if self.shutdown.load(Ordering::Relaxed) {
                break;
            }

            match rx.recv_timeout(POLL_INTERVAL) {
                Ok(Ok(events)) => {
                    let changed = relevant_paths(&dir, events.iter().map(|e| e.path.as_path()));
                    if changed.is_empty() {
                        continue;
                    }
                    log::info!("{} file(s) changed, re-running", changed.len());
                    if let Err(e) = on_change(&changed) {
                        log::error!("{}", e);
                    }
                }
                Ok(Err(e)) => log::error!("Watch error: {}", e),
                Err(std::sync::mpsc::RecvTimeoutError::Timeout) => {}
                Err(std::sync::mpsc::RecvTimeoutError::Disconnected) => break,
            }
        }

        log::info!("Stopped watching {}", dir.display());
        Ok(())
    }
}

/// Changed paths, minus anything inside a hidden file or directory below `dir`.
///
/// Only components below `dir` count, so a watched directory that itself
/// sits under a hidden one still reports its changes.
fn relevant_paths<'a>(dir: &Path, changed: impl IntoIterator<Item = &'a Path>) -> Vec<PathBuf> {
    let mut paths: Vec<PathBuf> = changed
        .into_iter()
        .filter(|path| match path.strip_prefix(dir) {
            Ok(relative) => !is_hidden(relative),
            Err(_) => true,
        })
        .map(Path::to_path_buf)
        .collect();
    paths.sort();
    paths.dedup();
    paths
}

fn is_hidden(relative: &Path) -> bool {
    relative.components().any(|c| match c {
        Component::Normal(name) => name.to_str().map(|s| s.starts_with('.')).unwrap_or(false),
        _ => false,
    })
}

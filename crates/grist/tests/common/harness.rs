//! Fixture files in a temporary directory.

#![allow(dead_code)]

use std::path::{Path, PathBuf};

use assert_fs::prelude::*;
use assert_fs::TempDir;

/// Isolated working directory for one test.
pub struct TestHarness {
    temp_dir: TempDir,
}

impl TestHarness {
    pub fn new() -> Self {
        Self {
            temp_dir: TempDir::new().expect("Failed to create temp directory"),
        }
    }

    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes a fixture file, creating parent directories.
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let child = self.temp_dir.child(relative);
        child.write_str(content).expect("Failed to write fixture");
        child.path().to_path_buf()
    }

    pub fn read(&self, relative: &str) -> String {
        std::fs::read_to_string(self.path().join(relative)).expect("Failed to read file")
    }

    pub fn exists(&self, relative: &str) -> bool {
        self.path().join(relative).exists()
    }

    /// A path inside the harness that does not exist yet.
    pub fn subdir(&self, relative: &str) -> PathBuf {
        self.path().join(relative)
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}

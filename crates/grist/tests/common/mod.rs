//! Shared test utilities for grist integration tests.
//!
//! This module provides:
//! - `MemoryHandler`, a handler backed by an in-memory remote
//! - `TestHarness` for fixture files in a temporary directory
//! - Builders for resources and registries

pub mod builders;
pub mod harness;
pub mod memory;

// Each test binary uses a different subset.
#[allow(unused_imports)]
pub use builders::*;
#[allow(unused_imports)]
pub use harness::TestHarness;
#[allow(unused_imports)]
pub use memory::{MemoryHandler, MemoryRemote, RecordingNotifier};

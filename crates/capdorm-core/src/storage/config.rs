//! Storage configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Configuration for the relational store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    /// Path to the database file. None opens an in-memory database.
    pub path: Option<PathBuf>,

    /// How long a statement waits on a locked database before failing.
    pub busy_timeout: Duration,

    /// Enforce declared `FOREIGN KEY` constraints.
    pub foreign_keys: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout: Duration::from_secs(5),
            foreign_keys: true,
        }
    }
}

impl StoreConfig {
    /// Create a new configuration backed by the file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: Some(path.into()),
            ..Default::default()
        }
    }

    /// Create an in-memory configuration for testing.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Set the busy timeout.
    pub fn with_busy_timeout(mut self, timeout: Duration) -> Self {
        self.busy_timeout = timeout;
        self
    }

    /// Disable foreign key enforcement.
    pub fn without_foreign_keys(mut self) -> Self {
        self.foreign_keys = false;
        self
    }

    /// Check if this configuration opens an in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.path.is_none()
    }
}

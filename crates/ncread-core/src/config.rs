//! # Server Configuration
//!
//! Settings that shape every read: the with-defaults basic mode, the worker
//! count of the batch pool and the optional database path. Loaded by the app
//! from TOML; every field has a default.

use crate::with_defaults::WithDefaultsMode;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Default number of request workers.
pub const DEFAULT_WORKERS: usize = 4;

/// Server-wide settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    /// Mode used when a request carries no with-defaults parameter.
    pub with_defaults: WithDefaultsMode,
    /// Maximum number of requests processed concurrently.
    pub workers: usize,
    /// redb database file; in-memory storage when absent.
    pub database: Option<PathBuf>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            with_defaults: WithDefaultsMode::default(),
            workers: DEFAULT_WORKERS,
            database: None,
        }
    }
}

impl ServerConfig {
    /// Builder: set the with-defaults basic mode.
    #[must_use]
    pub fn with_defaults(mut self, mode: WithDefaultsMode) -> Self {
        self.with_defaults = mode;
        self
    }

    /// Worker count, never zero.
    #[must_use]
    pub fn effective_workers(&self) -> usize {
        self.workers.max(1)
    }
}

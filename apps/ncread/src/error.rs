//! # Application Errors
//!
//! Failures of the binary itself: fixture files, configuration, storage
//! setup and worker scheduling. Read failures never appear here; they are
//! part of the reply sent for the request.

use ncread_core::StoreFault;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("I/O error on {path}: {message}")]
    Io { path: String, message: String },

    #[error("Invalid JSON in {path}: {message}")]
    Json { path: String, message: String },

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreFault),

    #[error("{0}")]
    Usage(String),

    #[error("Worker failed: {0}")]
    Worker(String),
}

impl AppError {
    pub(crate) fn io(path: &std::path::Path, err: &std::io::Error) -> Self {
        Self::Io {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }

    pub(crate) fn json(path: &std::path::Path, err: &serde_json::Error) -> Self {
        Self::Json {
            path: path.display().to_string(),
            message: err.to_string(),
        }
    }
}

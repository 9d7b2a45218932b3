//! # ncread
//!
//! The application layer around `ncread-core`: command line, bounded worker
//! pool, file fixtures and JSON rendering of replies.

pub mod cli;
pub mod error;
pub mod fixtures;
pub mod pool;
pub mod render;

pub use error::AppError;

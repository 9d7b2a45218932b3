//! # ncread CLI Module
//!
//! This module implements the CLI interface for ncread.
//!
//! ## Available Commands
//!
//! - `init` - Create a database and install the schema modules
//! - `seed` - Load items for a datastore from a JSON file
//! - `get` - Run a `<get>` request
//! - `get-config` - Run a `<get-config>` request
//! - `modules` - List the modules a filterless read covers
//! - `batch` - Run a file of requests on the worker pool

mod commands;

use crate::error::AppError;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

pub use commands::*;

// =============================================================================
// CLI STRUCTURE
// =============================================================================

/// ncread - NETCONF read server
///
/// Answers get and get-config requests against a configuration store,
/// merging locally served state and reporting defaults per with-defaults.
#[derive(Parser, Debug)]
#[command(name = "ncread")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Suppress banner output
    #[arg(short, long, global = true)]
    pub quiet: bool,

    /// Path to the redb database (in-memory store when absent)
    #[arg(short = 'D', long, global = true)]
    pub database: Option<PathBuf>,

    /// JSON file with additional schema modules
    #[arg(short = 'S', long, global = true)]
    pub schema: Option<PathBuf>,

    /// TOML server configuration
    #[arg(short = 'C', long, global = true)]
    pub config: Option<PathBuf>,

    /// Output in compact JSON format (for programmatic access)
    #[arg(long, global = true)]
    pub json_mode: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Filter and reporting options shared by the read commands.
#[derive(clap::Args, Debug, Clone, Default)]
pub struct ReadArgs {
    /// XPath filter (`|`-separated absolute paths)
    #[arg(short = 'x', long, conflicts_with = "subtree")]
    pub xpath: Option<String>,

    /// JSON file holding a subtree filter
    #[arg(short = 's', long)]
    pub subtree: Option<PathBuf>,

    /// with-defaults mode for this request
    #[arg(short = 'w', long)]
    pub with_defaults: Option<String>,

    /// Message id of the request
    #[arg(short = 'm', long, default_value = "1")]
    pub message_id: String,
}

/// Available CLI commands.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Initialize a new database and install the schema's modules
    Init {
        /// Force initialization even if database exists
        #[arg(short, long)]
        force: bool,
    },

    /// Load items into a datastore
    Seed {
        /// JSON array of {path, value, default, state} items
        #[arg(short, long)]
        file: PathBuf,

        /// Target datastore (running, startup)
        #[arg(short = 't', long, default_value = "running")]
        datastore: String,
    },

    /// Run a <get> request
    Get {
        #[command(flatten)]
        read: ReadArgs,
    },

    /// Run a <get-config> request
    GetConfig {
        /// Source datastore (running, startup, candidate)
        #[arg(long, default_value = "running")]
        source: String,

        #[command(flatten)]
        read: ReadArgs,
    },

    /// List the modules covered by a read without filter
    Modules,

    /// Run a JSON file of {session, request} entries on the worker pool
    Batch {
        /// Input file path
        #[arg(short, long)]
        file: PathBuf,
    },
}

// =============================================================================
// COMMAND EXECUTION
// =============================================================================

/// Execute the CLI with parsed arguments.
pub async fn execute(cli: Cli) -> Result<(), AppError> {
    let ctx = Context::load(&cli)?;

    match cli.command {
        Some(Commands::Init { force }) => cmd_init(&ctx, force),
        Some(Commands::Seed { file, datastore }) => cmd_seed(&ctx, &file, &datastore),
        Some(Commands::Get { read }) => cmd_get(&ctx, &read),
        Some(Commands::GetConfig { source, read }) => cmd_get_config(&ctx, &source, &read),
        Some(Commands::Batch { file }) => cmd_batch(&ctx, &file).await,
        Some(Commands::Modules) | None => cmd_modules(&ctx),
    }
}

//! # ncread - NETCONF Read Server
//!
//! The main binary for the ncread response-assembly engine.
//!
//! This application provides:
//! - CLI interface for store setup and read requests
//! - Batch execution on a bounded worker pool
//! - JSON rendering of replies per with-defaults mode
//!
//! ## Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │                   apps/ncread (THE BINARY)               │
//! │                                                          │
//! │  ┌─────────────┐    ┌──────────────┐    ┌────────────┐   │
//! │  │    CLI      │    │ Worker Pool  │    │  Renderer  │   │
//! │  │   (clap)    │    │   (tokio)    │    │   (JSON)   │   │
//! │  └──────┬──────┘    └──────┬───────┘    └─────┬──────┘   │
//! │         │                  │                  │          │
//! │         └──────────────────┼──────────────────┘          │
//! │                            ▼                             │
//! │                    ┌───────────────┐                     │
//! │                    │  ncread-core  │                     │
//! │                    │ (THE ENGINE)  │                     │
//! │                    └───────────────┘                     │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```bash
//! ncread -D ncread.redb -S device.json init
//! ncread -D ncread.redb -S device.json seed -f running.json
//! ncread -D ncread.redb -S device.json get-config --source running -w report-all-tagged
//! ncread -D ncread.redb -S device.json get -x '/dev:system | /ietf-netconf-monitoring:netconf-state/statistics'
//! ncread -D ncread.redb -S device.json batch -f requests.json
//! ```

use clap::Parser;
use ncread::cli;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

// =============================================================================
// APPLICATION ENTRY POINT
// =============================================================================

#[tokio::main]
async fn main() {
    // NCREAD_LOG_FORMAT=json enables machine-parseable output.
    let log_format = std::env::var("NCREAD_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "ncread=info,ncread_core=info".into());

    match log_format.as_str() {
        "json" => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().json().with_writer(std::io::stderr))
                .init();
        }
        _ => {
            tracing_subscriber::registry()
                .with(filter)
                .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
                .init();
        }
    }

    let cli = cli::Cli::parse();

    if !cli.quiet && !cli.json_mode {
        print_banner();
    }

    if let Err(e) = cli::execute(cli).await {
        tracing::error!("Error: {}", e);
        std::process::exit(1);
    }
}

/// Print the startup banner to stderr, keeping stdout for replies.
fn print_banner() {
    eprintln!("ncread v{} - NETCONF get/get-config", env!("CARGO_PKG_VERSION"));
}

// SPDX-FileCopyrightText: 2026 Evobridge Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Evobridge - WhatsApp instance supervisor for the Evolution API.
//!
//! This is the binary entry point: the long-running `serve` process plus a
//! handful of one-shot operator commands.

#[cfg(not(target_env = "msvc"))]
use tikv_jemallocator::Jemalloc;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: Jemalloc = Jemalloc;

mod commands;
mod serve;
mod shutdown;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Evobridge - WhatsApp instance supervisor for the Evolution API.
#[derive(Parser, Debug)]
#[command(name = "evobridge", version, about, long_about = None)]
struct Cli {
    /// Load this config file instead of the XDG hierarchy.
    #[arg(long, global = true, value_name = "PATH")]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run the supervisor and the HTTP gateway until interrupted.
    Serve,
    /// Run one connection-check cycle and print its summary.
    Check,
    /// Create the five session slots of a tenant.
    Provision {
        /// Tenant (CRM location) id.
        tenant: String,
    },
    /// Show registered instances and the last health snapshot.
    Status {
        /// Only show instances of this tenant.
        #[arg(long)]
        tenant: Option<String>,
        /// Print JSON instead of a table.
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    let loaded = match cli.config.as_deref() {
        Some(path) => evobridge_config::load_and_validate_path(path),
        None => evobridge_config::load_and_validate(),
    };
    let config = match loaded {
        Ok(config) => config,
        Err(errors) => {
            evobridge_config::render_errors(&errors);
            std::process::exit(1);
        }
    };

    init_tracing(&config.service.log_level);

    let result = match cli.command {
        Some(Commands::Serve) => serve::run_serve(config).await,
        Some(Commands::Check) => commands::run_check(&config).await,
        Some(Commands::Provision { tenant }) => commands::run_provision(&config, &tenant).await,
        Some(Commands::Status { tenant, json }) => {
            commands::run_status(&config, tenant.as_deref(), json).await
        }
        None => {
            println!("evobridge: use --help for available commands");
            Ok(())
        }
    };

    if let Err(e) = result {
        eprintln!("evobridge: {e}");
        std::process::exit(1);
    }
}

/// Initializes the tracing subscriber with the given log level.
///
/// Logs go to stderr so one-shot commands can print JSON on stdout.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("evobridge={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_names(false)
        .init();
}

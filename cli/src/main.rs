// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # ruote-bridge CLI
//!
//! The `ruote-bridge` binary fronts a ruote-rest workflow engine.
//!
//! ## Commands
//!
//! - `ruote-bridge serve` - Run the jobs API and the launch worker
//! - `ruote-bridge workitems list|show|count` - Query work items
//! - `ruote-bridge launch <NAME>` - Launch a process definition
//! - `ruote-bridge config show|validate` - Configuration management

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

use ruote_bridge::commands::{self, ConfigCommand, LaunchArgs, ServeArgs, WorkItemsCommand};

/// ruote-bridge - Workflow engine client and process launcher
#[derive(Parser)]
#[command(name = "ruote-bridge")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "RUOTE_BRIDGE_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "RUOTE_BRIDGE_LOG_LEVEL", default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the jobs API and the launch worker
    #[command(name = "serve")]
    Serve(ServeArgs),

    /// Work item queries
    #[command(name = "workitems")]
    WorkItems {
        #[command(subcommand)]
        command: WorkItemsCommand,
    },

    /// Launch a process definition
    #[command(name = "launch")]
    Launch(LaunchArgs),

    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Some(Commands::Serve(args)) => commands::serve::handle_command(args, cli.config).await,
        Some(Commands::WorkItems { command }) => {
            commands::workitems::handle_command(command, cli.config).await
        }
        Some(Commands::Launch(args)) => commands::launch::handle_command(args, cli.config).await,
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}

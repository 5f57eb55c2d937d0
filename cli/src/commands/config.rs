// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate

use anyhow::{bail, Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use ruote_bridge_core::domain::config::BridgeConfig;
use ruote_bridge_core::infrastructure::process_definitions::ProcessDefinitionStore;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,

        /// Print the effective configuration as YAML
        #[arg(long)]
        yaml: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },
}

pub async fn handle_command(command: ConfigCommand, config_override: Option<PathBuf>) -> Result<()> {
    match command {
        ConfigCommand::Show { paths, yaml } => show(config_override, paths, yaml),
        ConfigCommand::Validate { file } => validate(file.or(config_override)),
    }
}

fn show(config_override: Option<PathBuf>, show_paths: bool, yaml: bool) -> Result<()> {
    let config = BridgeConfig::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        match &config_override {
            Some(path) => println!("  1. --config flag: {}", path.display()),
            None => println!("  1. --config flag: {}", "(not set)".dimmed()),
        }
        println!(
            "  2. RUOTE_BRIDGE_CONFIG_PATH: {}",
            std::env::var("RUOTE_BRIDGE_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./ruote-bridge.yaml");
        println!("  4. ~/.ruote-bridge/config.yaml");
        println!("  5. /etc/ruote-bridge/config.yaml");
        println!();
    }

    if yaml {
        print!("{}", serde_yaml::to_string(&config).context("Failed to serialize configuration")?);
        return Ok(());
    }

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Engine:".bold());
    println!("  URL: {}", config.engine_url);
    let status = if config.enabled { "enabled".green() } else { "disabled".red() };
    println!("  Status: {}", status);
    println!("  Request timeout: {}s", config.request_timeout_secs);
    println!();

    println!("{}", "Process definitions:".bold());
    println!("  Directory: {}", config.processes_dir.display());
    println!();

    println!("{}", "Launch queue:".bold());
    println!("  Max attempts: {}", config.queue.max_attempts);
    println!("  Retry delay: {}ms", config.queue.retry_delay_ms);
    println!();

    println!("{}", "Jobs API:".bold());
    println!("  Listen: {}:{}", config.api.bind_address, config.api.port);
    println!();

    Ok(())
}

fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = BridgeConfig::load_or_default(config_path).context("Failed to load configuration")?;

    config.validate().context("Configuration validation failed")?;

    if !config.processes_dir.is_dir() {
        println!(
            "{}",
            format!(
                "⚠ Process definition directory {} does not exist",
                config.processes_dir.display()
            )
            .yellow()
        );
    } else {
        let store = ProcessDefinitionStore::new(&config.processes_dir);
        match store.check_templates() {
            Ok(count) => println!("  {} process definition template(s) checked", count),
            Err(failures) => {
                for failure in &failures {
                    println!("{}", format!("✗ {}", failure).red());
                }
                bail!("{} process definition template(s) failed to compile", failures.len());
            }
        }
    }

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

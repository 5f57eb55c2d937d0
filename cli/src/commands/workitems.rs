// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Work item commands
//!
//! Commands: list, show, count, tree

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use ruote_bridge_core::domain::config::BridgeConfig;
use ruote_bridge_core::domain::work_item::WorkItem;
use ruote_bridge_core::infrastructure::ruote_client::{RuoteClient, RuoteError};

#[derive(Subcommand)]
pub enum WorkItemsCommand {
    /// List work items for a participant
    List {
        /// Participant or role name (underscores become dashes)
        #[arg(value_name = "PARTICIPANT")]
        participant: String,

        /// Print raw JSON
        #[arg(long)]
        json: bool,
    },

    /// Show a single work item
    Show {
        /// Work item id (`wfid/0_0_0`, escaped or not)
        #[arg(value_name = "ID")]
        id: String,
    },

    /// Count work items for a participant
    Count {
        #[arg(value_name = "PARTICIPANT")]
        participant: String,
    },

    /// Print the expression tree of a work item's process
    Tree {
        #[arg(value_name = "ID")]
        id: String,

        /// Ask the engine for the decoded tree
        #[arg(long)]
        decode: bool,
    },
}

pub async fn handle_command(command: WorkItemsCommand, config_path: Option<PathBuf>) -> Result<()> {
    let config = BridgeConfig::load_or_default(config_path).context("Failed to load configuration")?;
    let client = RuoteClient::from_config(&config).context("Failed to create engine client")?;

    let result = match command {
        WorkItemsCommand::List { participant, json } => list(&client, &participant, json).await,
        WorkItemsCommand::Show { id } => show(&client, &id).await,
        WorkItemsCommand::Count { participant } => {
            let count = client.count(participant.as_str()).await?;
            println!("{}", count);
            Ok(())
        }
        WorkItemsCommand::Tree { id, decode } => tree(&client, &id, decode).await,
    };

    if let Err(RuoteError::EngineUnavailable(reason)) = &result {
        println!(
            "{}",
            format!("✗ ruote-rest is not running at {} ({})", client.base_url(), reason).red()
        );
        std::process::exit(2);
    }

    result.map_err(Into::into)
}

async fn list(client: &RuoteClient, participant: &str, json: bool) -> Result<(), RuoteError> {
    let items = client.find_by_participant(participant).await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&items).unwrap_or_default());
        return Ok(());
    }

    if items.is_empty() {
        println!("{}", "No work items".dimmed());
        return Ok(());
    }

    for item in &items {
        print_summary(item);
    }

    Ok(())
}

async fn show(client: &RuoteClient, id: &str) -> Result<(), RuoteError> {
    match client.find_by_id(id).await? {
        Some(item) => {
            print_summary(&item);
            println!("{}", serde_json::to_string_pretty(item.attributes()).unwrap_or_default());
        }
        None => println!("{}", format!("Work item {} not found", id).yellow()),
    }

    Ok(())
}

async fn tree(client: &RuoteClient, id: &str, decode: bool) -> Result<(), RuoteError> {
    let Some(mut item) = client.find_by_id(id).await? else {
        println!("{}", format!("Work item {} not found", id).yellow());
        return Ok(());
    };

    let tree = client.expression_tree(&mut item, decode).await?;
    println!("{}", serde_json::to_string_pretty(&tree).unwrap_or_default());
    Ok(())
}

fn print_summary(item: &WorkItem) {
    println!(
        "{}  {}  {}",
        item.to_param(false).bold(),
        item.participant_name().unwrap_or("-"),
        item.name().unwrap_or("-").dimmed(),
    );

    if let Some(activity) = item.activity() {
        println!("    {}", activity);
    }
    if let Some(dispatched) = item.dispatch_time() {
        println!("    dispatched {}", dispatched.to_rfc3339().dimmed());
    }
    if item.has_api_error() {
        println!("    {}", item.api_error().red());
    }
}

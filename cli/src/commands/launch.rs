// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Launch command
//!
//! Renders a process definition, queues it and runs the launch worker until
//! the queue is drained.

use anyhow::{anyhow, bail, Context, Result};
use clap::Args;
use colored::Colorize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use ruote_bridge_core::application::process::Process;
use ruote_bridge_core::domain::config::BridgeConfig;
use ruote_bridge_core::domain::launch::LaunchOutcome;
use ruote_bridge_core::domain::participant::ParticipantRef;
use ruote_bridge_core::infrastructure::job_queue::{InMemoryJobQueue, LaunchWorker};
use ruote_bridge_core::infrastructure::process_definitions::ProcessDefinitionStore;
use ruote_bridge_core::infrastructure::ruote_client::RuoteClient;

#[derive(Args)]
pub struct LaunchArgs {
    /// Process definition name (file stem under processes_dir)
    #[arg(value_name = "NAME")]
    pub name: String,

    /// Launch payload as a JSON object
    #[arg(long, value_name = "JSON")]
    pub payload: Option<String>,

    /// Participant binding `role=name` or `role=Type#id` (repeatable)
    #[arg(short, long = "participant", value_name = "ROLE=PARTICIPANT")]
    pub participants: Vec<String>,
}

pub async fn handle_command(args: LaunchArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = BridgeConfig::load_or_default(config_path).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    let participants = args
        .participants
        .iter()
        .map(String::as_str)
        .map(parse_participant)
        .collect::<Result<HashMap<_, _>>>()?;
    let fields = parse_payload(args.payload.as_deref())?;

    let store = Arc::new(ProcessDefinitionStore::new(&config.processes_dir));
    let mut process = Process::new(store, &args.name, participants)?;

    let (queue, receiver) = InMemoryJobQueue::new();
    let outcome = process.launch(&queue, config.enabled, fields).await;
    drop(queue);

    match outcome {
        LaunchOutcome::Enqueued { job_id } => {
            println!("{} {}", "Queued launch".bold(), job_id);

            let client = Arc::new(RuoteClient::from_config(&config).context("Failed to create engine client")?);
            let stats = LaunchWorker::new(receiver, client, &config.queue).run().await;

            if stats.dropped > 0 {
                println!(
                    "{}",
                    format!("✗ Launch of {} was dropped after {} attempts", args.name, config.queue.max_attempts).red()
                );
                std::process::exit(1);
            }
            println!("{}", format!("✓ Launched {}", args.name).green());
        }
        LaunchOutcome::Disabled => {
            println!("{}", "⚠ Process launching is disabled, nothing was sent".yellow());
        }
        LaunchOutcome::Failed { reason } => {
            println!("{}", format!("✗ Launch failed: {}", reason).red());
            std::process::exit(1);
        }
    }

    Ok(())
}

fn parse_participant(binding: &str) -> Result<(String, ParticipantRef)> {
    let (role, target) = binding
        .split_once('=')
        .ok_or_else(|| anyhow!("Participant binding '{}' must look like role=participant", binding))?;

    if role.is_empty() || target.is_empty() {
        bail!("Participant binding '{}' has an empty side", binding);
    }

    let participant = match target.split_once('#') {
        Some((type_name, id)) if !type_name.is_empty() && !id.is_empty() => ParticipantRef::Object {
            type_name: type_name.to_string(),
            id: id.to_string(),
        },
        _ => ParticipantRef::Name(target.to_string()),
    };

    Ok((role.to_string(), participant))
}

fn parse_payload(raw: Option<&str>) -> Result<Map<String, Value>> {
    let Some(raw) = raw else {
        return Ok(Map::new());
    };

    match serde_json::from_str::<Value>(raw).context("Payload is not valid JSON")? {
        Value::Object(map) => Ok(map),
        other => bail!("Payload must be a JSON object, got {}", other),
    }
}

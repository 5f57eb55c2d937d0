// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Jobs API server
//!
//! Runs the jobs HTTP API together with the launch worker that drains the
//! in-memory job queue. Host models are not reachable from the standalone
//! server, so work item details report `model_missing`.

use anyhow::{Context, Result};
use async_trait::async_trait;
use clap::Args;
use metrics_exporter_prometheus::PrometheusBuilder;
use serde_json::{Map, Value};
use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::signal;
use tracing::{error, info, warn};

use ruote_bridge_core::application::jobs::JobsService;
use ruote_bridge_core::application::process_launcher::ProcessLauncher;
use ruote_bridge_core::domain::config::BridgeConfig;
use ruote_bridge_core::domain::launcher::ProcessModel;
use ruote_bridge_core::domain::participant::Identifiable;
use ruote_bridge_core::domain::repository::{ModelStore, ModelStoreError};
use ruote_bridge_core::domain::work_item::ModelRef;
use ruote_bridge_core::infrastructure::job_queue::{InMemoryJobQueue, LaunchWorker};
use ruote_bridge_core::infrastructure::process_definitions::ProcessDefinitionStore;
use ruote_bridge_core::infrastructure::ruote_client::RuoteClient;
use ruote_bridge_core::presentation::api;

#[derive(Args)]
pub struct ServeArgs {
    /// HTTP API host (default: api.bind_address)
    #[arg(long, env = "RUOTE_BRIDGE_HOST")]
    pub host: Option<String>,

    /// HTTP API port (default: api.port)
    #[arg(long, env = "RUOTE_BRIDGE_PORT")]
    pub port: Option<u16>,

    /// Expose Prometheus metrics on this port
    #[arg(long, env = "RUOTE_BRIDGE_METRICS_PORT")]
    pub metrics_port: Option<u16>,
}

/// Model store for a server without a host application behind it.
struct DetachedModelStore;

#[async_trait]
impl ModelStore for DetachedModelStore {
    async fn find(&self, _model: &ModelRef) -> Result<Option<Box<dyn ProcessModel>>, ModelStoreError> {
        Ok(None)
    }

    async fn update(&self, model: &mut dyn ProcessModel, _changes: &Map<String, Value>) -> Result<(), ModelStoreError> {
        Err(ModelStoreError::UnknownClass(model.type_name().to_string()))
    }
}

pub async fn handle_command(args: ServeArgs, config_path: Option<PathBuf>) -> Result<()> {
    let config = BridgeConfig::load_or_default(config_path).context("Failed to load configuration")?;
    config.validate().context("Configuration validation failed")?;

    info!(engine = %config.engine_url, enabled = config.enabled, "Configuration loaded");
    if !config.enabled {
        warn!("Bridge is disabled: launches are skipped and work item queries return nothing");
    }

    if let Some(port) = args.metrics_port {
        PrometheusBuilder::new()
            .with_http_listener(([0, 0, 0, 0], port))
            .install()
            .context("Failed to install Prometheus exporter")?;
        info!("Metrics exposed on 0.0.0.0:{}/metrics", port);
    }

    // Initialize services
    let client = Arc::new(RuoteClient::from_config(&config).context("Failed to create engine client")?);
    let (queue, receiver) = InMemoryJobQueue::new();
    let worker = tokio::spawn(LaunchWorker::new(receiver, client.clone(), &config.queue).run());

    let launcher = Arc::new(ProcessLauncher::new(
        Arc::new(ProcessDefinitionStore::new(&config.processes_dir)),
        Arc::new(queue),
        config.enabled,
    ));
    let jobs = Arc::new(JobsService::new(client, Arc::new(DetachedModelStore), launcher));
    let app = api::app(jobs);

    // Start HTTP server
    let host = args.host.unwrap_or(config.api.bind_address.clone());
    let port = args.port.unwrap_or(config.api.port);
    let addr: SocketAddr = format!("{}:{}", host, port)
        .parse()
        .with_context(|| format!("Invalid listen address {}:{}", host, port))?;
    let listener = TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind to {}", addr))?;

    info!("Jobs API listening on {}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    // The router owned the last queue handle; the worker finishes what is queued
    match worker.await {
        Ok(stats) => info!(performed = stats.performed, dropped = stats.dropped, "Launch worker drained"),
        Err(e) => error!("Launch worker task failed: {}", e),
    }

    info!("Server shutting down");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!("Failed to install Ctrl+C handler: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        },
        _ = terminate => {
            info!("Received SIGTERM signal");
        },
    }
}

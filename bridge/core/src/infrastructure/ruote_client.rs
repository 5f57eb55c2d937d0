// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! ruote-rest HTTP Client
//!
//! Provides the HTTP client for the ruote-rest workflow engine: work item
//! queries and mutations, expression trees and process launches.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** REST communication with the workflow engine
//! - **Integration:** Jobs service / launch worker → ruote-rest HTTP API
//!
//! # Endpoints
//!
//! | Call | Request |
//! |------|---------|
//! | `find_by_participant` | `GET /workitems?participant={name}&format=json` |
//! | `find_by_id` | `GET /workitems/{wfid}/{expid}.json` |
//! | `persist` / `advance` | `PUT {self link}` |
//! | `cancel_process` | `DELETE {host}/processes/{wfid}.json` |
//! | `expression_tree` | `GET /processes/{wfid}/tree.json[?plain=true]` |
//! | `launch` | `POST /processes` (form: `pdef`, `fields`) |
//!
//! # Failure policy
//!
//! - Participant queries treat an unreachable engine as "no work items".
//! - Point lookups return `None` for 404 and surface `EngineUnavailable`.
//! - Mutations propagate every transport error unmodified.
//!
//! # Usage
//!
//! ```ignore
//! let client = RuoteClient::from_config(&config)?;
//!
//! for mut item in client.find_by_participant("dialup_admin").await? {
//!     item.set("checked", json!(true));
//!     client.advance(&mut item).await?;
//! }
//! ```

use crate::domain::config::BridgeConfig;
use crate::domain::identifier::{escape_component, IdentifierError, WorkItemId};
use crate::domain::launch::LaunchDescriptor;
use crate::domain::participant::ParticipantRef;
use crate::domain::work_item::{WorkItem, WorkItemError, WorkItemOperation};
use reqwest::{Client as HttpClient, Response, StatusCode};
use serde_json::Value;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum RuoteError {
    /// Connection refused or host unreachable.
    #[error("Workflow engine unavailable: {0}")]
    EngineUnavailable(String),

    #[error("Workflow engine returned {status}: {body}")]
    Http { status: StatusCode, body: String },

    #[error("Transport error: {0}")]
    Transport(#[source] reqwest::Error),

    #[error("Invalid engine response: {0}")]
    Decode(String),

    #[error(transparent)]
    MalformedId(#[from] IdentifierError),

    #[error(transparent)]
    WorkItem(#[from] WorkItemError),
}

impl RuoteError {
    pub fn is_engine_unavailable(&self) -> bool {
        matches!(self, Self::EngineUnavailable(_))
    }
}

impl From<reqwest::Error> for RuoteError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_connect() {
            Self::EngineUnavailable(err.to_string())
        } else if err.is_decode() {
            Self::Decode(err.to_string())
        } else {
            Self::Transport(err)
        }
    }
}

#[derive(Clone)]
pub struct RuoteClient {
    http: HttpClient,
    base_url: String,
    enabled: bool,
}

impl RuoteClient {
    pub fn new(base_url: &str, enabled: bool, timeout: Duration) -> Result<Self, RuoteError> {
        let http = HttpClient::builder().timeout(timeout).build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            enabled,
        })
    }

    pub fn from_config(config: &BridgeConfig) -> Result<Self, RuoteError> {
        Self::new(
            &config.engine_base(),
            config.enabled,
            Duration::from_secs(config.request_timeout_secs),
        )
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn enabled(&self) -> bool {
        self.enabled
    }

    /// Work items routed to `participant`.
    pub async fn find_by_participant(
        &self,
        participant: impl Into<ParticipantRef>,
    ) -> Result<Vec<WorkItem>, RuoteError> {
        let participant = participant.into().engine_name();
        record_request("find_by_participant");

        if !self.enabled {
            return Ok(Vec::new());
        }

        match self.query_participant(&participant).await {
            Err(RuoteError::EngineUnavailable(reason)) => {
                warn!(participant = %participant, "Workflow engine unavailable, no work items: {}", reason);
                Ok(Vec::new())
            }
            other => other,
        }
    }

    async fn query_participant(&self, participant: &str) -> Result<Vec<WorkItem>, RuoteError> {
        let url = format!("{}/workitems", self.base_url);
        let response = self
            .http
            .get(&url)
            .query(&[("participant", participant), ("format", "json")])
            .send()
            .await?;

        let body: Value = check(response).await?.json().await?;
        let elements = body
            .get("elements")
            .and_then(Value::as_array)
            .ok_or_else(|| RuoteError::Decode("missing 'elements' in work item list".to_string()))?;

        let items = elements
            .iter()
            .map(|element| -> Result<WorkItem, RuoteError> {
                match element {
                    // Some engines return each element JSON-encoded
                    Value::String(encoded) => Ok(WorkItem::parse_json(encoded)?),
                    other => Ok(WorkItem::from_json(other.clone())?),
                }
            })
            .collect::<Result<Vec<_>, _>>()?;

        debug!(participant = %participant, count = items.len(), "Fetched work items");
        Ok(items)
    }

    pub async fn first_by_participant(
        &self,
        participant: impl Into<ParticipantRef>,
    ) -> Result<Option<WorkItem>, RuoteError> {
        Ok(self.find_by_participant(participant).await?.into_iter().next())
    }

    pub async fn last_by_participant(
        &self,
        participant: impl Into<ParticipantRef>,
    ) -> Result<Option<WorkItem>, RuoteError> {
        Ok(self.find_by_participant(participant).await?.pop())
    }

    /// Number of work items for `participant`; zero when the engine is unreachable.
    pub async fn count(&self, participant: impl Into<ParticipantRef>) -> Result<usize, RuoteError> {
        Ok(self.find_by_participant(participant).await?.len())
    }

    /// Fetch a single work item by its encoded id.
    pub async fn find_by_id(&self, encoded: &str) -> Result<Option<WorkItem>, RuoteError> {
        record_request("find_by_id");

        if !self.enabled {
            return Ok(None);
        }

        let id = WorkItemId::parse(encoded)?;

        let url = format!("{}/workitems/{}.json", self.base_url, id.engine_path());
        let response = self.http.get(&url).send().await?;

        if response.status() == StatusCode::NOT_FOUND {
            debug!(id = %id, "Work item not found");
            return Ok(None);
        }

        let body: Value = check(response).await?.json().await?;
        Ok(Some(WorkItem::from_json(body)?))
    }

    /// Re-read the work item from its self link.
    pub async fn reload(&self, item: &mut WorkItem) -> Result<(), RuoteError> {
        record_request("reload");

        let response = self.http.get(item.self_uri()?).send().await?;
        let body: Value = check(response).await?.json().await?;
        item.reset(body)?;
        Ok(())
    }

    /// Save attribute changes without moving the process forward.
    pub async fn persist(&self, item: &mut WorkItem) -> Result<(), RuoteError> {
        let next = item.check_transition(WorkItemOperation::Persist)?;
        record_request("persist");

        self.put(item).await?;
        item.mark(next);
        info!(id = %item.id(), "Work item persisted");
        Ok(())
    }

    /// Save attribute changes and let the engine proceed.
    pub async fn advance(&self, item: &mut WorkItem) -> Result<(), RuoteError> {
        let next = item.check_transition(WorkItemOperation::Advance)?;
        record_request("advance");

        item.mark_proceeded();
        self.put(item).await?;
        item.mark(next);
        info!(id = %item.id(), "Work item advanced");
        Ok(())
    }

    /// Cancel the whole process the work item belongs to.
    pub async fn cancel_process(&self, item: &mut WorkItem) -> Result<(), RuoteError> {
        let next = item.check_transition(WorkItemOperation::CancelProcess)?;
        record_request("cancel_process");

        let url = format!(
            "{}/processes/{}.json",
            item.host()?,
            escape_component(item.workflow_instance_id())
        );
        let response = self.http.delete(&url).send().await?;
        check(response).await?;

        item.mark(next);
        info!(workflow_instance_id = %item.workflow_instance_id(), "Process cancelled");
        Ok(())
    }

    async fn put(&self, item: &WorkItem) -> Result<(), RuoteError> {
        let response = self
            .http
            .put(item.self_uri()?)
            .json(item.as_json())
            .send()
            .await?;
        check(response).await?;
        Ok(())
    }

    /// Expression tree of the item's process, fetched once per item.
    pub async fn expression_tree(&self, item: &mut WorkItem, decode: bool) -> Result<Value, RuoteError> {
        if let Some(tree) = item.cached_expression_tree() {
            return Ok(tree.clone());
        }
        record_request("expression_tree");

        let url = format!(
            "{}/processes/{}/tree.json",
            self.base_url,
            escape_component(item.workflow_instance_id())
        );
        let mut request = self.http.get(&url);
        if !decode {
            request = request.query(&[("plain", "true")]);
        }

        let tree: Value = check(request.send().await?).await?.json().await?;
        item.cache_expression_tree(tree.clone());
        Ok(tree)
    }

    /// Create a process instance from a launch descriptor.
    pub async fn launch(&self, descriptor: &LaunchDescriptor) -> Result<String, RuoteError> {
        record_request("launch");
        info!(job_id = %descriptor.job_id, "Launching queued process");

        let url = format!("{}/processes", self.base_url);
        let response = self
            .http
            .post(&url)
            .form(&[
                ("pdef", descriptor.process_def.as_str()),
                ("fields", descriptor.fields.as_str()),
            ])
            .send()
            .await?;

        let body = check(response).await?.text().await?;
        info!(job_id = %descriptor.job_id, "Launch results: {}", body);
        Ok(body)
    }
}

async fn check(response: Response) -> Result<Response, RuoteError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "(no body)".to_string());
    Err(RuoteError::Http { status, body })
}

fn record_request(operation: &'static str) {
    metrics::counter!("ruote_workitem_requests_total", "operation" => operation).increment(1);
}

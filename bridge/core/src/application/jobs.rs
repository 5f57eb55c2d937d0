// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Jobs Use Cases
//!
//! The work list a user sees: pending work items, the item detail with the
//! model it refers to, processing (advance or cancel) and the process
//! visualization.
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** Orchestrate work item handling for the API and CLI
//! - **Collaborators:**
//!   - Domain: WorkItem, ModelRef, ModelStore
//!   - Application: ProcessLauncher (scoped disable, payload)
//!   - Infrastructure: RuoteClient

use crate::application::process_launcher::ProcessLauncher;
use crate::domain::launcher::{ConfigurationError, ProcessModel};
use crate::domain::participant::{underscore, Identifiable, ParticipantRef};
use crate::domain::repository::{ModelStore, ModelStoreError};
use crate::domain::work_item::{ModelRef, WorkItem};
use crate::infrastructure::ruote_client::{RuoteClient, RuoteError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info};

/// View shown when the model behind a work item cannot be loaded.
pub const MODEL_MISSING_VIEW: &str = "model_missing";

/// Role that never has a work list of its own.
const ADMIN_ROLE: &str = "admin";

#[derive(Debug, Error)]
pub enum JobsError {
    #[error("Work item {0} not found")]
    NotFound(String),

    #[error(transparent)]
    Engine(#[from] RuoteError),

    #[error(transparent)]
    Models(#[from] ModelStoreError),

    #[error(transparent)]
    Configuration(#[from] ConfigurationError),
}

impl JobsError {
    pub fn is_engine_unavailable(&self) -> bool {
        matches!(self, Self::Engine(e) if e.is_engine_unavailable())
    }
}

/// Whose work list to show.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Audience {
    Participant(String),
    /// Every role except `admin`, each dasherized.
    Roles(Vec<String>),
}

#[derive(Debug, Clone, Serialize)]
pub struct JobView {
    pub workitem: WorkItem,
    pub model: Option<ModelRef>,
    pub view: String,
}

/// Body of a process request
#[derive(Debug, Clone, Default, Deserialize)]
pub struct JobUpdateRequest {
    #[serde(default)]
    pub attributes: Option<Map<String, Value>>,
    #[serde(default)]
    pub model: Option<Map<String, Value>>,
    #[serde(default)]
    pub commit: Option<String>,
}

impl JobUpdateRequest {
    fn cancels(&self) -> bool {
        self.commit
            .as_deref()
            .is_some_and(|commit| commit.to_lowercase().contains("cancel"))
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "result", rename_all = "snake_case")]
pub enum JobUpdate {
    Advanced,
    Cancelled,
    /// The model rejected the changes; nothing was sent to the engine.
    Invalid { view: String, errors: Vec<String> },
}

impl JobUpdate {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Advanced => "advanced",
            Self::Cancelled => "cancelled",
            Self::Invalid { .. } => "invalid",
        }
    }

    pub fn flash(&self) -> &'static str {
        match self {
            Self::Advanced => "Activity processed",
            Self::Cancelled => "Process terminated",
            Self::Invalid { .. } => "Could not save changes",
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct JobVisualization {
    pub workitem: WorkItem,
    pub tree: Value,
}

pub struct JobsService {
    client: Arc<RuoteClient>,
    models: Arc<dyn ModelStore>,
    launcher: Arc<ProcessLauncher>,
}

impl JobsService {
    pub fn new(client: Arc<RuoteClient>, models: Arc<dyn ModelStore>, launcher: Arc<ProcessLauncher>) -> Self {
        Self { client, models, launcher }
    }

    pub async fn list(&self, audience: &Audience) -> Result<Vec<WorkItem>, JobsError> {
        match audience {
            Audience::Participant(name) => Ok(self.client.find_by_participant(name.as_str()).await?),
            Audience::Roles(roles) => {
                let mut items = Vec::new();
                for role in roles.iter().filter(|r| r.as_str() != ADMIN_ROLE) {
                    items.extend(self.client.find_by_participant(ParticipantRef::from(role.as_str())).await?);
                }
                Ok(items)
            }
        }
    }

    pub async fn show(&self, id: &str) -> Result<JobView, JobsError> {
        let workitem = self.fetch(id).await?;

        let model = match workitem.model_ref() {
            Some(reference) => self.load_model(&reference).await?.map(|_| reference),
            None => None,
        };

        let view = match &model {
            Some(_) => view_name(&workitem),
            None => MODEL_MISSING_VIEW.to_string(),
        };

        Ok(JobView { workitem, model, view })
    }

    /// Apply the request to the work item and its model, then advance or
    /// cancel the process.
    pub async fn update(&self, id: &str, request: JobUpdateRequest) -> Result<JobUpdate, JobsError> {
        let mut workitem = self.fetch(id).await?;

        if let Some(attributes) = &request.attributes {
            for (key, value) in attributes {
                workitem.merge_attribute(key, value.clone());
            }
        }

        if let Some(changes) = request.model.as_ref().filter(|c| !c.is_empty()) {
            if let Some(errors) = self.update_model(&mut workitem, changes).await? {
                return Ok(JobUpdate::Invalid { view: view_name(&workitem), errors });
            }
        }

        if request.cancels() {
            self.client.cancel_process(&mut workitem).await?;
            Ok(JobUpdate::Cancelled)
        } else {
            self.client.advance(&mut workitem).await?;
            Ok(JobUpdate::Advanced)
        }
    }

    pub async fn visualize(&self, id: &str) -> Result<JobVisualization, JobsError> {
        let mut workitem = self.fetch(id).await?;
        let tree = self.client.expression_tree(&mut workitem, false).await?;
        Ok(JobVisualization { workitem, tree })
    }

    async fn fetch(&self, id: &str) -> Result<WorkItem, JobsError> {
        self.client
            .find_by_id(id)
            .await?
            .ok_or_else(|| JobsError::NotFound(id.to_string()))
    }

    async fn load_model(&self, reference: &ModelRef) -> Result<Option<Box<dyn ProcessModel>>, JobsError> {
        match self.models.find(reference).await {
            Ok(model) => Ok(model),
            Err(ModelStoreError::UnknownClass(class)) => {
                debug!(class = %class, "Work item refers to an unknown model class");
                Ok(None)
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Returns the validation errors when the model rejects the changes.
    async fn update_model(
        &self,
        workitem: &mut WorkItem,
        changes: &Map<String, Value>,
    ) -> Result<Option<Vec<String>>, JobsError> {
        let Some(reference) = workitem.model_ref() else {
            return Ok(None);
        };
        let Some(mut model) = self.load_model(&reference).await? else {
            return Ok(None);
        };

        let type_name = model.type_name().to_string();
        let updated = self
            .launcher
            .without_processes_async(&type_name, self.models.update(model.as_mut(), changes))
            .await;

        match updated {
            Ok(()) => {
                let payload = self.launcher.payload_for(model.as_ref())?;
                workitem.attributes_mut().extend(payload);
                info!(id = %workitem.id(), model = %type_name, "Model updated from work item");
                Ok(None)
            }
            Err(ModelStoreError::Validation(errors)) => Ok(Some(errors)),
            Err(e) => Err(e.into()),
        }
    }
}

fn view_name(workitem: &WorkItem) -> String {
    workitem.name().map(underscore).unwrap_or_else(|| "show".to_string())
}

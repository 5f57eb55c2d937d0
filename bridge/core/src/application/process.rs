// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Process Launch
//!
//! A named process definition plus the participants and payload it is
//! launched with. Launching renders the definition and queues a
//! [`LaunchDescriptor`]; the engine call itself happens on the worker.
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** Turn a definition name into a queued launch
//! - **Collaborators:**
//!   - Domain: LaunchDescriptor, LaunchOutcome, ParticipantRef
//!   - Infrastructure: ProcessDefinitionStore, JobQueue

use crate::domain::launch::{LaunchDescriptor, LaunchOutcome};
use crate::domain::launcher::ConfigurationError;
use crate::domain::participant::ParticipantRef;
use crate::domain::repository::JobQueue;
use crate::infrastructure::definition_template_engine::DefinitionContext;
use crate::infrastructure::process_definitions::{DefinitionSource, ProcessDefinitionStore};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, error, info};

pub struct Process {
    name: String,
    source: DefinitionSource,
    store: Arc<ProcessDefinitionStore>,
    participants: HashMap<String, ParticipantRef>,
    fields: Map<String, Value>,
}

impl Process {
    /// Fails when no definition called `name` exists.
    pub fn new(
        store: Arc<ProcessDefinitionStore>,
        name: &str,
        participants: HashMap<String, ParticipantRef>,
    ) -> Result<Self, ConfigurationError> {
        let source = store.locate(name)?;

        Ok(Self {
            name: name.to_string(),
            source,
            store,
            participants,
            fields: Map::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &DefinitionSource {
        &self.source
    }

    /// Participant name as used inside a definition (`-` becomes `_`).
    pub fn participant(&self, name: &str) -> Result<String, ConfigurationError> {
        self.participants
            .get(name)
            .map(|p| p.engine_name().replace('-', "_"))
            .ok_or_else(|| ConfigurationError::MissingParticipant(name.to_string()))
    }

    pub fn field(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Render the definition with the current fields and participants.
    pub fn definition(&self) -> Result<String, ConfigurationError> {
        let mut context = DefinitionContext::new().fields(self.fields.clone());
        for name in self.participants.keys() {
            context = context.participant(name.clone(), self.participant(name)?);
        }

        self.store.render(&self.source, &context)
    }

    /// Merge `fields` into the payload and queue the launch.
    ///
    /// Never returns an error: render and queue failures are logged and
    /// reported as [`LaunchOutcome::Failed`].
    pub async fn launch(
        &mut self,
        queue: &dyn JobQueue,
        enabled: bool,
        fields: Map<String, Value>,
    ) -> LaunchOutcome {
        self.fields.extend(fields);

        let outcome = if enabled {
            self.enqueue(queue).await
        } else {
            info!(process = %self.name, "Process launching disabled, not launching");
            LaunchOutcome::Disabled
        };

        metrics::counter!("ruote_launches_total", "outcome" => outcome.label()).increment(1);
        outcome
    }

    async fn enqueue(&self, queue: &dyn JobQueue) -> LaunchOutcome {
        let descriptor = match self
            .definition()
            .map_err(|e| e.to_string())
            .and_then(|pdef| LaunchDescriptor::new(pdef, &self.fields).map_err(|e| e.to_string()))
            .map(|descriptor| descriptor.for_process(&self.name, self.participants.clone()))
        {
            Ok(descriptor) => descriptor,
            Err(reason) => {
                error!(process = %self.name, "Failed to prepare process launch: {}", reason);
                return LaunchOutcome::Failed { reason };
            }
        };

        debug!(
            process = %self.name,
            job_id = %descriptor.job_id,
            fields = %descriptor.fields,
            "Launch descriptor prepared"
        );

        match queue.enqueue(descriptor).await {
            Ok(job_id) => {
                info!(process = %self.name, job_id = %job_id, "Process launch queued");
                LaunchOutcome::Enqueued { job_id }
            }
            Err(e) => {
                error!(process = %self.name, "Failed to queue process launch: {}", e);
                LaunchOutcome::Failed { reason: e.to_string() }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::RecordingJobQueue;
    use serde_json::json;

    fn store(files: &[(&str, &str)]) -> (tempfile::TempDir, Arc<ProcessDefinitionStore>) {
        let dir = tempfile::tempdir().unwrap();
        for (name, content) in files {
            std::fs::write(dir.path().join(name), content).unwrap();
        }
        let store = Arc::new(ProcessDefinitionStore::new(dir.path()));
        (dir, store)
    }

    fn participants() -> HashMap<String, ParticipantRef> {
        HashMap::from([
            ("approver".to_string(), ParticipantRef::from("sales_manager")),
            ("owner".to_string(), ParticipantRef::Object { type_name: "Customer".into(), id: "7".into() }),
        ])
    }

    #[test]
    fn test_missing_definition() {
        let (_dir, store) = store(&[]);
        let result = Process::new(store, "unknown", HashMap::new());
        assert!(matches!(result, Err(ConfigurationError::DefinitionNotFound { .. })));
    }

    #[test]
    fn test_participant_names() {
        let (_dir, store) = store(&[("approval", "x")]);
        let process = Process::new(store, "approval", participants()).unwrap();

        assert_eq!(process.participant("approver").unwrap(), "sales_manager");
        assert_eq!(process.participant("owner").unwrap(), "customer_7");
        assert!(matches!(
            process.participant("nobody"),
            Err(ConfigurationError::MissingParticipant(name)) if name == "nobody"
        ));
    }

    #[tokio::test]
    async fn test_launch_queues_rendered_definition() {
        let (_dir, store) = store(&[(
            "approval.hbs",
            r#"<participant ref="{{participants.approver}}" plan="{{fields.plan}}"/>"#,
        )]);
        let queue = RecordingJobQueue::new();
        let mut process = Process::new(store, "approval", participants()).unwrap();

        let mut fields = Map::new();
        fields.insert("plan".into(), json!("basic"));
        let outcome = process.launch(&queue, true, fields).await;

        let queued = queue.launches();
        assert_eq!(queued.len(), 1);
        assert_eq!(outcome, LaunchOutcome::Enqueued { job_id: queued[0].job_id });
        assert_eq!(queued[0].process_def, r#"<participant ref="sales_manager" plan="basic"/>"#);
        assert_eq!(queued[0].fields, r#"{"plan":"basic"}"#);
        queue.assert_launched("approval", &participants(), json!({ "plan": "basic" }));
        assert_eq!(process.field("plan"), Some(&json!("basic")));
    }

    #[tokio::test]
    async fn test_disabled_launch_leaves_queue_untouched() {
        let (_dir, store) = store(&[("approval", "x")]);
        let queue = RecordingJobQueue::new();
        let mut process = Process::new(store, "approval", HashMap::new()).unwrap();

        let outcome = process.launch(&queue, false, Map::new()).await;

        assert_eq!(outcome, LaunchOutcome::Disabled);
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_render_failure_is_captured() {
        let (_dir, store) = store(&[("approval.hbs", "{{participants.nobody}}")]);
        let queue = RecordingJobQueue::new();
        let mut process = Process::new(store, "approval", HashMap::new()).unwrap();

        let outcome = process.launch(&queue, true, Map::new()).await;

        assert!(outcome.is_failed());
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_queue_failure_is_captured() {
        let (_dir, store) = store(&[("approval", "x")]);
        let queue = RecordingJobQueue::closed();
        let mut process = Process::new(store, "approval", HashMap::new()).unwrap();

        assert!(process.launch(&queue, true, Map::new()).await.is_failed());
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Test Support
//!
//! Helpers for code built on the bridge, enabled with the `test-util`
//! feature:
//!
//! | Helper | Stands in for |
//! |--------|---------------|
//! | [`MockWorkItem`] | a work item dispatched by the engine |
//! | [`RecordingJobQueue`] | the host job queue; asserts launches |
//! | [`MockEngine`] | the engine's work item lookups |
//!
//! # Usage
//!
//! ```ignore
//! let mut engine = MockEngine::start().await;
//! let item = engine.work_item(MockWorkItem::new("dialup_admin").model(&account)).build();
//! engine.stub_find_by_participant("dialup_admin", &[item]).await;
//!
//! let queue = Arc::new(RecordingJobQueue::new());
//! // ... exercise the code under test ...
//! queue.assert_launched("provision_dialup", &participants, json!({ "plan": "basic" }));
//! ```

use crate::domain::identifier::encode_url_id;
use crate::domain::launch::{JobId, LaunchDescriptor};
use crate::domain::participant::{Identifiable, ParticipantRef};
use crate::domain::repository::{JobQueue, QueueError};
use crate::domain::work_item::{ModelRef, WorkItem};
use crate::infrastructure::ruote_client::RuoteClient;
use async_trait::async_trait;
use chrono::Utc;
use mockito::{Matcher, Mock, Server, ServerGuard};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::time::Duration;
use uuid::Uuid;

/// Definition name given to mock work items unless one is set.
pub const MOCK_DEFINITION: &str = "MockDefinition";

const WORK_ITEM_TYPE: &str = "OpenWFE::InFlowWorkItem";

/// Flow expression id of a freshly dispatched participant expression.
pub fn mock_flow_expression(participant: &str, definition: &str) -> Value {
    json!({
        "owfe_version": "0.9.20",
        "engine_id": "ruote_rest",
        "workflow_definition_url": "field:__definition",
        "workflow_definition_name": definition,
        "workflow_definition_revision": "0",
        "workflow_instance_id": random_instance_id(),
        "expression_name": participant,
        "expression_id": "0.0.0",
    })
}

fn random_instance_id() -> String {
    (Uuid::new_v4().as_u128() % 100_000).to_string()
}

/// Builder for work items as the engine would dispatch them.
#[derive(Debug, Clone)]
pub struct MockWorkItem {
    participant: String,
    definition: String,
    workflow_instance_id: String,
    expression_id: String,
    attributes: Map<String, Value>,
    params: Map<String, Value>,
    host: Option<String>,
}

impl MockWorkItem {
    /// Work item for `participant`, named the way the engine names it.
    ///
    /// # Panics
    ///
    /// When the participant name is blank.
    pub fn new(participant: impl Into<ParticipantRef>) -> Self {
        let participant = participant.into().engine_name();
        assert!(!participant.trim().is_empty(), "a mock work item needs a participant");

        Self {
            participant,
            definition: MOCK_DEFINITION.to_string(),
            workflow_instance_id: random_instance_id(),
            expression_id: "0.0.0".to_string(),
            attributes: Map::new(),
            params: Map::new(),
            host: None,
        }
    }

    /// Work item for the participant derived from `object` (`isp-7`).
    pub fn for_object(object: &dyn Identifiable) -> Self {
        Self::new(ParticipantRef::object(object))
    }

    pub fn definition(mut self, name: impl Into<String>) -> Self {
        self.definition = name.into();
        self
    }

    /// Reference `model` from the `model` attribute.
    pub fn model(mut self, model: &dyn Identifiable) -> Self {
        self.attributes.insert("model".to_string(), ModelRef::of(model).to_value());
        self
    }

    pub fn attribute(mut self, key: impl Into<String>, value: Value) -> Self {
        self.attributes.insert(key.into(), value);
        self
    }

    /// Expression parameter, readable through `WorkItem::params`.
    pub fn param(mut self, key: impl Into<String>, value: Value) -> Self {
        self.params.insert(key.into(), value);
        self
    }

    pub fn workflow_instance_id(mut self, id: impl Into<String>) -> Self {
        self.workflow_instance_id = id.into();
        self
    }

    pub fn expression_id(mut self, id: impl Into<String>) -> Self {
        self.expression_id = id.into();
        self
    }

    /// Add a self link under `base_url` so the item can be saved.
    pub fn hosted_at(mut self, base_url: impl Into<String>) -> Self {
        self.host = Some(base_url.into().trim_end_matches('/').to_string());
        self
    }

    /// Engine JSON for the work item.
    pub fn to_json(&self) -> Value {
        let mut flow_expression = mock_flow_expression(&self.participant, &self.definition);
        flow_expression["workflow_instance_id"] = json!(self.workflow_instance_id);
        flow_expression["expression_id"] = json!(self.expression_id);

        let mut attributes = self.attributes.clone();
        if !self.params.is_empty() {
            attributes.insert("params".to_string(), Value::Object(self.params.clone()));
        }

        let links = match &self.host {
            Some(host) => vec![json!({
                "rel": "self",
                "href": format!(
                    "{}/workitems/{}",
                    host,
                    encode_url_id(&self.workflow_instance_id, &self.expression_id, false)
                ),
            })],
            None => Vec::new(),
        };

        let now = Utc::now().to_rfc3339();
        json!({
            "type": WORK_ITEM_TYPE,
            "participant_name": self.participant,
            "flow_expression_id": flow_expression,
            "attributes": attributes,
            "links": links,
            "dispatch_time": now,
            "last_modified": now,
        })
    }

    /// # Panics
    ///
    /// When the ids set on the builder are blank.
    pub fn build(&self) -> WorkItem {
        match WorkItem::from_json(self.to_json()) {
            Ok(item) => item,
            Err(e) => panic!("mock work item is not a valid work item: {}", e),
        }
    }
}

/// Job queue that keeps every descriptor instead of running it.
#[derive(Debug, Default)]
pub struct RecordingJobQueue {
    launches: Mutex<Vec<LaunchDescriptor>>,
    closed: bool,
}

impl RecordingJobQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue that refuses every descriptor with `QueueError::Closed`.
    pub fn closed() -> Self {
        Self { closed: true, ..Self::default() }
    }

    pub fn launches(&self) -> Vec<LaunchDescriptor> {
        self.launches.lock().clone()
    }

    pub fn is_empty(&self) -> bool {
        self.launches.lock().is_empty()
    }

    /// Descriptors queued for the definition called `process`.
    pub fn launches_of(&self, process: &str) -> Vec<LaunchDescriptor> {
        self.launches
            .lock()
            .iter()
            .filter(|descriptor| descriptor.process == process)
            .cloned()
            .collect()
    }

    /// Payload of the most recent launch.
    pub fn last_payload(&self) -> Option<Map<String, Value>> {
        self.launches.lock().last().and_then(|descriptor| descriptor.payload().ok())
    }

    /// Assert `process` was queued with exactly these participants and payload.
    #[track_caller]
    pub fn assert_launched(
        &self,
        process: &str,
        participants: &HashMap<String, ParticipantRef>,
        payload: Value,
    ) {
        let launches = self.launches_of(process);
        assert!(!launches.is_empty(), "expected a launch of {}, got {}", process, self.summary());

        let matched = launches.iter().any(|descriptor| {
            &descriptor.participants == participants
                && descriptor.payload().map(Value::Object).ok().as_ref() == Some(&payload)
        });
        assert!(
            matched,
            "{} was launched, but not with participants {:?} and payload {}; got {}",
            process,
            participants,
            payload,
            self.summary()
        );
    }

    #[track_caller]
    pub fn assert_never_launched(&self, process: &str) {
        let launches = self.launches_of(process);
        assert!(launches.is_empty(), "expected no launch of {}, got {}", process, self.summary());
    }

    fn summary(&self) -> String {
        let launches = self.launches.lock();
        if launches.is_empty() {
            return "no launches".to_string();
        }
        launches
            .iter()
            .map(|d| format!("{} {:?} {}", d.process, d.participants, d.fields))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

#[async_trait]
impl JobQueue for RecordingJobQueue {
    async fn enqueue(&self, descriptor: LaunchDescriptor) -> Result<JobId, QueueError> {
        if self.closed {
            return Err(QueueError::Closed);
        }
        let job_id = descriptor.job_id;
        self.launches.lock().push(descriptor);
        Ok(job_id)
    }
}

/// Mock engine answering the client's work item lookups.
pub struct MockEngine {
    server: ServerGuard,
}

impl MockEngine {
    pub async fn start() -> Self {
        Self { server: Server::new_async().await }
    }

    pub fn url(&self) -> String {
        self.server.url()
    }

    /// Underlying server, for stubbing anything else.
    pub fn server(&mut self) -> &mut ServerGuard {
        &mut self.server
    }

    /// Enabled client pointed at this engine.
    ///
    /// # Panics
    ///
    /// When the HTTP client cannot be built.
    pub fn client(&self) -> RuoteClient {
        match RuoteClient::new(&self.url(), true, Duration::from_secs(5)) {
            Ok(client) => client,
            Err(e) => panic!("failed to build client for mock engine: {}", e),
        }
    }

    /// Host `item` on this engine so it can be reloaded and saved.
    pub fn work_item(&self, item: MockWorkItem) -> MockWorkItem {
        item.hosted_at(self.url())
    }

    /// Answer participant queries for `participant` with `items`.
    pub async fn stub_find_by_participant(
        &mut self,
        participant: impl Into<ParticipantRef>,
        items: &[WorkItem],
    ) -> Mock {
        let participant = participant.into().engine_name();
        let elements: Vec<Value> = items.iter().map(WorkItem::to_json).collect();

        self.server
            .mock("GET", "/workitems")
            .match_query(Matcher::AllOf(vec![
                Matcher::UrlEncoded("participant".into(), participant),
                Matcher::UrlEncoded("format".into(), "json".into()),
            ]))
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(json!({ "elements": elements }).to_string())
            .create_async()
            .await
    }

    /// Answer lookups of `item` by id.
    pub async fn stub_find_by_id(&mut self, item: &WorkItem) -> Mock {
        self.server
            .mock("GET", work_item_path(item).as_str())
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(item.to_json().to_string())
            .create_async()
            .await
    }

    /// Report `item` as gone.
    pub async fn stub_missing(&mut self, item: &WorkItem) -> Mock {
        self.server
            .mock("GET", work_item_path(item).as_str())
            .with_status(404)
            .create_async()
            .await
    }
}

fn work_item_path(item: &WorkItem) -> String {
    format!("/workitems/{}.json", item.id().engine_path())
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Isp(u64);

    impl Identifiable for Isp {
        fn type_name(&self) -> &str {
            "Isp"
        }

        fn id(&self) -> String {
            self.0.to_string()
        }
    }

    fn participants() -> HashMap<String, ParticipantRef> {
        HashMap::from([("admin".to_string(), ParticipantRef::from("dialup_admin"))])
    }

    async fn queue_launch(queue: &RecordingJobQueue, process: &str, payload: Value) {
        let Value::Object(fields) = payload else {
            panic!("payload must be an object");
        };
        let descriptor = LaunchDescriptor::new("<process-definition/>", &fields)
            .unwrap()
            .for_process(process, participants());
        queue.enqueue(descriptor).await.unwrap();
    }

    #[test]
    fn test_mock_work_item_participant_names() {
        let item = MockWorkItem::new("dialup_admin").build();
        assert_eq!(item.participant_name(), Some("dialup-admin"));

        let item = MockWorkItem::for_object(&Isp(7)).build();
        assert_eq!(item.participant_name(), Some("isp-7"));
    }

    #[test]
    #[should_panic(expected = "needs a participant")]
    fn test_mock_work_item_requires_participant() {
        MockWorkItem::new("");
    }

    #[test]
    fn test_mock_work_item_definition_name() {
        assert_eq!(MockWorkItem::new("sales").build().name(), Some(MOCK_DEFINITION));
        assert_eq!(
            MockWorkItem::new("sales").definition("ProvisionDialup").build().name(),
            Some("ProvisionDialup")
        );
    }

    #[test]
    fn test_mock_work_item_model_and_attributes() {
        let item = MockWorkItem::new("sales")
            .model(&Isp(7))
            .attribute("plan", json!("basic"))
            .param("activity", json!("Check the line"))
            .build();

        let model = item.model_ref().unwrap();
        assert_eq!(model, ModelRef { class: "Isp".into(), id: "7".into() });
        assert_eq!(item.get("plan"), Some(&json!("basic")));
        assert_eq!(item.activity().as_deref(), Some("Check the line"));
        assert!(item.dispatch_time().is_some());
        assert!(item.links().is_empty());
    }

    #[test]
    fn test_mock_flow_expression() {
        let fei = mock_flow_expression("sales", "ProvisionDialup");
        assert_eq!(fei["engine_id"], json!("ruote_rest"));
        assert_eq!(fei["expression_id"], json!("0.0.0"));
        assert_eq!(fei["expression_name"], json!("sales"));
        assert_eq!(fei["workflow_definition_name"], json!("ProvisionDialup"));

        let wfid: u64 = fei["workflow_instance_id"].as_str().unwrap().parse().unwrap();
        assert!(wfid < 100_000);
    }

    #[test]
    fn test_hosted_work_item_has_self_link() {
        let item = MockWorkItem::new("sales")
            .workflow_instance_id("20081225-christmas")
            .expression_id("0.0.1")
            .hosted_at("http://engine.example/")
            .build();

        assert_eq!(
            item.self_uri().unwrap(),
            "http://engine.example/workitems/20081225-christmas/0_0_1"
        );
        assert_eq!(item.host().unwrap(), "http://engine.example");
    }

    #[tokio::test]
    async fn test_assert_launched() {
        let queue = RecordingJobQueue::new();
        queue_launch(&queue, "provision_dialup", json!({ "plan": "basic" })).await;

        queue.assert_launched("provision_dialup", &participants(), json!({ "plan": "basic" }));
        queue.assert_never_launched("terminate_dialup");
        assert_eq!(queue.launches_of("provision_dialup").len(), 1);
        assert_eq!(queue.last_payload().unwrap()["plan"], json!("basic"));
    }

    #[tokio::test]
    #[should_panic(expected = "not with participants")]
    async fn test_assert_launched_checks_payload() {
        let queue = RecordingJobQueue::new();
        queue_launch(&queue, "provision_dialup", json!({ "plan": "basic" })).await;

        queue.assert_launched("provision_dialup", &participants(), json!({ "plan": "premium" }));
    }

    #[test]
    #[should_panic(expected = "expected a launch of provision_dialup")]
    fn test_assert_launched_without_launch() {
        RecordingJobQueue::new().assert_launched("provision_dialup", &participants(), json!({}));
    }

    #[tokio::test]
    #[should_panic(expected = "expected no launch")]
    async fn test_assert_never_launched() {
        let queue = RecordingJobQueue::new();
        queue_launch(&queue, "provision_dialup", json!({})).await;

        queue.assert_never_launched("provision_dialup");
    }

    #[tokio::test]
    async fn test_closed_queue_refuses() {
        let queue = RecordingJobQueue::closed();
        let descriptor = LaunchDescriptor::new("x", &Map::new()).unwrap();

        assert!(matches!(queue.enqueue(descriptor).await, Err(QueueError::Closed)));
        assert!(queue.is_empty());
    }

    #[tokio::test]
    async fn test_stub_find_by_participant() {
        let mut engine = MockEngine::start().await;
        let items = [
            engine.work_item(MockWorkItem::new("dialup_admin").model(&Isp(7))).build(),
            engine.work_item(MockWorkItem::new("dialup_admin")).build(),
        ];
        let mock = engine.stub_find_by_participant("dialup_admin", &items).await;

        let found = engine.client().find_by_participant("dialup_admin").await.unwrap();

        mock.assert_async().await;
        assert_eq!(found.len(), 2);
        assert_eq!(found[0].id(), items[0].id());
        assert_eq!(found[0].model_ref(), items[0].model_ref());
    }

    #[tokio::test]
    async fn test_stub_find_by_id() {
        let mut engine = MockEngine::start().await;
        let item = engine
            .work_item(MockWorkItem::new("sales").workflow_instance_id("20081225-christmas"))
            .build();
        let gone = engine
            .work_item(MockWorkItem::new("sales").workflow_instance_id("20081226-boxing"))
            .build();
        engine.stub_find_by_id(&item).await;
        engine.stub_missing(&gone).await;

        let client = engine.client();
        let found = client.find_by_id(&item.to_param(true)).await.unwrap().unwrap();
        assert_eq!(found.id(), item.id());
        assert_eq!(found.participant_name(), Some("sales"));
        assert!(client.find_by_id(&gone.to_param(true)).await.unwrap().is_none());
    }
}

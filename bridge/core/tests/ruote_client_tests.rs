// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Integration tests for the ruote-rest client against a mock engine.
//!
//! Covers participant queries (including an unreachable engine), point
//! lookups, the work item mutations and their request shapes, expression
//! tree caching and the queued launch path end to end.

use mockito::{Matcher, Server};
use ruote_bridge_core::application::process_launcher::ProcessLauncher;
use ruote_bridge_core::domain::config::QueueConfig;
use ruote_bridge_core::domain::launch::{LaunchDescriptor, LaunchOutcome};
use ruote_bridge_core::domain::launcher::{
    LaunchBindings, LifecycleEvent, ModelEventError, ProcessModel, Resolver,
};
use ruote_bridge_core::domain::participant::Identifiable;
use ruote_bridge_core::domain::work_item::{WorkItem, WorkItemError, WorkItemState};
use ruote_bridge_core::infrastructure::job_queue::{InMemoryJobQueue, LaunchWorker};
use ruote_bridge_core::infrastructure::process_definitions::ProcessDefinitionStore;
use ruote_bridge_core::infrastructure::ruote_client::{RuoteClient, RuoteError};
use serde_json::{json, Value};
use std::sync::Arc;
use std::time::Duration;

/// Nothing listens on port 1; connections are refused immediately.
const UNREACHABLE: &str = "http://127.0.0.1:1";

fn client(base_url: &str) -> RuoteClient {
    RuoteClient::new(base_url, true, Duration::from_secs(5)).unwrap()
}

fn work_item_json(base_url: &str, wfid: &str, expid: &str) -> Value {
    json!({
        "flow_expression_id": {
            "workflow_instance_id": wfid,
            "expression_id": expid,
            "workflow_definition_name": "ServiceProcess",
            "expression_name": "participant"
        },
        "participant_name": "dialup-admin",
        "dispatch_time": "2008-12-25 10:00:00 +0000",
        "attributes": {
            "params": { "activity": "Check the line" },
            "model": { "class": "Account", "id": "42" }
        },
        "links": [
            { "rel": "self", "href": format!("{}/workitems/{}/{}", base_url, wfid, expid.replace('.', "_")) }
        ]
    })
}

#[tokio::test]
async fn test_find_by_participant_dasherizes_role() {
    let mut server = Server::new_async().await;
    let url = server.url();
    let body = json!({
        "elements": [
            work_item_json(&url, "20081225-christmas", "0.0.0"),
            // Some engines send each element JSON-encoded
            work_item_json(&url, "20081226-boxing", "0.0.1").to_string()
        ]
    });

    let mock = server
        .mock("GET", "/workitems")
        .match_query(Matcher::AllOf(vec![
            Matcher::UrlEncoded("participant".into(), "dialup-admin".into()),
            Matcher::UrlEncoded("format".into(), "json".into()),
        ]))
        .with_status(200)
        .with_header("content-type", "application/json")
        .with_body(body.to_string())
        .create_async()
        .await;

    let items = client(&url).find_by_participant("dialup_admin").await.unwrap();

    mock.assert_async().await;
    assert_eq!(items.len(), 2);
    assert_eq!(items[0].workflow_instance_id(), "20081225-christmas");
    assert_eq!(items[1].expression_id(), "0.0.1");
    assert_eq!(items[0].activity().as_deref(), Some("Check the line"));
}

#[tokio::test]
async fn test_first_and_last_by_participant() {
    let mut server = Server::new_async().await;
    let url = server.url();
    let body = json!({
        "elements": [
            work_item_json(&url, "wf-a", "0.0"),
            work_item_json(&url, "wf-b", "0.0")
        ]
    });

    server
        .mock("GET", "/workitems")
        .match_query(Matcher::Any)
        .with_status(200)
        .with_body(body.to_string())
        .expect(2)
        .create_async()
        .await;

    let client = client(&url);
    let first = client.first_by_participant("sales").await.unwrap().unwrap();
    let last = client.last_by_participant("sales").await.unwrap().unwrap();

    assert_eq!(first.workflow_instance_id(), "wf-a");
    assert_eq!(last.workflow_instance_id(), "wf-b");
}

#[tokio::test]
async fn test_find_by_participant_engine_unreachable() {
    let client = client(UNREACHABLE);

    let items = client.find_by_participant("dialup_admin").await.unwrap();
    assert!(items.is_empty());
    assert_eq!(client.count("dialup_admin").await.unwrap(), 0);
}

#[tokio::test]
async fn test_find_by_participant_server_error_propagates() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/workitems")
        .match_query(Matcher::Any)
        .with_status(500)
        .with_body("boom")
        .create_async()
        .await;

    let result = client(&server.url()).find_by_participant("sales").await;
    assert!(matches!(result, Err(RuoteError::Http { status, .. }) if status.as_u16() == 500));
}

#[tokio::test]
async fn test_disabled_client_sends_nothing() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("GET", Matcher::Any)
        .expect(0)
        .create_async()
        .await;

    let client = RuoteClient::new(&server.url(), false, Duration::from_secs(5)).unwrap();

    assert!(client.find_by_participant("sales").await.unwrap().is_empty());
    assert!(client.find_by_id("20081225-christmas%2F0_0_0").await.unwrap().is_none());
    // A disabled client never looks at the id
    assert!(client.find_by_id("no-separator").await.unwrap().is_none());
    mock.assert_async().await;
}

#[tokio::test]
async fn test_find_by_id_accepts_every_encoding() {
    let mut server = Server::new_async().await;
    let url = server.url();

    let mock = server
        .mock("GET", "/workitems/20081225-christmas/0_0_0.json")
        .with_status(200)
        .with_body(work_item_json(&url, "20081225-christmas", "0.0.0").to_string())
        .expect(4)
        .create_async()
        .await;

    let client = client(&url);
    for id in [
        "20081225-christmas%2F0_0_0",
        "20081225-christmas%2F0.0.0",
        "20081225-christmas/0.0.0",
        "20081225-christmas/0_0_0",
    ] {
        let item = client.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(item.to_param(true), "20081225-christmas%2F0_0_0");
    }

    mock.assert_async().await;
}

#[tokio::test]
async fn test_find_by_id_decoded_once() {
    let mut server = Server::new_async().await;
    let url = server.url();

    let mock = server
        .mock("GET", "/workitems/100%2541/0.json")
        .with_status(200)
        .with_body(work_item_json(&url, "100%41", "0").to_string())
        .expect(2)
        .create_async()
        .await;

    let client = client(&url);
    // As received from the router, and still escaped
    for id in ["100%41/0", "100%2541%2F0"] {
        let item = client.find_by_id(id).await.unwrap().unwrap();
        assert_eq!(item.workflow_instance_id(), "100%41");
    }

    mock.assert_async().await;
}

#[tokio::test]
async fn test_find_by_id_not_found() {
    let mut server = Server::new_async().await;
    server
        .mock("GET", "/workitems/20081225-christmas/0_0_9.json")
        .with_status(404)
        .create_async()
        .await;

    let item = client(&server.url()).find_by_id("20081225-christmas/0.0.9").await.unwrap();
    assert!(item.is_none());
}

#[tokio::test]
async fn test_find_by_id_engine_unreachable() {
    let result = client(UNREACHABLE).find_by_id("20081225-christmas/0_0_0").await;
    assert!(matches!(result, Err(RuoteError::EngineUnavailable(_))));
}

#[tokio::test]
async fn test_find_by_id_malformed() {
    let result = client(UNREACHABLE).find_by_id("no-separator").await;
    assert!(matches!(result, Err(RuoteError::MalformedId(_))));
}

#[tokio::test]
async fn test_persist_then_advance() {
    let mut server = Server::new_async().await;
    let url = server.url();
    let mut item = WorkItem::from_json(work_item_json(
        &url,
        "20081225-christmas",
        "0.0.0",
    ))
    .unwrap();

    let persisted = server
        .mock("PUT", "/workitems/20081225-christmas/0_0_0")
        .match_header("content-type", "application/json")
        .match_body(Matcher::PartialJson(json!({ "attributes": { "checked": true } })))
        .with_status(200)
        .expect(3)
        .create_async()
        .await;

    let client = client(&url);
    item.set("checked", json!(true));
    client.persist(&mut item).await.unwrap();
    assert_eq!(item.state(), WorkItemState::Persisted);
    assert_eq!(item.get("_state"), None);

    client.advance(&mut item).await.unwrap();
    assert_eq!(item.state(), WorkItemState::Advanced);
    assert_eq!(item.get("_state"), Some(&json!("proceeded")));

    // Advancing again re-sends the update
    client.advance(&mut item).await.unwrap();
    persisted.assert_async().await;

    // Persisting an advanced item is refused locally
    let err = client.persist(&mut item).await.unwrap_err();
    assert!(matches!(err, RuoteError::WorkItem(WorkItemError::InvalidTransition { .. })));
}

#[tokio::test]
async fn test_advance_sends_proceeded_state() {
    let mut server = Server::new_async().await;
    let url = server.url();
    let mut item = WorkItem::from_json(work_item_json(
        &url, "wf-1", "0.1",
    ))
    .unwrap();

    let mock = server
        .mock("PUT", "/workitems/wf-1/0_1")
        .match_body(Matcher::PartialJson(json!({ "attributes": { "_state": "proceeded" } })))
        .with_status(200)
        .create_async()
        .await;

    client(&url).advance(&mut item).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_cancel_process() {
    let mut server = Server::new_async().await;
    let url = server.url();
    let mut item = WorkItem::from_json(work_item_json(
        &url, "wf-1", "0.1",
    ))
    .unwrap();

    let mock = server
        .mock("DELETE", "/processes/wf-1.json")
        .with_status(200)
        .create_async()
        .await;

    let client = client(&url);
    client.cancel_process(&mut item).await.unwrap();
    mock.assert_async().await;
    assert_eq!(item.state(), WorkItemState::ProcessCancelled);

    let err = client.advance(&mut item).await.unwrap_err();
    assert!(matches!(err, RuoteError::WorkItem(WorkItemError::InvalidTransition { .. })));
}

#[tokio::test]
async fn test_cancel_process_escapes_instance_id() {
    let mut server = Server::new_async().await;
    let url = server.url();
    let mut item = WorkItem::from_json(work_item_json(
        &url, "wf 1?", "0.1",
    ))
    .unwrap();

    let mock = server
        .mock("DELETE", "/processes/wf%201%3F.json")
        .with_status(200)
        .create_async()
        .await;

    client(&url).cancel_process(&mut item).await.unwrap();
    mock.assert_async().await;
}

#[tokio::test]
async fn test_mutations_propagate_connection_errors() {
    let mut item = WorkItem::from_json(work_item_json(
        UNREACHABLE, "wf-1", "0.1",
    ))
    .unwrap();

    let err = client(UNREACHABLE).advance(&mut item).await.unwrap_err();
    assert!(err.is_engine_unavailable());
    assert_eq!(item.state(), WorkItemState::Fetched);
}

#[tokio::test]
async fn test_reload_replaces_local_copy() {
    let mut server = Server::new_async().await;
    let url = server.url();
    let mut item = WorkItem::from_json(work_item_json(
        &url, "wf-1", "0.1",
    ))
    .unwrap();
    item.set("scratch", json!("local only"));

    let mut fresh = work_item_json(&url, "wf-1", "0.1");
    fresh["attributes"]["approved"] = json!(true);
    server
        .mock("GET", "/workitems/wf-1/0_1")
        .with_status(200)
        .with_body(fresh.to_string())
        .create_async()
        .await;

    client(&url).reload(&mut item).await.unwrap();
    assert_eq!(item.get("approved"), Some(&json!(true)));
    assert_eq!(item.get("scratch"), None);
}

#[tokio::test]
async fn test_expression_tree_is_cached() {
    let mut server = Server::new_async().await;
    let url = server.url();
    let mut item = WorkItem::from_json(work_item_json(
        &url, "wf-1", "0.1",
    ))
    .unwrap();

    let tree = json!(["process-definition", { "name": "ServiceProcess" }, []]);
    let mock = server
        .mock("GET", "/processes/wf-1/tree.json")
        .match_query(Matcher::UrlEncoded("plain".into(), "true".into()))
        .with_status(200)
        .with_body(tree.to_string())
        .expect(1)
        .create_async()
        .await;

    let client = client(&url);
    assert_eq!(client.expression_tree(&mut item, false).await.unwrap(), tree);
    assert_eq!(client.expression_tree(&mut item, false).await.unwrap(), tree);
    mock.assert_async().await;
}

#[tokio::test]
async fn test_launch_posts_form() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/processes")
        .match_header("content-type", "application/x-www-form-urlencoded")
        .match_body(Matcher::AllOf(vec![
            Matcher::Regex("pdef=%3Cprocess-definition%2F%3E".into()),
            Matcher::Regex("fields=%7B%22plan%22%3A%22basic%22%7D".into()),
        ]))
        .with_status(201)
        .with_body("20090101-launched")
        .create_async()
        .await;

    let mut fields = serde_json::Map::new();
    fields.insert("plan".into(), json!("basic"));
    let descriptor = LaunchDescriptor::new("<process-definition/>", &fields).unwrap();

    let body = client(&server.url()).launch(&descriptor).await.unwrap();
    assert_eq!(body, "20090101-launched");
    mock.assert_async().await;
}

struct Account {
    id: u64,
}

impl Identifiable for Account {
    fn type_name(&self) -> &str {
        "Account"
    }

    fn id(&self) -> String {
        self.id.to_string()
    }
}

impl ProcessModel for Account {
    fn read(&self, _accessor: &str) -> Option<Value> {
        None
    }

    fn fire_event(&mut self, _event: &str) -> Result<(), ModelEventError> {
        Ok(())
    }

    fn set_state(&mut self, _state: &str) {}
}

#[tokio::test]
async fn test_lifecycle_launch_reaches_engine() {
    let mut server = Server::new_async().await;
    let mock = server
        .mock("POST", "/processes")
        .match_body(Matcher::Regex("itag%22%3A%22account-42%22".into()))
        .with_status(201)
        .with_body("20090101-launched")
        .create_async()
        .await;

    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("open_account"), "<process-definition/>").unwrap();

    let (queue, receiver) = InMemoryJobQueue::new();
    let launcher = ProcessLauncher::new(
        Arc::new(ProcessDefinitionStore::new(dir.path())),
        Arc::new(queue),
        true,
    );
    launcher
        .register(
            "Account",
            LaunchBindings::new().on(LifecycleEvent::Create, Resolver::literal("open_account")),
        )
        .unwrap();

    let outcome = launcher.on_create(&mut Account { id: 42 }).await.unwrap();
    assert!(matches!(outcome, Some(LaunchOutcome::Enqueued { .. })));

    // Dropping the launcher closes the queue so the worker stops after draining
    drop(launcher);
    let worker = LaunchWorker::new(
        receiver,
        Arc::new(client(&server.url())),
        &QueueConfig { max_attempts: 1, retry_delay_ms: 0 },
    );
    worker.run().await;

    mock.assert_async().await;
}

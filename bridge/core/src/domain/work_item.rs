// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Work Item
//!
//! Local, possibly stale copy of an engine work item. The engine owns the
//! resource; this type keeps the raw JSON so updates are sent back exactly as
//! received plus local attribute changes.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Typed access to the engine's work item representation
//!
//! # State Machine
//!
//! ```text
//! Fetched ──persist──▶ Persisted ──persist──▶ Persisted
//!    │                    │
//!    ├──advance──▶ Advanced ◀──advance──┤       (advance may repeat)
//!    └──cancel───▶ ProcessCancelled ◀───┘       (terminal)
//! ```

use crate::domain::identifier::{encode_url_id, WorkItemId};
use crate::domain::participant::Identifiable;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use url::Url;

/// Attribute key the engine reads to decide whether a work item proceeds.
pub const STATE_KEY: &str = "_state";
pub const PROCEEDED: &str = "proceeded";

#[derive(Debug, Error)]
pub enum WorkItemError {
    #[error("Work item is not a JSON object")]
    NotAnObject,

    #[error("Work item is missing '{0}'")]
    MissingField(&'static str),

    #[error("Work item has no self link")]
    MissingSelfLink,

    #[error("Invalid work item link '{0}': {1}")]
    InvalidLink(String, String),

    #[error("Cannot {operation} a work item that is {state:?}")]
    InvalidTransition {
        state: WorkItemState,
        operation: &'static str,
    },
}

/// Lifecycle of a work item as seen by this client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WorkItemState {
    Fetched,
    Persisted,
    Advanced,
    ProcessCancelled,
}

/// Operations that move a work item through its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkItemOperation {
    Persist,
    Advance,
    CancelProcess,
}

impl WorkItemOperation {
    fn name(self) -> &'static str {
        match self {
            Self::Persist => "persist",
            Self::Advance => "advance",
            Self::CancelProcess => "cancel the process of",
        }
    }
}

impl WorkItemState {
    /// State reached by applying `operation`, if allowed.
    pub fn transition(self, operation: WorkItemOperation) -> Result<Self, WorkItemError> {
        use WorkItemOperation::*;
        use WorkItemState::*;

        match (self, operation) {
            (Fetched | Persisted, Persist) => Ok(Persisted),
            (Fetched | Persisted | Advanced, Advance) => Ok(Advanced),
            (Fetched | Persisted, CancelProcess) => Ok(ProcessCancelled),
            (state, operation) => Err(WorkItemError::InvalidTransition {
                state,
                operation: operation.name(),
            }),
        }
    }
}

/// `{class, id}` reference to the host model a work item was launched for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModelRef {
    pub class: String,
    pub id: String,
}

impl ModelRef {
    pub fn of(model: &dyn Identifiable) -> Self {
        Self {
            class: model.type_name().to_string(),
            id: model.id(),
        }
    }

    /// Payload form. Integer ids are sent as JSON numbers.
    pub fn to_value(&self) -> Value {
        let id = self
            .id
            .parse::<i64>()
            .map(Value::from)
            .unwrap_or_else(|_| Value::String(self.id.clone()));
        json!({ "class": self.class, "id": id })
    }
}

#[derive(Debug, Clone)]
pub struct WorkItem {
    raw: Map<String, Value>,
    state: WorkItemState,
    expression_tree: Option<Value>,
}

impl WorkItem {
    /// Build from the engine's JSON. A missing `attributes` member becomes `{}`.
    pub fn from_json(json: Value) -> Result<Self, WorkItemError> {
        let mut raw = match json {
            Value::Object(map) => map,
            _ => return Err(WorkItemError::NotAnObject),
        };

        if !matches!(raw.get("attributes"), Some(Value::Object(_))) {
            raw.insert("attributes".to_string(), Value::Object(Map::new()));
        }

        let item = Self {
            raw,
            state: WorkItemState::Fetched,
            expression_tree: None,
        };

        // The id fields are required for every later operation
        item.flow_str("workflow_instance_id")
            .ok_or(WorkItemError::MissingField("flow_expression_id.workflow_instance_id"))?;
        item.flow_str("expression_id")
            .ok_or(WorkItemError::MissingField("flow_expression_id.expression_id"))?;

        Ok(item)
    }

    pub fn parse_json(json: &str) -> Result<Self, WorkItemError> {
        let value: Value = serde_json::from_str(json).map_err(|_| WorkItemError::NotAnObject)?;
        Self::from_json(value)
    }

    /// Replace the local copy with a freshly fetched representation.
    pub fn reset(&mut self, json: Value) -> Result<(), WorkItemError> {
        let state = self.state;
        *self = Self::from_json(json)?;
        self.state = state;
        Ok(())
    }

    fn flow_str(&self, key: &str) -> Option<&str> {
        self.raw
            .get("flow_expression_id")
            .and_then(|f| f.get(key))
            .and_then(Value::as_str)
    }

    fn str_field(&self, key: &str) -> Option<&str> {
        self.raw.get(key).and_then(Value::as_str)
    }

    pub fn workflow_instance_id(&self) -> &str {
        self.flow_str("workflow_instance_id").unwrap_or_default()
    }

    pub fn expression_id(&self) -> &str {
        self.flow_str("expression_id").unwrap_or_default()
    }

    pub fn id(&self) -> WorkItemId {
        WorkItemId::new(self.workflow_instance_id(), self.expression_id())
    }

    /// Workflow definition name, used to pick the view for this item.
    pub fn name(&self) -> Option<&str> {
        self.flow_str("workflow_definition_name")
    }

    pub fn participant_name(&self) -> Option<&str> {
        self.str_field("participant_name")
    }

    pub fn flow_expression_id(&self) -> Option<&Value> {
        self.raw.get("flow_expression_id")
    }

    pub fn dispatch_time(&self) -> Option<DateTime<Utc>> {
        self.str_field("dispatch_time").and_then(parse_time)
    }

    pub fn last_modified(&self) -> Option<DateTime<Utc>> {
        self.str_field("last_modified").and_then(parse_time)
    }

    pub fn attributes(&self) -> &Map<String, Value> {
        match self.raw.get("attributes") {
            Some(Value::Object(map)) => map,
            _ => unreachable!("attributes initialised in from_json"),
        }
    }

    pub fn attributes_mut(&mut self) -> &mut Map<String, Value> {
        match self.raw.get_mut("attributes") {
            Some(Value::Object(map)) => map,
            _ => unreachable!("attributes initialised in from_json"),
        }
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.attributes().get(key)
    }

    pub fn set(&mut self, key: impl Into<String>, value: Value) {
        self.attributes_mut().insert(key.into(), value);
    }

    /// Merge `value` into the attribute `key`: objects are merged one level
    /// deep, anything else replaces the current value.
    pub fn merge_attribute(&mut self, key: &str, value: Value) {
        let attributes = self.attributes_mut();
        if let (Some(Value::Object(existing)), Value::Object(incoming)) =
            (attributes.get_mut(key), &value)
        {
            existing.extend(incoming.clone());
            return;
        }
        attributes.insert(key.to_string(), value);
    }

    pub fn params(&self) -> Map<String, Value> {
        match self.get("params") {
            Some(Value::Object(params)) => params.clone(),
            _ => Map::new(),
        }
    }

    pub fn activity(&self) -> Option<String> {
        self.params()
            .get("activity")
            .and_then(Value::as_str)
            .map(str::to_string)
    }

    pub fn has_api_error(&self) -> bool {
        !is_blank(self.get("api_error"))
    }

    pub fn api_error(&self) -> String {
        self.get("api_error")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    }

    pub fn postponed(&self) -> bool {
        !is_blank(self.get("postpone"))
    }

    /// The `model` attribute, if both class and id are present.
    pub fn model_ref(&self) -> Option<ModelRef> {
        let model = self.get("model")?;
        let class = model.get("class").filter(|v| !is_blank(Some(v)))?;
        let id = model.get("id").filter(|v| !is_blank(Some(v)))?;

        Some(ModelRef {
            class: class.as_str()?.to_string(),
            id: match id {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            },
        })
    }

    pub fn links(&self) -> &[Value] {
        self.raw
            .get("links")
            .and_then(Value::as_array)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    /// The `rel=self` link, target of updates.
    pub fn self_uri(&self) -> Result<&str, WorkItemError> {
        self.links()
            .iter()
            .find(|link| link.get("rel").and_then(Value::as_str) == Some("self"))
            .and_then(|link| link.get("href"))
            .and_then(Value::as_str)
            .ok_or(WorkItemError::MissingSelfLink)
    }

    /// Scheme, host and port of [`Self::self_uri`].
    pub fn host(&self) -> Result<String, WorkItemError> {
        let uri = self.self_uri()?;
        let parsed =
            Url::parse(uri).map_err(|e| WorkItemError::InvalidLink(uri.to_string(), e.to_string()))?;

        let mut host = format!("{}://{}", parsed.scheme(), parsed.host_str().unwrap_or_default());
        if let Some(port) = parsed.port() {
            host.push_str(&format!(":{}", port));
        }
        Ok(host)
    }

    pub fn to_param(&self, escape: bool) -> String {
        encode_url_id(self.workflow_instance_id(), self.expression_id(), escape)
    }

    pub fn state(&self) -> WorkItemState {
        self.state
    }

    /// Validate `operation` against the current state without applying it.
    pub fn check_transition(&self, operation: WorkItemOperation) -> Result<WorkItemState, WorkItemError> {
        self.state.transition(operation)
    }

    pub fn mark(&mut self, state: WorkItemState) {
        self.state = state;
    }

    pub fn mark_proceeded(&mut self) {
        self.set(STATE_KEY, Value::String(PROCEEDED.to_string()));
    }

    pub fn cached_expression_tree(&self) -> Option<&Value> {
        self.expression_tree.as_ref()
    }

    pub fn cache_expression_tree(&mut self, tree: Value) {
        self.expression_tree = Some(tree);
    }

    pub fn as_json(&self) -> &Map<String, Value> {
        &self.raw
    }

    pub fn to_json(&self) -> Value {
        Value::Object(self.raw.clone())
    }
}

impl PartialEq for WorkItem {
    fn eq(&self, other: &Self) -> bool {
        self.workflow_instance_id() == other.workflow_instance_id()
    }
}

impl Serialize for WorkItem {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        self.raw.serialize(serializer)
    }
}

fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    let trimmed = raw.trim_matches('"');
    DateTime::parse_from_rfc3339(trimmed)
        .or_else(|_| DateTime::parse_from_str(trimmed, "%Y/%m/%d %H:%M:%S %z"))
        .or_else(|_| DateTime::parse_from_str(trimmed, "%Y-%m-%d %H:%M:%S %z"))
        .ok()
        .map(|t| t.with_timezone(&Utc))
}

fn is_blank(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(Value::Object(m)) => m.is_empty(),
        Some(Value::Array(a)) => a.is_empty(),
        Some(Value::Bool(b)) => !b,
        Some(Value::Number(_)) => false,
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Process Launcher
//!
//! Maps host model lifecycle events to process launches. Each model type
//! registers its [`LaunchBindings`] once; the host then calls
//! [`ProcessLauncher::on_create`] and friends from its own lifecycle hooks.
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** Lifecycle binding, launch payloads, per-type gating
//! - **Collaborators:**
//!   - Domain: LaunchBindings, ProcessModel, Initiator
//!   - Application: Process
//!   - Infrastructure: ProcessDefinitionStore, JobQueue
//!
//! # Payload
//!
//! Every launch payload carries:
//!
//! | Key | Value |
//! |-----|-------|
//! | `self_provision` | initiator's answer to `provision_check`, `true` by default |
//! | `model` | `{class, id}` of the triggering model |
//! | `itag` | `{type}-{id}`, lowercased |
//!
//! on top of the configured `payload` resolver output. Keys passed
//! explicitly to [`ProcessLauncher::launch_process`] win over all of them.
//!
//! # Gating
//!
//! Launches are enabled per model type. `disable_scope` and the
//! `without_processes*` helpers disable a type for a block and restore the
//! previous flag afterwards. The flag is per type, not per task: overlapping
//! scopes on the same type from concurrent tasks are not supported.

use crate::application::process::Process;
use crate::domain::launch::LaunchOutcome;
use crate::domain::launcher::{
    resolve_name, ConfigurationError, LaunchBindings, LifecycleEvent, ProcessModel,
};
use crate::domain::participant::{object_participant_name, Identifiable, ParticipantRef};
use crate::domain::repository::JobQueue;
use crate::domain::work_item::ModelRef;
use crate::infrastructure::process_definitions::ProcessDefinitionStore;
use parking_lot::RwLock;
use scopeguard::ScopeGuard;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tracing::{debug, info, warn};

pub struct ProcessLauncher {
    store: Arc<ProcessDefinitionStore>,
    queue: Arc<dyn JobQueue>,
    /// Bridge-wide switch from configuration
    enabled: bool,
    bindings: RwLock<HashMap<String, Arc<LaunchBindings>>>,
    flags: RwLock<HashMap<String, bool>>,
}

impl ProcessLauncher {
    pub fn new(store: Arc<ProcessDefinitionStore>, queue: Arc<dyn JobQueue>, enabled: bool) -> Self {
        Self {
            store,
            queue,
            enabled,
            bindings: RwLock::new(HashMap::new()),
            flags: RwLock::new(HashMap::new()),
        }
    }

    /// Register the bindings for a model type.
    ///
    /// Returns `false` without changing anything when the type is already
    /// registered. Processes for a newly registered type start enabled.
    pub fn register(&self, type_name: &str, bindings: LaunchBindings) -> Result<bool, ConfigurationError> {
        bindings.validate()?;

        let mut registry = self.bindings.write();
        if registry.contains_key(type_name) {
            debug!(type_name, "Launch bindings already registered, ignoring");
            return Ok(false);
        }

        let events: Vec<&str> = bindings.bound_events().iter().map(|e| e.as_str()).collect();
        info!(type_name, events = ?events, "Registered launch bindings");

        registry.insert(type_name.to_string(), Arc::new(bindings));
        self.flags.write().entry(type_name.to_string()).or_insert(true);
        Ok(true)
    }

    pub fn bindings(&self, type_name: &str) -> Option<Arc<LaunchBindings>> {
        self.bindings.read().get(type_name).cloned()
    }

    pub async fn on_create(&self, model: &mut dyn ProcessModel) -> Result<Option<LaunchOutcome>, ConfigurationError> {
        self.lifecycle(LifecycleEvent::Create, model).await
    }

    pub async fn on_update(&self, model: &mut dyn ProcessModel) -> Result<Option<LaunchOutcome>, ConfigurationError> {
        self.lifecycle(LifecycleEvent::Update, model).await
    }

    pub async fn on_save(&self, model: &mut dyn ProcessModel) -> Result<Option<LaunchOutcome>, ConfigurationError> {
        self.lifecycle(LifecycleEvent::Save, model).await
    }

    pub async fn on_destroy(&self, model: &mut dyn ProcessModel) -> Result<Option<LaunchOutcome>, ConfigurationError> {
        self.lifecycle(LifecycleEvent::Destroy, model).await
    }

    async fn lifecycle(
        &self,
        event: LifecycleEvent,
        model: &mut dyn ProcessModel,
    ) -> Result<Option<LaunchOutcome>, ConfigurationError> {
        let Some(bindings) = self.bindings(model.type_name()) else {
            return Ok(None);
        };

        let Some(name) = bindings
            .process_for(event)
            .and_then(|resolver| resolve_name(resolver, &*model))
        else {
            debug!(type_name = model.type_name(), %event, "No process bound for lifecycle event");
            return Ok(None);
        };

        let participants = bindings.resolve_participants(&*model)?;
        self.launch_process(model, &name, participants, Map::new()).await
    }

    /// Launch process `name` for `model`.
    ///
    /// Returns `Ok(None)` when processes are disabled for the model's type.
    /// After any launch that did not fail, the configured `event` is fired
    /// on the model and then the configured `state` is assigned.
    pub async fn launch_process(
        &self,
        model: &mut dyn ProcessModel,
        name: &str,
        participants: HashMap<String, ParticipantRef>,
        payload: Map<String, Value>,
    ) -> Result<Option<LaunchOutcome>, ConfigurationError> {
        let type_name = model.type_name().to_string();
        if !self.processes_enabled(&type_name) {
            info!(type_name = %type_name, process = name, "Processes disabled for model type, not launching");
            return Ok(None);
        }

        let mut fields = self.payload_for(&*model)?;
        fields.extend(payload);

        let mut process = Process::new(self.store.clone(), name, participants)?;
        let outcome = process.launch(self.queue.as_ref(), self.enabled, fields).await;

        if !outcome.is_failed() {
            if let Some(bindings) = self.bindings(&type_name) {
                after_launch(&bindings, model);
            }
        }

        Ok(Some(outcome))
    }

    /// Computed launch payload for `model`.
    pub fn payload_for(&self, model: &dyn ProcessModel) -> Result<Map<String, Value>, ConfigurationError> {
        let bindings = self.bindings(model.type_name());

        let mut payload = match &bindings {
            Some(bindings) => bindings.resolve_payload(model)?,
            None => Map::new(),
        };

        let check = bindings.as_ref().and_then(|b| b.provision_check_name());
        payload.insert("self_provision".to_string(), Value::Bool(self_provision(check, model)));

        payload.insert("model".to_string(), ModelRef::of(model).to_value());
        payload.insert("itag".to_string(), Value::String(object_participant_name(model)));

        Ok(payload)
    }

    pub fn processes_enabled(&self, type_name: &str) -> bool {
        self.flags.read().get(type_name).copied().unwrap_or(true)
    }

    pub fn enable_processes(&self, type_name: &str) {
        self.flags.write().insert(type_name.to_string(), true);
    }

    pub fn disable_processes(&self, type_name: &str) {
        self.flags.write().insert(type_name.to_string(), false);
    }

    /// Disable processes for `type_name` until the returned guard is dropped,
    /// then restore whatever the flag was before.
    pub fn disable_scope(&self, type_name: &str) -> ScopeGuard<Option<bool>, impl FnOnce(Option<bool>) + '_> {
        let type_name = type_name.to_string();
        let prior = self.flags.write().insert(type_name.clone(), false);

        scopeguard::guard(prior, move |prior| {
            let mut flags = self.flags.write();
            match prior {
                Some(flag) => flags.insert(type_name, flag),
                None => flags.remove(&type_name),
            };
        })
    }

    pub fn without_processes<R>(&self, type_name: &str, f: impl FnOnce() -> R) -> R {
        let _scope = self.disable_scope(type_name);
        f()
    }

    pub async fn without_processes_async<F: Future>(&self, type_name: &str, fut: F) -> F::Output {
        let _scope = self.disable_scope(type_name);
        fut.await
    }
}

/// `true` unless an initiator exists and answers the configured check.
fn self_provision(check: Option<&str>, model: &dyn ProcessModel) -> bool {
    match (check, model.process_initiator()) {
        (Some(check), Some(initiator)) => initiator.provision_check(check).unwrap_or(true),
        _ => true,
    }
}

fn after_launch(bindings: &LaunchBindings, model: &mut dyn ProcessModel) {
    if let Some(event) = bindings.post_launch_event() {
        if let Err(e) = model.fire_event(event) {
            warn!(type_name = model.type_name(), id = %model.id(), "{}", e);
        }
    }

    if let Some(state) = bindings.post_launch_state() {
        model.set_state(state);
    }
}

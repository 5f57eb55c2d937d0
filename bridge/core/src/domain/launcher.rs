// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Launcher Configuration
//!
//! Declarative mapping from a host model's lifecycle events to the processes
//! launched for it. A model type registers one [`LaunchBindings`] with the
//! [`ProcessLauncher`](crate::application::process_launcher::ProcessLauncher);
//! the bindings are read-only afterwards.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Resolver types, lifecycle bindings and the host model contract
//!
//! # Configuration keys
//!
//! | Key | Value |
//! |-----|-------|
//! | `create` / `update` / `save` / `destroy` | process name resolver |
//! | `participants` | resolver returning `{name: participant}` |
//! | `payload` | resolver returning a JSON object |
//! | `event` | event fired on the model after a launch |
//! | `state` | state assigned to the model after a launch |
//! | `provision_check` | initiator check feeding `self_provision` |

use crate::domain::participant::{Identifiable, ParticipantRef};
use serde::{Deserialize, Deserializer};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

/// Configuration problems. Raised eagerly and fatal to the operation.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    #[error("Invalid launcher configuration: {0}")]
    InvalidBindings(String),

    #[error("Participant {0} not found")]
    MissingParticipant(String),

    #[error("Could not find process definition {name} (looked in {path:?})")]
    DefinitionNotFound { name: String, path: PathBuf },

    #[error("Failed to read process definition {name}: {reason}")]
    DefinitionUnreadable { name: String, reason: String },

    #[error("Failed to render process definition {name}: {reason}")]
    Template { name: String, reason: String },
}

#[derive(Debug, Error)]
#[error("Model event '{event}' failed: {reason}")]
pub struct ModelEventError {
    pub event: String,
    pub reason: String,
}

/// The actor that triggered a change on a model.
pub trait Initiator: Send + Sync {
    /// Answer a provisioning check, `None` if this initiator has no such check.
    fn provision_check(&self, check: &str) -> Option<bool>;
}

/// Host model contract used by the launcher.
pub trait ProcessModel: Identifiable + Send + Sync {
    /// Read a named accessor (`Resolver::Accessor`).
    fn read(&self, accessor: &str) -> Option<Value>;

    /// Fire a lifecycle event, e.g. a state machine transition.
    fn fire_event(&mut self, event: &str) -> Result<(), ModelEventError>;

    /// Assign the state attribute directly, skipping validation and callbacks.
    fn set_state(&mut self, state: &str);

    /// Who started the change, if known.
    fn process_initiator(&self) -> Option<&dyn Initiator> {
        None
    }
}

/// Callback resolver signature.
pub type ResolverFn = dyn Fn(&dyn ProcessModel) -> Value + Send + Sync;

/// How a configuration value is obtained for a model instance.
#[derive(Clone)]
pub enum Resolver {
    Literal(Value),
    Accessor(String),
    Callback(Arc<ResolverFn>),
}

impl Resolver {
    pub fn literal(value: impl Into<Value>) -> Self {
        Self::Literal(value.into())
    }

    pub fn accessor(name: impl Into<String>) -> Self {
        Self::Accessor(name.into())
    }

    pub fn callback<F>(f: F) -> Self
    where
        F: Fn(&dyn ProcessModel) -> Value + Send + Sync + 'static,
    {
        Self::Callback(Arc::new(f))
    }
}

impl fmt::Debug for Resolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Literal(v) => f.debug_tuple("Literal").field(v).finish(),
            Self::Accessor(name) => f.debug_tuple("Accessor").field(name).finish(),
            Self::Callback(_) => f.write_str("Callback(..)"),
        }
    }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ResolverRepr {
    Accessor { accessor: String },
    Literal(Value),
}

impl<'de> Deserialize<'de> for Resolver {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        Ok(match ResolverRepr::deserialize(deserializer)? {
            ResolverRepr::Accessor { accessor } => Resolver::Accessor(accessor),
            ResolverRepr::Literal(value) => Resolver::Literal(value),
        })
    }
}

/// Resolve a configuration value for `model`. `None` when the resolver yields nothing.
pub fn resolve(resolver: &Resolver, model: &dyn ProcessModel) -> Option<Value> {
    let value = match resolver {
        Resolver::Literal(value) => value.clone(),
        Resolver::Accessor(name) => model.read(name)?,
        Resolver::Callback(callback) => callback(model),
    };

    (!value.is_null()).then_some(value)
}

/// Resolve a process name; blank or non-string values yield `None`.
pub fn resolve_name(resolver: &Resolver, model: &dyn ProcessModel) -> Option<String> {
    match resolve(resolver, model)? {
        Value::String(name) if !name.trim().is_empty() => Some(name),
        _ => None,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum LifecycleEvent {
    Create,
    Update,
    Save,
    Destroy,
}

impl LifecycleEvent {
    pub const ALL: [LifecycleEvent; 4] = [Self::Create, Self::Update, Self::Save, Self::Destroy];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Create => "create",
            Self::Update => "update",
            Self::Save => "save",
            Self::Destroy => "destroy",
        }
    }
}

impl fmt::Display for LifecycleEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per model type launch configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct LaunchBindings {
    #[serde(default)]
    create: Option<Resolver>,
    #[serde(default)]
    update: Option<Resolver>,
    #[serde(default)]
    save: Option<Resolver>,
    #[serde(default)]
    destroy: Option<Resolver>,
    #[serde(default)]
    participants: Option<Resolver>,
    #[serde(default)]
    payload: Option<Resolver>,
    #[serde(default)]
    event: Option<String>,
    #[serde(default)]
    state: Option<String>,
    #[serde(default)]
    provision_check: Option<String>,
}

impl LaunchBindings {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse bindings from configuration. Unknown keys are rejected.
    pub fn from_value(value: Value) -> Result<Self, ConfigurationError> {
        let bindings: Self = serde_json::from_value(value)
            .map_err(|e| ConfigurationError::InvalidBindings(e.to_string()))?;
        bindings.validate()?;
        Ok(bindings)
    }

    pub fn on(mut self, event: LifecycleEvent, process: Resolver) -> Self {
        *self.slot_mut(event) = Some(process);
        self
    }

    pub fn participants(mut self, resolver: Resolver) -> Self {
        self.participants = Some(resolver);
        self
    }

    pub fn payload(mut self, resolver: Resolver) -> Self {
        self.payload = Some(resolver);
        self
    }

    pub fn event(mut self, event: impl Into<String>) -> Self {
        self.event = Some(event.into());
        self
    }

    pub fn state(mut self, state: impl Into<String>) -> Self {
        self.state = Some(state.into());
        self
    }

    pub fn provision_check(mut self, check: impl Into<String>) -> Self {
        self.provision_check = Some(check.into());
        self
    }

    fn slot_mut(&mut self, event: LifecycleEvent) -> &mut Option<Resolver> {
        match event {
            LifecycleEvent::Create => &mut self.create,
            LifecycleEvent::Update => &mut self.update,
            LifecycleEvent::Save => &mut self.save,
            LifecycleEvent::Destroy => &mut self.destroy,
        }
    }

    pub fn process_for(&self, event: LifecycleEvent) -> Option<&Resolver> {
        match event {
            LifecycleEvent::Create => self.create.as_ref(),
            LifecycleEvent::Update => self.update.as_ref(),
            LifecycleEvent::Save => self.save.as_ref(),
            LifecycleEvent::Destroy => self.destroy.as_ref(),
        }
    }

    pub fn bound_events(&self) -> Vec<LifecycleEvent> {
        LifecycleEvent::ALL
            .into_iter()
            .filter(|e| self.process_for(*e).is_some())
            .collect()
    }

    pub fn participants_resolver(&self) -> Option<&Resolver> {
        self.participants.as_ref()
    }

    pub fn payload_resolver(&self) -> Option<&Resolver> {
        self.payload.as_ref()
    }

    pub fn post_launch_event(&self) -> Option<&str> {
        self.event.as_deref()
    }

    pub fn post_launch_state(&self) -> Option<&str> {
        self.state.as_deref()
    }

    pub fn provision_check_name(&self) -> Option<&str> {
        self.provision_check.as_deref()
    }

    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.bound_events().is_empty() {
            return Err(ConfigurationError::InvalidBindings(
                "at least one of create, update, save or destroy must be bound".to_string(),
            ));
        }
        for (key, value) in [("event", &self.event), ("state", &self.state), ("provision_check", &self.provision_check)] {
            if matches!(value, Some(v) if v.trim().is_empty()) {
                return Err(ConfigurationError::InvalidBindings(format!("'{}' must not be blank", key)));
            }
        }
        Ok(())
    }

    /// Participants for `model`, `{}` when no resolver is configured.
    pub fn resolve_participants(
        &self,
        model: &dyn ProcessModel,
    ) -> Result<HashMap<String, ParticipantRef>, ConfigurationError> {
        let Some(value) = self.participants.as_ref().and_then(|r| resolve(r, model)) else {
            return Ok(HashMap::new());
        };

        serde_json::from_value(value).map_err(|e| {
            ConfigurationError::InvalidBindings(format!("participants must map names to participants: {}", e))
        })
    }

    /// Payload resolver output, `{}` when none is configured.
    pub fn resolve_payload(&self, model: &dyn ProcessModel) -> Result<Map<String, Value>, ConfigurationError> {
        match self.payload.as_ref().and_then(|r| resolve(r, model)) {
            None => Ok(Map::new()),
            Some(Value::Object(map)) => Ok(map),
            Some(other) => Err(ConfigurationError::InvalidBindings(format!(
                "payload must be a JSON object, got {}",
                other
            ))),
        }
    }
}

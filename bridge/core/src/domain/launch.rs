// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Launch Descriptor
//!
//! A process launch is handed to the job queue as a self-contained record:
//! the rendered definition text and the JSON-encoded payload. Once queued the
//! descriptor is never re-read from the originating model.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Serializable launch request and its outcome

use crate::domain::participant::ParticipantRef;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

/// Identifier assigned to a descriptor when it is queued.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub Uuid);

impl JobId {
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

/// `POST /processes` request body, prepared ahead of time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LaunchDescriptor {
    pub job_id: JobId,
    /// Name of the definition the text was rendered from
    #[serde(default)]
    pub process: String,
    #[serde(default)]
    pub participants: HashMap<String, ParticipantRef>,
    /// Process definition text, templates already rendered
    pub process_def: String,
    /// JSON-encoded launch payload
    pub fields: String,
}

impl LaunchDescriptor {
    pub fn new(process_def: impl Into<String>, fields: &Map<String, Value>) -> Result<Self, serde_json::Error> {
        Ok(Self {
            job_id: JobId::new(),
            process: String::new(),
            participants: HashMap::new(),
            process_def: process_def.into(),
            fields: serde_json::to_string(fields)?,
        })
    }

    /// Record which definition and participants the launch came from.
    pub fn for_process(mut self, process: impl Into<String>, participants: HashMap<String, ParticipantRef>) -> Self {
        self.process = process.into();
        self.participants = participants;
        self
    }

    /// Decoded launch payload.
    pub fn payload(&self) -> Result<Map<String, Value>, serde_json::Error> {
        serde_json::from_str(&self.fields)
    }
}

/// Result of asking for a launch. Never an error: failures are recorded here.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum LaunchOutcome {
    Enqueued { job_id: JobId },
    /// The bridge is administratively disabled; nothing was queued.
    Disabled,
    Failed { reason: String },
}

impl LaunchOutcome {
    pub fn is_failed(&self) -> bool {
        matches!(self, Self::Failed { .. })
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::Enqueued { .. } => "enqueued",
            Self::Disabled => "disabled",
            Self::Failed { .. } => "failed",
        }
    }
}

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Host Seams
//!
//! The bridge depends on two narrow collaborator interfaces supplied by the
//! host application:
//!
//! | Trait | Purpose | Implementations |
//! |-------|---------|----------------|
//! | `JobQueue` | submit-and-forget, at-least-once execution of launch descriptors | `InMemoryJobQueue` |
//! | `ModelStore` | find and update the host models work items refer to | host application |
//!
//! Concrete implementations are selected when the bridge is wired together;
//! the in-memory queue is used by the CLI and by tests.

use async_trait::async_trait;
use crate::domain::launch::{JobId, LaunchDescriptor};
use crate::domain::launcher::ProcessModel;
use crate::domain::work_item::ModelRef;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Job queue is closed")]
    Closed,

    #[error("Job queue rejected descriptor: {0}")]
    Rejected(String),
}

/// Asynchronous job queue. No result channel: callers never observe execution.
#[async_trait]
pub trait JobQueue: Send + Sync {
    async fn enqueue(&self, descriptor: LaunchDescriptor) -> Result<JobId, QueueError>;
}

#[derive(Debug, Error)]
pub enum ModelStoreError {
    #[error("Unknown model class: {0}")]
    UnknownClass(String),

    /// The update was rejected; the messages are shown to the user.
    #[error("Validation failed: {}", .0.join(", "))]
    Validation(Vec<String>),

    #[error("Model store error: {0}")]
    Backend(String),
}

/// Host models referenced from work item payloads.
#[async_trait]
pub trait ModelStore: Send + Sync {
    /// Find the model, `Ok(None)` when it no longer exists.
    async fn find(&self, model: &ModelRef) -> Result<Option<Box<dyn ProcessModel>>, ModelStoreError>;

    /// Apply attribute changes and persist the model.
    async fn update(
        &self,
        model: &mut dyn ProcessModel,
        changes: &Map<String, Value>,
    ) -> Result<(), ModelStoreError>;
}

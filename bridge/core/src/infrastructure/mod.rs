// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod ruote_client;
pub mod job_queue;
pub mod process_definitions;
pub mod definition_template_engine;

pub use job_queue::{InMemoryJobQueue, LaunchExecutor, LaunchWorker, WorkerStats};
pub use ruote_client::{RuoteClient, RuoteError};

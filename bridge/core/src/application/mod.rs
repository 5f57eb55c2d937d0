// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod process;
pub mod process_launcher;
pub mod jobs;

// Re-export use cases for convenience
pub use process::Process;
pub use process_launcher::ProcessLauncher;
pub use jobs::{Audience, JobUpdate, JobUpdateRequest, JobsError, JobsService};

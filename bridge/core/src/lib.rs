// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Lib
//!
//! Workflow client and process-launch coordination for a ruote-rest engine.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain, application services, engine adapters and JSON API

pub mod domain;
pub mod application;
pub mod infrastructure;
pub mod presentation;

#[cfg(any(test, feature = "test-util"))]
pub mod testing;

pub use domain::*;

// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Presentation Layer (`ruote-bridge-core`)
//!
//! JSON surface over the jobs use cases. No business logic lives here;
//! handlers delegate to [`crate::application::jobs::JobsService`].
//!
//! | Module | Transport | Description |
//! |--------|-----------|-------------|
//! | [`api`] | HTTP (Axum) | Work list, work item detail, processing, visualization |

pub mod api;

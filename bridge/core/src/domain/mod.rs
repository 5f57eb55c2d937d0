// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Mod
//!
//! Work items, identifiers, launch bindings and the host seams.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Types shared by every other layer

pub mod config;
pub mod identifier;
pub mod launch;
pub mod launcher;
pub mod participant;
pub mod repository;
pub mod work_item;

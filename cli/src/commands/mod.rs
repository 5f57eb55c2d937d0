// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the ruote-bridge CLI

pub mod config;
pub mod launch;
pub mod serve;
pub mod workitems;

pub use self::config::ConfigCommand;
pub use self::launch::LaunchArgs;
pub use self::serve::ServeArgs;
pub use self::workitems::WorkItemsCommand;

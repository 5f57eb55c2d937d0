// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Definition Template Engine
//!
//! Renders templated process definitions (`*.hbs`) with Handlebars before
//! they are sent to the engine.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Substitute launch data into process definition templates
//! - **Integration:** ProcessDefinitionStore → LaunchDescriptor.process_def
//!
//! # Template Data
//!
//! - `{{fields.<key>}}` - launch payload values
//! - `{{participants.<name>}}` - participant names, dashes replaced by underscores
//!
//! # Usage
//!
//! ```ignore
//! let engine = DefinitionTemplateEngine::new();
//! let definition = engine.render(
//!     "<participant ref=\"{{participants.approver}}\"/>",
//!     &context,
//! )?;
//! ```

use anyhow::{Context, Result};
use handlebars::Handlebars;
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;

/// Data made available to a definition template
#[derive(Debug, Clone, Default, Serialize)]
pub struct DefinitionContext {
    pub fields: Map<String, Value>,
    pub participants: HashMap<String, String>,
}

impl DefinitionContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fields(mut self, fields: Map<String, Value>) -> Self {
        self.fields = fields;
        self
    }

    pub fn participant(mut self, name: impl Into<String>, engine_name: impl Into<String>) -> Self {
        self.participants.insert(name.into(), engine_name.into());
        self
    }
}

pub struct DefinitionTemplateEngine {
    handlebars: Handlebars<'static>,
}

impl DefinitionTemplateEngine {
    pub fn new() -> Self {
        let mut handlebars = Handlebars::new();

        // Unknown participants must fail the render rather than produce an empty ref
        handlebars.set_strict_mode(true);
        // Definitions are XML/Ruby DSL, not HTML
        handlebars.register_escape_fn(handlebars::no_escape);

        Self { handlebars }
    }

    pub fn render(&self, template: &str, context: &DefinitionContext) -> Result<String> {
        self.handlebars
            .render_template(template, context)
            .context("Failed to render process definition template")
    }

    /// Validate template syntax without rendering
    pub fn validate_template(&self, template: &str) -> Result<()> {
        handlebars::template::Template::compile(template)
            .map(|_| ())
            .context("Invalid Handlebars template syntax")
    }
}

impl Default for DefinitionTemplateEngine {
    fn default() -> Self {
        Self::new()
    }
}

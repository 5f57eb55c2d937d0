// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Process Definition Store
//!
//! Resolves process definitions by name from a single directory. A name
//! `N` resolves to `N.hbs` (a template) when that file exists, otherwise to
//! `N` itself. Names already ending in `.hbs` are always templates.
//!
//! # Architecture
//!
//! - **Layer:** Infrastructure
//! - **Purpose:** Locate, read and render process definitions

use crate::domain::launcher::ConfigurationError;
use crate::infrastructure::definition_template_engine::{DefinitionContext, DefinitionTemplateEngine};
use std::path::{Component, Path, PathBuf};

const TEMPLATE_EXTENSION: &str = ".hbs";

/// A definition located on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DefinitionSource {
    /// Name as resolved, including the template extension when templated
    pub name: String,
    pub path: PathBuf,
    pub templated: bool,
}

pub struct ProcessDefinitionStore {
    root: PathBuf,
    engine: DefinitionTemplateEngine,
}

impl ProcessDefinitionStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            engine: DefinitionTemplateEngine::new(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Find the definition called `name`.
    pub fn locate(&self, name: &str) -> Result<DefinitionSource, ConfigurationError> {
        let not_found = || ConfigurationError::DefinitionNotFound {
            name: name.to_string(),
            path: self.root.join(name),
        };

        // Names are file names relative to the root, never paths out of it
        let relative = Path::new(name);
        if name.is_empty()
            || relative
                .components()
                .any(|c| !matches!(c, Component::Normal(_)))
        {
            return Err(not_found());
        }

        if name.ends_with(TEMPLATE_EXTENSION) {
            let path = self.root.join(name);
            return if path.is_file() {
                Ok(DefinitionSource { name: name.to_string(), path, templated: true })
            } else {
                Err(not_found())
            };
        }

        let template_name = format!("{}{}", name, TEMPLATE_EXTENSION);
        let template_path = self.root.join(&template_name);
        if template_path.is_file() {
            return Ok(DefinitionSource { name: template_name, path: template_path, templated: true });
        }

        let path = self.root.join(name);
        if path.is_file() {
            return Ok(DefinitionSource { name: name.to_string(), path, templated: false });
        }

        Err(not_found())
    }

    /// Read the definition, rendering it when it is a template.
    pub fn render(
        &self,
        source: &DefinitionSource,
        context: &DefinitionContext,
    ) -> Result<String, ConfigurationError> {
        let text = std::fs::read_to_string(&source.path).map_err(|e| {
            ConfigurationError::DefinitionUnreadable {
                name: source.name.clone(),
                reason: e.to_string(),
            }
        })?;

        if !source.templated {
            return Ok(text);
        }

        self.engine
            .render(&text, context)
            .map_err(|e| ConfigurationError::Template {
                name: source.name.clone(),
                reason: format!("{:#}", e),
            })
    }

    /// Syntax-check every template under the root, sorted by name.
    ///
    /// Returns the number of templates checked, or the first failures.
    pub fn check_templates(&self) -> Result<usize, Vec<ConfigurationError>> {
        let entries = std::fs::read_dir(&self.root).map_err(|e| {
            vec![ConfigurationError::DefinitionUnreadable {
                name: self.root.display().to_string(),
                reason: e.to_string(),
            }]
        })?;

        let mut names: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.path().is_file())
            .filter_map(|entry| entry.file_name().into_string().ok())
            .filter(|name| name.ends_with(TEMPLATE_EXTENSION))
            .collect();
        names.sort();

        let failures: Vec<ConfigurationError> = names
            .iter()
            .filter_map(|name| {
                let text = match std::fs::read_to_string(self.root.join(name)) {
                    Ok(text) => text,
                    Err(e) => {
                        return Some(ConfigurationError::DefinitionUnreadable {
                            name: name.clone(),
                            reason: e.to_string(),
                        })
                    }
                };
                self.engine
                    .validate_template(&text)
                    .err()
                    .map(|e| ConfigurationError::Template {
                        name: name.clone(),
                        reason: format!("{:#}", e),
                    })
            })
            .collect();

        if failures.is_empty() {
            Ok(names.len())
        } else {
            Err(failures)
        }
    }
}

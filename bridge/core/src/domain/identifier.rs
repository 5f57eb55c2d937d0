// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Work Item Identifier Codec
//!
//! A work item is addressed by the engine through two ids: the workflow
//! instance id and the expression id (a dotted position such as `0.0.1`).
//! Web routes and engine URLs carry both as a single string:
//!
//! ```text
//! {workflow_instance_id}/{expression_id with '.' replaced by '_'}
//! ```
//!
//! optionally percent-escaped so it fits inside one URL path segment.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Encode/decode composite work item ids

use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, CONTROLS};
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Separator between the workflow instance id and the expression id.
pub const PATH_SEPARATOR: char = '/';

/// Characters escaped when an id is embedded in a single path segment.
const SEGMENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'%')
    .add(b'/')
    .add(b'.')
    .add(b'?')
    .add(b'#');

/// Characters escaped in each component of an engine resource path.
const COMPONENT: &AsciiSet = &CONTROLS
    .add(b' ')
    .add(b'%')
    .add(b'/')
    .add(b'?')
    .add(b'#');

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("Malformed work item id: {0}")]
    MalformedId(String),
}

/// Join a workflow instance id and an expression id into the URL form.
///
/// # Examples
/// ```
/// use ruote_bridge_core::domain::identifier::encode_url_id;
///
/// assert_eq!(encode_url_id("20081225-christmas", "0.0.0", false), "20081225-christmas/0_0_0");
/// assert_eq!(encode_url_id("20081225-christmas", "0.0.0", true), "20081225-christmas%2F0_0_0");
/// ```
pub fn encode_url_id(workflow_instance_id: &str, expression_id: &str, escape: bool) -> String {
    let joined = format!(
        "{}{}{}",
        workflow_instance_id,
        PATH_SEPARATOR,
        expression_id.replace('.', "_")
    );

    if escape {
        utf8_percent_encode(&joined, SEGMENT).to_string()
    } else {
        joined
    }
}

/// Undo [`encode_url_id`].
///
/// With `keep_underscore` the expression id stays in URL form (`0_0_0`),
/// otherwise it is returned in engine form (`0.0.0`). Input without a
/// separator is only percent-decoded.
pub fn decode_url_id(encoded: &str, keep_underscore: bool) -> String {
    normalize_expression(&percent_decode_str(encoded).decode_utf8_lossy(), keep_underscore)
}

fn normalize_expression(id: &str, keep_underscore: bool) -> String {
    match id.split_once(PATH_SEPARATOR) {
        Some((instance, expression)) => {
            let expression = if keep_underscore {
                expression.replace('.', "_")
            } else {
                expression.replace('_', ".")
            };
            format!("{}{}{}", instance, PATH_SEPARATOR, expression)
        }
        None => id.to_string(),
    }
}

/// Escape one component of an engine resource path.
pub fn escape_component(component: &str) -> String {
    utf8_percent_encode(component, COMPONENT).to_string()
}

/// Parsed composite id of a work item, expression id in engine form.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct WorkItemId {
    pub workflow_instance_id: String,
    pub expression_id: String,
}

impl WorkItemId {
    pub fn new(workflow_instance_id: impl Into<String>, expression_id: impl Into<String>) -> Self {
        Self {
            workflow_instance_id: workflow_instance_id.into(),
            expression_id: expression_id.into(),
        }
    }

    /// Parse any of the accepted encodings (escaped or not, dots or underscores).
    ///
    /// An id that already contains the separator has been decoded once (by
    /// the router, for instance) and is not percent-decoded again.
    pub fn parse(encoded: &str) -> Result<Self, IdentifierError> {
        let decoded = if encoded.contains(PATH_SEPARATOR) {
            normalize_expression(encoded, false)
        } else {
            decode_url_id(encoded, false)
        };

        let (instance, expression) = decoded
            .split_once(PATH_SEPARATOR)
            .ok_or_else(|| IdentifierError::MalformedId(encoded.to_string()))?;

        if instance.is_empty() || expression.is_empty() {
            return Err(IdentifierError::MalformedId(encoded.to_string()));
        }

        Ok(Self::new(instance, expression))
    }

    /// Path used by the engine's `/workitems/...` resource.
    pub fn url_path(&self) -> String {
        encode_url_id(&self.workflow_instance_id, &self.expression_id, false)
    }

    /// `{wfid}/{expid}` for engine resource URLs, each component escaped.
    pub fn engine_path(&self) -> String {
        format!(
            "{}{}{}",
            escape_component(&self.workflow_instance_id),
            PATH_SEPARATOR,
            escape_component(&self.expression_id.replace('.', "_"))
        )
    }

    /// Single-segment form for web routes.
    pub fn to_param(&self) -> String {
        encode_url_id(&self.workflow_instance_id, &self.expression_id, true)
    }
}

impl fmt::Display for WorkItemId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}{}", self.workflow_instance_id, PATH_SEPARATOR, self.expression_id)
    }
}

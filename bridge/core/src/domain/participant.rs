// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Participant Naming
//!
//! The engine routes work items to participants by name. Names are either
//! roles (`dialup_admin` becomes `dialup-admin`) or derived from a domain
//! object (`Account` #42 becomes `account-42`).
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Derive dynamic participant names

use serde::{Deserialize, Serialize};
use std::fmt;

/// Anything with a type name and a primary key.
pub trait Identifiable {
    fn type_name(&self) -> &str;
    fn id(&self) -> String;
}

/// A participant reference, either a plain role name or a domain object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ParticipantRef {
    Name(String),
    Object { type_name: String, id: String },
}

impl ParticipantRef {
    pub fn object(object: &dyn Identifiable) -> Self {
        Self::Object {
            type_name: object.type_name().to_string(),
            id: object.id(),
        }
    }

    /// Name used by the engine for this participant.
    pub fn engine_name(&self) -> String {
        match self {
            Self::Name(name) => dasherize(name),
            Self::Object { type_name, id } => object_name(type_name, id),
        }
    }
}

impl From<&str> for ParticipantRef {
    fn from(name: &str) -> Self {
        Self::Name(name.to_string())
    }
}

impl From<String> for ParticipantRef {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

impl From<&dyn Identifiable> for ParticipantRef {
    fn from(object: &dyn Identifiable) -> Self {
        Self::object(object)
    }
}

impl fmt::Display for ParticipantRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.engine_name())
    }
}

/// Replace underscores with dashes.
pub fn dasherize(name: &str) -> String {
    name.replace('_', "-")
}

/// `{type}-{id}`, lowercased.
pub fn object_name(type_name: &str, id: &str) -> String {
    format!("{}-{}", type_name, id).to_lowercase()
}

/// Participant name for anything identifiable (also used as the payload `itag`).
pub fn object_participant_name(object: &dyn Identifiable) -> String {
    object_name(object.type_name(), &object.id())
}

/// `CamelCase`/dashed names to `snake_case`, used to derive view names.
///
/// Acronym runs end before their last capital: `HTTPServer` gives `http_server`.
pub fn underscore(name: &str) -> String {
    let chars: Vec<char> = name.chars().collect();
    let mut out = String::with_capacity(name.len() + 4);

    for (i, &c) in chars.iter().enumerate() {
        if c == '-' || c == ' ' {
            out.push('_');
        } else if c.is_uppercase() {
            let prev = i.checked_sub(1).map(|p| chars[p]);
            let next = chars.get(i + 1);
            let after_word = prev.is_some_and(|p| p.is_lowercase() || p.is_ascii_digit());
            let ends_acronym = prev.is_some_and(char::is_uppercase) && next.is_some_and(|n| n.is_lowercase());
            if after_word || ends_acronym {
                out.push('_');
            }
            out.extend(c.to_lowercase());
        } else {
            out.push(c);
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Account(u64);

    impl Identifiable for Account {
        fn type_name(&self) -> &str {
            "Account"
        }

        fn id(&self) -> String {
            self.0.to_string()
        }
    }

    #[test]
    fn test_role_names_are_dasherized() {
        assert_eq!(ParticipantRef::from("dialup_admin").engine_name(), "dialup-admin");
        assert_eq!(ParticipantRef::from("sales").engine_name(), "sales");
    }

    #[test]
    fn test_object_names() {
        let account = Account(42);
        let participant = ParticipantRef::object(&account);
        assert_eq!(participant.engine_name(), "account-42");
        assert_eq!(object_participant_name(&account), "account-42");
    }

    #[test]
    fn test_underscore() {
        assert_eq!(underscore("ProvisionDialup"), "provision_dialup");
        assert_eq!(underscore("provision-dialup"), "provision_dialup");
        assert_eq!(underscore("already_snake"), "already_snake");
        assert_eq!(underscore("HTTPServer"), "http_server");
        assert_eq!(underscore("ADSLProvision"), "adsl_provision");
        assert_eq!(underscore("ProvisionADSL"), "provision_adsl");
        assert_eq!(underscore("ADSL"), "adsl");
    }
}

//! Shared datatypes used across resources.
//!
//! A deliberately small subset of the FHIR datatypes: just what the
//! Organization/Endpoint/HealthcareService/Consent/VerificationResult graph
//! needs, with camelCase wire names.

use serde::{Deserialize, Serialize};

use crate::reference::Reference;

/// A `{system, value}` identifier.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identifier {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub value: String,
}

impl Identifier {
    /// Creates an identifier under a system.
    pub fn new(system: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            value: value.into(),
        }
    }

    /// Formats as the token form `system|value` (or bare `value`).
    #[must_use]
    pub fn token(&self) -> String {
        match &self.system {
            Some(system) => format!("{system}|{}", self.value),
            None => self.value.clone(),
        }
    }

    /// Matches a search token: `system|value` requires both to match,
    /// a bare `value` matches on value alone.
    #[must_use]
    pub fn matches_token(&self, token: &str) -> bool {
        match token.split_once('|') {
            Some((system, value)) => {
                self.system.as_deref() == Some(system) && self.value == value
            }
            None => self.value == token,
        }
    }
}

/// A `{system, code}` coding.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coding {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display: Option<String>,
}

impl Coding {
    /// Creates a coding under a system.
    pub fn new(system: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            system: Some(system.into()),
            code: code.into(),
            display: None,
        }
    }

    /// Matches a search token the same way `Identifier::matches_token` does.
    #[must_use]
    pub fn matches_token(&self, token: &str) -> bool {
        match token.split_once('|') {
            Some((system, code)) => self.system.as_deref() == Some(system) && self.code == code,
            None => self.code == token,
        }
    }
}

/// A codeable concept: one or more codings plus optional text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CodeableConcept {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub coding: Vec<Coding>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

impl CodeableConcept {
    /// Single-coding concept.
    pub fn of(coding: Coding) -> Self {
        Self {
            coding: vec![coding],
            text: None,
        }
    }

    /// Returns `true` if any coding carries `code` under `system`.
    #[must_use]
    pub fn has_coding(&self, system: &str, code: &str) -> bool {
        self.coding
            .iter()
            .any(|c| c.system.as_deref() == Some(system) && c.code == code)
    }
}

/// An extension node. Only the value kinds the platform uses are modeled.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Extension {
    pub url: String,
    #[serde(rename = "valueString", skip_serializing_if = "Option::is_none")]
    pub value_string: Option<String>,
    #[serde(rename = "valueReference", skip_serializing_if = "Option::is_none")]
    pub value_reference: Option<Reference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extension: Vec<Extension>,
}

impl Extension {
    /// A string-valued extension.
    pub fn string(url: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            value_string: Some(value.into()),
            value_reference: None,
            extension: Vec::new(),
        }
    }

    /// A reference-valued extension.
    pub fn reference(url: impl Into<String>, value: Reference) -> Self {
        Self {
            url: url.into(),
            value_string: None,
            value_reference: Some(value),
            extension: Vec::new(),
        }
    }

    /// A complex extension wrapping nested extensions.
    pub fn complex(url: impl Into<String>, nested: Vec<Extension>) -> Self {
        Self {
            url: url.into(),
            value_string: None,
            value_reference: None,
            extension: nested,
        }
    }
}

/// Finds the first extension with `url` in a slice.
#[must_use]
pub fn find_extension<'a>(extensions: &'a [Extension], url: &str) -> Option<&'a Extension> {
    extensions.iter().find(|e| e.url == url)
}

/// Resource metadata; only the tag list is used by this platform.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct Meta {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub tag: Vec<Coding>,
}

impl Meta {
    /// Returns `true` if no tags are present.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tag.is_empty()
    }

    /// Returns `true` if a tag with `code` under `system` is present.
    #[must_use]
    pub fn has_tag(&self, system: &str, code: &str) -> bool {
        self.tag
            .iter()
            .any(|t| t.system.as_deref() == Some(system) && t.code == code)
    }

    /// Replaces any tag under `system` with the given code.
    pub fn set_tag(&mut self, system: &str, code: &str) {
        self.tag.retain(|t| t.system.as_deref() != Some(system));
        self.tag.push(Coding::new(system, code));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identifier_token_matching() {
        let id = Identifier::new("http://sys", "123");
        assert!(id.matches_token("http://sys|123"));
        assert!(id.matches_token("123"));
        assert!(!id.matches_token("http://other|123"));
        assert!(!id.matches_token("456"));
        assert_eq!(id.token(), "http://sys|123");
    }

    #[test]
    fn identifier_without_system() {
        let id = Identifier {
            system: None,
            value: "123".into(),
        };
        assert!(id.matches_token("123"));
        assert!(!id.matches_token("http://sys|123"));
        assert_eq!(id.token(), "123");
    }

    #[test]
    fn concept_coding_lookup() {
        let concept = CodeableConcept::of(Coding::new("http://sys", "source"));
        assert!(concept.has_coding("http://sys", "source"));
        assert!(!concept.has_coding("http://sys", "pcm"));
    }

    #[test]
    fn meta_tag_replacement() {
        let mut meta = Meta::default();
        meta.set_tag("http://tags", "catalog");
        assert!(meta.has_tag("http://tags", "catalog"));
        meta.set_tag("http://tags", "instance");
        assert!(meta.has_tag("http://tags", "instance"));
        assert!(!meta.has_tag("http://tags", "catalog"));
        assert_eq!(meta.tag.len(), 1);
    }

    #[test]
    fn extension_nesting_round_trips() {
        let ext = Extension::complex(
            "http://ext/certs",
            vec![Extension::string("thumbprint", "abc")],
        );
        let json = serde_json::to_value(&ext).unwrap();
        assert_eq!(json["extension"][0]["valueString"], "abc");
        let back: Extension = serde_json::from_value(json).unwrap();
        assert_eq!(back, ext);
    }
}

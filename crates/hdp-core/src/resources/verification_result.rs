//! VerificationResult: attestation records about platform resources.

use serde::{Deserialize, Serialize};

use crate::reference::Reference;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ValidatorAttestation {
    pub organization: Reference,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult {
    #[serde(default)]
    pub id: String,
    #[serde(default = "default_status")]
    pub status: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub target: Vec<Reference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub validator: Vec<ValidatorAttestation>,
}

fn default_status() -> String {
    "validated".to_string()
}

impl VerificationResult {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            status: default_status(),
            target: Vec::new(),
            validator: Vec::new(),
        }
    }

    /// Returns `true` if no validator attestation is present.
    #[must_use]
    pub fn needs_default_validator(&self) -> bool {
        self.validator.is_empty()
    }
}

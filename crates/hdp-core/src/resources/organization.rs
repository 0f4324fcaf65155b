//! Organization: parent orgs, service providers, data sources, and the PCM
//! administrative organization itself.

use serde::{Deserialize, Serialize};

use crate::reference::Reference;
use crate::terminology::{
    EXT_APPLICABLE_CERTIFICATES, EXT_THUMBPRINT, ORG_TYPE_PCM, ORG_TYPE_SERVICE_PROVIDER,
    ORG_TYPE_SOURCE, SYS_ORG_TYPE,
};
use crate::types::{CodeableConcept, Coding, Extension, Identifier, find_extension};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Organization {
    #[serde(default)]
    pub id: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifier: Vec<Identifier>,
    #[serde(rename = "type", default, skip_serializing_if = "Vec::is_empty")]
    pub r#type: Vec<CodeableConcept>,
    #[serde(rename = "partOf", skip_serializing_if = "Option::is_none")]
    pub part_of: Option<Reference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoint: Vec<Reference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extension: Vec<Extension>,
}

fn default_active() -> bool {
    true
}

impl Organization {
    /// Creates an active organization with a name and no type codings.
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            active: true,
            name: Some(name.into()),
            identifier: Vec::new(),
            r#type: Vec::new(),
            part_of: None,
            endpoint: Vec::new(),
            extension: Vec::new(),
        }
    }

    /// Adds a PCM organization-type coding.
    #[must_use]
    pub fn with_org_type(mut self, code: &str) -> Self {
        self.r#type
            .push(CodeableConcept::of(Coding::new(SYS_ORG_TYPE, code)));
        self
    }

    /// Returns `true` if the organization carries the given PCM type code.
    #[must_use]
    pub fn has_org_type(&self, code: &str) -> bool {
        self.r#type.iter().any(|t| t.has_coding(SYS_ORG_TYPE, code))
    }

    /// The PCM administrative organization.
    #[must_use]
    pub fn is_pcm(&self) -> bool {
        self.has_org_type(ORG_TYPE_PCM)
    }

    /// A Data Source organization.
    #[must_use]
    pub fn is_source(&self) -> bool {
        self.has_org_type(ORG_TYPE_SOURCE)
    }

    /// A Service Provider organization.
    #[must_use]
    pub fn is_service_provider(&self) -> bool {
        self.has_org_type(ORG_TYPE_SERVICE_PROVIDER)
    }

    /// Certificate thumbprints from the applicable-certificates extension.
    #[must_use]
    pub fn applicable_thumbprints(&self) -> Vec<&str> {
        thumbprints_of(&self.extension)
    }

    /// The reference other resources use to point at this organization.
    #[must_use]
    pub fn reference(&self) -> Reference {
        Reference::to("Organization", &self.id)
    }
}

/// Extracts thumbprint values from an applicable-certificates extension.
#[must_use]
pub(crate) fn thumbprints_of(extensions: &[Extension]) -> Vec<&str> {
    find_extension(extensions, EXT_APPLICABLE_CERTIFICATES)
        .map(|ext| {
            ext.extension
                .iter()
                .filter(|nested| nested.url == EXT_THUMBPRINT)
                .filter_map(|nested| nested.value_string.as_deref())
                .collect()
        })
        .unwrap_or_default()
}

//! HealthcareService: catalog templates and SP-owned instances.
//!
//! A `catalog` service is a PCM-managed template carrying a catalog
//! identifier. An `instance` is owned by an SP organization and linked to a
//! catalog via the based-on-canonical extension; instances created without an
//! explicit link get an auto-created catalog twin.

use serde::{Deserialize, Serialize};

use crate::reference::Reference;
use crate::terminology::{
    EXT_BASED_ON_CANONICAL, SYS_META_TAG, SYS_SERVICE_CATALOG_ID, TAG_CATALOG, TAG_INSTANCE,
};
use crate::types::{CodeableConcept, Extension, Identifier, Meta, find_extension};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthcareService {
    #[serde(default)]
    pub id: String,
    #[serde(default, skip_serializing_if = "Meta::is_empty")]
    pub meta: Meta,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active: Option<bool>,
    #[serde(rename = "providedBy", skip_serializing_if = "Option::is_none")]
    pub provided_by: Option<Reference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub identifier: Vec<Identifier>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub category: Vec<CodeableConcept>,
    #[serde(rename = "type", default, skip_serializing_if = "Vec::is_empty")]
    pub r#type: Vec<CodeableConcept>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extension: Vec<Extension>,
}

impl HealthcareService {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            meta: Meta::default(),
            active: None,
            provided_by: None,
            identifier: Vec::new(),
            category: Vec::new(),
            r#type: Vec::new(),
            name: None,
            extension: Vec::new(),
        }
    }

    #[must_use]
    pub fn is_catalog(&self) -> bool {
        self.meta.has_tag(SYS_META_TAG, TAG_CATALOG)
    }

    #[must_use]
    pub fn is_instance(&self) -> bool {
        self.meta.has_tag(SYS_META_TAG, TAG_INSTANCE)
    }

    /// Tags the service as a catalog template.
    pub fn tag_catalog(&mut self) {
        self.meta.set_tag(SYS_META_TAG, TAG_CATALOG);
    }

    /// Tags the service as an SP-owned instance.
    pub fn tag_instance(&mut self) {
        self.meta.set_tag(SYS_META_TAG, TAG_INSTANCE);
    }

    /// The catalog identifier value, if one is present.
    #[must_use]
    pub fn catalog_identifier(&self) -> Option<&str> {
        self.identifier
            .iter()
            .find(|i| i.system.as_deref() == Some(SYS_SERVICE_CATALOG_ID))
            .map(|i| i.value.as_str())
    }

    /// Assigns a catalog identifier, replacing any existing one.
    pub fn set_catalog_identifier(&mut self, value: impl Into<String>) {
        self.identifier
            .retain(|i| i.system.as_deref() != Some(SYS_SERVICE_CATALOG_ID));
        self.identifier
            .push(Identifier::new(SYS_SERVICE_CATALOG_ID, value));
    }

    /// The canonical (catalog) service this instance is based on.
    #[must_use]
    pub fn based_on_canonical(&self) -> Option<&Reference> {
        find_extension(&self.extension, EXT_BASED_ON_CANONICAL)
            .and_then(|e| e.value_reference.as_ref())
    }

    /// Links this instance to a canonical service.
    pub fn set_based_on_canonical(&mut self, canonical: Reference) {
        self.extension.retain(|e| e.url != EXT_BASED_ON_CANONICAL);
        self.extension
            .push(Extension::reference(EXT_BASED_ON_CANONICAL, canonical));
    }

    /// Returns `true` if this instance is provided by `Organization/{id}`.
    #[must_use]
    pub fn is_provided_by(&self, organization_id: &str) -> bool {
        self.provided_by
            .as_ref()
            .is_some_and(|r| r.points_to("Organization", organization_id))
    }
}

//! Endpoint: a Data Source's resource-server address.
//!
//! The `address` is the canonical audience string: token requests name it as
//! the RFC 8707 resource indicator, and introspection binds tokens back to
//! it. Addresses are unique across endpoints.

use serde::{Deserialize, Serialize};

use crate::reference::Reference;
use crate::types::Extension;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Endpoint {
    #[serde(default)]
    pub id: String,
    pub address: String,
    #[serde(rename = "managingOrganization", skip_serializing_if = "Option::is_none")]
    pub managing_organization: Option<Reference>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub extension: Vec<Extension>,
}

impl Endpoint {
    pub fn new(id: impl Into<String>, address: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            address: address.into(),
            managing_organization: None,
            extension: Vec::new(),
        }
    }

    /// Sets the managing organization.
    #[must_use]
    pub fn managed_by(mut self, organization_id: &str) -> Self {
        self.managing_organization = Some(Reference::to("Organization", organization_id));
        self
    }

    /// Certificate thumbprints from the applicable-certificates extension.
    #[must_use]
    pub fn applicable_thumbprints(&self) -> Vec<&str> {
        super::organization::thumbprints_of(&self.extension)
    }

    /// Returns `true` if this endpoint is managed by `Organization/{id}`.
    #[must_use]
    pub fn is_managed_by(&self, organization_id: &str) -> bool {
        self.managing_organization
            .as_ref()
            .is_some_and(|r| r.points_to("Organization", organization_id))
    }
}

//! Concurrent typed resource tables.
//!
//! Each resource type gets its own map keyed by id. Insert/get/remove are
//! atomic; `update_with` holds the entry lock across the read-modify-write so
//! a handler's mutation of one resource cannot interleave with a concurrent
//! writer to the same id. Id collisions resolve last-writer-wins.

use dashmap::DashMap;

use hdp_core::error::{CoreError, Result};
use hdp_core::reference::Reference;
use hdp_core::resources::{
    AnyResource, Consent, Endpoint, HealthcareService, Organization, VerificationResult,
};

/// A concurrent map of one resource type.
#[derive(Debug)]
pub struct TypedStore<T: Clone> {
    data: DashMap<String, T>,
}

impl<T: Clone> Default for TypedStore<T> {
    fn default() -> Self {
        Self {
            data: DashMap::new(),
        }
    }
}

impl<T: Clone> TypedStore<T> {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    /// Returns a clone of the resource, if present.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<T> {
        self.data.get(id).map(|entry| entry.value().clone())
    }

    /// Returns `true` if the id is present.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.data.contains_key(id)
    }

    /// Inserts or replaces a resource (last-writer-wins).
    pub fn put(&self, id: impl Into<String>, resource: T) {
        self.data.insert(id.into(), resource);
    }

    /// Inserts a resource, failing if the id already exists.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::Conflict` when a resource with this id exists.
    pub fn insert_new(&self, resource_type: &str, id: impl Into<String>, resource: T) -> Result<()> {
        let id = id.into();
        match self.data.entry(id.clone()) {
            dashmap::Entry::Occupied(_) => Err(CoreError::conflict(resource_type, id)),
            dashmap::Entry::Vacant(slot) => {
                slot.insert(resource);
                Ok(())
            }
        }
    }

    /// Applies `f` to the stored resource under the entry lock.
    ///
    /// The closure sees the current value and may mutate it; the whole
    /// read-modify-write is atomic with respect to other writers of this id.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::NotFound` when the id is absent, or whatever `f`
    /// returns.
    pub fn update_with<R>(
        &self,
        resource_type: &str,
        id: &str,
        f: impl FnOnce(&mut T) -> Result<R>,
    ) -> Result<R> {
        match self.data.get_mut(id) {
            Some(mut entry) => f(entry.value_mut()),
            None => Err(CoreError::not_found(resource_type, id)),
        }
    }

    /// Runs `f` with the entry lock held, passing the resource when present.
    ///
    /// Callers that need their own error type for the read-modify-write use
    /// this; the whole closure is atomic with respect to other writers of
    /// this id.
    pub fn with_entry<R>(&self, id: &str, f: impl FnOnce(Option<&mut T>) -> R) -> R {
        match self.data.get_mut(id) {
            Some(mut entry) => f(Some(entry.value_mut())),
            None => f(None),
        }
    }

    /// Removes a resource, returning it if present.
    pub fn remove(&self, id: &str) -> Option<T> {
        self.data.remove(id).map(|(_, v)| v)
    }

    /// Snapshot of all resources.
    #[must_use]
    pub fn all(&self) -> Vec<T> {
        self.data.iter().map(|entry| entry.value().clone()).collect()
    }

    /// Number of stored resources.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the table is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

/// The process-wide resource store shared by the AS and RS.
#[derive(Debug, Default)]
pub struct ResourceStore {
    pub organizations: TypedStore<Organization>,
    pub endpoints: TypedStore<Endpoint>,
    pub services: TypedStore<HealthcareService>,
    pub consents: TypedStore<Consent>,
    pub verification_results: TypedStore<VerificationResult>,
}

impl ResourceStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Resolves a reference to any stored resource.
    #[must_use]
    pub fn resolve(&self, reference: &Reference) -> Option<AnyResource> {
        let (resource_type, id) = reference.parts().ok()?;
        match resource_type {
            "Organization" => self.organizations.get(id).map(AnyResource::Organization),
            "Endpoint" => self.endpoints.get(id).map(AnyResource::Endpoint),
            "HealthcareService" => self.services.get(id).map(AnyResource::HealthcareService),
            "Consent" => self.consents.get(id).map(AnyResource::Consent),
            "VerificationResult" => self
                .verification_results
                .get(id)
                .map(AnyResource::VerificationResult),
            _ => None,
        }
    }

    /// Resolves an organization reference.
    #[must_use]
    pub fn organization_of(&self, reference: &Reference) -> Option<Organization> {
        let (resource_type, id) = reference.parts().ok()?;
        if resource_type != "Organization" {
            return None;
        }
        self.organizations.get(id)
    }

    /// The single PCM administrative organization.
    #[must_use]
    pub fn pcm_organization(&self) -> Option<Organization> {
        self.organizations.all().into_iter().find(|o| o.is_pcm())
    }

    /// Returns `true` if `organization_id` names the PCM admin organization.
    #[must_use]
    pub fn is_admin_organization(&self, organization_id: &str) -> bool {
        self.organizations
            .get(organization_id)
            .is_some_and(|o| o.is_pcm())
    }

    /// All endpoints managed by the organization.
    #[must_use]
    pub fn endpoints_of(&self, organization_id: &str) -> Vec<Endpoint> {
        self.endpoints
            .all()
            .into_iter()
            .filter(|e| e.is_managed_by(organization_id))
            .collect()
    }

    /// The endpoint whose address equals `address` exactly, if any.
    ///
    /// Addresses are unique across endpoints, which is what lets them serve
    /// as RFC 8707 resource indicators.
    #[must_use]
    pub fn endpoint_by_address(&self, address: &str) -> Option<Endpoint> {
        self.endpoints
            .all()
            .into_iter()
            .find(|e| e.address == address)
    }
}

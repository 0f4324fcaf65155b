//! Registered OAuth clients.
//!
//! Clients are seeded at boot from configuration and are not mutable through
//! the API. Each client is bound to one organization and one certificate; the
//! certificate is both the assertion-verification key source and the
//! holder-of-key anchor.

use async_trait::async_trait;
use dashmap::DashMap;

use crate::error::AuthResult;

/// A registered client.
#[derive(Debug, Clone)]
pub struct ClientRecord {
    /// The client id; issuer and subject of its assertions.
    pub client_id: String,
    /// The organization this client acts for.
    pub organization_id: String,
    /// PEM of the registered client certificate.
    pub certificate_pem: String,
    /// Scopes this client may be granted.
    pub scopes: Vec<String>,
}

impl ClientRecord {
    pub fn new(
        client_id: impl Into<String>,
        organization_id: impl Into<String>,
        certificate_pem: impl Into<String>,
        scopes: Vec<String>,
    ) -> Self {
        Self {
            client_id: client_id.into(),
            organization_id: organization_id.into(),
            certificate_pem: certificate_pem.into(),
            scopes,
        }
    }

    /// Returns `true` if every space-separated part of `scope` is allowed.
    #[must_use]
    pub fn allows_scope(&self, scope: &str) -> bool {
        scope
            .split_whitespace()
            .all(|part| self.scopes.iter().any(|allowed| allowed == part))
    }
}

/// Lookup interface for registered clients.
#[async_trait]
pub trait ClientStorage: Send + Sync {
    /// Finds a client by its client id.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup itself fails; an unknown client is
    /// `Ok(None)`.
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<ClientRecord>>;
}

/// In-memory client registry seeded at boot.
#[derive(Debug, Default)]
pub struct InMemoryClientStorage {
    clients: DashMap<String, ClientRecord>,
}

impl InMemoryClientStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Seeds a registry from records.
    #[must_use]
    pub fn seeded(records: impl IntoIterator<Item = ClientRecord>) -> Self {
        let storage = Self::new();
        for record in records {
            storage.register(record);
        }
        storage
    }

    /// Registers (or replaces) a client.
    pub fn register(&self, record: ClientRecord) {
        self.clients.insert(record.client_id.clone(), record);
    }

    /// Number of registered clients.
    #[must_use]
    pub fn len(&self) -> usize {
        self.clients.len()
    }

    /// Returns `true` if no clients are registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }
}

#[async_trait]
impl ClientStorage for InMemoryClientStorage {
    async fn find_by_client_id(&self, client_id: &str) -> AuthResult<Option<ClientRecord>> {
        Ok(self.clients.get(client_id).map(|entry| entry.value().clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn lookup_and_scope_checks() {
        let storage = InMemoryClientStorage::seeded([ClientRecord::new(
            "sp-client",
            "org-sp",
            "-----BEGIN CERTIFICATE-----",
            vec!["system/*.cruds".into(), "introspection".into()],
        )]);

        let client = storage
            .find_by_client_id("sp-client")
            .await
            .unwrap()
            .expect("registered");
        assert_eq!(client.organization_id, "org-sp");
        assert!(client.allows_scope("introspection"));
        assert!(client.allows_scope("system/*.cruds introspection"));
        assert!(!client.allows_scope("admin/*.cruds"));

        assert!(
            storage
                .find_by_client_id("nobody")
                .await
                .unwrap()
                .is_none()
        );
    }
}

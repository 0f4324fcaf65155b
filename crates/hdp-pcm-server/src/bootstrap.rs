//! Bootstrap seeding.
//!
//! All state is rebuilt at start: the organization/endpoint/service graph
//! comes from the embedded seed set, registered clients from configuration.

use hdp_auth::client::{ClientRecord, InMemoryClientStorage};
use hdp_core::Reference;
use hdp_core::resources::{Endpoint, HealthcareService, Organization};
use hdp_core::terminology::{ORG_TYPE_PCM, ORG_TYPE_SERVICE_PROVIDER, ORG_TYPE_SOURCE};
use hdp_store::ResourceStore;

use crate::config::AppConfig;

/// Seeds the resource graph: the PCM admin organization, a Service Provider,
/// a Data Source with its gateway endpoint, and a catalog service.
pub fn seed_store(store: &ResourceStore) {
    store.organizations.put(
        "org-pcm",
        Organization::new("org-pcm", "Patient Consent Manager").with_org_type(ORG_TYPE_PCM),
    );
    store.organizations.put(
        "org-sp",
        Organization::new("org-sp", "Community Clinic").with_org_type(ORG_TYPE_SERVICE_PROVIDER),
    );
    store.organizations.put(
        "org-hospital-b-sp",
        Organization::new("org-hospital-b-sp", "Hospital B")
            .with_org_type(ORG_TYPE_SERVICE_PROVIDER),
    );

    let mut vaccine_repo =
        Organization::new("org-vaccine-repo", "National Vaccine Repository")
            .with_org_type(ORG_TYPE_SOURCE);
    vaccine_repo.endpoint = vec![Reference::to("Endpoint", "ep-vaccine-repo")];
    store.organizations.put("org-vaccine-repo", vaccine_repo);
    store.endpoints.put(
        "ep-vaccine-repo",
        Endpoint::new("ep-vaccine-repo", "https://ds-gw:8080/fhir").managed_by("org-vaccine-repo"),
    );

    let mut service = HealthcareService::new("service-1");
    service.name = Some("Vaccination history".into());
    service.active = Some(true);
    service.tag_catalog();
    service.set_catalog_identifier("vaccination-history");
    store.services.put("service-1", service);

    tracing::info!(
        organizations = store.organizations.len(),
        endpoints = store.endpoints.len(),
        services = store.services.len(),
        "resource store seeded"
    );
}

/// Builds the client registry from configuration, loading certificate PEMs
/// from disk where needed.
pub fn seed_clients(config: &AppConfig) -> Result<InMemoryClientStorage, String> {
    let storage = InMemoryClientStorage::new();
    for seed in &config.clients {
        let pem = match (&seed.certificate_pem, &seed.certificate_pem_path) {
            (Some(pem), _) => pem.clone(),
            (None, Some(path)) => std::fs::read_to_string(path).map_err(|e| {
                format!("client '{}': cannot read certificate {path}: {e}", seed.client_id)
            })?,
            (None, None) => {
                return Err(format!("client '{}' has no certificate", seed.client_id));
            }
        };
        storage.register(ClientRecord::new(
            &seed.client_id,
            &seed.organization_id,
            pem,
            seed.scopes.clone(),
        ));
    }
    tracing::info!(clients = storage.len(), "client registry seeded");
    Ok(storage)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ClientSeed;

    #[test]
    fn seed_graph_is_consistent() {
        let store = ResourceStore::new();
        seed_store(&store);

        assert!(store.is_admin_organization("org-pcm"));
        let repo = store.organizations.get("org-vaccine-repo").unwrap();
        assert!(repo.is_source());
        let endpoint = store.endpoint_by_address("https://ds-gw:8080/fhir").unwrap();
        assert!(endpoint.is_managed_by("org-vaccine-repo"));
        assert!(store.services.get("service-1").unwrap().is_catalog());
    }

    #[test]
    fn client_seed_prefers_inline_pem() {
        let mut config = AppConfig::default();
        config.clients.push(ClientSeed {
            client_id: "sp-client".into(),
            organization_id: "org-sp".into(),
            certificate_pem: Some("-----BEGIN CERTIFICATE-----".into()),
            certificate_pem_path: None,
            scopes: vec!["system/*.cruds".into()],
        });
        let storage = seed_clients(&config).unwrap();
        assert_eq!(storage.len(), 1);
    }
}

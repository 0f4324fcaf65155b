//! Search-parameter matching.
//!
//! Each resource type supports a fixed parameter set; unknown parameters are
//! ignored. Token parameters accept `system|value` or bare `value`.

use hdp_core::resources::{Consent, Endpoint, HealthcareService, Organization};
use hdp_core::terminology::SYS_SERVICE_CATALOG_ID;

/// Parsed query parameters, preserving repeats.
#[derive(Debug, Clone, Default)]
pub struct SearchParams {
    params: Vec<(String, String)>,
}

impl SearchParams {
    /// Builds from decoded query pairs.
    #[must_use]
    pub fn from_pairs(pairs: impl IntoIterator<Item = (String, String)>) -> Self {
        Self {
            params: pairs.into_iter().collect(),
        }
    }

    /// First value of a parameter.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.params
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }

    /// All values of a parameter, in request order.
    #[must_use]
    pub fn all(&self, name: &str) -> Vec<&str> {
        self.params
            .iter()
            .filter(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
            .collect()
    }

    /// Returns `true` if no parameters were supplied.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }
}

/// Case-insensitive FHIR string matching (starts-with).
fn string_matches(value: Option<&str>, query: &str) -> bool {
    value.is_some_and(|v| v.to_lowercase().starts_with(&query.to_lowercase()))
}

/// Organization search: `type`, `name`, `identifier`.
#[must_use]
pub fn organization_matches(org: &Organization, params: &SearchParams) -> bool {
    if let Some(q) = params.get("type")
        && !org.r#type.iter().any(|t| t.coding.iter().any(|c| c.matches_token(q)))
    {
        return false;
    }
    if let Some(q) = params.get("name")
        && !string_matches(org.name.as_deref(), q)
    {
        return false;
    }
    if let Some(q) = params.get("identifier")
        && !org.identifier.iter().any(|i| i.matches_token(q))
    {
        return false;
    }
    true
}

/// Endpoint search: `thumbprint` (matches the applicable-certificates
/// extension values).
#[must_use]
pub fn endpoint_matches(endpoint: &Endpoint, params: &SearchParams) -> bool {
    if let Some(q) = params.get("thumbprint")
        && !endpoint.applicable_thumbprints().contains(&q)
    {
        return false;
    }
    true
}

/// HealthcareService search: `providedBy`, `category`, `type`, `identifier`,
/// `name`, `active`.
#[must_use]
pub fn service_matches(service: &HealthcareService, params: &SearchParams) -> bool {
    if let Some(q) = params.get("providedBy") {
        let wanted = q.strip_prefix("Organization/").unwrap_or(q);
        if !service.is_provided_by(wanted) {
            return false;
        }
    }
    if let Some(q) = params.get("category")
        && !service
            .category
            .iter()
            .any(|c| c.coding.iter().any(|coding| coding.matches_token(q)))
    {
        return false;
    }
    if let Some(q) = params.get("type")
        && !service
            .r#type
            .iter()
            .any(|c| c.coding.iter().any(|coding| coding.matches_token(q)))
    {
        return false;
    }
    if let Some(q) = params.get("identifier")
        && !service.identifier.iter().any(|i| i.matches_token(q))
    {
        return false;
    }
    if let Some(q) = params.get("name")
        && !string_matches(service.name.as_deref(), q)
    {
        return false;
    }
    if let Some(q) = params.get("active") {
        let wanted = q == "true";
        if service.active.unwrap_or(false) != wanted {
            return false;
        }
    }
    true
}

/// Consent search: `_id`, `status`, `patient`, `patient.identifier`,
/// `pcm-service`.
#[must_use]
pub fn consent_matches(consent: &Consent, params: &SearchParams) -> bool {
    if let Some(q) = params.get("_id")
        && consent.id != q
    {
        return false;
    }
    if let Some(q) = params.get("status")
        && consent.status.as_str() != q
    {
        return false;
    }
    for name in ["patient", "patient.identifier"] {
        if let Some(q) = params.get(name)
            && !consent
                .patient
                .as_ref()
                .is_some_and(|p| p.identifier.matches_token(q))
        {
            return false;
        }
    }
    if let Some(q) = params.get("pcm-service") {
        let matches = consent.pcm_service().is_some_and(|service| {
            let wanted = q.strip_prefix("HealthcareService/").unwrap_or(q);
            service.points_to("HealthcareService", wanted)
                || service_catalog_token_matches(service, q)
        });
        if !matches {
            return false;
        }
    }
    true
}

/// Allows `pcm-service` queries by catalog-identifier token as well as by
/// reference; the reference itself cannot answer that, so this only matches
/// the `system|value` form against the fixed catalog system.
fn service_catalog_token_matches(service: &hdp_core::Reference, token: &str) -> bool {
    token
        .split_once('|')
        .is_some_and(|(system, value)| {
            system == SYS_SERVICE_CATALOG_ID && service.id() == Some(value)
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hdp_core::Reference;
    use hdp_core::resources::{ConsentActor, ConsentStatus};
    use hdp_core::terminology::{
        EXT_APPLICABLE_CERTIFICATES, EXT_THUMBPRINT, ORG_TYPE_SOURCE, ROLE_IRCP, SYS_NATIONAL_ID,
        SYS_ORG_TYPE,
    };
    use hdp_core::types::{Extension, Identifier};

    fn params(pairs: &[(&str, &str)]) -> SearchParams {
        SearchParams::from_pairs(
            pairs
                .iter()
                .map(|(n, v)| ((*n).to_string(), (*v).to_string())),
        )
    }

    #[test]
    fn organization_type_and_name() {
        let org = Organization::new("org-1", "Vaccine Repository").with_org_type(ORG_TYPE_SOURCE);

        assert!(organization_matches(&org, &params(&[("type", "source")])));
        assert!(organization_matches(
            &org,
            &params(&[("type", &format!("{SYS_ORG_TYPE}|source"))])
        ));
        assert!(organization_matches(&org, &params(&[("name", "vaccine")])));
        assert!(!organization_matches(&org, &params(&[("name", "clinic")])));
        assert!(!organization_matches(&org, &params(&[("type", "pcm")])));
        // Unknown parameters are ignored.
        assert!(organization_matches(&org, &params(&[("color", "blue")])));
    }

    #[test]
    fn endpoint_thumbprint() {
        let mut ep = Endpoint::new("ep-1", "https://ds/fhir");
        ep.extension.push(Extension::complex(
            EXT_APPLICABLE_CERTIFICATES,
            vec![Extension::string(EXT_THUMBPRINT, "abc123")],
        ));
        assert!(endpoint_matches(&ep, &params(&[("thumbprint", "abc123")])));
        assert!(!endpoint_matches(&ep, &params(&[("thumbprint", "zzz")])));
    }

    #[test]
    fn service_provided_by_and_active() {
        let mut svc = HealthcareService::new("svc-1");
        svc.provided_by = Some(Reference::to("Organization", "org-sp"));
        svc.active = Some(true);
        svc.name = Some("Vaccination history".into());

        assert!(service_matches(
            &svc,
            &params(&[("providedBy", "Organization/org-sp")])
        ));
        assert!(service_matches(&svc, &params(&[("providedBy", "org-sp")])));
        assert!(service_matches(&svc, &params(&[("active", "true")])));
        assert!(!service_matches(&svc, &params(&[("active", "false")])));
        assert!(service_matches(&svc, &params(&[("name", "vacc")])));
    }

    #[test]
    fn consent_patient_and_status() {
        let mut consent = Consent::proposed("c-1", Identifier::new(SYS_NATIONAL_ID, "99887766"));
        consent.status = ConsentStatus::Active;
        consent.provision.actor.push(ConsentActor::new(
            ROLE_IRCP,
            Reference::to("Organization", "org-sp"),
        ));
        consent.set_pcm_service(Reference::to("HealthcareService", "svc-1"));

        assert!(consent_matches(&consent, &params(&[("_id", "c-1")])));
        assert!(consent_matches(&consent, &params(&[("status", "active")])));
        assert!(!consent_matches(&consent, &params(&[("status", "proposed")])));
        assert!(consent_matches(
            &consent,
            &params(&[("patient", &format!("{SYS_NATIONAL_ID}|99887766"))])
        ));
        assert!(consent_matches(
            &consent,
            &params(&[("patient.identifier", "99887766")])
        ));
        assert!(consent_matches(
            &consent,
            &params(&[("pcm-service", "HealthcareService/svc-1")])
        ));
        assert!(!consent_matches(
            &consent,
            &params(&[("pcm-service", "HealthcareService/svc-2")])
        ));
    }
}

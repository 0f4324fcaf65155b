//! Token introspection with audience binding to the calling PEP.
//!
//! The caller authenticates with its own access token (scope
//! `introspection`); its organization's Endpoint addresses are the only
//! audiences it may introspect. A token whose `aud` names a different
//! resource server introspects as `{active: false}` — that is what stops a
//! token captured at one Data Source from being replayed against another.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use hdp_store::ResourceStore;

use crate::error::{AuthError, AuthResult};
use crate::token::{Confirmation, FhirContext, TokenRecord, TokenStore};

/// Form parameters of the introspection endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct IntrospectionRequest {
    pub token: String,
}

/// Introspection response: `active` plus the token record when active.
///
/// Inactive responses carry only `active: false`; the reason is never
/// disclosed.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct IntrospectionResponse {
    pub active: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iss: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub aud: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub client_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub organization_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient: Option<String>,
    #[serde(rename = "fhirContext", default, skip_serializing_if = "Vec::is_empty")]
    pub fhir_context: Vec<FhirContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cnf: Option<Confirmation>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exp: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
}

impl IntrospectionResponse {
    /// The inactive response.
    #[must_use]
    pub fn inactive() -> Self {
        Self::default()
    }

    /// An active response carrying the record verbatim.
    #[must_use]
    pub fn from_record(record: &TokenRecord) -> Self {
        Self {
            active: true,
            sub: Some(record.sub.clone()),
            scope: Some(record.scope.clone()),
            iss: Some(record.iss.clone()),
            aud: Some(record.aud.clone()),
            client_id: Some(record.client_id.clone()),
            organization_id: Some(record.organization_id.clone()),
            patient: record.patient.clone(),
            fhir_context: record.fhir_context.clone(),
            cnf: Some(record.cnf.clone()),
            exp: Some(record.exp),
            iat: Some(record.iat),
        }
    }
}

/// The introspection service.
pub struct IntrospectionService {
    tokens: Arc<TokenStore>,
    store: Arc<ResourceStore>,
}

impl IntrospectionService {
    pub fn new(tokens: Arc<TokenStore>, store: Arc<ResourceStore>) -> Self {
        Self { tokens, store }
    }

    /// Introspects `token` on behalf of the caller organization.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Forbidden` when the caller's organization cannot
    /// be resolved or has no Endpoint to bind the audience to. A missing,
    /// expired, or audience-mismatched target token is not an error — it
    /// introspects as inactive.
    pub fn introspect(
        &self,
        caller_organization_id: &str,
        token: &str,
    ) -> AuthResult<IntrospectionResponse> {
        if self
            .store
            .organizations
            .get(caller_organization_id)
            .is_none()
        {
            return Err(AuthError::forbidden("caller organization is not registered"));
        }
        let introspector_addresses: Vec<String> = self
            .store
            .endpoints_of(caller_organization_id)
            .into_iter()
            .map(|e| e.address)
            .collect();
        if introspector_addresses.is_empty() {
            return Err(AuthError::forbidden(
                "caller organization has no endpoint to introspect for",
            ));
        }

        let now = hdp_core::time::unix_now();
        let Some(record) = self.tokens.get_active(token, now) else {
            return Ok(IntrospectionResponse::inactive());
        };
        if !introspector_addresses.iter().any(|addr| *addr == record.aud) {
            tracing::debug!(
                caller = %caller_organization_id,
                aud = %record.aud,
                "introspected token is bound to a different resource server"
            );
            return Ok(IntrospectionResponse::inactive());
        }

        Ok(IntrospectionResponse::from_record(&record))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hdp_core::resources::{Endpoint, Organization};
    use hdp_core::terminology::ORG_TYPE_SOURCE;

    fn setup() -> (Arc<TokenStore>, Arc<ResourceStore>, IntrospectionService) {
        let tokens = Arc::new(TokenStore::new());
        let store = Arc::new(ResourceStore::new());
        store.organizations.put(
            "org-ds-a",
            Organization::new("org-ds-a", "DS A").with_org_type(ORG_TYPE_SOURCE),
        );
        store.organizations.put(
            "org-ds-b",
            Organization::new("org-ds-b", "DS B").with_org_type(ORG_TYPE_SOURCE),
        );
        store.organizations.put("org-bare", Organization::new("org-bare", "No endpoint"));
        store.endpoints.put(
            "ep-a",
            Endpoint::new("ep-a", "https://ds-a:8080/fhir").managed_by("org-ds-a"),
        );
        store.endpoints.put(
            "ep-b",
            Endpoint::new("ep-b", "https://ds-b:8080/fhir").managed_by("org-ds-b"),
        );
        let service = IntrospectionService::new(tokens.clone(), store.clone());
        (tokens, store, service)
    }

    fn record_for(aud: &str) -> TokenRecord {
        let now = hdp_core::time::unix_now();
        TokenRecord {
            token: "t-1".into(),
            sub: "sp-client".into(),
            client_id: "sp-client".into(),
            organization_id: "org-sp".into(),
            scope: "patient/Observation.rs".into(),
            iss: "https://pcm.example".into(),
            aud: aud.into(),
            patient: Some("sys|123".into()),
            fhir_context: Vec::new(),
            cnf: Confirmation {
                x5t_s256: "tp".into(),
            },
            iat: now,
            exp: now + 30,
        }
    }

    #[test]
    fn audience_binding_gates_activity() {
        let (tokens, _store, service) = setup();
        tokens.insert(record_for("https://ds-a:8080/fhir"));

        let response = service.introspect("org-ds-a", "t-1").unwrap();
        assert!(response.active);
        assert_eq!(response.patient.as_deref(), Some("sys|123"));
        assert_eq!(response.aud.as_deref(), Some("https://ds-a:8080/fhir"));
        assert_eq!(response.cnf.as_ref().unwrap().x5t_s256, "tp");

        // The same token introspected by the other Data Source is inactive.
        let response = service.introspect("org-ds-b", "t-1").unwrap();
        assert!(!response.active);
        assert!(response.sub.is_none());
    }

    #[test]
    fn unknown_or_expired_tokens_are_inactive() {
        let (tokens, _store, service) = setup();
        let response = service.introspect("org-ds-a", "nope").unwrap();
        assert!(!response.active);

        let mut record = record_for("https://ds-a:8080/fhir");
        record.exp = hdp_core::time::unix_now() - 5;
        tokens.insert(record);
        let response = service.introspect("org-ds-a", "t-1").unwrap();
        assert!(!response.active);
    }

    #[test]
    fn caller_without_endpoint_is_forbidden() {
        let (_tokens, _store, service) = setup();
        let err = service.introspect("org-bare", "t-1").unwrap_err();
        assert_eq!(err.http_status(), 403);
        let err = service.introspect("org-ghost", "t-1").unwrap_err();
        assert_eq!(err.http_status(), 403);
    }

    #[test]
    fn inactive_response_serializes_minimal() {
        let json = serde_json::to_value(IntrospectionResponse::inactive()).unwrap();
        assert_eq!(json, serde_json::json!({"active": false}));
    }
}

//! Token issuance: the `/token` validation pipeline.
//!
//! Client-credentials only, with private-key JWT client authentication and
//! RFC 8707 resource binding. B2B requests additionally bind the token to
//! active consents: the client's organization must be a party to every
//! referenced consent, and the requested resource must be an endpoint owned
//! by one of the consents' custodians.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use hdp_core::Reference;
use hdp_core::resources::{Consent, ConsentStatus, HealthcareService};
use hdp_core::terminology::{SCOPE_DS_DATA, SCOPE_SYSTEM_CRUDS, SYS_CONSENT_ID, SYS_SERVICE_CATALOG_ID};
use hdp_core::types::Identifier;
use hdp_store::ResourceStore;

use crate::assertion::{self, B2bAuthorization};
use crate::client::{ClientRecord, ClientStorage};
use crate::error::{AuthError, AuthResult};
use crate::thumbprint::{self, PeerCertificate};
use crate::token::{Confirmation, FhirContext, TokenRecord, TokenStore, mint_token_value};
use crate::{CLIENT_ASSERTION_TYPE_JWT_BEARER, GRANT_TYPE_CLIENT_CREDENTIALS};

/// Form parameters of the token endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenRequest {
    pub grant_type: String,
    #[serde(default)]
    pub client_assertion_type: Option<String>,
    #[serde(default)]
    pub client_assertion: Option<String>,
    /// RFC 8707 resource indicator; required.
    #[serde(default)]
    pub resource: Option<String>,
    /// Advisory; B2B flows override it with the fixed DS-data scope.
    #[serde(default)]
    pub scope: Option<String>,
}

/// Successful token response.
#[derive(Debug, Clone, Serialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub token_type: &'static str,
    pub expires_in: i64,
    pub scope: String,
}

/// Issuer configuration.
#[derive(Debug, Clone)]
pub struct IssuerConfig {
    /// Public base URL of the authorization server, used to derive the
    /// accepted assertion audiences.
    pub public_base_url: String,
    /// Token lifetime in seconds.
    pub token_ttl_secs: i64,
}

impl IssuerConfig {
    pub fn new(public_base_url: impl Into<String>) -> Self {
        Self {
            public_base_url: public_base_url.into(),
            token_ttl_secs: 30,
        }
    }
}

/// The token issuance service.
pub struct TokenIssuer {
    clients: Arc<dyn ClientStorage>,
    store: Arc<ResourceStore>,
    tokens: Arc<TokenStore>,
    config: IssuerConfig,
}

impl TokenIssuer {
    pub fn new(
        clients: Arc<dyn ClientStorage>,
        store: Arc<ResourceStore>,
        tokens: Arc<TokenStore>,
        config: IssuerConfig,
    ) -> Self {
        Self {
            clients,
            store,
            tokens,
            config,
        }
    }

    /// Runs the issuance pipeline. The peer certificate comes from the mTLS
    /// gate, which has already chain-verified it; `None` only occurs when
    /// the gate is disabled.
    ///
    /// # Errors
    ///
    /// Any pipeline step failure short-circuits with the error mapped to its
    /// OAuth code and status by the caller.
    pub async fn issue(
        &self,
        request: &TokenRequest,
        peer: Option<&PeerCertificate>,
    ) -> AuthResult<TokenResponse> {
        // Grant and assertion shape.
        if request.grant_type != GRANT_TYPE_CLIENT_CREDENTIALS {
            return Err(AuthError::unsupported_grant_type(&request.grant_type));
        }
        let assertion = match (
            request.client_assertion_type.as_deref(),
            request.client_assertion.as_deref(),
        ) {
            (Some(CLIENT_ASSERTION_TYPE_JWT_BEARER), Some(assertion)) => assertion,
            _ => {
                return Err(AuthError::invalid_client(
                    "client_assertion of type jwt-bearer is required",
                ));
            }
        };

        // Resource indicator presence.
        let resource = request
            .resource
            .as_deref()
            .filter(|r| !r.is_empty())
            .ok_or_else(|| AuthError::invalid_request("resource parameter is required"))?;

        // Assertion decode: iss and sub must be present and equal.
        let (iss, sub) = assertion::peek_issuer(assertion)?;
        if iss != sub {
            return Err(AuthError::invalid_client("assertion iss and sub must match"));
        }

        // Client lookup; the registered certificate is the verification key.
        let client = self
            .clients
            .find_by_client_id(&iss)
            .await?
            .ok_or_else(|| AuthError::invalid_client("unknown client"))?;
        let key = thumbprint::decoding_key_from_cert_pem(&client.certificate_pem)?;

        // Signature and audience verification.
        let audiences = assertion::accepted_audiences(&self.config.public_base_url)?;
        let claims = assertion::verify(assertion, &key, &audiences)?;

        // B2B binding.
        let binding = match claims.b2b() {
            Some(b2b) => Some(self.bind_b2b(&client, b2b, resource)?),
            None => None,
        };

        // Holder-of-key confirmation: the registered certificate is
        // authoritative; an mTLS peer mismatch is logged, not blocked.
        let registered_thumbprint = thumbprint::thumbprint_of_pem(&client.certificate_pem)?;
        let peer_thumbprint = peer.map(|p| p.thumbprint.clone()).unwrap_or_default();
        if let Some(peer) = peer
            && registered_thumbprint != peer.thumbprint
        {
            tracing::warn!(
                client_id = %client.client_id,
                registered = %registered_thumbprint,
                presented = %peer.thumbprint,
                "mTLS peer certificate does not match registered client certificate"
            );
        }

        let (scope, patient, fhir_context) = match binding {
            Some(b2b) => (SCOPE_DS_DATA.to_string(), b2b.patient, b2b.fhir_context),
            None => (self.plain_scope(&client, request.scope.as_deref())?, None, Vec::new()),
        };

        let now = hdp_core::time::unix_now();
        let record = TokenRecord {
            token: mint_token_value(),
            sub: client.client_id.clone(),
            client_id: client.client_id.clone(),
            organization_id: client.organization_id.clone(),
            scope: scope.clone(),
            iss: self.config.public_base_url.clone(),
            aud: resource.to_string(),
            patient,
            fhir_context,
            cnf: Confirmation {
                x5t_s256: registered_thumbprint.clone(),
            },
            iat: now,
            exp: now + self.config.token_ttl_secs,
        };

        tracing::info!(
            client_id = %client.client_id,
            organization_id = %client.organization_id,
            aud = %record.aud,
            cnf = %registered_thumbprint,
            peer_thumbprint = %peer_thumbprint,
            "access token issued"
        );

        let response = TokenResponse {
            access_token: record.token.clone(),
            token_type: "Bearer",
            expires_in: self.config.token_ttl_secs,
            scope,
        };
        self.tokens.insert(record);
        Ok(response)
    }

    /// Scope for non-B2B issuance: the requested scope when the client is
    /// allowed all of it, the default system scope otherwise.
    fn plain_scope(&self, client: &ClientRecord, requested: Option<&str>) -> AuthResult<String> {
        match requested.filter(|s| !s.is_empty()) {
            Some(scope) => {
                if client.allows_scope(scope) {
                    Ok(scope.to_string())
                } else {
                    Err(AuthError::invalid_scope(format!(
                        "scope '{scope}' is not allowed for this client"
                    )))
                }
            }
            None => Ok(SCOPE_SYSTEM_CRUDS.to_string()),
        }
    }

    /// Resolves and validates the B2B consent/actor/resource bindings.
    fn bind_b2b(
        &self,
        client: &ClientRecord,
        b2b: &B2bAuthorization,
        resource: &str,
    ) -> AuthResult<B2bBinding> {
        // The asserted organization must be the one the client is bound to.
        if b2b.organization_id_suffix() != Some(client.organization_id.as_str()) {
            return Err(AuthError::unauthorized_client(
                "asserted organization does not match the registered client",
            ));
        }

        let mut consents = Vec::new();
        for reference in &b2b.consent_reference {
            let consent = self
                .resolve_consent(reference)
                .ok_or_else(|| AuthError::invalid_grant(format!("consent '{reference}' not found")))?;
            if consent.status != ConsentStatus::Active {
                return Err(AuthError::invalid_grant(format!(
                    "consent '{reference}' is not active"
                )));
            }
            // Actor binding: the client's organization must be a party.
            if !consent.is_actor(&client.organization_id) {
                return Err(AuthError::access_denied("Client is not a party to this consent"));
            }
            consents.push(consent);
        }

        // Resource binding: the indicator must name a custodian-owned
        // endpoint address, exactly.
        let custodian_owns_resource = consents.iter().any(|consent| {
            consent.custodians().iter().any(|actor| {
                actor
                    .reference
                    .id()
                    .map(|org_id| {
                        self.store
                            .endpoints_of(org_id)
                            .iter()
                            .any(|endpoint| endpoint.address == resource)
                    })
                    .unwrap_or(false)
            })
        });
        if !custodian_owns_resource {
            return Err(AuthError::invalid_target(
                "resource is not an endpoint of any consent custodian",
            ));
        }

        let patient = consents
            .iter()
            .find_map(|c| c.patient.as_ref())
            .map(|p| p.identifier.token());

        let mut fhir_context = Vec::new();
        for consent in &consents {
            fhir_context.extend(self.consent_context(consent));
        }

        Ok(B2bBinding {
            patient,
            fhir_context,
        })
    }

    fn resolve_consent(&self, reference: &str) -> Option<Consent> {
        let id = match Reference::new(reference).parts() {
            Ok(("Consent", id)) => id.to_string(),
            Ok(_) => return None,
            // A bare id is accepted.
            Err(_) if !reference.contains('/') => reference.to_string(),
            Err(_) => return None,
        };
        self.store.consents.get(&id)
    }

    /// fhirContext entries for one consent: the consent itself plus the
    /// catalog identity of its linked service.
    fn consent_context(&self, consent: &Consent) -> Vec<FhirContext> {
        let mut entries = Vec::new();

        let consent_value = consent
            .identifier_in(SYS_CONSENT_ID)
            .unwrap_or(&consent.id)
            .to_string();
        entries.push(FhirContext {
            r#type: "Consent".to_string(),
            identifier: Identifier::new(SYS_CONSENT_ID, consent_value),
        });

        if let Some(service_ref) = consent.pcm_service()
            && let Some(service) = self.resolve_service(service_ref)
        {
            let canonical = service
                .based_on_canonical()
                .filter(|_| service.is_instance())
                .and_then(|canonical_ref| self.resolve_service(canonical_ref));

            let catalog_value = canonical
                .as_ref()
                .and_then(|c| c.catalog_identifier())
                .or_else(|| service.catalog_identifier())
                .unwrap_or(&service.id)
                .to_string();

            entries.push(FhirContext {
                r#type: "HealthcareService".to_string(),
                identifier: Identifier::new(SYS_SERVICE_CATALOG_ID, catalog_value),
            });
        }

        entries
    }

    fn resolve_service(&self, reference: &Reference) -> Option<HealthcareService> {
        let (resource_type, id) = reference.parts().ok()?;
        (resource_type == "HealthcareService")
            .then(|| self.store.services.get(id))
            .flatten()
    }
}

struct B2bBinding {
    patient: Option<String>,
    fhir_context: Vec<FhirContext>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header};
    use rsa::pkcs8::{EncodePrivateKey, LineEnding};

    use hdp_core::resources::{ConsentActor, Endpoint, Organization};
    use hdp_core::terminology::{
        ORG_TYPE_SERVICE_PROVIDER, ORG_TYPE_SOURCE, ROLE_CST, ROLE_IRCP, SYS_NATIONAL_ID,
    };
    use hdp_store::ResourceStore;

    use crate::client::InMemoryClientStorage;

    const PCM_BASE: &str = "https://pcm.example";
    const DS_ADDRESS: &str = "https://ds-gw:8080/fhir";

    /// A client credential: a self-signed RSA certificate and the matching
    /// signing key.
    struct Credential {
        cert_pem: String,
        signing_key: EncodingKey,
    }

    fn credential() -> Credential {
        let private = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
        let pkcs8 = private.to_pkcs8_pem(LineEnding::LF).unwrap().to_string();
        let keypair = rcgen::KeyPair::from_pem(&pkcs8).unwrap();
        let cert = rcgen::CertificateParams::new(vec!["sp.example".to_string()])
            .unwrap()
            .self_signed(&keypair)
            .unwrap();
        Credential {
            cert_pem: cert.pem(),
            signing_key: EncodingKey::from_rsa_pem(pkcs8.as_bytes()).unwrap(),
        }
    }

    struct Fixture {
        issuer: TokenIssuer,
        tokens: Arc<TokenStore>,
        sp: Credential,
    }

    fn fixture() -> Fixture {
        let store = Arc::new(ResourceStore::new());
        store.organizations.put(
            "org-sp",
            Organization::new("org-sp", "Clinic").with_org_type(ORG_TYPE_SERVICE_PROVIDER),
        );
        store.organizations.put(
            "org-vaccine-repo",
            Organization::new("org-vaccine-repo", "Vaccine Repository")
                .with_org_type(ORG_TYPE_SOURCE),
        );
        store.endpoints.put(
            "ep-ds",
            Endpoint::new("ep-ds", DS_ADDRESS).managed_by("org-vaccine-repo"),
        );

        let mut consent = Consent::proposed(
            "c-1",
            hdp_core::types::Identifier::new(SYS_NATIONAL_ID, "99887766"),
        );
        consent.status = ConsentStatus::Active;
        consent.provision.actor.push(ConsentActor::new(
            ROLE_IRCP,
            Reference::to("Organization", "org-sp"),
        ));
        consent.provision.actor.push(ConsentActor::new(
            ROLE_CST,
            Reference::to("Organization", "org-vaccine-repo"),
        ));
        store.consents.put("c-1", consent);

        let sp = credential();
        let clients = Arc::new(InMemoryClientStorage::seeded([ClientRecord::new(
            "sp-client",
            "org-sp",
            sp.cert_pem.clone(),
            vec!["system/*.cruds".to_string(), "introspection".to_string()],
        )]));

        let tokens = Arc::new(TokenStore::new());
        let issuer = TokenIssuer::new(
            clients,
            store,
            tokens.clone(),
            IssuerConfig::new(PCM_BASE),
        );
        Fixture { issuer, tokens, sp }
    }

    fn assertion_for(fixture: &Fixture, b2b: Option<serde_json::Value>) -> String {
        let mut claims = serde_json::json!({
            "iss": "sp-client",
            "sub": "sp-client",
            "aud": format!("{PCM_BASE}/token"),
            "exp": hdp_core::time::unix_now() + 300,
            "jti": uuid::Uuid::new_v4().to_string(),
        });
        if let Some(b2b) = b2b {
            claims["extensions"] = serde_json::json!({ "hl7-b2b": b2b });
        }
        jsonwebtoken::encode(
            &Header::new(jsonwebtoken::Algorithm::RS256),
            &claims,
            &fixture.sp.signing_key,
        )
        .unwrap()
    }

    fn b2b_block() -> serde_json::Value {
        serde_json::json!({
            "organization_id": format!("{PCM_BASE}/r4/Organization/org-sp"),
            "purpose_of_use": ["TREAT"],
            "consent_reference": ["Consent/c-1"],
        })
    }

    fn request(assertion: String, resource: &str) -> TokenRequest {
        TokenRequest {
            grant_type: GRANT_TYPE_CLIENT_CREDENTIALS.to_string(),
            client_assertion_type: Some(CLIENT_ASSERTION_TYPE_JWT_BEARER.to_string()),
            client_assertion: Some(assertion),
            resource: Some(resource.to_string()),
            scope: None,
        }
    }

    fn peer_of(fixture: &Fixture) -> PeerCertificate {
        PeerCertificate::from_pem(&fixture.sp.cert_pem).unwrap()
    }

    #[tokio::test]
    async fn b2b_happy_path_binds_consent_and_cnf() {
        let f = fixture();
        let response = f
            .issuer
            .issue(&request(assertion_for(&f, Some(b2b_block())), DS_ADDRESS), Some(&peer_of(&f)))
            .await
            .unwrap();

        assert_eq!(response.token_type, "Bearer");
        assert_eq!(response.expires_in, 30);
        assert_eq!(response.scope, SCOPE_DS_DATA);

        let now = hdp_core::time::unix_now();
        let record = f.tokens.get_active(&response.access_token, now).unwrap();
        assert_eq!(record.aud, DS_ADDRESS);
        assert_eq!(record.organization_id, "org-sp");
        assert_eq!(
            record.patient.as_deref(),
            Some("http://fhir.health.gov.il/identifier/il-national-id|99887766")
        );
        // T1: cnf equals the registered certificate's thumbprint.
        assert_eq!(
            record.cnf.x5t_s256,
            thumbprint::thumbprint_of_pem(&f.sp.cert_pem).unwrap()
        );
        // fhirContext carries the consent hint.
        assert_eq!(record.fhir_context.len(), 1);
        assert_eq!(record.fhir_context[0].r#type, "Consent");
        assert_eq!(record.fhir_context[0].identifier.value, "c-1");
    }

    #[tokio::test]
    async fn wrong_grant_and_missing_pieces() {
        let f = fixture();
        let peer = peer_of(&f);

        let mut req = request(assertion_for(&f, None), DS_ADDRESS);
        req.grant_type = "authorization_code".into();
        let err = f.issuer.issue(&req, Some(&peer)).await.unwrap_err();
        assert_eq!(err.oauth_error_code(), "unsupported_grant_type");

        let mut req = request(assertion_for(&f, None), DS_ADDRESS);
        req.client_assertion = None;
        let err = f.issuer.issue(&req, Some(&peer)).await.unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_client");

        let mut req = request(assertion_for(&f, None), DS_ADDRESS);
        req.resource = None;
        let err = f.issuer.issue(&req, Some(&peer)).await.unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_request");
    }

    #[tokio::test]
    async fn unknown_client_is_invalid_client() {
        let f = fixture();
        let claims = serde_json::json!({
            "iss": "ghost-client",
            "sub": "ghost-client",
            "aud": format!("{PCM_BASE}/token"),
            "exp": hdp_core::time::unix_now() + 300,
        });
        let assertion = jsonwebtoken::encode(
            &Header::new(jsonwebtoken::Algorithm::RS256),
            &claims,
            &f.sp.signing_key,
        )
        .unwrap();
        let err = f
            .issuer
            .issue(&request(assertion, DS_ADDRESS), Some(&peer_of(&f)))
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_client");
    }

    #[tokio::test]
    async fn foreign_organization_assertion_is_unauthorized_client() {
        let f = fixture();
        let b2b = serde_json::json!({
            "organization_id": format!("{PCM_BASE}/r4/Organization/org-hospital-b"),
            "consent_reference": ["Consent/c-1"],
        });
        let err = f
            .issuer
            .issue(&request(assertion_for(&f, Some(b2b)), DS_ADDRESS), Some(&peer_of(&f)))
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "unauthorized_client");
    }

    #[tokio::test]
    async fn missing_or_inactive_consent_is_invalid_grant() {
        let f = fixture();
        let b2b = serde_json::json!({
            "organization_id": format!("{PCM_BASE}/r4/Organization/org-sp"),
            "consent_reference": ["Consent/nope"],
        });
        let err = f
            .issuer
            .issue(&request(assertion_for(&f, Some(b2b)), DS_ADDRESS), Some(&peer_of(&f)))
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_grant");

        // Deactivate the consent; same request now fails the status check.
        f.issuer
            .store
            .consents
            .update_with("Consent", "c-1", |c| {
                c.status = ConsentStatus::Inactive;
                Ok(())
            })
            .unwrap();
        let err = f
            .issuer
            .issue(&request(assertion_for(&f, Some(b2b_block())), DS_ADDRESS), Some(&peer_of(&f)))
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_grant");
    }

    #[tokio::test]
    async fn non_party_consent_is_access_denied() {
        let f = fixture();
        // Rewrite the consent so org-sp is no longer an actor.
        f.issuer
            .store
            .consents
            .update_with("Consent", "c-1", |c| {
                c.provision.actor.retain(|a| !a.reference.points_to("Organization", "org-sp"));
                Ok(())
            })
            .unwrap();

        let err = f
            .issuer
            .issue(&request(assertion_for(&f, Some(b2b_block())), DS_ADDRESS), Some(&peer_of(&f)))
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "access_denied");
        assert!(err.description().contains("not a party"));
    }

    #[tokio::test]
    async fn resource_not_owned_by_custodian_is_invalid_target() {
        let f = fixture();
        let err = f
            .issuer
            .issue(
                &request(assertion_for(&f, Some(b2b_block())), "https://evil.example/fhir"),
                Some(&peer_of(&f)),
            )
            .await
            .unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_target");
    }

    #[tokio::test]
    async fn plain_flow_defaults_scope_and_mismatched_peer_still_issues() {
        let f = fixture();
        // Present a different certificate at the TLS layer; issuance warns
        // but proceeds, and cnf stays bound to the registered certificate.
        let stranger = credential();
        let peer = PeerCertificate::from_pem(&stranger.cert_pem).unwrap();

        let response = f
            .issuer
            .issue(&request(assertion_for(&f, None), DS_ADDRESS), Some(&peer))
            .await
            .unwrap();
        assert_eq!(response.scope, SCOPE_SYSTEM_CRUDS);

        let record = f
            .tokens
            .get_active(&response.access_token, hdp_core::time::unix_now())
            .unwrap();
        assert!(record.patient.is_none());
        assert_eq!(
            record.cnf.x5t_s256,
            thumbprint::thumbprint_of_pem(&f.sp.cert_pem).unwrap()
        );
    }

    #[tokio::test]
    async fn requested_scope_must_be_allowed() {
        let f = fixture();
        let mut req = request(assertion_for(&f, None), DS_ADDRESS);
        req.scope = Some("introspection".into());
        let response = f.issuer.issue(&req, Some(&peer_of(&f))).await.unwrap();
        assert_eq!(response.scope, "introspection");

        let mut req = request(assertion_for(&f, None), DS_ADDRESS);
        req.scope = Some("admin/everything".into());
        let err = f.issuer.issue(&req, Some(&peer_of(&f))).await.unwrap_err();
        assert_eq!(err.oauth_error_code(), "invalid_scope");
    }
}

//! Shared fixtures: a seeded server on an ephemeral port and signed client
//! credentials.

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use rsa::pkcs8::{EncodePrivateKey, LineEnding};
use tokio::task::JoinHandle;

use hdp_auth::client::{ClientRecord, InMemoryClientStorage};
use hdp_core::Reference;
use hdp_core::resources::{Endpoint, Organization};
use hdp_core::terminology::{ORG_TYPE_SOURCE, SCOPE_INTROSPECTION, SCOPE_SYSTEM_CRUDS};
use hdp_pcm_server::config::AppConfig;
use hdp_pcm_server::{AppState, bootstrap, build_app};
use hdp_store::ResourceStore;

pub const PUBLIC_BASE: &str = "https://localhost:8443";
pub const DS_ADDRESS: &str = "https://ds-gw:8080/fhir";
pub const DS_B_ADDRESS: &str = "https://ds-b-gw:8080/fhir";

/// A registered client credential: certificate plus assertion signing key.
#[derive(Clone)]
pub struct Credential {
    pub client_id: String,
    pub cert_pem: String,
    signing_key: EncodingKey,
}

impl Credential {
    pub fn generate(client_id: &str) -> Self {
        let private = rsa::RsaPrivateKey::new(&mut rand::thread_rng(), 2048).unwrap();
        let pkcs8 = private.to_pkcs8_pem(LineEnding::LF).unwrap().to_string();
        let keypair = rcgen::KeyPair::from_pem(&pkcs8).unwrap();
        let cert = rcgen::CertificateParams::new(vec![format!("{client_id}.example")])
            .unwrap()
            .self_signed(&keypair)
            .unwrap();
        Self {
            client_id: client_id.to_string(),
            cert_pem: cert.pem(),
            signing_key: EncodingKey::from_rsa_pem(pkcs8.as_bytes()).unwrap(),
        }
    }

    /// Signs a client assertion, optionally carrying a B2B block.
    pub fn assertion(&self, b2b: Option<serde_json::Value>) -> String {
        let mut claims = serde_json::json!({
            "iss": self.client_id,
            "sub": self.client_id,
            "aud": format!("{PUBLIC_BASE}/token"),
            "exp": time::OffsetDateTime::now_utc().unix_timestamp() + 300,
            "jti": uuid_like(),
        });
        if let Some(b2b) = b2b {
            claims["extensions"] = serde_json::json!({ "hl7-b2b": b2b });
        }
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key).unwrap()
    }

    /// The URL-escaped PEM for the forwarded-certificate header.
    pub fn cert_header(&self) -> String {
        urlencoding::encode(&self.cert_pem).into_owned()
    }
}

fn uuid_like() -> String {
    format!("jti-{}", std::time::UNIX_EPOCH.elapsed().unwrap().as_nanos())
}

/// The running test server and its registered credentials.
pub struct TestServer {
    pub base: String,
    pub sp: Credential,
    pub hospital_b: Credential,
    pub admin: Credential,
    pub pep: Credential,
    pub pep_b: Credential,
    _handle: JoinHandle<()>,
}

/// Seeds the default graph plus a second Data Source, registers one client
/// per organization, and serves on an ephemeral port.
pub async fn start_server() -> TestServer {
    let store = ResourceStore::new();
    bootstrap::seed_store(&store);

    let mut ds_b = Organization::new("org-ds-b", "Second Repository").with_org_type(ORG_TYPE_SOURCE);
    ds_b.endpoint = vec![Reference::to("Endpoint", "ep-ds-b")];
    store.organizations.put("org-ds-b", ds_b);
    store
        .endpoints
        .put("ep-ds-b", Endpoint::new("ep-ds-b", DS_B_ADDRESS).managed_by("org-ds-b"));

    // Key generation is expensive; the credential set is shared across the
    // binary's tests.
    static CREDENTIALS: std::sync::OnceLock<[Credential; 5]> = std::sync::OnceLock::new();
    let [sp, hospital_b, admin, pep, pep_b] = CREDENTIALS
        .get_or_init(|| {
            [
                Credential::generate("sp-client"),
                Credential::generate("hospital-b-client"),
                Credential::generate("pcm-admin-client"),
                Credential::generate("vaccine-repo-pep"),
                Credential::generate("ds-b-pep"),
            ]
        })
        .clone();

    let clients = InMemoryClientStorage::new();
    for (credential, organization_id, scopes) in [
        (&sp, "org-sp", vec![SCOPE_SYSTEM_CRUDS]),
        (&hospital_b, "org-hospital-b-sp", vec![SCOPE_SYSTEM_CRUDS]),
        (&admin, "org-pcm", vec![SCOPE_SYSTEM_CRUDS]),
        (&pep, "org-vaccine-repo", vec![SCOPE_SYSTEM_CRUDS, SCOPE_INTROSPECTION]),
        (&pep_b, "org-ds-b", vec![SCOPE_SYSTEM_CRUDS, SCOPE_INTROSPECTION]),
    ] {
        clients.register(ClientRecord::new(
            &credential.client_id,
            organization_id,
            credential.cert_pem.clone(),
            scopes.into_iter().map(String::from).collect(),
        ));
    }

    let state = AppState::build(AppConfig::default(), store, clients).expect("state");
    let app = build_app(state);

    let listener = tokio::net::TcpListener::bind((std::net::Ipv4Addr::LOCALHOST, 0))
        .await
        .expect("bind");
    let addr = listener.local_addr().unwrap();
    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    TestServer {
        base: format!("http://{addr}"),
        sp,
        hospital_b,
        admin,
        pep,
        pep_b,
        _handle: handle,
    }
}

impl TestServer {
    /// Obtains an access token for a credential, optionally consent-bound.
    pub async fn token(
        &self,
        credential: &Credential,
        resource: &str,
        b2b: Option<serde_json::Value>,
        scope: Option<&str>,
    ) -> reqwest::Response {
        let mut form = vec![
            ("grant_type", "client_credentials".to_string()),
            (
                "client_assertion_type",
                "urn:ietf:params:oauth:client-assertion-type:jwt-bearer".to_string(),
            ),
            ("client_assertion", credential.assertion(b2b)),
            ("resource", resource.to_string()),
        ];
        if let Some(scope) = scope {
            form.push(("scope", scope.to_string()));
        }
        reqwest::Client::new()
            .post(format!("{}/token", self.base))
            .header("x-client-cert", credential.cert_header())
            .form(&form)
            .send()
            .await
            .unwrap()
    }

    /// Obtains a bearer for the RS surface.
    pub async fn bearer(&self, credential: &Credential) -> String {
        let response = self
            .token(credential, &format!("{PUBLIC_BASE}/r4"), None, None)
            .await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        response.json::<serde_json::Value>().await.unwrap()["access_token"]
            .as_str()
            .unwrap()
            .to_string()
    }

    /// Obtains a bearer carrying the introspection scope.
    pub async fn bearer_with_introspection(&self, credential: &Credential) -> String {
        let response = self
            .token(
                credential,
                &format!("{PUBLIC_BASE}/r4"),
                None,
                Some("introspection"),
            )
            .await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        response.json::<serde_json::Value>().await.unwrap()["access_token"]
            .as_str()
            .unwrap()
            .to_string()
    }

    /// A GET against the RS surface, authenticated as `credential`.
    pub async fn rs_get(&self, credential: &Credential, path: &str) -> reqwest::Response {
        let bearer = self.bearer(credential).await;
        reqwest::Client::new()
            .get(format!("{}/r4{path}", self.base))
            .header("x-client-cert", credential.cert_header())
            .bearer_auth(bearer)
            .send()
            .await
            .unwrap()
    }

    /// A POST of a resource body, authenticated as `credential`.
    pub async fn rs_post(
        &self,
        credential: &Credential,
        path: &str,
        body: &serde_json::Value,
    ) -> reqwest::Response {
        let bearer = self.bearer(credential).await;
        reqwest::Client::new()
            .post(format!("{}/r4{path}", self.base))
            .header("x-client-cert", credential.cert_header())
            .bearer_auth(bearer)
            .json(body)
            .send()
            .await
            .unwrap()
    }

    /// A PUT of a resource body, authenticated as `credential`.
    pub async fn rs_put(
        &self,
        credential: &Credential,
        path: &str,
        body: &serde_json::Value,
    ) -> reqwest::Response {
        let bearer = self.bearer(credential).await;
        reqwest::Client::new()
            .put(format!("{}/r4{path}", self.base))
            .header("x-client-cert", credential.cert_header())
            .bearer_auth(bearer)
            .json(body)
            .send()
            .await
            .unwrap()
    }

    /// Creates a consent as the SP and approves it as the admin, adding the
    /// custodian actor — the fixed mutation the approval UI performs.
    pub async fn approved_consent(&self, custodian_org: &str) -> serde_json::Value {
        let response = self
            .rs_post(
                &self.sp,
                "/Consent",
                &serde_json::json!({
                    "resourceType": "Consent",
                    "status": "proposed",
                    "patient": {
                        "identifier": {
                            "system": "http://fhir.health.gov.il/identifier/il-national-id",
                            "value": "99887766",
                        }
                    },
                    "extension": [{
                        "url": "http://pcm.fhir.health.gov.il/StructureDefinition/ext-pcm-service",
                        "valueReference": {"reference": "HealthcareService/service-1"},
                    }],
                }),
            )
            .await;
        assert_eq!(response.status(), reqwest::StatusCode::CREATED);
        let mut consent: serde_json::Value = response.json().await.unwrap();

        // Approval: active status plus the custodian actor.
        consent["status"] = serde_json::json!("active");
        consent["provision"]["actor"]
            .as_array_mut()
            .unwrap()
            .push(serde_json::json!({
                "role": {
                    "coding": [{
                        "system": "http://terminology.hl7.org/CodeSystem/v3-ParticipationType",
                        "code": "CST",
                    }]
                },
                "reference": {"reference": format!("Organization/{custodian_org}")},
            }));
        let id = consent["id"].as_str().unwrap().to_string();
        let response = self
            .rs_put(&self.admin, &format!("/Consent/{id}"), &consent)
            .await;
        assert_eq!(response.status(), reqwest::StatusCode::OK);
        response.json().await.unwrap()
    }

    /// The B2B block binding `organization_id` to `consent_id`.
    pub fn b2b(organization_id: &str, consent_id: &str) -> serde_json::Value {
        serde_json::json!({
            "organization_id": format!("{PUBLIC_BASE}/r4/Organization/{organization_id}"),
            "purpose_of_use": ["TREAT"],
            "consent_reference": [format!("Consent/{consent_id}")],
        })
    }
}

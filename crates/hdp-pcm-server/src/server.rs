//! Application state and router assembly.

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post, put};

use hdp_auth::client::InMemoryClientStorage;
use hdp_auth::introspection::IntrospectionService;
use hdp_auth::issuer::{IssuerConfig, TokenIssuer};
use hdp_auth::token::TokenStore;
use hdp_store::ResourceStore;

use crate::bootstrap;
use crate::config::AppConfig;
use crate::handlers::{discovery, introspect, resources, token};

/// Shared state of the co-located authorization and resource servers.
#[derive(Clone)]
pub struct AppState {
    pub store: Arc<ResourceStore>,
    pub tokens: Arc<TokenStore>,
    pub issuer: Arc<TokenIssuer>,
    pub introspection: Arc<IntrospectionService>,
    pub config: Arc<AppConfig>,
    /// DER of the configured trust anchor, when any.
    pub trust_anchor: Option<Arc<Vec<u8>>>,
}

impl AppState {
    /// Builds state over an already-seeded store and client registry.
    pub fn build(
        config: AppConfig,
        store: ResourceStore,
        clients: InMemoryClientStorage,
    ) -> Result<Self, String> {
        let trust_anchor = match &config.tls.trust_anchor_pem_path {
            Some(path) => {
                let pem = std::fs::read_to_string(path)
                    .map_err(|e| format!("cannot read trust anchor {path}: {e}"))?;
                let der = hdp_auth::thumbprint::pem_to_der(&pem)
                    .map_err(|e| format!("trust anchor {path}: {e}"))?;
                Some(Arc::new(der))
            }
            None => None,
        };

        let store = Arc::new(store);
        let tokens = Arc::new(TokenStore::new());
        let clients = Arc::new(clients);
        let issuer = Arc::new(TokenIssuer::new(
            clients,
            store.clone(),
            tokens.clone(),
            IssuerConfig {
                public_base_url: config.server.public_base_url.clone(),
                token_ttl_secs: config.token.ttl_secs,
            },
        ));
        let introspection = Arc::new(IntrospectionService::new(tokens.clone(), store.clone()));

        Ok(Self {
            store,
            tokens,
            issuer,
            introspection,
            config: Arc::new(config),
            trust_anchor,
        })
    }

    /// Builds state with the default seed set and config-seeded clients.
    pub fn bootstrap(config: AppConfig) -> Result<Self, String> {
        let store = ResourceStore::new();
        bootstrap::seed_store(&store);
        let clients = bootstrap::seed_clients(&config)?;
        Self::build(config, store, clients)
    }
}

/// Assembles the API router: the two token operations, the discovery
/// endpoints, and the `/r4` resource surface.
pub fn build_app(state: AppState) -> Router {
    let r4 = Router::new()
        .route(
            "/.well-known/smart-configuration",
            get(discovery::smart_configuration),
        )
        .route("/metadata", get(discovery::metadata))
        .route(
            "/Organization",
            get(resources::organization_search).post(resources::organization_create),
        )
        .route(
            "/Organization/{id}",
            get(resources::organization_read).put(resources::organization_update),
        )
        .route(
            "/Endpoint",
            get(resources::endpoint_search).post(resources::endpoint_create),
        )
        .route(
            "/Endpoint/{id}",
            get(resources::endpoint_read).put(resources::endpoint_update),
        )
        .route(
            "/HealthcareService",
            get(resources::service_search).post(resources::service_create),
        )
        .route(
            "/HealthcareService/{id}",
            get(resources::service_read).put(resources::service_update),
        )
        .route(
            "/Consent",
            get(resources::consent_search).post(resources::consent_create),
        )
        .route(
            "/Consent/{id}",
            get(resources::consent_read).put(resources::consent_update),
        )
        .route(
            "/VerificationResult",
            get(resources::verification_result_search)
                .post(resources::verification_result_create),
        )
        .route(
            "/VerificationResult/{id}",
            get(resources::verification_result_read),
        );

    Router::new()
        .route("/token", post(token::token_handler))
        .route("/introspect", post(introspect::introspect_handler))
        .nest("/r4", r4)
        .with_state(state)
}

/// Binds the API listener and serves until shutdown.
pub async fn run(config: AppConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.addr();
    let state = AppState::bootstrap(config)?;
    let app = build_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "PCM server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

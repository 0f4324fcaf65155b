//! Data Source resource server.
//!
//! Sits behind the gateway/PEP pair and trusts only the internal HS256
//! token minted by the PEP; any other bearer is rejected. Responses are
//! keyed by the token's mapped patient (`Patient/<hash>`), so the national
//! identifier never reaches this process. Scopes are not enforced at this
//! layer; the custodian binding at token issuance already restricts what
//! can arrive here.

pub mod config;
pub mod handlers;
pub mod token;

use axum::Router;
use axum::routing::get;

use hdp_auth::local_token::LocalTokenService;

pub use config::DsConfig;

/// Shared DS resource-server state.
#[derive(Clone)]
pub struct DsState {
    pub local_tokens: LocalTokenService,
}

impl DsState {
    #[must_use]
    pub fn build(config: &DsConfig) -> Self {
        Self {
            local_tokens: LocalTokenService::new(
                config.internal.secret.as_bytes(),
                config.internal.token_ttl_secs,
            ),
        }
    }
}

/// Assembles the DS router.
pub fn build_app(state: DsState) -> Router {
    Router::new()
        .route("/fhir/Observation", get(handlers::observation_search))
        .with_state(state)
}

/// Binds the listener and serves until shutdown.
pub async fn run(config: DsConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.addr();
    let state = DsState::build(&config);
    let app = build_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "DS resource server listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Initializes the tracing subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

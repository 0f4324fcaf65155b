//! Data Source policy enforcement point.
//!
//! Sits behind the DS gateway, which calls `GET /auth-check` as a
//! sub-request for every inbound data request. The PEP introspects the
//! external bearer with the PCM, translates the patient identity into a
//! hashed local subject, and hands back a short-lived internal token in the
//! `X-Local-Token` header for the gateway to swap in.

pub mod auth_check;
pub mod config;
pub mod identity;
pub mod pcm;

use std::sync::Arc;

use axum::Router;
use axum::routing::get;

use hdp_auth::local_token::LocalTokenService;

pub use config::PepConfig;

/// Shared PEP state.
#[derive(Clone)]
pub struct PepState {
    pub pcm: Arc<pcm::PcmClient>,
    pub local_tokens: LocalTokenService,
}

impl PepState {
    /// Builds state from configuration.
    ///
    /// # Errors
    ///
    /// Fails when the PEP's signing key cannot be loaded.
    pub fn build(config: &PepConfig) -> Result<Self, String> {
        let pcm = pcm::PcmClient::new(config.pcm.clone())?;
        let local_tokens = LocalTokenService::new(
            config.internal.secret.as_bytes(),
            config.internal.token_ttl_secs,
        );
        Ok(Self {
            pcm: Arc::new(pcm),
            local_tokens,
        })
    }
}

/// Assembles the PEP router.
pub fn build_app(state: PepState) -> Router {
    Router::new()
        .route("/auth-check", get(auth_check::auth_check_handler))
        .with_state(state)
}

/// Binds the listener and serves until shutdown.
pub async fn run(config: PepConfig) -> Result<(), Box<dyn std::error::Error>> {
    let addr = config.addr();
    let state = PepState::build(&config)?;
    let app = build_app(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(%addr, "PEP listening");
    axum::serve(listener, app).await?;
    Ok(())
}

/// Initializes the tracing subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

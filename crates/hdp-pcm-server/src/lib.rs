//! Patient Consent Manager: authorization server and resource server in one
//! process, sharing the token and resource stores.

pub mod authz;
pub mod bootstrap;
pub mod config;
pub mod handlers;
pub mod outcome;
pub mod peer_cert;
pub mod server;

pub use config::AppConfig;
pub use server::{AppState, build_app, run};

/// Initializes the tracing subscriber once per process.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt::try_init();
}

//! The `POST /token` endpoint.

use axum::Form;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use tracing::{info, warn};

use hdp_auth::issuer::TokenRequest;

use crate::handlers::{oauth_error_response, oauth_success_response};
use crate::peer_cert;
use crate::server::AppState;

/// Token endpoint handler: mTLS gate first, then the issuance pipeline.
pub async fn token_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(request): Form<TokenRequest>,
) -> Response {
    let peer = match peer_cert::extract_peer(
        &headers,
        state.trust_anchor.as_deref().map(Vec::as_slice),
        state.config.tls.require_client_cert,
    ) {
        Ok(peer) => peer,
        Err(error) => {
            warn!(error = %error, "token request failed the mTLS gate");
            return oauth_error_response(error);
        }
    };

    match state.issuer.issue(&request, peer.as_ref()).await {
        Ok(response) => {
            info!(grant_type = %request.grant_type, "token issued");
            oauth_success_response(response)
        }
        Err(error) => {
            warn!(
                grant_type = %request.grant_type,
                error = %error,
                "token request rejected"
            );
            oauth_error_response(error)
        }
    }
}

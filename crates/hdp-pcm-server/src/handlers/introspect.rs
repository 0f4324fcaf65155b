//! The `POST /introspect` endpoint.
//!
//! Callers authenticate with mTLS plus their own bearer token, which must
//! carry the `introspection` scope. The caller's organization determines the
//! audience binding.

use axum::Form;
use axum::extract::State;
use axum::http::HeaderMap;
use axum::response::Response;
use tracing::{debug, warn};

use hdp_auth::AuthError;
use hdp_auth::introspection::IntrospectionRequest;
use hdp_core::terminology::SCOPE_INTROSPECTION;

use crate::handlers::{oauth_error_response, oauth_success_response};
use crate::peer_cert;
use crate::server::AppState;

pub async fn introspect_handler(
    State(state): State<AppState>,
    headers: HeaderMap,
    Form(request): Form<IntrospectionRequest>,
) -> Response {
    if let Err(error) = peer_cert::extract_peer(
        &headers,
        state.trust_anchor.as_deref().map(Vec::as_slice),
        state.config.tls.require_client_cert,
    ) {
        warn!(error = %error, "introspection request failed the mTLS gate");
        return oauth_error_response(error);
    }

    // The caller's own access token authenticates it.
    let bearer = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty());
    let Some(bearer) = bearer else {
        return oauth_error_response(AuthError::unauthorized("bearer token required"));
    };
    let Some(caller) = state.tokens.get_active(bearer, hdp_core::time::unix_now()) else {
        return oauth_error_response(AuthError::unauthorized("invalid or expired token"));
    };
    if !caller.has_scope(SCOPE_INTROSPECTION) {
        return oauth_error_response(AuthError::forbidden(
            "introspection scope required",
        ));
    }

    match state
        .introspection
        .introspect(&caller.organization_id, &request.token)
    {
        Ok(response) => {
            debug!(
                caller = %caller.organization_id,
                active = response.active,
                "token introspected"
            );
            oauth_success_response(response)
        }
        Err(error) => {
            warn!(caller = %caller.organization_id, error = %error, "introspection rejected");
            oauth_error_response(error)
        }
    }
}

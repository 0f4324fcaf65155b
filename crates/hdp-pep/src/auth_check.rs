//! The `GET /auth-check` sub-request handler.
//!
//! The gateway forwards the original `Authorization` header and the SP's
//! mTLS certificate (URL-escaped PEM in `x-client-cert`). On success the
//! response carries the internal token in `X-Local-Token`; the gateway
//! rewrites the upstream `Authorization` with it.

use axum::Json;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use serde_json::json;
use tracing::warn;

use hdp_auth::local_token::LocalTokenClaims;
use hdp_auth::thumbprint::PeerCertificate;

use crate::PepState;
use crate::identity;

/// Response header carrying the minted internal token.
pub const LOCAL_TOKEN_HEADER: &str = "x-local-token";

fn unauthorized(reason: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(json!({"error": "unauthorized", "error_description": reason})),
    )
        .into_response()
}

pub async fn auth_check_handler(State(state): State<PepState>, headers: HeaderMap) -> Response {
    // 1. The original bearer.
    let Some(bearer) = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
    else {
        return unauthorized("missing bearer token");
    };

    // 2–4. Introspect with the PCM; failures and inactive tokens are both
    // a 401 for the caller.
    let introspection = match state.pcm.introspect(bearer).await {
        Ok(response) => response,
        Err(error) => {
            warn!(error = %error, "introspection failed");
            return unauthorized("introspection failed");
        }
    };
    if !introspection.active {
        return unauthorized("token is not active");
    }

    // 5. Advisory holder-of-key check against the gateway-forwarded
    // certificate; a mismatch is logged, never blocking.
    let forwarded_thumbprint = headers
        .get("x-client-cert")
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| urlencoding::decode(raw).ok())
        .and_then(|pem| PeerCertificate::from_pem(&pem).ok())
        .map(|peer| peer.thumbprint);
    if let (Some(presented), Some(cnf)) = (&forwarded_thumbprint, &introspection.cnf)
        && *presented != cnf.x5t_s256
    {
        warn!(
            presented = %presented,
            bound = %cnf.x5t_s256,
            "presented certificate does not match the token's holder-of-key binding"
        );
    }

    // 6. Identity translation.
    let Some(patient) = introspection.patient.as_deref() else {
        return unauthorized("token carries no patient binding");
    };
    let local_patient = match identity::local_subject(patient) {
        Ok(subject) => subject,
        Err(error) => {
            warn!(error = %error, "patient binding malformed");
            return unauthorized("patient binding malformed");
        }
    };

    let claims = LocalTokenClaims {
        sub: introspection.client_id.clone().unwrap_or_default(),
        scope: introspection.scope.clone().unwrap_or_default(),
        iss: introspection.iss.clone().unwrap_or_default(),
        aud: introspection.aud.clone().unwrap_or_default(),
        jti: String::new(),
        iat: introspection.iat.unwrap_or(0),
        exp: 0,
        patient: local_patient,
        fhir_context: introspection.fhir_context.clone(),
        cnf: introspection.cnf.clone(),
    };
    let token = match state.local_tokens.mint(claims) {
        Ok(token) => token,
        Err(error) => {
            warn!(error = %error, "cannot mint local token");
            return unauthorized("cannot mint local token");
        }
    };

    // 7. The gateway swaps this into the upstream Authorization header.
    (StatusCode::OK, [(LOCAL_TOKEN_HEADER, token)]).into_response()
}

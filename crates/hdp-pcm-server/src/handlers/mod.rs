//! HTTP handlers for the authorization and resource surfaces.

pub mod discovery;
pub mod introspect;
pub mod resources;
pub mod token;

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use hdp_auth::AuthError;

/// Maps an authorization error to the OAuth 2.0 error body with no-store
/// caching headers.
pub fn oauth_error_response(error: AuthError) -> Response {
    let status =
        StatusCode::from_u16(error.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let body = json!({
        "error": error.oauth_error_code(),
        "error_description": error.description(),
    });
    (
        status,
        [
            ("Cache-Control", "no-store"),
            ("Pragma", "no-cache"),
        ],
        Json(body),
    )
        .into_response()
}

/// Wraps a successful token-endpoint payload with no-store caching headers.
pub fn oauth_success_response<T: serde::Serialize>(payload: T) -> Response {
    (
        StatusCode::OK,
        [
            ("Cache-Control", "no-store"),
            ("Pragma", "no-cache"),
        ],
        Json(payload),
    )
        .into_response()
}

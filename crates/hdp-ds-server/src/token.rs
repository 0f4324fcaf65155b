//! Internal-token bearer extraction.

use axum::http::HeaderMap;

use hdp_auth::error::AuthResult;
use hdp_auth::local_token::{LocalTokenClaims, LocalTokenService};

/// Validates the internal bearer; anything else — including an opaque PCM
/// token — is rejected.
///
/// # Errors
///
/// Returns `AuthError::Unauthorized` when the bearer is missing, not an
/// HS256 token under the shared secret, or expired.
pub fn authenticate(headers: &HeaderMap, service: &LocalTokenService) -> AuthResult<LocalTokenClaims> {
    let bearer = headers
        .get("authorization")
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .filter(|token| !token.is_empty())
        .ok_or_else(|| hdp_auth::AuthError::unauthorized("missing bearer token"))?;
    service.verify(bearer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use hdp_auth::local_token::LocalTokenClaims;

    fn claims() -> LocalTokenClaims {
        LocalTokenClaims {
            sub: "sp-client".into(),
            scope: "patient/Observation.rs".into(),
            iss: "https://pcm.example".into(),
            aud: "https://ds-gw:8080/fhir".into(),
            jti: String::new(),
            iat: 0,
            exp: 0,
            patient: "Patient/abc".into(),
            fhir_context: Vec::new(),
            cnf: None,
        }
    }

    #[test]
    fn accepts_only_the_internal_token() {
        let service = LocalTokenService::new(b"internal-secret", 30);
        let token = service.mint(claims()).unwrap();

        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_str(&format!("Bearer {token}")).unwrap(),
        );
        let verified = authenticate(&headers, &service).unwrap();
        assert_eq!(verified.patient, "Patient/abc");

        // An opaque external token never validates here.
        let mut headers = HeaderMap::new();
        headers.insert(
            "authorization",
            HeaderValue::from_static("Bearer 3f6c2a9e-opaque-uuid"),
        );
        assert!(authenticate(&headers, &service).is_err());

        assert!(authenticate(&HeaderMap::new(), &service).is_err());
    }
}

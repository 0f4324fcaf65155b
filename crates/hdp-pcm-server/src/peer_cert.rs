//! The mTLS gate.
//!
//! TLS (including client-certificate verification against the platform CA)
//! terminates in front of this process; the terminator forwards the verified
//! peer certificate URL-escaped in the `x-client-cert` header, the same
//! contract the DS gateway uses towards its PEP. When a trust anchor is
//! configured the certificate's signature is re-verified here, so a
//! misconfigured terminator cannot smuggle untrusted certificates through.

use axum::http::HeaderMap;

use hdp_auth::error::{AuthError, AuthResult};
use hdp_auth::thumbprint::PeerCertificate;

/// Header carrying the URL-escaped PEM of the verified peer certificate.
pub const CLIENT_CERT_HEADER: &str = "x-client-cert";

/// Extracts and verifies the forwarded peer certificate.
///
/// # Errors
///
/// Returns `AuthError::AccessDenied` when the certificate is required but
/// missing, unparseable, or not issued by the trust anchor.
pub fn extract_peer(
    headers: &HeaderMap,
    trust_anchor_der: Option<&[u8]>,
    required: bool,
) -> AuthResult<Option<PeerCertificate>> {
    let Some(raw) = headers.get(CLIENT_CERT_HEADER) else {
        if required {
            return Err(AuthError::access_denied("client certificate required"));
        }
        return Ok(None);
    };

    let raw = raw
        .to_str()
        .map_err(|_| AuthError::access_denied("client certificate header is not valid text"))?;
    let pem = urlencoding::decode(raw)
        .map_err(|_| AuthError::access_denied("client certificate header is not URL-encoded"))?;

    let peer = PeerCertificate::from_pem(&pem)?;
    if let Some(anchor) = trust_anchor_der {
        peer.verify_signed_by(anchor)?;
    }
    Ok(Some(peer))
}

/// As `extract_peer`, but with a required certificate.
///
/// # Errors
///
/// See `extract_peer`.
pub fn require_peer(
    headers: &HeaderMap,
    trust_anchor_der: Option<&[u8]>,
) -> AuthResult<PeerCertificate> {
    extract_peer(headers, trust_anchor_der, true)?
        .ok_or_else(|| AuthError::access_denied("client certificate required"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;

    fn cert_pem() -> String {
        let key = rcgen::KeyPair::generate().unwrap();
        rcgen::CertificateParams::new(vec!["peer.example".to_string()])
            .unwrap()
            .self_signed(&key)
            .unwrap()
            .pem()
    }

    #[test]
    fn missing_header_denied_when_required() {
        let headers = HeaderMap::new();
        let err = require_peer(&headers, None).unwrap_err();
        assert_eq!(err.oauth_error_code(), "access_denied");
        assert!(extract_peer(&headers, None, false).unwrap().is_none());
    }

    #[test]
    fn url_escaped_pem_round_trips() {
        let pem = cert_pem();
        let mut headers = HeaderMap::new();
        headers.insert(
            CLIENT_CERT_HEADER,
            HeaderValue::from_str(&urlencoding::encode(&pem)).unwrap(),
        );
        let peer = require_peer(&headers, None).unwrap();
        assert_eq!(
            peer.thumbprint,
            hdp_auth::thumbprint::thumbprint_of_pem(&pem).unwrap()
        );
    }

    #[test]
    fn untrusted_certificate_denied_with_anchor() {
        let pem = cert_pem();
        let anchor_der = hdp_auth::thumbprint::pem_to_der(&cert_pem()).unwrap();
        let mut headers = HeaderMap::new();
        headers.insert(
            CLIENT_CERT_HEADER,
            HeaderValue::from_str(&urlencoding::encode(&pem)).unwrap(),
        );
        let err = require_peer(&headers, Some(&anchor_der)).unwrap_err();
        assert_eq!(err.oauth_error_code(), "access_denied");
    }
}

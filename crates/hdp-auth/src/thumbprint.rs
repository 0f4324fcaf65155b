//! Certificate thumbprints and holder-of-key material.
//!
//! The confirmation format is `x5t#S256`: base64url (no padding) of the
//! SHA-256 digest over the DER-encoded certificate (RFC 8705 §3.1).

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::DecodingKey;
use sha2::{Digest, Sha256};
use x509_parser::prelude::{FromDer, X509Certificate};

use crate::error::{AuthError, AuthResult};

/// A parsed peer certificate retained for holder-of-key checks.
#[derive(Debug, Clone)]
pub struct PeerCertificate {
    /// DER encoding of the certificate.
    pub der: Vec<u8>,
    /// Precomputed `x5t#S256` thumbprint.
    pub thumbprint: String,
}

impl PeerCertificate {
    /// Parses a PEM-encoded certificate.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::AccessDenied` when the PEM does not decode to a
    /// certificate — a failed mTLS gate, not a client-assertion problem.
    pub fn from_pem(pem: &str) -> AuthResult<Self> {
        let der = pem_to_der(pem)?;
        let thumbprint = x5t_s256(&der);
        Ok(Self { der, thumbprint })
    }

    /// Verifies that this certificate was signed by the trust anchor.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::AccessDenied` when the signature does not verify
    /// against the anchor's public key.
    pub fn verify_signed_by(&self, anchor_der: &[u8]) -> AuthResult<()> {
        let (_, cert) = X509Certificate::from_der(&self.der)
            .map_err(|e| AuthError::access_denied(format!("peer certificate unparseable: {e}")))?;
        let (_, anchor) = X509Certificate::from_der(anchor_der)
            .map_err(|e| AuthError::internal(format!("trust anchor unparseable: {e}")))?;
        cert.verify_signature(Some(anchor.public_key()))
            .map_err(|_| AuthError::access_denied("peer certificate not issued by trust anchor"))
    }
}

/// Decodes the first PEM block into DER bytes.
///
/// # Errors
///
/// Returns `AuthError::AccessDenied` on malformed PEM.
pub fn pem_to_der(pem: &str) -> AuthResult<Vec<u8>> {
    let (_, parsed) = x509_parser::pem::parse_x509_pem(pem.as_bytes())
        .map_err(|e| AuthError::access_denied(format!("invalid certificate PEM: {e}")))?;
    Ok(parsed.contents)
}

/// Computes the `x5t#S256` thumbprint of a DER-encoded certificate.
#[must_use]
pub fn x5t_s256(der: &[u8]) -> String {
    URL_SAFE_NO_PAD.encode(Sha256::digest(der))
}

/// Thumbprint of a PEM-encoded certificate.
///
/// # Errors
///
/// Returns `AuthError::AccessDenied` on malformed PEM.
pub fn thumbprint_of_pem(pem: &str) -> AuthResult<String> {
    Ok(x5t_s256(&pem_to_der(pem)?))
}

/// Extracts the assertion-verification key from a client's registered
/// certificate PEM.
///
/// Only RSA subject keys are supported; assertions are verified with RS256.
///
/// # Errors
///
/// Returns `AuthError::InvalidClient` when the certificate or its subject
/// public key cannot be used.
pub fn decoding_key_from_cert_pem(pem: &str) -> AuthResult<DecodingKey> {
    let der = pem_to_der(pem)
        .map_err(|_| AuthError::invalid_client("registered client certificate is not valid PEM"))?;
    let (_, cert) = X509Certificate::from_der(&der)
        .map_err(|e| AuthError::invalid_client(format!("registered certificate unparseable: {e}")))?;
    // For rsaEncryption keys the BIT STRING payload is the PKCS#1
    // RSAPublicKey structure jsonwebtoken expects.
    let spki = cert.public_key();
    Ok(DecodingKey::from_rsa_der(&spki.subject_public_key.data))
}

//! Client assertion validation (RFC 7523) with the HL7 B2B authorization
//! extension.
//!
//! The assertion is a JWT signed with the private key matching the client's
//! registered certificate. `iss` and `sub` must both equal the client id,
//! and `aud` must name the token endpoint. Both the `http` and `https`
//! variants of the endpoint URL are accepted to tolerate TLS-terminating
//! proxies in front of the listener.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{AuthError, AuthResult};

/// Audience claim: a single string or an array of strings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StringOrArray {
    String(String),
    Array(Vec<String>),
}

impl StringOrArray {
    /// Checks if the audience contains the specified value.
    #[must_use]
    pub fn contains(&self, value: &str) -> bool {
        match self {
            Self::String(s) => s == value,
            Self::Array(values) => values.iter().any(|s| s == value),
        }
    }
}

/// The `extensions.hl7-b2b` object carried in B2B client assertions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct B2bAuthorization {
    /// URL whose trailing segment names the asserting organization.
    #[serde(default)]
    pub organization_id: Option<String>,
    /// Purpose-of-use codes; carried through but not evaluated here.
    #[serde(default)]
    pub purpose_of_use: Vec<String>,
    /// Consent references the requested token should be bound to.
    #[serde(default)]
    pub consent_reference: Vec<String>,
}

impl B2bAuthorization {
    /// The trailing path segment of `organization_id`.
    #[must_use]
    pub fn organization_id_suffix(&self) -> Option<&str> {
        self.organization_id
            .as_deref()
            .map(|id| id.trim_end_matches('/'))
            .and_then(|id| id.rsplit('/').next())
            .filter(|suffix| !suffix.is_empty())
    }
}

/// Structured extension claims.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AssertionExtensions {
    #[serde(rename = "hl7-b2b", default)]
    pub hl7_b2b: Option<B2bAuthorization>,
}

/// Claims of a client assertion.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientAssertionClaims {
    pub iss: String,
    pub sub: String,
    pub aud: StringOrArray,
    pub exp: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub jti: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub extensions: Option<AssertionExtensions>,
}

impl ClientAssertionClaims {
    /// The B2B authorization block, if the assertion carries one.
    #[must_use]
    pub fn b2b(&self) -> Option<&B2bAuthorization> {
        self.extensions.as_ref().and_then(|e| e.hl7_b2b.as_ref())
    }
}

/// Accepted token-endpoint audiences derived from the server's public base
/// URL: the configured scheme plus its http/https twin.
///
/// # Errors
///
/// Returns `AuthError::Internal` when the configured base URL is unparseable.
pub fn accepted_audiences(public_base_url: &str) -> AuthResult<Vec<String>> {
    let mut url = Url::parse(public_base_url)
        .map_err(|e| AuthError::internal(format!("invalid public base url: {e}")))?;
    let path = format!("{}/token", url.path().trim_end_matches('/'));
    url.set_path(&path);

    let mut audiences = vec![url.to_string()];
    let other_scheme = match url.scheme() {
        "https" => "http",
        _ => "https",
    };
    if url.set_scheme(other_scheme).is_ok() {
        audiences.push(url.to_string());
    }
    Ok(audiences)
}

/// Decodes the assertion payload without verifying the signature, returning
/// `(iss, sub)`.
///
/// Used to find the client whose registered certificate verifies the
/// assertion; never trust these values before `verify` succeeds.
///
/// # Errors
///
/// Returns `AuthError::InvalidClient` when the JWT is malformed or either
/// claim is missing.
pub fn peek_issuer(assertion: &str) -> AuthResult<(String, String)> {
    let mut parts = assertion.split('.');
    let (Some(_), Some(payload), Some(_), None) =
        (parts.next(), parts.next(), parts.next(), parts.next())
    else {
        return Err(AuthError::invalid_client("assertion is not a JWT"));
    };

    let payload_bytes = URL_SAFE_NO_PAD
        .decode(payload)
        .map_err(|_| AuthError::invalid_client("assertion payload is not base64url"))?;

    #[derive(Deserialize)]
    struct MinimalClaims {
        #[serde(default)]
        iss: Option<String>,
        #[serde(default)]
        sub: Option<String>,
    }

    let claims: MinimalClaims = serde_json::from_slice(&payload_bytes)
        .map_err(|_| AuthError::invalid_client("assertion payload is not JSON"))?;

    match (claims.iss, claims.sub) {
        (Some(iss), Some(sub)) => Ok((iss, sub)),
        _ => Err(AuthError::invalid_client("assertion requires iss and sub")),
    }
}

/// Verifies the assertion signature (RS256) and audience, returning the
/// full claims.
///
/// # Errors
///
/// Returns `AuthError::InvalidClient` on any signature, audience, or
/// expiry failure.
pub fn verify(
    assertion: &str,
    key: &DecodingKey,
    audiences: &[String],
) -> AuthResult<ClientAssertionClaims> {
    let mut validation = Validation::new(Algorithm::RS256);
    validation.set_audience(audiences);

    let data = jsonwebtoken::decode::<ClientAssertionClaims>(assertion, key, &validation)
        .map_err(|e| {
            tracing::debug!(error = %e, "client assertion verification failed");
            AuthError::invalid_client(format!("invalid client assertion: {e}"))
        })?;
    Ok(data.claims)
}

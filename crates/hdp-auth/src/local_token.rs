//! The Data Source's internal token.
//!
//! After a successful introspection the PEP translates the external patient
//! identity into a hashed local subject and mints a short-lived HS256 JWT for
//! the resource server behind it. The shared secret never leaves the Data
//! Source.

use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{AuthError, AuthResult};
use crate::token::{Confirmation, FhirContext};

/// Claims of the DS-internal token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LocalTokenClaims {
    pub sub: String,
    pub scope: String,
    pub iss: String,
    pub aud: String,
    pub jti: String,
    pub iat: i64,
    pub exp: i64,
    /// The hashed local subject, `Patient/<hex sha-256>`.
    pub patient: String,
    #[serde(rename = "fhirContext", default, skip_serializing_if = "Vec::is_empty")]
    pub fhir_context: Vec<FhirContext>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cnf: Option<Confirmation>,
}

/// Mints and validates DS-internal tokens with the shared secret.
#[derive(Clone)]
pub struct LocalTokenService {
    encoding: EncodingKey,
    decoding: DecodingKey,
    ttl_secs: i64,
}

impl LocalTokenService {
    /// Creates a service around the shared internal secret.
    #[must_use]
    pub fn new(secret: &[u8], ttl_secs: i64) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
            ttl_secs,
        }
    }

    /// The configured token lifetime in seconds.
    #[must_use]
    pub fn ttl_secs(&self) -> i64 {
        self.ttl_secs
    }

    /// Signs claims into a token. `iat` is copied through when the caller
    /// set one (defaulting to now), `exp` becomes `iat + ttl`, and a fresh
    /// `jti` is assigned.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Internal` if signing fails.
    pub fn mint(&self, mut claims: LocalTokenClaims) -> AuthResult<String> {
        if claims.iat <= 0 {
            claims.iat = hdp_core::time::unix_now();
        }
        claims.exp = claims.iat + self.ttl_secs;
        claims.jti = Uuid::new_v4().to_string();
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::internal(format!("failed to sign local token: {e}")))
    }

    /// Validates a bearer and returns its claims. Anything that is not an
    /// unexpired HS256 token under the shared secret is rejected.
    ///
    /// # Errors
    ///
    /// Returns `AuthError::Unauthorized` on any validation failure.
    pub fn verify(&self, token: &str) -> AuthResult<LocalTokenClaims> {
        let mut validation = Validation::new(Algorithm::HS256);
        // `aud` is copied through from the external token and varies per
        // Data Source; expiry is the gate here.
        validation.validate_aud = false;
        jsonwebtoken::decode::<LocalTokenClaims>(token, &self.decoding, &validation)
            .map(|data| data.claims)
            .map_err(|e| AuthError::unauthorized(format!("invalid local token: {e}")))
    }
}

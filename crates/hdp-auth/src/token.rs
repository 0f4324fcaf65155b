//! Opaque access tokens and the in-memory token store.
//!
//! Tokens are v4 uuids; the record behind them lives only in process memory
//! and is rebuilt empty on restart. Expiry is checked lazily on lookup and
//! expired entries are removed when observed — with a 30-second lifetime
//! there is nothing to sweep.

use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use hdp_core::types::Identifier;

/// Holder-of-key confirmation claim.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Confirmation {
    /// base64url SHA-256 over the DER-encoded client certificate.
    #[serde(rename = "x5t#S256")]
    pub x5t_s256: String,
}

/// A `{type, identifier}` hint for downstream policy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FhirContext {
    #[serde(rename = "type")]
    pub r#type: String,
    pub identifier: Identifier,
}

/// The record behind an opaque access token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenRecord {
    pub token: String,
    pub sub: String,
    pub client_id: String,
    pub organization_id: String,
    pub scope: String,
    pub iss: String,
    /// The resource address this token is usable against.
    pub aud: String,
    /// `system|value` patient binding for consent-bound tokens.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub patient: Option<String>,
    #[serde(rename = "fhirContext", default, skip_serializing_if = "Vec::is_empty")]
    pub fhir_context: Vec<FhirContext>,
    pub cnf: Confirmation,
    pub iat: i64,
    pub exp: i64,
}

impl TokenRecord {
    /// Returns `true` if the token has expired at `now`.
    #[must_use]
    pub fn is_expired(&self, now: i64) -> bool {
        self.exp < now
    }

    /// Returns `true` if the token's scope includes `scope` as a
    /// space-separated part.
    #[must_use]
    pub fn has_scope(&self, scope: &str) -> bool {
        self.scope.split_whitespace().any(|part| part == scope)
    }
}

/// Generates a fresh opaque token value.
#[must_use]
pub fn mint_token_value() -> String {
    Uuid::new_v4().to_string()
}

/// The process-wide token map shared by issuance and introspection.
#[derive(Debug, Default)]
pub struct TokenStore {
    tokens: DashMap<String, TokenRecord>,
}

impl TokenStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a token record (last-writer-wins on the astronomically
    /// unlikely uuid collision).
    pub fn insert(&self, record: TokenRecord) {
        self.tokens.insert(record.token.clone(), record);
    }

    /// Looks up an unexpired token. An expired entry is removed on
    /// observation and reported as absent.
    #[must_use]
    pub fn get_active(&self, token: &str, now: i64) -> Option<TokenRecord> {
        let record = self.tokens.get(token).map(|entry| entry.value().clone())?;
        if record.is_expired(now) {
            self.tokens.remove(token);
            return None;
        }
        Some(record)
    }

    /// Number of live entries (including not-yet-observed expired ones).
    #[must_use]
    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    /// Returns `true` if no tokens are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

//! SMART configuration discovery document.
//!
//! Served unauthenticated at `/r4/.well-known/smart-configuration` so PEPs
//! can locate the token and introspection endpoints.

use serde::{Deserialize, Serialize};

use hdp_core::terminology::{SCOPE_INTROSPECTION, SCOPE_SYSTEM_CRUDS};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmartConfiguration {
    pub issuer: String,
    pub token_endpoint: String,
    pub introspection_endpoint: String,
    pub grant_types_supported: Vec<String>,
    pub token_endpoint_auth_methods_supported: Vec<String>,
    pub scopes_supported: Vec<String>,
    pub capabilities: Vec<String>,
}

impl SmartConfiguration {
    /// Builds the document from the server's public base URL.
    #[must_use]
    pub fn build(public_base_url: &str) -> Self {
        let base = public_base_url.trim_end_matches('/');
        Self {
            issuer: base.to_string(),
            token_endpoint: format!("{base}/token"),
            introspection_endpoint: format!("{base}/introspect"),
            grant_types_supported: vec!["client_credentials".to_string()],
            token_endpoint_auth_methods_supported: vec!["private_key_jwt".to_string()],
            scopes_supported: vec![
                SCOPE_SYSTEM_CRUDS.to_string(),
                SCOPE_INTROSPECTION.to_string(),
            ],
            capabilities: vec![
                "client-confidential-asymmetric".to_string(),
                "permission-v2".to_string(),
            ],
        }
    }
}

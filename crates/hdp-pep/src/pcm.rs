//! Outbound PCM client: discovery, the PEP's own access token, and
//! introspection.
//!
//! Both the token and the discovery document are cached. Refresh races on a
//! cold cache can cause duplicate fetches; that is acceptable. A 401/403
//! from introspection invalidates the cached token and the call retries
//! once with a fresh one.

use std::time::Duration;

use jsonwebtoken::{Algorithm, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use hdp_auth::error::{AuthError, AuthResult};
use hdp_auth::introspection::IntrospectionResponse;
use hdp_core::terminology::SCOPE_INTROSPECTION;

use crate::config::PcmSettings;

/// The slice of SMART discovery the PEP needs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmartEndpoints {
    pub token_endpoint: String,
    pub introspection_endpoint: String,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponseBody {
    access_token: String,
    expires_in: i64,
}

/// Client for the PCM authorization server.
pub struct PcmClient {
    http: reqwest::Client,
    settings: PcmSettings,
    signing_key: EncodingKey,
    token_cache: RwLock<Option<CachedToken>>,
    discovery_cache: RwLock<Option<SmartEndpoints>>,
}

impl PcmClient {
    /// Builds the client, loading the PEP's assertion signing key.
    ///
    /// # Errors
    ///
    /// Fails when the key is missing or not a valid RSA PEM.
    pub fn new(settings: PcmSettings) -> Result<Self, String> {
        let pem = match (&settings.private_key_pem, &settings.private_key_pem_path) {
            (Some(pem), _) => pem.clone(),
            (None, Some(path)) => std::fs::read_to_string(path)
                .map_err(|e| format!("cannot read private key {path}: {e}"))?,
            (None, None) => return Err("no private key configured".into()),
        };
        let signing_key = EncodingKey::from_rsa_pem(pem.as_bytes())
            .map_err(|e| format!("invalid private key: {e}"))?;
        let http = reqwest::Client::builder()
            .timeout(Duration::from_millis(settings.timeout_ms))
            .build()
            .map_err(|e| format!("http client: {e}"))?;
        Ok(Self {
            http,
            settings,
            signing_key,
            token_cache: RwLock::new(None),
            discovery_cache: RwLock::new(None),
        })
    }

    /// The discovery endpoints, cached; falls back to configured defaults
    /// when the discovery document is unreachable.
    pub async fn endpoints(&self) -> SmartEndpoints {
        if let Some(cached) = self.discovery_cache.read().await.clone() {
            return cached;
        }

        let base = self.settings.base_url.trim_end_matches('/');
        let url = format!("{base}/r4/.well-known/smart-configuration");
        match self.fetch_discovery(&url).await {
            Ok(endpoints) => {
                *self.discovery_cache.write().await = Some(endpoints.clone());
                endpoints
            }
            Err(error) => {
                tracing::warn!(error = %error, "SMART discovery failed, using configured defaults");
                SmartEndpoints {
                    token_endpoint: format!("{base}/token"),
                    introspection_endpoint: self
                        .settings
                        .introspect_fallback_url
                        .clone()
                        .unwrap_or_else(|| format!("{base}/introspect")),
                }
            }
        }
    }

    async fn fetch_discovery(&self, url: &str) -> AuthResult<SmartEndpoints> {
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| AuthError::internal(format!("discovery request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(AuthError::internal(format!(
                "discovery returned {}",
                response.status()
            )));
        }
        response
            .json::<SmartEndpoints>()
            .await
            .map_err(|e| AuthError::internal(format!("discovery body unreadable: {e}")))
    }

    /// The PEP's own access token (scope `introspection`), cached until
    /// shortly before expiry.
    pub async fn own_token(&self) -> AuthResult<String> {
        let now = hdp_core::time::unix_now();
        if let Some(cached) = self.token_cache.read().await.clone()
            && cached.expires_at > now
        {
            return Ok(cached.access_token);
        }

        let endpoints = self.endpoints().await;
        let assertion = self.sign_assertion(&endpoints.token_endpoint)?;
        let response = self
            .http
            .post(&endpoints.token_endpoint)
            .form(&[
                ("grant_type", "client_credentials"),
                (
                    "client_assertion_type",
                    "urn:ietf:params:oauth:client-assertion-type:jwt-bearer",
                ),
                ("client_assertion", assertion.as_str()),
                ("resource", self.settings.base_url.as_str()),
                ("scope", SCOPE_INTROSPECTION),
            ])
            .send()
            .await
            .map_err(|e| AuthError::unauthorized(format!("token request failed: {e}")))?;
        if !response.status().is_success() {
            return Err(AuthError::unauthorized(format!(
                "token endpoint returned {}",
                response.status()
            )));
        }
        let body: TokenResponseBody = response
            .json()
            .await
            .map_err(|e| AuthError::unauthorized(format!("token body unreadable: {e}")))?;

        let cached = CachedToken {
            access_token: body.access_token.clone(),
            // A small margin keeps a nearly-expired token from being used.
            expires_at: now + body.expires_in - 5,
        };
        *self.token_cache.write().await = Some(cached);
        Ok(body.access_token)
    }

    /// Drops the cached token.
    pub async fn invalidate_token(&self) {
        *self.token_cache.write().await = None;
    }

    /// Introspects `token`, retrying once with a fresh own-token after a
    /// 401/403.
    pub async fn introspect(&self, token: &str) -> AuthResult<IntrospectionResponse> {
        match self.introspect_once(token).await {
            Err(AuthError::Unauthorized { .. } | AuthError::Forbidden { .. }) => {
                tracing::debug!("introspection rejected our token, refreshing and retrying");
                self.invalidate_token().await;
                self.introspect_once(token).await
            }
            other => other,
        }
    }

    async fn introspect_once(&self, token: &str) -> AuthResult<IntrospectionResponse> {
        let endpoints = self.endpoints().await;
        let bearer = self.own_token().await?;
        let response = self
            .http
            .post(&endpoints.introspection_endpoint)
            .bearer_auth(bearer)
            .form(&[("token", token)])
            .send()
            .await
            .map_err(|e| AuthError::internal(format!("introspection request failed: {e}")))?;

        match response.status().as_u16() {
            200 => response
                .json::<IntrospectionResponse>()
                .await
                .map_err(|e| AuthError::internal(format!("introspection body unreadable: {e}"))),
            401 => Err(AuthError::unauthorized("introspection rejected the caller")),
            403 => Err(AuthError::forbidden("introspection refused the caller")),
            other => Err(AuthError::internal(format!(
                "introspection returned {other}"
            ))),
        }
    }

    fn sign_assertion(&self, token_endpoint: &str) -> AuthResult<String> {
        let now = hdp_core::time::unix_now();
        let claims = serde_json::json!({
            "iss": self.settings.client_id,
            "sub": self.settings.client_id,
            "aud": token_endpoint,
            "exp": now + 300,
            "iat": now,
            "jti": Uuid::new_v4().to_string(),
        });
        jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &self.signing_key)
            .map_err(|e| AuthError::internal(format!("cannot sign assertion: {e}")))
    }
}

//! PCM server configuration.
//!
//! Loaded from an optional TOML file plus `HDP_PCM__`-prefixed environment
//! overrides, e.g. `HDP_PCM__SERVER__PORT=9443`.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub tls: TlsConfig,
    #[serde(default)]
    pub token: TokenSettings,
    #[serde(default)]
    pub logging: LoggingConfig,
    /// Registered clients, seeded at boot and not mutable through the API.
    #[serde(default)]
    pub clients: Vec<ClientSeed>,
}

impl AppConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.token.ttl_secs <= 0 {
            return Err("token.ttl_secs must be > 0".into());
        }
        let lvl = self.logging.level.to_ascii_lowercase();
        let valid_levels = ["trace", "debug", "info", "warn", "error", "off"];
        if !valid_levels.contains(&lvl.as_str()) {
            return Err(format!("logging.level must be one of {valid_levels:?}"));
        }
        for client in &self.clients {
            if client.certificate_pem.is_none() && client.certificate_pem_path.is_none() {
                return Err(format!(
                    "client '{}' needs certificate_pem or certificate_pem_path",
                    client.client_id
                ));
            }
        }
        Ok(())
    }

    pub fn addr(&self) -> SocketAddr {
        use std::net::{IpAddr, Ipv4Addr};
        let host: IpAddr = self
            .server
            .host
            .parse()
            .unwrap_or(IpAddr::V4(Ipv4Addr::new(0, 0, 0, 0)));
        SocketAddr::from((host, self.server.port))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    #[serde(default = "default_port")]
    pub port: u16,
    /// Public base URL, used for assertion audiences and discovery links.
    /// The API listener sits behind the mTLS terminator that advertises it.
    #[serde(default = "default_public_base_url")]
    pub public_base_url: String,
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    8443
}
fn default_public_base_url() -> String {
    "https://localhost:8443".into()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            public_base_url: default_public_base_url(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TlsConfig {
    /// PEM of the CA that client certificates must chain to. When unset,
    /// forwarded certificates are accepted as already verified by the
    /// terminator.
    #[serde(default)]
    pub trust_anchor_pem_path: Option<String>,
    /// Whether a forwarded client certificate is required at all. Disabled
    /// only in tests.
    #[serde(default = "default_require_client_cert")]
    pub require_client_cert: bool,
}

fn default_require_client_cert() -> bool {
    true
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            trust_anchor_pem_path: None,
            require_client_cert: default_require_client_cert(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenSettings {
    #[serde(default = "default_token_ttl")]
    pub ttl_secs: i64,
}

fn default_token_ttl() -> i64 {
    30
}

impl Default for TokenSettings {
    fn default() -> Self {
        Self {
            ttl_secs: default_token_ttl(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".into()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

/// A registered client seed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientSeed {
    pub client_id: String,
    pub organization_id: String,
    /// Inline certificate PEM; takes precedence over the path.
    #[serde(default)]
    pub certificate_pem: Option<String>,
    #[serde(default)]
    pub certificate_pem_path: Option<String>,
    #[serde(default)]
    pub scopes: Vec<String>,
}

pub mod loader {
    use super::AppConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    /// Loads configuration from `path` (or `hdp-pcm.toml` when present) and
    /// the environment.
    pub fn load_config(path: Option<&str>) -> Result<AppConfig, String> {
        let mut builder = Config::builder();
        let default_path = PathBuf::from(path.unwrap_or("hdp-pcm.toml"));
        if default_path.exists() {
            builder = builder.add_source(File::from(default_path));
        }
        builder = builder.add_source(
            Environment::with_prefix("HDP_PCM")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: AppConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}

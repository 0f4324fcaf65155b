//! DS resource-server configuration.

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct DsConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub internal: InternalTokenSettings,
}

impl DsConfig {
    pub fn validate(&self) -> Result<(), String> {
        if self.server.port == 0 {
            return Err("server.port must be > 0".into());
        }
        if self.internal.secret.is_empty() {
            return Err("internal.secret must be set".into());
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
}

fn default_host() -> String {
    "0.0.0.0".into()
}
fn default_port() -> u16 {
    3002
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

/// The internal token contract shared with the PEP.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InternalTokenSettings {
    #[serde(default)]
    pub secret: String,
    #[serde(default = "default_internal_ttl")]
    pub token_ttl_secs: i64,
}

fn default_internal_ttl() -> i64 {
    30
}

impl Default for InternalTokenSettings {
    fn default() -> Self {
        Self {
            secret: String::new(),
            token_ttl_secs: default_internal_ttl(),
        }
    }
}

pub mod loader {
    use super::DsConfig;
    use config::{Config, Environment, File};
    use std::path::PathBuf;

    pub fn load_config(path: Option<&str>) -> Result<DsConfig, String> {
        let mut builder = Config::builder();
        let default_path = PathBuf::from(path.unwrap_or("hdp-ds.toml"));
        if default_path.exists() {
            builder = builder.add_source(File::from(default_path));
        }
        builder = builder.add_source(
            Environment::with_prefix("HDP_DS")
                .try_parsing(true)
                .separator("__"),
        );
        let cfg = builder
            .build()
            .map_err(|e| format!("config build error: {e}"))?;
        let merged: DsConfig = cfg
            .try_deserialize()
            .map_err(|e| format!("config deserialize error: {e}"))?;
        merged.validate()?;
        Ok(merged)
    }
}

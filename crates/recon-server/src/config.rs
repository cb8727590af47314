use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::time::Duration;

/// Review UI server configuration. There is no API-key / rate-limit
/// surface here — the review UI is an internal tool and authentication is
/// explicitly out of scope.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
    pub port: u16,
    pub timeout_secs: u64,
    pub page_size: usize,
    pub enable_cors: bool,
    pub log_level: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0".to_string(),
            port: 8080,
            timeout_secs: 30,
            page_size: 50,
            enable_cors: true,
            log_level: "info".to_string(),
        }
    }
}

impl ServerConfig {
    /// Load from `recon-server.{toml,json,...}` if present, then layer
    /// `RECON_SERVER__*` environment variables over it.
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let builder = config::Config::builder()
            .add_source(config::File::with_name("recon-server").required(false))
            .add_source(config::Environment::with_prefix("RECON_SERVER").separator("__"));

        let config: ServerConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }

    pub fn socket_addr(&self) -> anyhow::Result<SocketAddr> {
        Ok(format!("{}:{}", self.bind_addr, self.port).parse()?)
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_binds_on_8080() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.port, 8080);
        assert_eq!(cfg.page_size, 50);
    }

    #[test]
    fn socket_addr_parses() {
        let cfg = ServerConfig::default();
        let addr = cfg.socket_addr().unwrap();
        assert_eq!(addr.port(), 8080);
    }
}

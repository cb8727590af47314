use serde::{Deserialize, Serialize};

use recon_resolution::EngineConfig;
use recon_server::ServerConfig;

/// Top-level configuration for the `recon` binary: where the embedded store
/// lives, on top of the `recon-server`/`recon-resolution` configs those
/// crates already know how to load. Layered the same way: a `recon.toml`
/// file if present, then `RECON__*` environment variables.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    pub db_path: String,
    pub server: ServerConfig,
    pub engine: EngineConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            db_path: "recon.redb".to_string(),
            server: ServerConfig::default(),
            engine: EngineConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let builder = config::Config::builder()
            .add_source(config::File::with_name("recon").required(false))
            .add_source(config::Environment::with_prefix("RECON").separator("__"));

        let config: AppConfig = builder.build()?.try_deserialize()?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_points_at_a_local_db_file() {
        let cfg = AppConfig::default();
        assert_eq!(cfg.db_path, "recon.redb");
        assert_eq!(cfg.server.port, 8080);
    }
}

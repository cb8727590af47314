//! `recon` CLI: starts the HTTP review server over an embedded `redb` store.

use std::sync::Arc;

use recon::{run_review_server, AppConfig, RedbStore};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = AppConfig::load()?;

    tracing_subscriber::fmt()
        .with_env_filter(&config.server.log_level)
        .with_target(false)
        .json()
        .init();

    let store = Arc::new(RedbStore::open(&config.db_path)?);

    tracing::info!(db_path = %config.db_path, "opened store");

    run_review_server(store, config.server, config.engine).await
}

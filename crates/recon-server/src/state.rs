use std::sync::Arc;

use recon_resolution::EngineConfig;
use recon_store::Store;

use crate::config::ServerConfig;

/// Shared state handed to every handler. Generic over the storage backend
/// so the same router works against `MemStore` in tests and `RedbStore` in
/// the running binary — the backend is pluggable at the `recon-store`
/// layer, so the generic has to reach all the way up to here.
pub struct ServerState<S: Store> {
    pub store: Arc<S>,
    pub config: ServerConfig,
    pub engine_config: EngineConfig,
}

impl<S: Store> ServerState<S> {
    pub fn new(store: Arc<S>, config: ServerConfig, engine_config: EngineConfig) -> Self {
        Self {
            store,
            config,
            engine_config,
        }
    }
}

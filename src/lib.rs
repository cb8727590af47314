//! Workspace umbrella crate for the resolution engine.
//!
//! `recon` re-exports the context, storage, intake and resolution layers so
//! an application can pull a single dependency instead of wiring the four
//! crates by hand. [`apply_correction`] is the one function most callers
//! need: hand it an observed value, its context, and a scope, and it
//! returns the canonical entity that value currently resolves to, creating
//! or reusing a Resolution edge as it goes.
//!
//! ## Quick start
//!
//! ```ignore
//! use recon::{apply_correction, EngineConfig, RedbStore};
//! use recon_context::ContextElement;
//!
//! # fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let store = RedbStore::open("recon.redb")?;
//! let config = EngineConfig::default();
//! let context = vec![ContextElement::new("country", "US")];
//!
//! let entity = apply_correction(&store, &config, "Acme Corp", &context, 1, &[])?;
//! # Ok(())
//! # }
//! ```
//!
//! When built with the `server` feature this crate also exposes
//! [`run_review_server`], which starts the HTTP review UI over a given
//! store.

pub use recon_context::{
    canonical_key, first_by_key, lists_structurally_equal, match_context, sim, ContextElement,
    ContextMatch,
};
pub use recon_intake::{
    find_or_create_canonical_entity, find_or_create_occurrence, CanonicalEntityArgs, IntakeError,
};
pub use recon_resolution::{
    apply_correction, best_for, conflicting_occurrences, delete, invalidate_scope, is_cache_valid,
    occurrences_in_scope, prune_stale, refresh_cache, resolution_stats, resolutions_by_status,
    resolutions_for_occurrence, set_status, upsert_pending, EngineConfig, Hypothesis,
    ResolutionError, ResolutionStats, ResolutionWithEndpoints,
};
pub use recon_store::{
    CanonicalEntityRow, MemStore, OccurrenceRow, ResolutionRow, ResolutionStatus, ScopeRow, Store,
    StoreError, Transaction,
};

#[cfg(feature = "embedded")]
pub use recon_store::RedbStore;

#[cfg(feature = "server")]
mod config;

#[cfg(feature = "server")]
pub use config::AppConfig;

#[cfg(feature = "server")]
pub use recon_server::{build_router, ServerConfig, ServerState};

/// Start the HTTP review server against `store`, blocking until shutdown.
///
/// Thin wrapper over [`recon_server::start_server`] so callers that only
/// need the common case don't have to build a [`ServerState`] by hand.
#[cfg(feature = "server")]
pub async fn run_review_server<S: Store + 'static>(
    store: std::sync::Arc<S>,
    server_config: ServerConfig,
    engine_config: EngineConfig,
) -> anyhow::Result<()> {
    let state = std::sync::Arc::new(ServerState::new(store, server_config, engine_config));
    recon_server::start_server(state).await
}

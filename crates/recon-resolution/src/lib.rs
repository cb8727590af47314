//! The resolution store, the `apply_correction` engine, and the read-side
//! query helpers the review UI runs against.
//!
//! The invalidation cache itself lives in `recon_store::cache` since it
//! only ever touches Occurrence/Scope rows — this crate re-exports it so
//! callers have one place to look.

mod engine;
mod error;
mod queries;
mod store;

pub use engine::{apply_correction, EngineConfig, Hypothesis};
pub use error::ResolutionError;
pub use queries::{
    conflicting_occurrences, occurrences_in_scope, resolution_stats, resolutions_by_status,
    resolutions_for_occurrence, ResolutionStats, ResolutionWithEndpoints,
};
pub use store::{best_for, delete, prune_stale, set_status, upsert_pending};

// Re-exported so review-UI code (recon-server) can invalidate and inspect
// the cache through this crate alone without an extra recon-store import.
pub use recon_store::{invalidate_scope, is_cache_valid, refresh_cache};

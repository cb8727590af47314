//! Transactional storage abstraction for the resolution engine.
//!
//! `recon-resolution` and `recon-intake` are written generic over [`Store`]
//! so they can run against the in-memory [`MemStore`] in tests and the
//! durable [`RedbStore`] in production, without either crate knowing which
//! one it's talking to.

mod cache;
mod error;
mod mem;
#[cfg(feature = "redb")]
mod redb_backend;
mod schema;
mod traits;

pub use cache::{invalidate_scope, is_cache_valid, refresh_cache};
pub use error::StoreError;
pub use mem::MemStore;
#[cfg(feature = "redb")]
pub use redb_backend::RedbStore;
pub use schema::{CanonicalEntityRow, OccurrenceRow, ResolutionRow, ResolutionStatus, ScopeRow};
pub use traits::{Store, Transaction};

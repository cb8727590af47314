use thiserror::Error;

/// Errors surfaced by the storage layer: a flat enum with `#[error]`
/// messages and `#[from]` wiring for the underlying serialization/backend
/// failures, never a single opaque `anyhow::Error`.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("scope {0} does not exist")]
    ScopeNotFound(u64),

    #[error("occurrence {0} does not exist")]
    OccurrenceNotFound(u64),

    #[error("canonical entity {0} does not exist")]
    CanonicalEntityNotFound(u64),

    #[error("resolution {0} does not exist")]
    ResolutionNotFound(u64),

    #[error("uniqueness conflict: {0}")]
    UniquenessConflict(String),

    #[error("row serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl StoreError {
    pub fn backend(msg: impl Into<String>) -> Self {
        StoreError::Backend(msg.into())
    }
}

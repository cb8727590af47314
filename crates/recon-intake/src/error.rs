use thiserror::Error;

/// Errors raised while upserting occurrences and canonical entities: a
/// flat enum where validation failures are distinguished from storage
/// failures so callers can decide whether a retry is sensible.
#[derive(Debug, Error)]
pub enum IntakeError {
    #[error("value exceeds the 500-character bound")]
    ValueTooLong,

    #[error("context element is missing a key")]
    MissingContextKey,

    #[error(transparent)]
    Store(#[from] recon_store::StoreError),
}

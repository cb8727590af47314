use thiserror::Error;

/// Errors raised by the resolution store and the `apply_correction`
/// engine: a flat enum split between input problems and store problems,
/// with the approved-invariant case called out explicitly because it is
/// the one place the engine performs its own read-modify-write recovery.
#[derive(Debug, Error)]
pub enum ResolutionError {
    #[error("value exceeds the 500-character bound")]
    ValueTooLong,

    #[error("context element is missing a key")]
    MissingContextKey,

    #[error("scope {0} does not exist")]
    UnknownScope(u64),

    #[error("resolution {0} does not exist")]
    NotFound(u64),

    #[error("could not demote the prior approved resolution for occurrence {0}: {source}")]
    ApprovedInvariantViolation {
        occurrence_id: u64,
        #[source]
        source: recon_store::StoreError,
    },

    #[error(transparent)]
    Intake(#[from] recon_intake::IntakeError),

    #[error(transparent)]
    Store(#[from] recon_store::StoreError),
}

//! Deduplicated intake: turning raw observations and hypothesis payloads
//! into the Occurrence and CanonicalEntity rows the resolution engine
//! scores against.
//!
//! Both functions here run inside a caller-provided transaction — they do
//! not open their own, so `recon-resolution`'s engine can compose them with
//! its own reads and writes atomically.

mod canonical;
mod error;
mod occurrence;

pub use canonical::{find_or_create_canonical_entity, CanonicalEntityArgs};
pub use error::IntakeError;
pub use occurrence::find_or_create_occurrence;

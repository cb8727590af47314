//! Context element model, coverage/match predicate, and value similarity.
//!
//! This is the bottom of the `recon` dependency graph: pure functions and
//! plain-old-data, no I/O, no storage concerns. `recon-intake` and
//! `recon-resolution` build on top of the types here.

mod element;
mod match_predicate;
mod similarity;

pub use element::{canonical_key, first_by_key, lists_structurally_equal, ContextElement};
pub use match_predicate::{match_context, ContextMatch};
pub use similarity::sim;

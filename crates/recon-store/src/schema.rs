use chrono::{DateTime, Utc};
use recon_context::ContextElement;
use serde::{Deserialize, Serialize};

/// Lifecycle status of a `Resolution` edge.
///
/// Encoded as `u8` on the wire/in storage: `0` pending, `1` approved, `9`
/// invalid. The gap mirrors the Django model's `CheckConstraint` values,
/// which reserved the range for statuses that were never added.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum ResolutionStatus {
    Pending = 0,
    Approved = 1,
    Invalid = 9,
}

impl ResolutionStatus {
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(ResolutionStatus::Pending),
            1 => Some(ResolutionStatus::Approved),
            9 => Some(ResolutionStatus::Invalid),
            _ => None,
        }
    }
}

/// A scope: the namespace a set of occurrences/canonical entities/resolutions
/// are deduplicated within. `updated_at` is bumped whenever the scope's
/// canonical-entity set changes, and is the epoch the invalidation cache
/// compares occurrence timestamps against.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScopeRow {
    pub id: u64,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// A single noisy observation, scoped, carrying a value and its context.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OccurrenceRow {
    pub id: u64,
    pub scope_id: u64,
    pub value: String,
    pub context: Vec<ContextElement>,
    pub resolved_to: Option<u64>,
    pub updated_at: DateTime<Utc>,
}

/// A deduplicated, canonical record. `external_id`, when present, is the
/// caller-supplied stable identity and takes lookup priority over
/// `(value, required_context_elements)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEntityRow {
    pub id: u64,
    pub scope_id: u64,
    pub value: String,
    pub external_id: Option<String>,
    pub required_context_elements: Vec<ContextElement>,
    pub context: Vec<ContextElement>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub updated_at: DateTime<Utc>,
}

/// An edge recording one candidate pairing of an occurrence to a canonical
/// entity, with its score and review status. `manual` marks a status set by
/// a human reviewer rather than the engine — the pruning rule refuses to
/// delete a manually-invalidated resolution even when it falls out of the
/// engine's candidate set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResolutionRow {
    pub id: u64,
    pub scope_id: u64,
    pub occurrence_id: u64,
    pub canonical_entity_id: u64,
    pub status: ResolutionStatus,
    pub score: f64,
    pub manual: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

use std::collections::HashSet;

use chrono::Utc;
use recon_context::{lists_structurally_equal, match_context, sim, ContextElement};
use recon_intake::{find_or_create_canonical_entity, find_or_create_occurrence, CanonicalEntityArgs};
use recon_store::{
    is_cache_valid, refresh_cache, CanonicalEntityRow, ResolutionStatus, ScopeRow, Store,
    Transaction,
};
use serde::{Deserialize, Serialize};

use crate::error::ResolutionError;
use crate::store::{best_for, prune_stale, upsert_pending};

/// A candidate canonical entity supplied alongside a correction request.
/// Materialized into a real canonical entity before scoring so it can win
/// like any other candidate.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Hypothesis {
    pub value: String,
    #[serde(default)]
    pub context: Vec<ContextElement>,
    #[serde(default)]
    pub required_context_elements: Vec<ContextElement>,
    #[serde(default)]
    pub external_id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Tunables for the engine that are a deployment choice rather than part of
/// the resolution algorithm itself.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Whether `scope_id = 0` is treated as "use/create sentinel scope 1".
    /// Gated because a caller that legitimately owns scope id 1 for
    /// something else would otherwise be surprised.
    pub allow_sentinel_scope: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            allow_sentinel_scope: true,
        }
    }
}

const SENTINEL_SCOPE_ID: u64 = 1;

/// The hot path: resolves one observation to a canonical entity, or
/// materializes one, all inside a single store transaction.
///
/// Returns `Ok(None)` only in the synthesis-vetoed case: a human has
/// already marked the entity this observation would synthesize as invalid
/// for this exact occurrence.
pub fn apply_correction<S: Store>(
    store: &S,
    config: &EngineConfig,
    value: &str,
    context: &[ContextElement],
    scope_id: u64,
    hypotheses: &[Hypothesis],
) -> Result<Option<CanonicalEntityRow>, ResolutionError> {
    store.transaction(|txn| apply_correction_txn(txn, config, value, context, scope_id, hypotheses))
}

fn apply_correction_txn(
    txn: &mut dyn Transaction,
    config: &EngineConfig,
    value: &str,
    context: &[ContextElement],
    scope_id: u64,
    hypotheses: &[Hypothesis],
) -> Result<Option<CanonicalEntityRow>, ResolutionError> {
    // 1. Scope resolution.
    let resolved_scope_id = if scope_id == 0 {
        if !config.allow_sentinel_scope {
            return Err(ResolutionError::UnknownScope(0));
        }
        if txn.get_scope(SENTINEL_SCOPE_ID)?.is_none() {
            txn.upsert_scope(ScopeRow {
                id: SENTINEL_SCOPE_ID,
                description: Some("sentinel scope".to_string()),
                updated_at: Utc::now(),
            })?;
        }
        SENTINEL_SCOPE_ID
    } else {
        txn.get_scope(scope_id)?
            .ok_or(ResolutionError::UnknownScope(scope_id))?;
        scope_id
    };

    // 2. Observation upsert.
    let occurrence = find_or_create_occurrence(txn, resolved_scope_id, value, context)?;

    // 3. Hypothesis materialization.
    let mut hypothesis_entities = Vec::with_capacity(hypotheses.len());
    for h in hypotheses {
        let entity = find_or_create_canonical_entity(
            txn,
            CanonicalEntityArgs {
                scope_id: resolved_scope_id,
                value: &h.value,
                external_id: h.external_id.as_deref(),
                name: h.name.as_deref(),
                description: h.description.as_deref(),
                required_context_elements: &h.required_context_elements,
                context: &h.context,
            },
        )?;
        hypothesis_entities.push(entity);
    }

    // 4. Approved fast path.
    let existing_resolutions = txn.list_resolutions_by_occurrence(occurrence.id)?;
    if let Some(approved) = existing_resolutions
        .iter()
        .find(|r| r.status == ResolutionStatus::Approved)
    {
        let entity = txn
            .get_canonical_entity(approved.canonical_entity_id)?
            .ok_or(ResolutionError::Store(recon_store::StoreError::CanonicalEntityNotFound(
                approved.canonical_entity_id,
            )))?;
        return Ok(Some(entity));
    }

    // 5. Cache fast path.
    if is_cache_valid(txn, occurrence.id)? {
        if let Some(resolved_to) = occurrence.resolved_to {
            if let Some(entity) = txn.get_canonical_entity(resolved_to)? {
                return Ok(Some(entity));
            }
        }
    }

    // 6. Candidate enumeration: all canonical entities in scope plus
    // hypotheses, deduplicated by id, first-seen order preserved.
    let mut candidates = txn.list_canonical_entities_by_scope(resolved_scope_id)?;
    let mut seen: HashSet<u64> = candidates.iter().map(|c| c.id).collect();
    for h in hypothesis_entities {
        if seen.insert(h.id) {
            candidates.push(h);
        }
    }

    // 7. Scoring loop.
    let mut keep_set: HashSet<u64> = HashSet::new();
    for candidate in &candidates {
        let context_match = match_context(&occurrence.context, &candidate.required_context_elements);
        if !context_match.matches {
            continue;
        }
        let vetoed = existing_resolutions.iter().any(|r| {
            r.canonical_entity_id == candidate.id && r.status == ResolutionStatus::Invalid
        });
        if vetoed {
            continue;
        }
        let score = 10.0 * sim(&occurrence.value, &candidate.value) + context_match.score;
        upsert_pending(txn, resolved_scope_id, occurrence.id, candidate.id, score)?;
        keep_set.insert(candidate.id);
    }

    // 8. Pruning.
    if !keep_set.is_empty() {
        prune_stale(txn, occurrence.id, &keep_set)?;
    }

    // 9. Winner selection.
    if let Some(best) = best_for(txn, occurrence.id)? {
        refresh_cache(txn, occurrence.id, Some(best.canonical_entity_id))?;
        let entity = txn
            .get_canonical_entity(best.canonical_entity_id)?
            .ok_or(ResolutionError::Store(recon_store::StoreError::CanonicalEntityNotFound(
                best.canonical_entity_id,
            )))?;
        return Ok(Some(entity));
    }

    // 10. Synthesis.
    let important_context: Vec<ContextElement> = occurrence
        .context
        .iter()
        .filter(|e| e.important)
        .cloned()
        .collect();

    let resolutions_after_pruning = txn.list_resolutions_by_occurrence(occurrence.id)?;
    for row in &resolutions_after_pruning {
        if row.status != ResolutionStatus::Invalid {
            continue;
        }
        let Some(candidate) = txn.get_canonical_entity(row.canonical_entity_id)? else {
            continue;
        };
        if candidate.value == occurrence.value
            && lists_structurally_equal(&candidate.required_context_elements, &important_context)
        {
            tracing::debug!(
                occurrence_id = occurrence.id,
                "synthesis vetoed by standing invalid resolution"
            );
            return Ok(None);
        }
    }

    let synthesized = find_or_create_canonical_entity(
        txn,
        CanonicalEntityArgs {
            scope_id: resolved_scope_id,
            value: &occurrence.value,
            external_id: None,
            name: None,
            description: None,
            required_context_elements: &important_context,
            context: &occurrence.context,
        },
    )?;

    let context_match = match_context(&occurrence.context, &important_context);
    let score = 10.0 * sim(&occurrence.value, &synthesized.value) + context_match.score;
    upsert_pending(txn, resolved_scope_id, occurrence.id, synthesized.id, score)?;
    refresh_cache(txn, occurrence.id, Some(synthesized.id))?;

    Ok(Some(synthesized))
}

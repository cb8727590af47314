use chrono::Utc;

use crate::error::StoreError;
use crate::traits::Transaction;

/// The invalidation cache is not in-memory: it is the `resolved_to` column
/// on an Occurrence plus the `updated_at` timestamps on both the
/// Occurrence and its owning Scope. These three functions are the entire
/// cache protocol; everything else in the engine just calls them at the
/// right moments.

/// `true` iff `occurrence_id` has a cached resolution that is still fresh
/// relative to its scope's epoch.
pub fn is_cache_valid(
    txn: &mut dyn Transaction,
    occurrence_id: u64,
) -> Result<bool, StoreError> {
    let occurrence = txn
        .get_occurrence(occurrence_id)?
        .ok_or(StoreError::OccurrenceNotFound(occurrence_id))?;
    let Some(_resolved_to) = occurrence.resolved_to else {
        return Ok(false);
    };
    let scope = txn
        .get_scope(occurrence.scope_id)?
        .ok_or(StoreError::ScopeNotFound(occurrence.scope_id))?;
    Ok(occurrence.updated_at >= scope.updated_at)
}

/// Set `occurrence.resolved_to` and bump its `updated_at` to now.
/// `resolved_to = None` clears the cache rather than pointing at anything.
pub fn refresh_cache(
    txn: &mut dyn Transaction,
    occurrence_id: u64,
    resolved_to: Option<u64>,
) -> Result<(), StoreError> {
    let mut occurrence = txn
        .get_occurrence(occurrence_id)?
        .ok_or(StoreError::OccurrenceNotFound(occurrence_id))?;
    occurrence.resolved_to = resolved_to;
    occurrence.updated_at = Utc::now();
    txn.update_occurrence(occurrence)?;
    Ok(())
}

/// Bump `updated_at` on every Occurrence in `scope_id`, then on the Scope
/// itself. Must be called whenever a CanonicalEntity in the scope is
/// created, mutated, or deleted — there is no ambient trigger doing this
/// implicitly, unlike the save-hook-coupled source this system replaces.
pub fn invalidate_scope(txn: &mut dyn Transaction, scope_id: u64) -> Result<(), StoreError> {
    let now = Utc::now();
    let occurrences = txn.list_occurrences_by_scope(scope_id)?;
    for mut occurrence in occurrences {
        occurrence.updated_at = now;
        txn.update_occurrence(occurrence)?;
    }
    txn.touch_scope(scope_id, now)?;
    Ok(())
}

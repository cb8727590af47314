use std::collections::HashSet;

use chrono::Utc;
use recon_store::{refresh_cache, ResolutionRow, ResolutionStatus, Transaction};

use crate::error::ResolutionError;

/// CRUD and status transitions for Occurrence→CanonicalEntity edges. Every
/// function here takes the transaction already open by its caller — there
/// is no standalone commit boundary at this layer, because the engine
/// needs several of these calls to succeed or fail as one unit.

/// Idempotent on `(occurrence_id, canonical_entity_id)`: if a row already
/// exists in any status, it is returned unchanged — `score` from this call
/// is discarded. Only a first sighting of the pair creates a row, and it is
/// always created `pending`, `manual=false`.
pub fn upsert_pending(
    txn: &mut dyn Transaction,
    scope_id: u64,
    occurrence_id: u64,
    canonical_entity_id: u64,
    score: f64,
) -> Result<ResolutionRow, ResolutionError> {
    if let Some(existing) =
        txn.find_resolution_by_occurrence_and_entity(occurrence_id, canonical_entity_id)?
    {
        return Ok(existing);
    }

    let id = txn.next_resolution_id()?;
    let now = Utc::now();
    let row = ResolutionRow {
        id,
        scope_id,
        occurrence_id,
        canonical_entity_id,
        status: ResolutionStatus::Pending,
        score,
        manual: false,
        created_at: now,
        updated_at: now,
    };
    Ok(txn.upsert_resolution(row)?)
}

/// Transition `resolution_id` to `new_status`. When transitioning *to*
/// approved, every other approved row for the same Occurrence is demoted
/// to pending first, in the same transaction — this is the at-most-one-
/// approved invariant enforced as a single atomic step, rather than a
/// racy read-then-write check.
pub fn set_status(
    txn: &mut dyn Transaction,
    resolution_id: u64,
    new_status: ResolutionStatus,
    manual: bool,
) -> Result<ResolutionRow, ResolutionError> {
    let mut row = txn
        .get_resolution(resolution_id)?
        .ok_or(ResolutionError::NotFound(resolution_id))?;

    if new_status == ResolutionStatus::Approved {
        let siblings = txn.list_resolutions_by_occurrence(row.occurrence_id)?;
        for mut sibling in siblings {
            if sibling.id == resolution_id || sibling.status != ResolutionStatus::Approved {
                continue;
            }
            sibling.status = ResolutionStatus::Pending;
            sibling.updated_at = Utc::now();
            txn.upsert_resolution(sibling).map_err(|source| {
                ResolutionError::ApprovedInvariantViolation {
                    occurrence_id: row.occurrence_id,
                    source,
                }
            })?;
        }
    }

    row.status = new_status;
    row.manual = manual;
    row.updated_at = Utc::now();
    let row = txn.upsert_resolution(row)?;

    // A manual transition can change which candidate the next
    // `applyCorrection` call ought to prefer (approving a different row,
    // vetoing the currently-cached winner). The engine's cache fast path
    // has no way to notice that on its own, so clear it here rather than
    // let a stale `resolved_to` survive a human decision.
    refresh_cache(txn, row.occurrence_id, None)?;

    Ok(row)
}

pub fn delete(txn: &mut dyn Transaction, resolution_id: u64) -> Result<(), ResolutionError> {
    let row = txn
        .get_resolution(resolution_id)?
        .ok_or(ResolutionError::NotFound(resolution_id))?;
    txn.delete_resolution(resolution_id)?;
    refresh_cache(txn, row.occurrence_id, None)?;
    Ok(())
}

/// Approved row if one exists, else the pending row with the highest score.
/// Ties break on `updated_at` desc, then `id` desc, so the choice is always
/// deterministic. Invalid rows are never returned.
pub fn best_for(
    txn: &mut dyn Transaction,
    occurrence_id: u64,
) -> Result<Option<ResolutionRow>, ResolutionError> {
    let rows = txn.list_resolutions_by_occurrence(occurrence_id)?;

    if let Some(approved) = rows.iter().find(|r| r.status == ResolutionStatus::Approved) {
        return Ok(Some(approved.clone()));
    }

    let best = rows
        .into_iter()
        .filter(|r| r.status == ResolutionStatus::Pending)
        .max_by(|a, b| {
            a.score
                .total_cmp(&b.score)
                .then(a.updated_at.cmp(&b.updated_at))
                .then(a.id.cmp(&b.id))
        });
    Ok(best)
}

/// Delete every resolution for `occurrence_id` whose `canonical_entity_id`
/// is not in `keep_set`, except rows that are `(status=invalid,
/// manual=true)` — sticky human rejections survive automatic pruning no
/// matter what the current scoring round produced.
pub fn prune_stale(
    txn: &mut dyn Transaction,
    occurrence_id: u64,
    keep_set: &HashSet<u64>,
) -> Result<(), ResolutionError> {
    let rows = txn.list_resolutions_by_occurrence(occurrence_id)?;
    for row in rows {
        if keep_set.contains(&row.canonical_entity_id) {
            continue;
        }
        if row.manual && row.status == ResolutionStatus::Invalid {
            continue;
        }
        delete(txn, row.id)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use recon_store::{MemStore, OccurrenceRow, ScopeRow, Store};

    fn seed(txn: &mut dyn Transaction) {
        txn.upsert_scope(ScopeRow {
            id: 1,
            description: None,
            updated_at: Utc::now(),
        })
        .unwrap();
        txn.insert_occurrence(OccurrenceRow {
            id: 1,
            scope_id: 1,
            value: "v".into(),
            context: vec![],
            resolved_to: None,
            updated_at: Utc::now(),
        })
        .unwrap();
    }

    #[test]
    fn upsert_pending_is_idempotent() {
        let store = MemStore::new();
        store.transaction(|txn| { seed(txn); Ok::<_, recon_store::StoreError>(()) }).unwrap();
        let first = store
            .transaction(|txn| upsert_pending(txn, 1, 1, 10, 5.0).map_err(|_| recon_store::StoreError::backend("x")))
            .unwrap();
        let second = store
            .transaction(|txn| upsert_pending(txn, 1, 1, 10, 999.0).map_err(|_| recon_store::StoreError::backend("x")))
            .unwrap();
        assert_eq!(first.id, second.id);
        assert_eq!(second.score, 5.0, "existing row's score must not change");
    }

    #[test]
    fn approving_demotes_prior_approved_sibling() {
        let store = MemStore::new();
        store.transaction(|txn| { seed(txn); Ok::<_, recon_store::StoreError>(()) }).unwrap();
        let r1 = store
            .transaction(|txn| upsert_pending(txn, 1, 1, 10, 5.0).map_err(|_| recon_store::StoreError::backend("x")))
            .unwrap();
        let r2 = store
            .transaction(|txn| upsert_pending(txn, 1, 1, 20, 3.0).map_err(|_| recon_store::StoreError::backend("x")))
            .unwrap();

        store
            .transaction(|txn| set_status(txn, r1.id, ResolutionStatus::Approved, true).map_err(|_| recon_store::StoreError::backend("x")))
            .unwrap();
        store
            .transaction(|txn| set_status(txn, r2.id, ResolutionStatus::Approved, true).map_err(|_| recon_store::StoreError::backend("x")))
            .unwrap();

        let row1 = store.transaction(|txn| txn.get_resolution(r1.id)).unwrap().unwrap();
        let row2 = store.transaction(|txn| txn.get_resolution(r2.id)).unwrap().unwrap();
        assert_eq!(row1.status, ResolutionStatus::Pending);
        assert_eq!(row2.status, ResolutionStatus::Approved);
    }

    #[test]
    fn best_for_prefers_approved_over_higher_scoring_pending() {
        let store = MemStore::new();
        store.transaction(|txn| { seed(txn); Ok::<_, recon_store::StoreError>(()) }).unwrap();
        let r1 = store
            .transaction(|txn| upsert_pending(txn, 1, 1, 10, 5.0).map_err(|_| recon_store::StoreError::backend("x")))
            .unwrap();
        let _r2 = store
            .transaction(|txn| upsert_pending(txn, 1, 1, 20, 99.0).map_err(|_| recon_store::StoreError::backend("x")))
            .unwrap();
        store
            .transaction(|txn| set_status(txn, r1.id, ResolutionStatus::Approved, true).map_err(|_| recon_store::StoreError::backend("x")))
            .unwrap();

        let best = store
            .transaction(|txn| best_for(txn, 1).map_err(|_| recon_store::StoreError::backend("x")))
            .unwrap()
            .unwrap();
        assert_eq!(best.canonical_entity_id, 10);
    }

    #[test]
    fn prune_stale_keeps_sticky_invalid_rows() {
        let store = MemStore::new();
        store.transaction(|txn| { seed(txn); Ok::<_, recon_store::StoreError>(()) }).unwrap();
        let r1 = store
            .transaction(|txn| upsert_pending(txn, 1, 1, 10, 5.0).map_err(|_| recon_store::StoreError::backend("x")))
            .unwrap();
        store
            .transaction(|txn| set_status(txn, r1.id, ResolutionStatus::Invalid, true).map_err(|_| recon_store::StoreError::backend("x")))
            .unwrap();

        store
            .transaction(|txn| prune_stale(txn, 1, &HashSet::new()).map_err(|_| recon_store::StoreError::backend("x")))
            .unwrap();

        let still_there = store.transaction(|txn| txn.get_resolution(r1.id)).unwrap();
        assert!(still_there.is_some());
    }

    #[test]
    fn prune_stale_removes_non_sticky_rows_outside_keep_set() {
        let store = MemStore::new();
        store.transaction(|txn| { seed(txn); Ok::<_, recon_store::StoreError>(()) }).unwrap();
        let r1 = store
            .transaction(|txn| upsert_pending(txn, 1, 1, 10, 5.0).map_err(|_| recon_store::StoreError::backend("x")))
            .unwrap();

        let keep: HashSet<u64> = HashSet::new();
        store
            .transaction(|txn| prune_stale(txn, 1, &keep).map_err(|_| recon_store::StoreError::backend("x")))
            .unwrap();

        let gone = store.transaction(|txn| txn.get_resolution(r1.id)).unwrap();
        assert!(gone.is_none());
    }
}

use recon_store::{CanonicalEntityRow, OccurrenceRow, ResolutionRow, ResolutionStatus, Transaction};

use crate::error::ResolutionError;

/// A Resolution with its endpoints eagerly fetched, so the review UI never
/// has to issue a follow-up lookup per row.
#[derive(Debug, Clone)]
pub struct ResolutionWithEndpoints {
    pub resolution: ResolutionRow,
    pub occurrence: OccurrenceRow,
    pub canonical_entity: CanonicalEntityRow,
}

fn with_endpoints(
    txn: &mut dyn Transaction,
    resolution: ResolutionRow,
) -> Result<ResolutionWithEndpoints, ResolutionError> {
    let occurrence = txn
        .get_occurrence(resolution.occurrence_id)?
        .ok_or(recon_store::StoreError::OccurrenceNotFound(resolution.occurrence_id))?;
    let canonical_entity = txn
        .get_canonical_entity(resolution.canonical_entity_id)?
        .ok_or(recon_store::StoreError::CanonicalEntityNotFound(
            resolution.canonical_entity_id,
        ))?;
    Ok(ResolutionWithEndpoints {
        resolution,
        occurrence,
        canonical_entity,
    })
}

/// Every Occurrence in `scope_id`.
pub fn occurrences_in_scope(
    txn: &mut dyn Transaction,
    scope_id: u64,
) -> Result<Vec<OccurrenceRow>, ResolutionError> {
    Ok(txn.list_occurrences_by_scope(scope_id)?)
}

/// Every Resolution for `occurrence_id`, ordered by score desc then
/// createdAt desc — the order the review UI lists alternatives in.
pub fn resolutions_for_occurrence(
    txn: &mut dyn Transaction,
    occurrence_id: u64,
) -> Result<Vec<ResolutionWithEndpoints>, ResolutionError> {
    let mut rows = txn.list_resolutions_by_occurrence(occurrence_id)?;
    rows.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then(b.created_at.cmp(&a.created_at))
    });
    rows.into_iter().map(|r| with_endpoints(txn, r)).collect()
}

/// Occurrences in `scope_id` with two or more pending Resolutions and no
/// approved one — the set the review UI should triage first.
pub fn conflicting_occurrences(
    txn: &mut dyn Transaction,
    scope_id: u64,
) -> Result<Vec<(OccurrenceRow, Vec<ResolutionWithEndpoints>)>, ResolutionError> {
    let occurrences = txn.list_occurrences_by_scope(scope_id)?;
    let mut conflicts = Vec::new();
    for occurrence in occurrences {
        let rows = txn.list_resolutions_by_occurrence(occurrence.id)?;
        let pending: Vec<_> = rows
            .iter()
            .filter(|r| r.status == ResolutionStatus::Pending)
            .cloned()
            .collect();
        let has_approved = rows.iter().any(|r| r.status == ResolutionStatus::Approved);
        if pending.len() >= 2 && !has_approved {
            let eager = pending
                .into_iter()
                .map(|r| with_endpoints(txn, r))
                .collect::<Result<Vec<_>, _>>()?;
            conflicts.push((occurrence, eager));
        }
    }
    Ok(conflicts)
}

/// Every Resolution in `scope_id`, optionally filtered to one status.
pub fn resolutions_by_status(
    txn: &mut dyn Transaction,
    scope_id: u64,
    status: Option<ResolutionStatus>,
) -> Result<Vec<ResolutionWithEndpoints>, ResolutionError> {
    let rows = txn.list_resolutions_by_scope_status(scope_id, status)?;
    rows.into_iter().map(|r| with_endpoints(txn, r)).collect()
}

/// Counts backing the review UI's summary panel, derived from the same
/// per-scope scan as the list endpoint.
#[derive(Debug, Clone, Copy, Default, serde::Serialize)]
pub struct ResolutionStats {
    pub total: usize,
    pub pending: usize,
    pub approved: usize,
    pub invalid: usize,
}

pub fn resolution_stats(
    txn: &mut dyn Transaction,
    scope_id: u64,
) -> Result<ResolutionStats, ResolutionError> {
    let rows = txn.list_resolutions_by_scope_status(scope_id, None)?;
    let mut stats = ResolutionStats::default();
    for row in rows {
        stats.total += 1;
        match row.status {
            ResolutionStatus::Pending => stats.pending += 1,
            ResolutionStatus::Approved => stats.approved += 1,
            ResolutionStatus::Invalid => stats.invalid += 1,
        }
    }
    Ok(stats)
}

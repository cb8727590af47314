use chrono::Utc;
use recon_context::{lists_structurally_equal, ContextElement};
use recon_store::{OccurrenceRow, Transaction};

use crate::error::IntakeError;

const MAX_VALUE_LEN: usize = 500;

fn validate(value: &str, context: &[ContextElement]) -> Result<(), IntakeError> {
    if value.chars().count() > MAX_VALUE_LEN {
        return Err(IntakeError::ValueTooLong);
    }
    if context.iter().any(|e| e.key.is_empty()) {
        return Err(IntakeError::MissingContextKey);
    }
    Ok(())
}

/// `candidate` covers `input` iff every element of `input` has a key-equal,
/// value-equal element in `candidate`. Asymmetric: a richer candidate
/// covers a sparser input, never the reverse.
fn covers(candidate: &[ContextElement], input: &[ContextElement]) -> bool {
    input.iter().all(|e| {
        candidate
            .iter()
            .any(|c| c.key == e.key && c.value == e.value)
    })
}

/// Deduplicate an incoming observation against existing Occurrences in
/// `scope_id` via the coverage rule. If an existing row's context already
/// covers the input's context, that row is returned unchanged — the input
/// is treated as a narrower, redundant sighting. Otherwise a new Occurrence
/// is created with the input context persisted verbatim.
pub fn find_or_create_occurrence(
    txn: &mut dyn Transaction,
    scope_id: u64,
    value: &str,
    context: &[ContextElement],
) -> Result<OccurrenceRow, IntakeError> {
    validate(value, context)?;

    let candidates = txn.find_occurrences_by_scope_value(scope_id, value)?;
    for candidate in &candidates {
        if covers(&candidate.context, context) {
            return Ok(candidate.clone());
        }
    }

    // No existing row covers this context; but an Occurrence with the exact
    // same normalized context is the same row under the uniqueness
    // invariant, not a new one.
    for candidate in &candidates {
        if lists_structurally_equal(&candidate.context, context) {
            return Ok(candidate.clone());
        }
    }

    let id = txn.next_occurrence_id()?;
    let row = OccurrenceRow {
        id,
        scope_id,
        value: value.to_string(),
        context: context.to_vec(),
        resolved_to: None,
        updated_at: Utc::now(),
    };
    let row = txn.insert_occurrence(row)?;
    tracing::debug!(occurrence_id = row.id, scope_id, "created occurrence");
    Ok(row)
}

#[cfg(test)]
mod tests {
    use super::*;
    use recon_store::MemStore;
    use recon_store::Store;

    fn elem(key: &str, value: &str) -> ContextElement {
        ContextElement::new(key, value)
    }

    #[test]
    fn first_sighting_creates_a_row() {
        let store = MemStore::new();
        let row = store
            .transaction(|txn| {
                find_or_create_occurrence(txn, 1, "v", &[elem("a", "1")]).map_err(|e| match e {
                    IntakeError::Store(s) => s,
                    _ => panic!("unexpected validation error"),
                })
            })
            .unwrap();
        assert_eq!(row.value, "v");
    }

    #[test]
    fn richer_candidate_covers_sparser_input() {
        let store = MemStore::new();
        store
            .transaction(|txn| {
                find_or_create_occurrence(txn, 1, "v", &[elem("a", "1"), elem("b", "2")])
                    .map_err(|_| recon_store::StoreError::backend("x"))
            })
            .unwrap();

        let (count_before, row) = store
            .transaction(|txn| {
                let before = txn.list_occurrences_by_scope(1)?.len();
                let row = find_or_create_occurrence(txn, 1, "v", &[elem("a", "1")])
                    .map_err(|_| recon_store::StoreError::backend("x"))?;
                Ok((before, row))
            })
            .unwrap();

        assert_eq!(count_before, 1);
        assert_eq!(row.context.len(), 2, "must return the existing richer row");

        let after = store.transaction(|txn| txn.list_occurrences_by_scope(1)).unwrap();
        assert_eq!(after.len(), 1, "coverage must not create a new row");
    }

    #[test]
    fn sparser_existing_row_does_not_absorb_richer_input() {
        let store = MemStore::new();
        store
            .transaction(|txn| {
                find_or_create_occurrence(txn, 1, "v", &[elem("a", "1")])
                    .map_err(|_| recon_store::StoreError::backend("x"))
            })
            .unwrap();

        store
            .transaction(|txn| {
                find_or_create_occurrence(txn, 1, "v", &[elem("a", "1"), elem("b", "2")])
                    .map_err(|_| recon_store::StoreError::backend("x"))
            })
            .unwrap();

        let rows = store.transaction(|txn| txn.list_occurrences_by_scope(1)).unwrap();
        assert_eq!(rows.len(), 2, "a richer input must create its own row");
    }

    #[test]
    fn value_over_bound_is_rejected() {
        let store = MemStore::new();
        let long_value = "x".repeat(501);
        let result = store.transaction(|txn| {
            match find_or_create_occurrence(txn, 1, &long_value, &[]) {
                Ok(row) => Ok(Some(row)),
                Err(IntakeError::ValueTooLong) => Ok(None),
                Err(IntakeError::Store(s)) => Err(s),
                Err(_) => Err(recon_store::StoreError::backend("x")),
            }
        });
        assert_eq!(result.unwrap(), None);
    }
}

//! Error behavior: input validation is rejected before any write, unknown
//! scopes are fatal, and not-found lookups surface cleanly.

use recon::{
    apply_correction, delete, set_status, ContextElement, EngineConfig, MemStore, ResolutionError,
    ResolutionStatus, ScopeRow, Store,
};

fn elem(key: &str, value: &str) -> ContextElement {
    ContextElement::new(key, value)
}

#[test]
fn value_over_length_bound_is_rejected_before_any_write() {
    let store = MemStore::new();
    let config = EngineConfig::default();
    let long_value = "x".repeat(501);

    let result = apply_correction(&store, &config, &long_value, &[], 0, &[]);
    assert!(matches!(result, Err(ResolutionError::Intake(_))));

    let occurrences = store.transaction(|txn| txn.list_occurrences_by_scope(1)).unwrap();
    assert!(occurrences.is_empty(), "a rejected request must not create a row");
}

#[test]
fn context_element_missing_a_key_is_rejected() {
    let store = MemStore::new();
    let config = EngineConfig::default();
    let bad_context = vec![ContextElement::new("", "value")];

    let result = apply_correction(&store, &config, "v", &bad_context, 0, &[]);
    assert!(matches!(result, Err(ResolutionError::Intake(_))));
}

#[test]
fn unknown_nonzero_scope_is_a_fatal_error() {
    let store = MemStore::new();
    let config = EngineConfig::default();

    let result = apply_correction(&store, &config, "v", &[elem("k", "v")], 42, &[]);
    assert!(matches!(result, Err(ResolutionError::UnknownScope(42))));
}

#[test]
fn sentinel_scope_can_be_disabled() {
    let store = MemStore::new();
    let config = EngineConfig {
        allow_sentinel_scope: false,
    };

    let result = apply_correction(&store, &config, "v", &[elem("k", "v")], 0, &[]);
    assert!(matches!(result, Err(ResolutionError::UnknownScope(0))));
}

#[test]
fn setting_status_on_an_unknown_resolution_is_not_found() {
    let store = MemStore::new();
    let result = store.transaction(|txn| {
        set_status(txn, 999, ResolutionStatus::Approved, true)
            .map_err(|e| recon::StoreError::backend(e.to_string()))
    });
    assert!(result.is_err());
}

#[test]
fn deleting_an_unknown_resolution_is_not_found() {
    let store = MemStore::new();
    let result = store.transaction(|txn| {
        delete(txn, 999).map_err(|e| recon::StoreError::backend(e.to_string()))
    });
    assert!(result.is_err());
}

#[test]
fn failed_transaction_leaves_no_partial_state() {
    // A constraint-style failure (unknown scope) aborts before any of the
    // scope's occurrences or canonical entities materialize; re-running
    // with a valid scope must start clean.
    let store = MemStore::new();
    store
        .transaction(|txn| {
            txn.upsert_scope(ScopeRow {
                id: 7,
                description: None,
                updated_at: chrono::Utc::now(),
            })
        })
        .unwrap();

    let config = EngineConfig::default();
    let _ = apply_correction(&store, &config, "v", &[elem("k", "v")], 99, &[]);

    let occurrences = store.transaction(|txn| txn.list_occurrences_by_scope(7)).unwrap();
    assert!(occurrences.is_empty());

    let ok = apply_correction(&store, &config, "v", &[elem("k", "v")], 7, &[]).unwrap();
    assert!(ok.is_some());
}

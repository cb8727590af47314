use std::collections::HashMap;
use std::sync::Mutex;

use recon_context::{canonical_key, ContextElement};

use crate::error::StoreError;
use crate::schema::{CanonicalEntityRow, OccurrenceRow, ResolutionRow, ResolutionStatus, ScopeRow};
use crate::traits::{Store, Transaction};

/// In-memory backend used by tests and by callers who don't need
/// durability: a handful of `HashMap`s behind a single lock, good enough
/// for correctness tests and small embedded uses, not tuned for
/// throughput.
#[derive(Default)]
pub struct MemStore {
    inner: Mutex<MemState>,
}

#[derive(Default, Clone)]
struct MemState {
    scopes: HashMap<u64, ScopeRow>,
    next_scope_id: u64,

    occurrences: HashMap<u64, OccurrenceRow>,
    next_occurrence_id: u64,

    canonical_entities: HashMap<u64, CanonicalEntityRow>,
    next_canonical_entity_id: u64,

    resolutions: HashMap<u64, ResolutionRow>,
    next_resolution_id: u64,
}

impl MemStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Store for MemStore {
    fn transaction<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut dyn Transaction) -> Result<T, StoreError>,
    {
        let mut guard = self
            .inner
            .lock()
            .map_err(|_| StoreError::backend("mem store mutex poisoned"))?;
        // Snapshot before running the closure so a failing transaction
        // leaves no trace, mirroring `RedbStore`'s drop-without-commit
        // semantics despite there being no real WAL backing this store.
        let snapshot = guard.clone();
        let mut txn = MemTransaction { state: &mut guard };
        match f(&mut txn) {
            Ok(value) => Ok(value),
            Err(e) => {
                *guard = snapshot;
                Err(e)
            }
        }
    }
}

struct MemTransaction<'a> {
    state: &'a mut MemState,
}

impl<'a> Transaction for MemTransaction<'a> {
    fn get_scope(&mut self, id: u64) -> Result<Option<ScopeRow>, StoreError> {
        Ok(self.state.scopes.get(&id).cloned())
    }

    fn list_scopes(&mut self) -> Result<Vec<ScopeRow>, StoreError> {
        let mut rows: Vec<_> = self.state.scopes.values().cloned().collect();
        rows.sort_by_key(|s| s.id);
        Ok(rows)
    }

    fn upsert_scope(&mut self, row: ScopeRow) -> Result<ScopeRow, StoreError> {
        self.state.next_scope_id = self.state.next_scope_id.max(row.id + 1);
        self.state.scopes.insert(row.id, row.clone());
        Ok(row)
    }

    fn touch_scope(
        &mut self,
        id: u64,
        updated_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), StoreError> {
        let scope = self
            .state
            .scopes
            .get_mut(&id)
            .ok_or(StoreError::ScopeNotFound(id))?;
        scope.updated_at = updated_at;
        Ok(())
    }

    fn next_scope_id(&mut self) -> Result<u64, StoreError> {
        let id = self.state.next_scope_id;
        self.state.next_scope_id += 1;
        Ok(id)
    }

    fn get_occurrence(&mut self, id: u64) -> Result<Option<OccurrenceRow>, StoreError> {
        Ok(self.state.occurrences.get(&id).cloned())
    }

    fn find_occurrences_by_scope_value(
        &mut self,
        scope_id: u64,
        value: &str,
    ) -> Result<Vec<OccurrenceRow>, StoreError> {
        Ok(self
            .state
            .occurrences
            .values()
            .filter(|o| o.scope_id == scope_id && o.value == value)
            .cloned()
            .collect())
    }

    fn list_occurrences_by_scope(&mut self, scope_id: u64) -> Result<Vec<OccurrenceRow>, StoreError> {
        Ok(self
            .state
            .occurrences
            .values()
            .filter(|o| o.scope_id == scope_id)
            .cloned()
            .collect())
    }

    fn insert_occurrence(&mut self, row: OccurrenceRow) -> Result<OccurrenceRow, StoreError> {
        self.state.next_occurrence_id = self.state.next_occurrence_id.max(row.id + 1);
        self.state.occurrences.insert(row.id, row.clone());
        Ok(row)
    }

    fn update_occurrence(&mut self, row: OccurrenceRow) -> Result<OccurrenceRow, StoreError> {
        if !self.state.occurrences.contains_key(&row.id) {
            return Err(StoreError::OccurrenceNotFound(row.id));
        }
        self.state.occurrences.insert(row.id, row.clone());
        Ok(row)
    }

    fn next_occurrence_id(&mut self) -> Result<u64, StoreError> {
        let id = self.state.next_occurrence_id;
        self.state.next_occurrence_id += 1;
        Ok(id)
    }

    fn get_canonical_entity(&mut self, id: u64) -> Result<Option<CanonicalEntityRow>, StoreError> {
        Ok(self.state.canonical_entities.get(&id).cloned())
    }

    fn find_canonical_entity_by_external_id(
        &mut self,
        scope_id: u64,
        external_id: &str,
    ) -> Result<Option<CanonicalEntityRow>, StoreError> {
        Ok(self
            .state
            .canonical_entities
            .values()
            .find(|c| c.scope_id == scope_id && c.external_id.as_deref() == Some(external_id))
            .cloned())
    }

    fn find_canonical_entity_by_value_context(
        &mut self,
        scope_id: u64,
        value: &str,
        required_context_elements: &[ContextElement],
    ) -> Result<Option<CanonicalEntityRow>, StoreError> {
        let key = canonical_key(required_context_elements);
        Ok(self
            .state
            .canonical_entities
            .values()
            .find(|c| {
                c.scope_id == scope_id
                    && c.value == value
                    && canonical_key(&c.required_context_elements) == key
            })
            .cloned())
    }

    fn list_canonical_entities_by_scope(
        &mut self,
        scope_id: u64,
    ) -> Result<Vec<CanonicalEntityRow>, StoreError> {
        Ok(self
            .state
            .canonical_entities
            .values()
            .filter(|c| c.scope_id == scope_id)
            .cloned()
            .collect())
    }

    fn insert_canonical_entity(
        &mut self,
        row: CanonicalEntityRow,
    ) -> Result<CanonicalEntityRow, StoreError> {
        self.state.next_canonical_entity_id = self.state.next_canonical_entity_id.max(row.id + 1);
        self.state.canonical_entities.insert(row.id, row.clone());
        Ok(row)
    }

    fn next_canonical_entity_id(&mut self) -> Result<u64, StoreError> {
        let id = self.state.next_canonical_entity_id;
        self.state.next_canonical_entity_id += 1;
        Ok(id)
    }

    fn get_resolution(&mut self, id: u64) -> Result<Option<ResolutionRow>, StoreError> {
        Ok(self.state.resolutions.get(&id).cloned())
    }

    fn find_resolution_by_occurrence_and_entity(
        &mut self,
        occurrence_id: u64,
        canonical_entity_id: u64,
    ) -> Result<Option<ResolutionRow>, StoreError> {
        Ok(self
            .state
            .resolutions
            .values()
            .find(|r| r.occurrence_id == occurrence_id && r.canonical_entity_id == canonical_entity_id)
            .cloned())
    }

    fn list_resolutions_by_occurrence(
        &mut self,
        occurrence_id: u64,
    ) -> Result<Vec<ResolutionRow>, StoreError> {
        Ok(self
            .state
            .resolutions
            .values()
            .filter(|r| r.occurrence_id == occurrence_id)
            .cloned()
            .collect())
    }

    fn list_resolutions_by_scope_status(
        &mut self,
        scope_id: u64,
        status: Option<ResolutionStatus>,
    ) -> Result<Vec<ResolutionRow>, StoreError> {
        Ok(self
            .state
            .resolutions
            .values()
            .filter(|r| {
                r.scope_id == scope_id && status.map(|s| s == r.status).unwrap_or(true)
            })
            .cloned()
            .collect())
    }

    fn upsert_resolution(&mut self, row: ResolutionRow) -> Result<ResolutionRow, StoreError> {
        self.state.next_resolution_id = self.state.next_resolution_id.max(row.id + 1);
        self.state.resolutions.insert(row.id, row.clone());
        Ok(row)
    }

    fn delete_resolution(&mut self, id: u64) -> Result<(), StoreError> {
        self.state
            .resolutions
            .remove(&id)
            .ok_or(StoreError::ResolutionNotFound(id))?;
        Ok(())
    }

    fn next_resolution_id(&mut self) -> Result<u64, StoreError> {
        let id = self.state.next_resolution_id;
        self.state.next_resolution_id += 1;
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn insert_and_get_roundtrip() {
        let store = MemStore::new();
        let scope = store
            .transaction(|txn| {
                let id = txn.next_scope_id()?;
                txn.upsert_scope(ScopeRow {
                    id,
                    description: None,
                    updated_at: Utc::now(),
                })
            })
            .unwrap();
        let fetched = store
            .transaction(|txn| txn.get_scope(scope.id))
            .unwrap()
            .unwrap();
        assert_eq!(fetched.id, scope.id);
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let store = MemStore::new();
        let result: Result<(), StoreError> = store.transaction(|txn| {
            txn.upsert_scope(ScopeRow {
                id: 1,
                description: None,
                updated_at: Utc::now(),
            })?;
            Err(StoreError::backend("boom"))
        });
        assert!(result.is_err());
        let fetched = store.transaction(|txn| txn.get_scope(1)).unwrap();
        assert!(fetched.is_none(), "write inside a failed transaction must not be visible");
    }

    #[test]
    fn find_canonical_entity_by_value_context_normalizes_ordering() {
        let store = MemStore::new();
        let ctx = vec![
            ContextElement::new("a", "1"),
            ContextElement::new("b", "2"),
        ];
        store
            .transaction(|txn| {
                txn.insert_canonical_entity(CanonicalEntityRow {
                    id: 1,
                    scope_id: 1,
                    value: "acme".into(),
                    external_id: None,
                    required_context_elements: ctx.clone(),
                    context: vec![],
                    name: None,
                    description: None,
                    updated_at: Utc::now(),
                })
            })
            .unwrap();

        let found = store
            .transaction(|txn| txn.find_canonical_entity_by_value_context(1, "acme", &ctx))
            .unwrap();
        assert!(found.is_some());
    }
}

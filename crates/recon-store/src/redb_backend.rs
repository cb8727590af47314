//! Embedded, durable backend built on `redb`.
//!
//! Table layout and transaction handling mirror
//! `crates/index/src/backend/redb.rs`'s `RedbBackend`: rows are JSON-encoded
//! bytes keyed by their numeric id in a primary table, with secondary lookups
//! implemented as extra tables keyed by a composite string. The difference
//! from that file is scope: `RedbBackend` opens one write transaction per
//! call, where here a single `begin_write()` spans every table touched by
//! one `apply_correction` call, because the engine needs those writes to
//! commit or fail together.
use std::path::Path;
use std::sync::Arc;

use recon_context::{canonical_key, ContextElement};
use redb::{Database, MultimapTableDefinition, ReadableMultimapTable, ReadableTable, TableDefinition};

use crate::error::StoreError;
use crate::schema::{CanonicalEntityRow, OccurrenceRow, ResolutionRow, ResolutionStatus, ScopeRow};
use crate::traits::{Store, Transaction};

const SCOPES: TableDefinition<u64, &[u8]> = TableDefinition::new("scopes");
const COUNTERS: TableDefinition<&str, u64> = TableDefinition::new("counters");

const OCCURRENCES: TableDefinition<u64, &[u8]> = TableDefinition::new("occurrences");
const OCCURRENCES_BY_SCOPE_VALUE: MultimapTableDefinition<&str, u64> =
    MultimapTableDefinition::new("occurrences_by_scope_value");

const CANONICAL_ENTITIES: TableDefinition<u64, &[u8]> = TableDefinition::new("canonical_entities");
const CANONICAL_BY_EXTERNAL_ID: TableDefinition<&str, u64> =
    TableDefinition::new("canonical_by_external_id");
const CANONICAL_BY_VALUE_CTX: TableDefinition<&str, u64> =
    TableDefinition::new("canonical_by_value_ctx");
const CANONICAL_BY_SCOPE: MultimapTableDefinition<u64, u64> =
    MultimapTableDefinition::new("canonical_by_scope");

const RESOLUTIONS: TableDefinition<u64, &[u8]> = TableDefinition::new("resolutions");
const RESOLUTIONS_BY_OCC_CANON: TableDefinition<&str, u64> =
    TableDefinition::new("resolutions_by_occ_canon");
const RESOLUTIONS_BY_OCCURRENCE: MultimapTableDefinition<u64, u64> =
    MultimapTableDefinition::new("resolutions_by_occurrence");
const RESOLUTIONS_BY_SCOPE_STATUS: MultimapTableDefinition<&str, u64> =
    MultimapTableDefinition::new("resolutions_by_scope_status");

/// Durable, ACID storage backend for production and embedded use.
pub struct RedbStore {
    db: Arc<Database>,
}

impl RedbStore {
    /// Open (creating if missing) the database file at `path`, pre-creating
    /// every table so readers never race a writer's first `open_table`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let db = Database::create(path).map_err(|e| StoreError::backend(e.to_string()))?;
        {
            let txn = db.begin_write().map_err(|e| StoreError::backend(e.to_string()))?;
            txn.open_table(SCOPES).map_err(|e| StoreError::backend(e.to_string()))?;
            txn.open_table(COUNTERS).map_err(|e| StoreError::backend(e.to_string()))?;
            txn.open_table(OCCURRENCES).map_err(|e| StoreError::backend(e.to_string()))?;
            txn.open_multimap_table(OCCURRENCES_BY_SCOPE_VALUE)
                .map_err(|e| StoreError::backend(e.to_string()))?;
            txn.open_table(CANONICAL_ENTITIES)
                .map_err(|e| StoreError::backend(e.to_string()))?;
            txn.open_table(CANONICAL_BY_EXTERNAL_ID)
                .map_err(|e| StoreError::backend(e.to_string()))?;
            txn.open_table(CANONICAL_BY_VALUE_CTX)
                .map_err(|e| StoreError::backend(e.to_string()))?;
            txn.open_multimap_table(CANONICAL_BY_SCOPE)
                .map_err(|e| StoreError::backend(e.to_string()))?;
            txn.open_table(RESOLUTIONS).map_err(|e| StoreError::backend(e.to_string()))?;
            txn.open_table(RESOLUTIONS_BY_OCC_CANON)
                .map_err(|e| StoreError::backend(e.to_string()))?;
            txn.open_multimap_table(RESOLUTIONS_BY_OCCURRENCE)
                .map_err(|e| StoreError::backend(e.to_string()))?;
            txn.open_multimap_table(RESOLUTIONS_BY_SCOPE_STATUS)
                .map_err(|e| StoreError::backend(e.to_string()))?;
            txn.commit().map_err(|e| StoreError::backend(e.to_string()))?;
        }
        Ok(Self { db: Arc::new(db) })
    }
}

impl Store for RedbStore {
    fn transaction<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut dyn Transaction) -> Result<T, StoreError>,
    {
        let write_txn = self
            .db
            .begin_write()
            .map_err(|e| StoreError::backend(e.to_string()))?;
        let result = {
            let mut txn = RedbTransaction { inner: &write_txn };
            f(&mut txn)
        };
        match result {
            Ok(value) => {
                write_txn
                    .commit()
                    .map_err(|e| StoreError::backend(e.to_string()))?;
                Ok(value)
            }
            Err(e) => {
                // Dropping without commit discards every write made through
                // `inner` above; redb has no explicit abort call.
                Err(e)
            }
        }
    }
}

struct RedbTransaction<'db> {
    inner: &'db redb::WriteTransaction,
}

fn encode<T: serde::Serialize>(row: &T) -> Result<Vec<u8>, StoreError> {
    Ok(serde_json::to_vec(row)?)
}

fn decode<T: serde::de::DeserializeOwned>(bytes: &[u8]) -> Result<T, StoreError> {
    Ok(serde_json::from_slice(bytes)?)
}

fn occ_scope_value_key(scope_id: u64, value: &str) -> String {
    format!("{scope_id}\0{value}")
}

fn canon_value_ctx_key(scope_id: u64, value: &str, required: &[ContextElement]) -> String {
    format!("{scope_id}\0{value}\0{}", canonical_key(required))
}

fn canon_external_id_key(scope_id: u64, external_id: &str) -> String {
    format!("{scope_id}\0{external_id}")
}

fn res_occ_canon_key(occurrence_id: u64, canonical_entity_id: u64) -> String {
    format!("{occurrence_id}\0{canonical_entity_id}")
}

fn res_scope_status_key(scope_id: u64, status: ResolutionStatus) -> String {
    format!("{scope_id}\0{}", status.as_u8())
}

impl<'db> RedbTransaction<'db> {
    fn next_id(&mut self, counter: &str) -> Result<u64, StoreError> {
        let mut table = self
            .inner
            .open_table(COUNTERS)
            .map_err(|e| StoreError::backend(e.to_string()))?;
        let current = table
            .get(counter)
            .map_err(|e| StoreError::backend(e.to_string()))?
            .map(|v| v.value())
            .unwrap_or(0);
        table
            .insert(counter, current + 1)
            .map_err(|e| StoreError::backend(e.to_string()))?;
        Ok(current)
    }
}

impl<'db> Transaction for RedbTransaction<'db> {
    fn get_scope(&mut self, id: u64) -> Result<Option<ScopeRow>, StoreError> {
        let table = self
            .inner
            .open_table(SCOPES)
            .map_err(|e| StoreError::backend(e.to_string()))?;
        match table.get(id).map_err(|e| StoreError::backend(e.to_string()))? {
            Some(bytes) => Ok(Some(decode(bytes.value())?)),
            None => Ok(None),
        }
    }

    fn list_scopes(&mut self) -> Result<Vec<ScopeRow>, StoreError> {
        let table = self
            .inner
            .open_table(SCOPES)
            .map_err(|e| StoreError::backend(e.to_string()))?;
        let mut rows = Vec::new();
        for entry in table.iter().map_err(|e| StoreError::backend(e.to_string()))? {
            let (_, bytes) = entry.map_err(|e| StoreError::backend(e.to_string()))?;
            rows.push(decode(bytes.value())?);
        }
        Ok(rows)
    }

    fn upsert_scope(&mut self, row: ScopeRow) -> Result<ScopeRow, StoreError> {
        let mut table = self
            .inner
            .open_table(SCOPES)
            .map_err(|e| StoreError::backend(e.to_string()))?;
        let bytes = encode(&row)?;
        table
            .insert(row.id, bytes.as_slice())
            .map_err(|e| StoreError::backend(e.to_string()))?;
        Ok(row)
    }

    fn touch_scope(
        &mut self,
        id: u64,
        updated_at: chrono::DateTime<chrono::Utc>,
    ) -> Result<(), StoreError> {
        let mut row = self
            .get_scope(id)?
            .ok_or(StoreError::ScopeNotFound(id))?;
        row.updated_at = updated_at;
        self.upsert_scope(row)?;
        Ok(())
    }

    fn next_scope_id(&mut self) -> Result<u64, StoreError> {
        self.next_id("scope")
    }

    fn get_occurrence(&mut self, id: u64) -> Result<Option<OccurrenceRow>, StoreError> {
        let table = self
            .inner
            .open_table(OCCURRENCES)
            .map_err(|e| StoreError::backend(e.to_string()))?;
        match table.get(id).map_err(|e| StoreError::backend(e.to_string()))? {
            Some(bytes) => Ok(Some(decode(bytes.value())?)),
            None => Ok(None),
        }
    }

    fn find_occurrences_by_scope_value(
        &mut self,
        scope_id: u64,
        value: &str,
    ) -> Result<Vec<OccurrenceRow>, StoreError> {
        let index = self
            .inner
            .open_multimap_table(OCCURRENCES_BY_SCOPE_VALUE)
            .map_err(|e| StoreError::backend(e.to_string()))?;
        let table = self
            .inner
            .open_table(OCCURRENCES)
            .map_err(|e| StoreError::backend(e.to_string()))?;
        let key = occ_scope_value_key(scope_id, value);
        let ids = index
            .get(key.as_str())
            .map_err(|e| StoreError::backend(e.to_string()))?;
        let mut rows = Vec::new();
        for id in ids {
            let id = id.map_err(|e| StoreError::backend(e.to_string()))?.value();
            if let Some(bytes) = table.get(id).map_err(|e| StoreError::backend(e.to_string()))? {
                rows.push(decode(bytes.value())?);
            }
        }
        Ok(rows)
    }

    fn list_occurrences_by_scope(&mut self, scope_id: u64) -> Result<Vec<OccurrenceRow>, StoreError> {
        let table = self
            .inner
            .open_table(OCCURRENCES)
            .map_err(|e| StoreError::backend(e.to_string()))?;
        let mut rows = Vec::new();
        for entry in table.iter().map_err(|e| StoreError::backend(e.to_string()))? {
            let (_, bytes) = entry.map_err(|e| StoreError::backend(e.to_string()))?;
            let row: OccurrenceRow = decode(bytes.value())?;
            if row.scope_id == scope_id {
                rows.push(row);
            }
        }
        Ok(rows)
    }

    fn insert_occurrence(&mut self, row: OccurrenceRow) -> Result<OccurrenceRow, StoreError> {
        let bytes = encode(&row)?;
        {
            let mut table = self
                .inner
                .open_table(OCCURRENCES)
                .map_err(|e| StoreError::backend(e.to_string()))?;
            table
                .insert(row.id, bytes.as_slice())
                .map_err(|e| StoreError::backend(e.to_string()))?;
        }
        {
            let mut index = self
                .inner
                .open_multimap_table(OCCURRENCES_BY_SCOPE_VALUE)
                .map_err(|e| StoreError::backend(e.to_string()))?;
            let key = occ_scope_value_key(row.scope_id, &row.value);
            index
                .insert(key.as_str(), row.id)
                .map_err(|e| StoreError::backend(e.to_string()))?;
        }
        Ok(row)
    }

    fn update_occurrence(&mut self, row: OccurrenceRow) -> Result<OccurrenceRow, StoreError> {
        if self.get_occurrence(row.id)?.is_none() {
            return Err(StoreError::OccurrenceNotFound(row.id));
        }
        let bytes = encode(&row)?;
        let mut table = self
            .inner
            .open_table(OCCURRENCES)
            .map_err(|e| StoreError::backend(e.to_string()))?;
        table
            .insert(row.id, bytes.as_slice())
            .map_err(|e| StoreError::backend(e.to_string()))?;
        Ok(row)
    }

    fn next_occurrence_id(&mut self) -> Result<u64, StoreError> {
        self.next_id("occurrence")
    }

    fn get_canonical_entity(&mut self, id: u64) -> Result<Option<CanonicalEntityRow>, StoreError> {
        let table = self
            .inner
            .open_table(CANONICAL_ENTITIES)
            .map_err(|e| StoreError::backend(e.to_string()))?;
        match table.get(id).map_err(|e| StoreError::backend(e.to_string()))? {
            Some(bytes) => Ok(Some(decode(bytes.value())?)),
            None => Ok(None),
        }
    }

    fn find_canonical_entity_by_external_id(
        &mut self,
        scope_id: u64,
        external_id: &str,
    ) -> Result<Option<CanonicalEntityRow>, StoreError> {
        let index = self
            .inner
            .open_table(CANONICAL_BY_EXTERNAL_ID)
            .map_err(|e| StoreError::backend(e.to_string()))?;
        let key = canon_external_id_key(scope_id, external_id);
        match index
            .get(key.as_str())
            .map_err(|e| StoreError::backend(e.to_string()))?
        {
            Some(id) => self.get_canonical_entity(id.value()),
            None => Ok(None),
        }
    }

    fn find_canonical_entity_by_value_context(
        &mut self,
        scope_id: u64,
        value: &str,
        required_context_elements: &[ContextElement],
    ) -> Result<Option<CanonicalEntityRow>, StoreError> {
        let index = self
            .inner
            .open_table(CANONICAL_BY_VALUE_CTX)
            .map_err(|e| StoreError::backend(e.to_string()))?;
        let key = canon_value_ctx_key(scope_id, value, required_context_elements);
        match index
            .get(key.as_str())
            .map_err(|e| StoreError::backend(e.to_string()))?
        {
            Some(id) => self.get_canonical_entity(id.value()),
            None => Ok(None),
        }
    }

    fn list_canonical_entities_by_scope(
        &mut self,
        scope_id: u64,
    ) -> Result<Vec<CanonicalEntityRow>, StoreError> {
        let index = self
            .inner
            .open_multimap_table(CANONICAL_BY_SCOPE)
            .map_err(|e| StoreError::backend(e.to_string()))?;
        let table = self
            .inner
            .open_table(CANONICAL_ENTITIES)
            .map_err(|e| StoreError::backend(e.to_string()))?;
        let ids = index
            .get(scope_id)
            .map_err(|e| StoreError::backend(e.to_string()))?;
        let mut rows = Vec::new();
        for id in ids {
            let id = id.map_err(|e| StoreError::backend(e.to_string()))?.value();
            if let Some(bytes) = table.get(id).map_err(|e| StoreError::backend(e.to_string()))? {
                rows.push(decode(bytes.value())?);
            }
        }
        Ok(rows)
    }

    fn insert_canonical_entity(
        &mut self,
        row: CanonicalEntityRow,
    ) -> Result<CanonicalEntityRow, StoreError> {
        let bytes = encode(&row)?;
        {
            let mut table = self
                .inner
                .open_table(CANONICAL_ENTITIES)
                .map_err(|e| StoreError::backend(e.to_string()))?;
            table
                .insert(row.id, bytes.as_slice())
                .map_err(|e| StoreError::backend(e.to_string()))?;
        }
        if let Some(external_id) = &row.external_id {
            let mut index = self
                .inner
                .open_table(CANONICAL_BY_EXTERNAL_ID)
                .map_err(|e| StoreError::backend(e.to_string()))?;
            let key = canon_external_id_key(row.scope_id, external_id);
            index
                .insert(key.as_str(), row.id)
                .map_err(|e| StoreError::backend(e.to_string()))?;
        }
        {
            let mut index = self
                .inner
                .open_table(CANONICAL_BY_VALUE_CTX)
                .map_err(|e| StoreError::backend(e.to_string()))?;
            let key = canon_value_ctx_key(row.scope_id, &row.value, &row.required_context_elements);
            index
                .insert(key.as_str(), row.id)
                .map_err(|e| StoreError::backend(e.to_string()))?;
        }
        {
            let mut index = self
                .inner
                .open_multimap_table(CANONICAL_BY_SCOPE)
                .map_err(|e| StoreError::backend(e.to_string()))?;
            index
                .insert(row.scope_id, row.id)
                .map_err(|e| StoreError::backend(e.to_string()))?;
        }
        Ok(row)
    }

    fn next_canonical_entity_id(&mut self) -> Result<u64, StoreError> {
        self.next_id("canonical_entity")
    }

    fn get_resolution(&mut self, id: u64) -> Result<Option<ResolutionRow>, StoreError> {
        let table = self
            .inner
            .open_table(RESOLUTIONS)
            .map_err(|e| StoreError::backend(e.to_string()))?;
        match table.get(id).map_err(|e| StoreError::backend(e.to_string()))? {
            Some(bytes) => Ok(Some(decode(bytes.value())?)),
            None => Ok(None),
        }
    }

    fn find_resolution_by_occurrence_and_entity(
        &mut self,
        occurrence_id: u64,
        canonical_entity_id: u64,
    ) -> Result<Option<ResolutionRow>, StoreError> {
        let index = self
            .inner
            .open_table(RESOLUTIONS_BY_OCC_CANON)
            .map_err(|e| StoreError::backend(e.to_string()))?;
        let key = res_occ_canon_key(occurrence_id, canonical_entity_id);
        match index
            .get(key.as_str())
            .map_err(|e| StoreError::backend(e.to_string()))?
        {
            Some(id) => self.get_resolution(id.value()),
            None => Ok(None),
        }
    }

    fn list_resolutions_by_occurrence(
        &mut self,
        occurrence_id: u64,
    ) -> Result<Vec<ResolutionRow>, StoreError> {
        let index = self
            .inner
            .open_multimap_table(RESOLUTIONS_BY_OCCURRENCE)
            .map_err(|e| StoreError::backend(e.to_string()))?;
        let table = self
            .inner
            .open_table(RESOLUTIONS)
            .map_err(|e| StoreError::backend(e.to_string()))?;
        let ids = index
            .get(occurrence_id)
            .map_err(|e| StoreError::backend(e.to_string()))?;
        let mut rows = Vec::new();
        for id in ids {
            let id = id.map_err(|e| StoreError::backend(e.to_string()))?.value();
            if let Some(bytes) = table.get(id).map_err(|e| StoreError::backend(e.to_string()))? {
                rows.push(decode(bytes.value())?);
            }
        }
        Ok(rows)
    }

    fn list_resolutions_by_scope_status(
        &mut self,
        scope_id: u64,
        status: Option<ResolutionStatus>,
    ) -> Result<Vec<ResolutionRow>, StoreError> {
        let table = self
            .inner
            .open_table(RESOLUTIONS)
            .map_err(|e| StoreError::backend(e.to_string()))?;

        match status {
            Some(status) => {
                let index = self
                    .inner
                    .open_multimap_table(RESOLUTIONS_BY_SCOPE_STATUS)
                    .map_err(|e| StoreError::backend(e.to_string()))?;
                let key = res_scope_status_key(scope_id, status);
                let ids = index
                    .get(key.as_str())
                    .map_err(|e| StoreError::backend(e.to_string()))?;
                let mut rows = Vec::new();
                for id in ids {
                    let id = id.map_err(|e| StoreError::backend(e.to_string()))?.value();
                    if let Some(bytes) =
                        table.get(id).map_err(|e| StoreError::backend(e.to_string()))?
                    {
                        rows.push(decode(bytes.value())?);
                    }
                }
                Ok(rows)
            }
            None => {
                let mut rows = Vec::new();
                for entry in table.iter().map_err(|e| StoreError::backend(e.to_string()))? {
                    let (_, bytes) = entry.map_err(|e| StoreError::backend(e.to_string()))?;
                    let row: ResolutionRow = decode(bytes.value())?;
                    if row.scope_id == scope_id {
                        rows.push(row);
                    }
                }
                Ok(rows)
            }
        }
    }

    fn upsert_resolution(&mut self, row: ResolutionRow) -> Result<ResolutionRow, StoreError> {
        let previous = self.get_resolution(row.id)?;
        let bytes = encode(&row)?;
        {
            let mut table = self
                .inner
                .open_table(RESOLUTIONS)
                .map_err(|e| StoreError::backend(e.to_string()))?;
            table
                .insert(row.id, bytes.as_slice())
                .map_err(|e| StoreError::backend(e.to_string()))?;
        }
        if let Some(previous) = &previous {
            if previous.status != row.status {
                let mut index = self
                    .inner
                    .open_multimap_table(RESOLUTIONS_BY_SCOPE_STATUS)
                    .map_err(|e| StoreError::backend(e.to_string()))?;
                let old_key = res_scope_status_key(previous.scope_id, previous.status);
                index
                    .remove(old_key.as_str(), row.id)
                    .map_err(|e| StoreError::backend(e.to_string()))?;
            }
        } else {
            {
                let mut index = self
                    .inner
                    .open_table(RESOLUTIONS_BY_OCC_CANON)
                    .map_err(|e| StoreError::backend(e.to_string()))?;
                let key = res_occ_canon_key(row.occurrence_id, row.canonical_entity_id);
                index
                    .insert(key.as_str(), row.id)
                    .map_err(|e| StoreError::backend(e.to_string()))?;
            }
            {
                let mut index = self
                    .inner
                    .open_multimap_table(RESOLUTIONS_BY_OCCURRENCE)
                    .map_err(|e| StoreError::backend(e.to_string()))?;
                index
                    .insert(row.occurrence_id, row.id)
                    .map_err(|e| StoreError::backend(e.to_string()))?;
            }
        }
        {
            let mut index = self
                .inner
                .open_multimap_table(RESOLUTIONS_BY_SCOPE_STATUS)
                .map_err(|e| StoreError::backend(e.to_string()))?;
            let key = res_scope_status_key(row.scope_id, row.status);
            index
                .insert(key.as_str(), row.id)
                .map_err(|e| StoreError::backend(e.to_string()))?;
        }
        Ok(row)
    }

    fn delete_resolution(&mut self, id: u64) -> Result<(), StoreError> {
        let row = self
            .get_resolution(id)?
            .ok_or(StoreError::ResolutionNotFound(id))?;
        {
            let mut table = self
                .inner
                .open_table(RESOLUTIONS)
                .map_err(|e| StoreError::backend(e.to_string()))?;
            table.remove(id).map_err(|e| StoreError::backend(e.to_string()))?;
        }
        {
            let mut index = self
                .inner
                .open_table(RESOLUTIONS_BY_OCC_CANON)
                .map_err(|e| StoreError::backend(e.to_string()))?;
            let key = res_occ_canon_key(row.occurrence_id, row.canonical_entity_id);
            index
                .remove(key.as_str())
                .map_err(|e| StoreError::backend(e.to_string()))?;
        }
        {
            let mut index = self
                .inner
                .open_multimap_table(RESOLUTIONS_BY_OCCURRENCE)
                .map_err(|e| StoreError::backend(e.to_string()))?;
            index
                .remove(row.occurrence_id, id)
                .map_err(|e| StoreError::backend(e.to_string()))?;
        }
        {
            let mut index = self
                .inner
                .open_multimap_table(RESOLUTIONS_BY_SCOPE_STATUS)
                .map_err(|e| StoreError::backend(e.to_string()))?;
            let key = res_scope_status_key(row.scope_id, row.status);
            index
                .remove(key.as_str(), id)
                .map_err(|e| StoreError::backend(e.to_string()))?;
        }
        Ok(())
    }

    fn next_resolution_id(&mut self) -> Result<u64, StoreError> {
        self.next_id("resolution")
    }
}

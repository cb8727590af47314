use crate::error::StoreError;
use crate::schema::{CanonicalEntityRow, OccurrenceRow, ResolutionRow, ResolutionStatus, ScopeRow};

/// A storage backend capable of running atomic, cross-entity transactions.
///
/// Deliberately generic rather than `dyn`-safe: `transaction` takes a
/// closure generic over its return type, which an object-safe trait cannot
/// express. Engine and server code is written generic over `S: Store`
/// instead of behind a trait object, so the backend is a compile-time
/// choice rather than a runtime indirection.
pub trait Store: Send + Sync {
    /// Run `f` against a single write transaction. If `f` returns `Err`, the
    /// transaction is rolled back; nothing it did is visible afterwards. All
    /// mutation in this crate goes through this method — there is no
    /// standalone single-statement write API, because the engine needs
    /// several statements to commit or fail together.
    fn transaction<F, T>(&self, f: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut dyn Transaction) -> Result<T, StoreError>;
}

/// The object-safe surface exposed inside a transaction closure.
///
/// One method per read/write operation the engine needs, grouped by entity.
/// Implementors (`MemStore`, `RedbStore`) are free to choose their own
/// on-disk/in-memory representation; this trait only commits to the
/// operations, not the layout.
pub trait Transaction {
    // -- Scope --------------------------------------------------------

    fn get_scope(&mut self, id: u64) -> Result<Option<ScopeRow>, StoreError>;

    fn list_scopes(&mut self) -> Result<Vec<ScopeRow>, StoreError>;

    /// Insert a scope with a caller-chosen id (used for the sentinel
    /// `scope_id=0` case) if absent, or update `description`/`updated_at`
    /// if present. Returns the stored row.
    fn upsert_scope(&mut self, row: ScopeRow) -> Result<ScopeRow, StoreError>;

    fn touch_scope(&mut self, id: u64, updated_at: chrono::DateTime<chrono::Utc>) -> Result<(), StoreError>;

    fn next_scope_id(&mut self) -> Result<u64, StoreError>;

    // -- Occurrence -----------------------------------------------------

    fn get_occurrence(&mut self, id: u64) -> Result<Option<OccurrenceRow>, StoreError>;

    /// Find an occurrence in `scope_id` whose `value` matches exactly, via
    /// the `OCCURRENCES_BY_SCOPE_VALUE` index. Returns every candidate;
    /// callers apply the coverage rule themselves since it needs the
    /// caller's observed context, not just the value.
    fn find_occurrences_by_scope_value(
        &mut self,
        scope_id: u64,
        value: &str,
    ) -> Result<Vec<OccurrenceRow>, StoreError>;

    fn list_occurrences_by_scope(&mut self, scope_id: u64) -> Result<Vec<OccurrenceRow>, StoreError>;

    fn insert_occurrence(&mut self, row: OccurrenceRow) -> Result<OccurrenceRow, StoreError>;

    fn update_occurrence(&mut self, row: OccurrenceRow) -> Result<OccurrenceRow, StoreError>;

    fn next_occurrence_id(&mut self) -> Result<u64, StoreError>;

    // -- CanonicalEntity --------------------------------------------------

    fn get_canonical_entity(&mut self, id: u64) -> Result<Option<CanonicalEntityRow>, StoreError>;

    fn find_canonical_entity_by_external_id(
        &mut self,
        scope_id: u64,
        external_id: &str,
    ) -> Result<Option<CanonicalEntityRow>, StoreError>;

    fn find_canonical_entity_by_value_context(
        &mut self,
        scope_id: u64,
        value: &str,
        required_context_elements: &[recon_context::ContextElement],
    ) -> Result<Option<CanonicalEntityRow>, StoreError>;

    fn list_canonical_entities_by_scope(
        &mut self,
        scope_id: u64,
    ) -> Result<Vec<CanonicalEntityRow>, StoreError>;

    fn insert_canonical_entity(
        &mut self,
        row: CanonicalEntityRow,
    ) -> Result<CanonicalEntityRow, StoreError>;

    fn next_canonical_entity_id(&mut self) -> Result<u64, StoreError>;

    // -- Resolution -------------------------------------------------------

    fn get_resolution(&mut self, id: u64) -> Result<Option<ResolutionRow>, StoreError>;

    fn find_resolution_by_occurrence_and_entity(
        &mut self,
        occurrence_id: u64,
        canonical_entity_id: u64,
    ) -> Result<Option<ResolutionRow>, StoreError>;

    fn list_resolutions_by_occurrence(
        &mut self,
        occurrence_id: u64,
    ) -> Result<Vec<ResolutionRow>, StoreError>;

    fn list_resolutions_by_scope_status(
        &mut self,
        scope_id: u64,
        status: Option<ResolutionStatus>,
    ) -> Result<Vec<ResolutionRow>, StoreError>;

    fn upsert_resolution(&mut self, row: ResolutionRow) -> Result<ResolutionRow, StoreError>;

    fn delete_resolution(&mut self, id: u64) -> Result<(), StoreError>;

    fn next_resolution_id(&mut self) -> Result<u64, StoreError>;
}

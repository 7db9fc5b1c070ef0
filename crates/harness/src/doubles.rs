use std::collections::BTreeSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use entmerge_core::{
    ConflictSet, EditFlags, EditSummary, EntityId, EntityRedirect, EntityRevision, EntitySnapshot,
    Principal, RevisionId,
};
use entmerge_engine::{
    CandidateEdit, ChangeSet, ContentMergeEngine, FieldMerger, FilterStatus, MergeConflict,
    PreSaveFilter, WatchlistStore,
};
use entmerge_storage::{EntityLookup, EntityReader, EntityWriter, LookupMode, StorageError};

/// Counts reads and can be told to fail for particular ids.
pub struct RecordingReader {
    inner: Arc<dyn EntityReader>,
    calls: AtomicUsize,
    failing: Mutex<BTreeSet<EntityId>>,
}

impl RecordingReader {
    pub fn new(inner: Arc<dyn EntityReader>) -> Self {
        Self {
            inner,
            calls: AtomicUsize::new(0),
            failing: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn fail_for(&self, id: EntityId) {
        if let Ok(mut failing) = self.failing.lock() {
            failing.insert(id);
        }
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl EntityReader for RecordingReader {
    fn get(&self, id: EntityId, mode: LookupMode) -> Result<EntityLookup, StorageError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.lock().map_err(|_| StorageError::LockPoisoned)?.contains(&id) {
            return Err(StorageError::Corrupted(format!("{id}: injected read failure")));
        }
        self.inner.get(id, mode)
    }
}

/// What a write attempt looked like, whether or not it succeeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveRecord {
    pub entity_id: EntityId,
    pub redirect: bool,
    pub summary: String,
    pub flags: EditFlags,
    pub base: Option<RevisionId>,
}

/// Records every write and can fail the n-th one (1-based).
pub struct RecordingWriter {
    inner: Arc<dyn EntityWriter>,
    records: Mutex<Vec<SaveRecord>>,
    fail_on: Option<usize>,
    concurrent_edit: Mutex<Option<(EntitySnapshot, Principal)>>,
}

impl RecordingWriter {
    pub fn new(inner: Arc<dyn EntityWriter>) -> Self {
        Self {
            inner,
            records: Mutex::new(Vec::new()),
            fail_on: None,
            concurrent_edit: Mutex::new(None),
        }
    }

    pub fn failing_on(mut self, attempt: usize) -> Self {
        self.fail_on = Some(attempt);
        self
    }

    /// Save `entity` straight to the inner store just before the first
    /// write goes through, as another editor would between a load and a
    /// save. Not recorded.
    pub fn with_concurrent_edit(mut self, entity: EntitySnapshot, principal: Principal) -> Self {
        self.concurrent_edit = Mutex::new(Some((entity, principal)));
        self
    }

    pub fn records(&self) -> Vec<SaveRecord> {
        self.records.lock().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn attempts(&self) -> usize {
        self.records().len()
    }

    fn record(&self, record: SaveRecord) -> Result<(), StorageError> {
        let pending = self
            .concurrent_edit
            .lock()
            .map_err(|_| StorageError::LockPoisoned)?
            .take();
        if let Some((entity, principal)) = pending {
            let summary = EditSummary::new("wbeditentity");
            self.inner
                .save_entity(&entity, &summary, &principal, EditFlags::UPDATE, None)?;
        }
        let mut records = self.records.lock().map_err(|_| StorageError::LockPoisoned)?;
        records.push(record);
        if self.fail_on == Some(records.len()) {
            return Err(StorageError::ConstraintViolation(format!(
                "injected failure on write {}",
                records.len()
            )));
        }
        Ok(())
    }
}

impl EntityWriter for RecordingWriter {
    fn save_entity(
        &self,
        entity: &EntitySnapshot,
        summary: &EditSummary,
        principal: &Principal,
        flags: EditFlags,
        base: Option<RevisionId>,
    ) -> Result<EntityRevision, StorageError> {
        self.record(SaveRecord {
            entity_id: entity.id(),
            redirect: false,
            summary: summary.format(),
            flags,
            base,
        })?;
        self.inner.save_entity(entity, summary, principal, flags, base)
    }

    fn save_redirect(
        &self,
        redirect: &EntityRedirect,
        summary: &EditSummary,
        principal: &Principal,
        flags: EditFlags,
        base: Option<RevisionId>,
    ) -> Result<EntityRevision, StorageError> {
        self.record(SaveRecord {
            entity_id: redirect.from_id(),
            redirect: true,
            summary: summary.format(),
            flags,
            base,
        })?;
        self.inner.save_redirect(redirect, summary, principal, flags, base)
    }
}

/// Delegates to `FieldMerger`, remembering the ignore sets it was given.
#[derive(Default)]
pub struct RecordingMergeEngine {
    inner: FieldMerger,
    seen: Mutex<Vec<ConflictSet>>,
}

impl RecordingMergeEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen(&self) -> Vec<ConflictSet> {
        self.seen.lock().map(|s| s.clone()).unwrap_or_default()
    }
}

impl ContentMergeEngine for RecordingMergeEngine {
    fn plan_merge(
        &self,
        source: &EntitySnapshot,
        target: &EntitySnapshot,
        ignore: &ConflictSet,
    ) -> Result<ChangeSet, MergeConflict> {
        if let Ok(mut seen) = self.seen.lock() {
            seen.push(ignore.clone());
        }
        self.inner.plan_merge(source, target, ignore)
    }
}

/// Rejects every candidate edit.
pub struct RejectingFilter(pub String);

impl PreSaveFilter for RejectingFilter {
    fn run(
        &self,
        _edit: &CandidateEdit,
        _principal: &Principal,
        _summary: &EditSummary,
    ) -> FilterStatus {
        FilterStatus::Reject(self.0.clone())
    }
}

pub struct FailingWatchlist;

impl WatchlistStore for FailingWatchlist {
    fn duplicate_entries(&self, _from: EntityId, _to: EntityId) -> Result<usize, StorageError> {
        Err(StorageError::LockPoisoned)
    }
}

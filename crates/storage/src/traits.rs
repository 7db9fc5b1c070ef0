use entmerge_core::{
    ActorId, EditFlags, EditSummary, EntityId, EntityRedirect, EntityRevision, EntitySnapshot,
    Hlc, Principal, RevisionId,
};

use crate::error::StorageError;

/// Read consistency. `Cached` may return a copy that lags behind the
/// latest write from another handle; `Authoritative` never does.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupMode {
    Cached,
    Authoritative,
}

/// Current state of an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntityLookup {
    Entity(EntityRevision),
    Redirect {
        revision_id: RevisionId,
        redirect: EntityRedirect,
    },
    Absent,
}

impl EntityLookup {
    pub fn revision_id(&self) -> Option<RevisionId> {
        match self {
            Self::Entity(revision) => Some(revision.revision_id),
            Self::Redirect { revision_id, .. } => Some(*revision_id),
            Self::Absent => None,
        }
    }

    pub fn is_redirect(&self) -> bool {
        matches!(self, Self::Redirect { .. })
    }

    pub fn is_absent(&self) -> bool {
        matches!(self, Self::Absent)
    }

    /// The snapshot, when the id currently denotes a concrete entity.
    pub fn entity(&self) -> Option<&EntitySnapshot> {
        match self {
            Self::Entity(revision) => revision.entity(),
            _ => None,
        }
    }
}

pub trait EntityReader: Send + Sync {
    fn get(&self, id: EntityId, mode: LookupMode) -> Result<EntityLookup, StorageError>;
}

/// Persists new revisions. `base` is the revision the caller's copy was
/// read at; a write whose base is no longer the latest revision fails with
/// `StorageError::EditConflict`.
pub trait EntityWriter: Send + Sync {
    fn save_entity(
        &self,
        entity: &EntitySnapshot,
        summary: &EditSummary,
        principal: &Principal,
        flags: EditFlags,
        base: Option<RevisionId>,
    ) -> Result<EntityRevision, StorageError>;

    fn save_redirect(
        &self,
        redirect: &EntityRedirect,
        summary: &EditSummary,
        principal: &Principal,
        flags: EditFlags,
        base: Option<RevisionId>,
    ) -> Result<EntityRevision, StorageError>;
}

/// Revision metadata as listed by `history`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RevisionRecord {
    pub revision_id: RevisionId,
    pub parent: Option<RevisionId>,
    pub entity_id: EntityId,
    pub kind: String,
    pub timestamp: Hlc,
    pub author: ActorId,
    pub flags: EditFlags,
    pub summary: String,
}

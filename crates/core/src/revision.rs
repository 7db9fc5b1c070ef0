use serde::{Deserialize, Serialize};

use crate::entity::EntitySnapshot;
use crate::error::CoreError;
use crate::hlc::Hlc;
use crate::ids::{ActorId, EntityId, RevisionId};
use crate::redirect::EntityRedirect;

/// What a revision stores for its entity: content, or a redirect record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum RevisionContent {
    Entity(EntitySnapshot),
    Redirect(EntityRedirect),
}

impl RevisionContent {
    pub fn entity_id(&self) -> EntityId {
        match self {
            Self::Entity(entity) => entity.id(),
            Self::Redirect(redirect) => redirect.from_id(),
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Entity(_) => "entity",
            Self::Redirect(_) => "redirect",
        }
    }

    pub fn to_msgpack(&self) -> Result<Vec<u8>, CoreError> {
        rmp_serde::to_vec(self).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, CoreError> {
        rmp_serde::from_slice(bytes).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    /// blake3 over the MessagePack encoding.
    pub fn checksum(&self) -> Result<[u8; 32], CoreError> {
        Ok(*blake3::hash(&self.to_msgpack()?).as_bytes())
    }
}

/// A persisted state of one entity, produced by every successful write.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityRevision {
    pub revision_id: RevisionId,
    pub parent: Option<RevisionId>,
    pub timestamp: Hlc,
    pub author: ActorId,
    pub content: RevisionContent,
}

impl EntityRevision {
    pub fn entity_id(&self) -> EntityId {
        self.content.entity_id()
    }

    pub fn entity(&self) -> Option<&EntitySnapshot> {
        match &self.content {
            RevisionContent::Entity(entity) => Some(entity),
            RevisionContent::Redirect(_) => None,
        }
    }

    pub fn redirect(&self) -> Option<&EntityRedirect> {
        match &self.content {
            RevisionContent::Redirect(redirect) => Some(redirect),
            RevisionContent::Entity(_) => None,
        }
    }

    pub fn into_entity(self) -> Option<EntitySnapshot> {
        match self.content {
            RevisionContent::Entity(entity) => Some(entity),
            RevisionContent::Redirect(_) => None,
        }
    }

    /// Bytes the author signs: entity id, parent revision, timestamp, content checksum.
    pub fn signing_bytes(
        entity_id: &EntityId,
        parent: Option<RevisionId>,
        timestamp: &Hlc,
        checksum: &[u8; 32],
    ) -> Vec<u8> {
        let mut bytes = Vec::new();
        bytes.extend_from_slice(entity_id.to_string().as_bytes());
        bytes.push(0);
        bytes.extend_from_slice(&parent.map(|p| p.get()).unwrap_or(0).to_be_bytes());
        bytes.extend_from_slice(&timestamp.to_bytes());
        bytes.extend_from_slice(checksum);
        bytes
    }
}

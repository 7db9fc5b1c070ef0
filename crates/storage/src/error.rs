use entmerge_core::RevisionId;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("entity already exists: {0}")]
    EntityExists(String),

    #[error("edit conflict on {entity_id}: based on {expected}, latest is {}", .actual.map(|r| r.to_string()).unwrap_or_else(|| "none".into()))]
    EditConflict {
        entity_id: String,
        expected: RevisionId,
        actual: Option<RevisionId>,
    },

    #[error("constraint violation: {0}")]
    ConstraintViolation(String),

    #[error("corrupted revision: {0}")]
    Corrupted(String),

    #[error("store lock poisoned")]
    LockPoisoned,

    #[error("core error: {0}")]
    Core(#[from] entmerge_core::CoreError),
}

pub mod config;
pub mod error;
pub mod filter;
pub mod merge;
pub mod merger;
pub mod permissions;
pub mod redirect;
pub mod watchlist;

pub use config::EngineConfig;
pub use error::{EngineError, ErrorKind};
pub use filter::{AllowAll, BlockedTargets, CandidateEdit, FilterStatus, PreSaveFilter};
pub use merge::{MergeOrchestrator, MergeOutcome};
pub use merger::{ChangeOp, ChangeSet, ContentMergeEngine, FieldMerger, MergeConflict};
pub use permissions::{
    Capability, PermissionEvaluator, PermissionStatus, RequiredPermissions, RightsEvaluator,
    EDIT_PROTECTED_RIGHT,
};
pub use redirect::RedirectCreator;
pub use watchlist::{InMemoryWatchlist, WatchlistStore};

use std::sync::Arc;

use entmerge_storage::{EntityReader, EntityWriter};

/// Collaborators shared by redirect creation and merging.
#[derive(Clone)]
pub struct EntityServices {
    pub reader: Arc<dyn EntityReader>,
    pub writer: Arc<dyn EntityWriter>,
    pub permissions: Arc<dyn PermissionEvaluator>,
    pub filter: Arc<dyn PreSaveFilter>,
}

impl EntityServices {
    pub fn new(
        reader: Arc<dyn EntityReader>,
        writer: Arc<dyn EntityWriter>,
        permissions: Arc<dyn PermissionEvaluator>,
        filter: Arc<dyn PreSaveFilter>,
    ) -> Self {
        Self {
            reader,
            writer,
            permissions,
            filter,
        }
    }

    /// Reads and writes go to the same store, every edit passes the filter.
    pub fn from_store<S>(store: Arc<S>, permissions: Arc<dyn PermissionEvaluator>) -> Self
    where
        S: EntityReader + EntityWriter + 'static,
    {
        Self {
            reader: store.clone(),
            writer: store,
            permissions,
            filter: Arc::new(AllowAll),
        }
    }

    pub fn with_filter(mut self, filter: Arc<dyn PreSaveFilter>) -> Self {
        self.filter = filter;
        self
    }
}

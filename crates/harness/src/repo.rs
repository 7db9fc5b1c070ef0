use std::sync::Arc;

use entmerge_core::{
    EditFlags, EditSummary, EntityId, EntitySnapshot, EntityType, Principal, RevisionId,
};
use entmerge_engine::{
    EngineConfig, EntityServices, FieldMerger, MergeOrchestrator, PermissionEvaluator,
    RedirectCreator, RightsEvaluator,
};
use entmerge_storage::{
    EntityLookup, EntityReader, EntityWriter, LookupMode, SqliteEntityStore, StorageError,
};

/// Every right the merge and redirect workflows ask for.
pub const FULL_RIGHTS: [&str; 5] =
    ["edit", "item-merge", "item-redirect", "property-redirect", "bot"];

/// A store plus a principal holding every right in `FULL_RIGHTS`.
pub struct TestRepo {
    pub store: Arc<SqliteEntityStore>,
    pub admin: Principal,
    pub config: EngineConfig,
    permissions: Arc<dyn PermissionEvaluator>,
}

impl TestRepo {
    pub fn new() -> Result<Self, StorageError> {
        Self::with_store(SqliteEntityStore::open_in_memory()?)
    }

    /// A file-backed repo; reopening the same path sees earlier writes.
    pub fn open(path: &str) -> Result<Self, StorageError> {
        Self::with_store(SqliteEntityStore::open(path)?)
    }

    fn with_store(store: SqliteEntityStore) -> Result<Self, StorageError> {
        Ok(Self {
            store: Arc::new(store),
            admin: Principal::new("Admin").with_rights(FULL_RIGHTS),
            config: EngineConfig::default(),
            permissions: Arc::new(RightsEvaluator::new()),
        })
    }

    pub fn with_permissions(mut self, permissions: Arc<dyn PermissionEvaluator>) -> Self {
        self.permissions = permissions;
        self
    }

    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// A principal holding only `rights`.
    pub fn user(&self, name: &str, rights: &[&str]) -> Principal {
        Principal::new(name).with_rights(rights.iter().copied())
    }

    pub fn services(&self) -> EntityServices {
        EntityServices::from_store(self.store.clone(), self.permissions.clone())
    }

    pub fn redirect_creator(&self, principal: &Principal) -> RedirectCreator {
        RedirectCreator::new(self.services(), principal.clone(), self.config.clone())
    }

    pub fn orchestrator(&self, principal: &Principal) -> MergeOrchestrator {
        MergeOrchestrator::new(
            self.services(),
            Arc::new(FieldMerger::new()),
            principal.clone(),
            self.config.clone(),
        )
    }

    /// Allocate an id and save the built snapshot as a new entity.
    pub fn create(
        &self,
        entity_type: EntityType,
        build: impl FnOnce(EntitySnapshot) -> EntitySnapshot,
    ) -> Result<EntityId, StorageError> {
        let id = self.store.next_id(entity_type)?;
        self.store.save_entity(
            &build(EntitySnapshot::new(id)),
            &EditSummary::new("wbeditentity").with_action("create"),
            &self.admin,
            EditFlags::NEW,
            None,
        )?;
        Ok(id)
    }

    pub fn create_item(
        &self,
        build: impl FnOnce(EntitySnapshot) -> EntitySnapshot,
    ) -> Result<EntityId, StorageError> {
        self.create(EntityType::Item, build)
    }

    pub fn create_empty_item(&self) -> Result<EntityId, StorageError> {
        self.create_item(|e| e)
    }

    pub fn create_property(
        &self,
        build: impl FnOnce(EntitySnapshot) -> EntitySnapshot,
    ) -> Result<EntityId, StorageError> {
        self.create(EntityType::Property, build)
    }

    /// Overwrite an entity's content outside any workflow.
    pub fn replace(&self, entity: &EntitySnapshot) -> Result<RevisionId, StorageError> {
        let revision = self.store.save_entity(
            entity,
            &EditSummary::new("wbeditentity").with_action("override"),
            &self.admin,
            EditFlags::UPDATE,
            None,
        )?;
        Ok(revision.revision_id)
    }

    pub fn lookup(&self, id: EntityId) -> Result<EntityLookup, StorageError> {
        self.store.get(id, LookupMode::Authoritative)
    }

    /// The current snapshot of `id`; errors when it is absent or a redirect.
    pub fn entity(&self, id: EntityId) -> Result<EntitySnapshot, StorageError> {
        match self.lookup(id)? {
            EntityLookup::Entity(revision) => revision
                .into_entity()
                .ok_or_else(|| StorageError::NotFound(id.to_string())),
            _ => Err(StorageError::NotFound(id.to_string())),
        }
    }

    pub fn revision_count(&self, id: EntityId) -> Result<usize, StorageError> {
        Ok(self.store.history(id)?.len())
    }
}

use std::sync::Arc;

use tracing::{debug, info, warn};

use entmerge_core::{
    ConflictSet, EditFlags, EditSummary, EntityId, EntityRevision, EntitySnapshot, Principal,
    RevisionId,
};
use entmerge_storage::{EntityLookup, LookupMode};

use crate::config::EngineConfig;
use crate::error::{EngineError, ErrorKind};
use crate::merger::{ContentMergeEngine, MergeConflict};
use crate::permissions::{Capability, RequiredPermissions};
use crate::redirect::RedirectCreator;
use crate::watchlist::WatchlistStore;
use crate::EntityServices;

/// Result of a merge: the revisions written for source and target, and
/// whether the emptied source was turned into a redirect.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    pub source_revision: EntityRevision,
    pub target_revision: EntityRevision,
    pub redirect_created: bool,
}

/// Folds one entity into another, then redirects the source when nothing
/// is left on it.
///
/// The two saves are not atomic. The target is written first; if the
/// source write then fails the target keeps the merged content and no
/// rollback is attempted.
pub struct MergeOrchestrator {
    services: EntityServices,
    merge_engine: Arc<dyn ContentMergeEngine>,
    watchlist: Option<Arc<dyn WatchlistStore>>,
    redirect_creator: RedirectCreator,
    principal: Principal,
    config: EngineConfig,
}

impl MergeOrchestrator {
    pub fn new(
        services: EntityServices,
        merge_engine: Arc<dyn ContentMergeEngine>,
        principal: Principal,
        config: EngineConfig,
    ) -> Self {
        let redirect_creator =
            RedirectCreator::new(services.clone(), principal.clone(), config.clone());
        Self {
            services,
            merge_engine,
            watchlist: None,
            redirect_creator,
            principal,
            config,
        }
    }

    pub fn with_watchlist(mut self, watchlist: Arc<dyn WatchlistStore>) -> Self {
        self.watchlist = Some(watchlist);
        self
    }

    pub fn redirect_creator(&self) -> &RedirectCreator {
        &self.redirect_creator
    }

    /// Merge `from` into `to`. Unknown names in `ignore_conflicts` are
    /// dropped. Redirect failures come back with their own codes.
    pub fn merge_items<I, S>(
        &self,
        from: EntityId,
        to: EntityId,
        ignore_conflicts: I,
        summary: Option<&str>,
        bot: bool,
    ) -> Result<MergeOutcome, EngineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let result = self.try_merge_items(from, to, ignore_conflicts, summary, bot);
        if let Err(err) = &result {
            debug!(%from, %to, code = err.code(), message = err.message(), "merge failed");
        }
        result
    }

    fn try_merge_items<I, S>(
        &self,
        from: EntityId,
        to: EntityId,
        ignore_conflicts: I,
        summary: Option<&str>,
        bot: bool,
    ) -> Result<MergeOutcome, EngineError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.check_ids(from, to)?;

        RequiredPermissions::new()
            .require(Capability::Edit, from)
            .require(Capability::Merge(from.entity_type()), from)
            .require(Capability::Edit, to)
            .require(Capability::Merge(to.entity_type()), to)
            .check(self.services.permissions.as_ref(), &self.principal)?;

        let from_revision = self.load_entity(from)?;
        let to_revision = self.load_entity(to)?;
        let base_from = from_revision.revision_id;
        let base_to = to_revision.revision_id;
        let (mut source, mut target) =
            match (from_revision.into_entity(), to_revision.into_entity()) {
                (Some(source), Some(target)) => (source, target),
                _ => {
                    return Err(EngineError::new(
                        ErrorKind::CantLoadEntityContent,
                        format!("{from} or {to} did not load as a concrete entity"),
                    ));
                }
            };
        self.check_entities(&source, &target)?;

        let (ignore, rejected) = ConflictSet::sanitize(ignore_conflicts);
        if !rejected.is_empty() {
            debug!(?rejected, "dropping unrecognised conflict categories");
        }

        self.apply_merge(&mut source, &mut target, &ignore)?;

        let truncated = self.config.truncate_summary(summary);
        let user_summary = truncated.as_deref();
        let bot = self.bot_authorized(to, bot);
        let mut flags = EditFlags::UPDATE | EditFlags::IGNORE_CONSTRAINTS;
        if bot {
            flags |= EditFlags::FORCE_BOT;
        }
        let target_revision = self.save(&target, "from", from, user_summary, flags, base_to)?;
        let source_revision = match self.save(&source, "to", to, user_summary, flags, base_from) {
            Ok(revision) => revision,
            Err(err) => {
                warn!(
                    %from,
                    %to,
                    target_revision = %target_revision.revision_id,
                    "target saved with merged content but saving the source failed"
                );
                return Err(err);
            }
        };

        self.duplicate_watchers(from, to);

        let redirect_created = if self.source_is_empty(from)? {
            self.redirect_creator.create_redirect(from, to, bot)?;
            true
        } else {
            false
        };

        info!(
            %from,
            %to,
            source_revision = %source_revision.revision_id,
            target_revision = %target_revision.revision_id,
            redirect_created,
            "merged entities"
        );

        Ok(MergeOutcome {
            source_revision,
            target_revision,
            redirect_created,
        })
    }

    /// Id-only validation; runs before any permission check or read.
    fn check_ids(&self, from: EntityId, to: EntityId) -> Result<(), EngineError> {
        for id in [from, to] {
            if !self.config.is_mergeable(id.entity_type()) {
                return Err(EngineError::new(
                    ErrorKind::NotItem,
                    format!("{id} is a {} and cannot be merged", id.entity_type()),
                ));
            }
        }
        if !from.is_compatible_with(&to) {
            return Err(EngineError::new(
                ErrorKind::NotItem,
                format!("{from} and {to} are different kinds of entity"),
            ));
        }
        if from == to {
            return Err(EngineError::new(
                ErrorKind::CantMergeSelf,
                format!("cannot merge {from} with itself"),
            ));
        }
        Ok(())
    }

    fn check_entities(
        &self,
        source: &EntitySnapshot,
        target: &EntitySnapshot,
    ) -> Result<(), EngineError> {
        for entity in [source, target] {
            if !self.config.is_mergeable(entity.entity_type()) {
                return Err(EngineError::new(
                    ErrorKind::NotItem,
                    format!("{} is a {} and cannot be merged", entity.id(), entity.entity_type()),
                ));
            }
        }
        if source.entity_type() != target.entity_type() {
            return Err(EngineError::new(
                ErrorKind::NotItem,
                format!("{} and {} are different kinds of entity", source.id(), target.id()),
            ));
        }
        if source.id() == target.id() {
            return Err(EngineError::new(
                ErrorKind::CantMergeSelf,
                format!("cannot merge {} with itself", source.id()),
            ));
        }
        Ok(())
    }

    fn load_entity(&self, id: EntityId) -> Result<EntityRevision, EngineError> {
        let lookup = self
            .services
            .reader
            .get(id, LookupMode::Authoritative)
            .map_err(|e| {
                EngineError::new(ErrorKind::CantLoadEntityContent, format!("failed to load {id}"))
                    .with_source(e)
            })?;
        match lookup {
            EntityLookup::Entity(revision) => Ok(revision),
            EntityLookup::Redirect { redirect, .. } => Err(EngineError::new(
                ErrorKind::CantLoadEntityContent,
                format!("{id} is a redirect to {}", redirect.to_id()),
            )),
            EntityLookup::Absent => Err(EngineError::new(
                ErrorKind::NoSuchEntity,
                format!("{id} does not exist"),
            )),
        }
    }

    fn apply_merge(
        &self,
        source: &mut EntitySnapshot,
        target: &mut EntitySnapshot,
        ignore: &ConflictSet,
    ) -> Result<(), EngineError> {
        let to_failed_modify = |e: MergeConflict| {
            EngineError::new(ErrorKind::FailedModify, e.message.clone()).with_source(e)
        };
        let changes = self
            .merge_engine
            .plan_merge(source, target, ignore)
            .map_err(to_failed_modify)?;
        changes.apply(source, target).map_err(to_failed_modify)?;
        debug!(
            from = %source.id(),
            to = %target.id(),
            ops = changes.ops().len(),
            "applied merge changes"
        );
        Ok(())
    }

    /// A bot request only holds when the principal may make bot edits on
    /// `to`; the same answer applies to every write of the merge.
    fn bot_authorized(&self, to: EntityId, requested: bool) -> bool {
        requested
            && self
                .services
                .permissions
                .check(&self.principal, &Capability::Bot, &to)
                .is_granted()
    }

    /// `action` is `from` for the target's summary and `to` for the source's;
    /// `other` is the id on the far side of the merge.
    fn save(
        &self,
        entity: &EntitySnapshot,
        action: &str,
        other: EntityId,
        user_summary: Option<&str>,
        flags: EditFlags,
        base: RevisionId,
    ) -> Result<EntityRevision, EngineError> {
        let summary = EditSummary::new(self.config.merge_module.as_str())
            .with_action(action)
            .with_comment_args([other.serialization()])
            .with_user_summary(user_summary);
        self.services
            .writer
            .save_entity(entity, &summary, &self.principal, flags, Some(base))
            .map_err(|e| {
                EngineError::new(ErrorKind::FailedSave, format!("failed to save {}", entity.id()))
                    .with_source(e)
            })
    }

    fn duplicate_watchers(&self, from: EntityId, to: EntityId) {
        let Some(watchlist) = &self.watchlist else {
            return;
        };
        match watchlist.duplicate_entries(from, to) {
            Ok(added) => debug!(%from, %to, added, "copied watchers to merge target"),
            Err(err) => warn!(%from, %to, error = %err, "failed to copy watchers to merge target"),
        }
    }

    fn source_is_empty(&self, from: EntityId) -> Result<bool, EngineError> {
        let lookup = self
            .services
            .reader
            .get(from, LookupMode::Authoritative)
            .map_err(|e| {
                EngineError::new(
                    ErrorKind::CantLoadEntityContent,
                    format!("failed to reload {from}"),
                )
                .with_source(e)
            })?;
        Ok(lookup.entity().is_some_and(EntitySnapshot::is_empty))
    }
}

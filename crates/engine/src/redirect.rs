use tracing::{debug, info};

use entmerge_core::{EditFlags, EditSummary, EntityId, EntityRedirect, Principal, RevisionId};
use entmerge_storage::{EntityLookup, LookupMode};

use crate::config::EngineConfig;
use crate::error::{EngineError, ErrorKind};
use crate::filter::{CandidateEdit, FilterStatus};
use crate::permissions::{Capability, RequiredPermissions};
use crate::EntityServices;

/// Turns an empty entity (or an existing redirect) into a redirect to
/// another entity of the same type.
pub struct RedirectCreator {
    services: EntityServices,
    principal: Principal,
    config: EngineConfig,
}

impl RedirectCreator {
    pub fn new(services: EntityServices, principal: Principal, config: EngineConfig) -> Self {
        Self {
            services,
            principal,
            config,
        }
    }

    pub fn principal(&self) -> &Principal {
        &self.principal
    }

    /// Checks run in a fixed order and the first failure wins:
    /// compatibility, permissions, target, source, pre-save filter.
    /// Nothing is written unless all of them pass.
    pub fn create_redirect(
        &self,
        from: EntityId,
        to: EntityId,
        bot: bool,
    ) -> Result<EntityRedirect, EngineError> {
        let result = self.try_create_redirect(from, to, bot);
        if let Err(err) = &result {
            debug!(%from, %to, code = err.code(), message = err.message(), "redirect rejected");
        }
        result
    }

    fn try_create_redirect(
        &self,
        from: EntityId,
        to: EntityId,
        bot: bool,
    ) -> Result<EntityRedirect, EngineError> {
        let redirect = self.check_compatible(from, to)?;

        RequiredPermissions::new()
            .require(Capability::Edit, from)
            .require(Capability::Redirect(from.entity_type()), from)
            .check(self.services.permissions.as_ref(), &self.principal)?;

        self.check_target(to)?;
        let base = self.check_source(from)?;

        let summary = EditSummary::new(self.config.redirect_module.as_str())
            .with_comment_args([from.serialization(), to.serialization()]);

        let candidate = CandidateEdit::redirect(redirect);
        let status = self.services.filter.run(&candidate, &self.principal, &summary);
        if let FilterStatus::Reject(reason) = status {
            debug!(%from, %to, %reason, "pre-save filter rejected redirect");
            return Err(EngineError::new(
                ErrorKind::CantRedirect,
                format!("the redirect from {from} to {to} was rejected by a pre-save filter"),
            ));
        }

        let mut flags = EditFlags::UPDATE;
        if bot {
            flags |= EditFlags::FORCE_BOT;
        }

        let revision = self
            .services
            .writer
            .save_redirect(&redirect, &summary, &self.principal, flags, base)
            .map_err(|e| {
                EngineError::new(
                    ErrorKind::CantRedirect,
                    format!("failed to save redirect from {from} to {to}"),
                )
                .with_source(e)
            })?;

        info!(%from, %to, revision = %revision.revision_id, bot, "created redirect");
        Ok(redirect)
    }

    fn check_compatible(
        &self,
        from: EntityId,
        to: EntityId,
    ) -> Result<EntityRedirect, EngineError> {
        if !from.is_compatible_with(&to) {
            return Err(EngineError::new(
                ErrorKind::TargetIsIncompatible,
                format!(
                    "cannot redirect {from} ({}) to {to} ({})",
                    from.entity_type(),
                    to.entity_type()
                ),
            ));
        }
        EntityRedirect::new(from, to).map_err(|e| {
            EngineError::new(ErrorKind::TargetIsIncompatible, e.to_string()).with_source(e)
        })
    }

    /// The target must exist, not be a redirect, and carry content.
    fn check_target(&self, to: EntityId) -> Result<(), EngineError> {
        match self.load(to)? {
            EntityLookup::Absent => Err(EngineError::new(
                ErrorKind::NoSuchEntity,
                format!("{to} does not exist"),
            )),
            EntityLookup::Redirect { redirect, .. } => Err(EngineError::new(
                ErrorKind::TargetIsRedirect,
                format!("{to} is itself a redirect to {}", redirect.to_id()),
            )),
            EntityLookup::Entity(revision) => match revision.entity() {
                Some(entity) if entity.is_empty() => Err(EngineError::new(
                    ErrorKind::TargetIsIncompatible,
                    format!("{to} is empty and cannot be a redirect target"),
                )),
                _ => Ok(()),
            },
        }
    }

    /// The source must be empty or already a redirect. Returns the revision
    /// the redirect will be based on.
    fn check_source(&self, from: EntityId) -> Result<Option<RevisionId>, EngineError> {
        match self.load(from)? {
            EntityLookup::Redirect { revision_id, .. } => Ok(Some(revision_id)),
            EntityLookup::Absent => Err(EngineError::new(
                ErrorKind::NoSuchEntity,
                format!("{from} does not exist"),
            )),
            EntityLookup::Entity(revision) => match revision.entity() {
                Some(entity) if !entity.is_empty() => Err(EngineError::new(
                    ErrorKind::TargetNotEmpty,
                    format!("{from} still has content and cannot become a redirect"),
                )),
                _ => Ok(Some(revision.revision_id)),
            },
        }
    }

    fn load(&self, id: EntityId) -> Result<EntityLookup, EngineError> {
        self.services
            .reader
            .get(id, LookupMode::Authoritative)
            .map_err(|e| {
                EngineError::new(ErrorKind::CantLoadEntityContent, format!("failed to load {id}"))
                    .with_source(e)
            })
    }
}

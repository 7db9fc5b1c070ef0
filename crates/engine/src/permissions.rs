use std::collections::BTreeSet;
use std::fmt;

use tracing::debug;

use entmerge_core::{EntityId, EntityType, Principal};

use crate::error::{EngineError, ErrorKind};

/// Right that protected entities additionally require for edit capabilities.
pub const EDIT_PROTECTED_RIGHT: &str = "editprotected";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    Edit,
    Merge(EntityType),
    Redirect(EntityType),
    Bot,
}

impl Capability {
    /// Right name, e.g. `edit`, `item-merge`, `property-redirect`.
    pub fn name(&self) -> String {
        match self {
            Self::Edit => "edit".to_string(),
            Self::Merge(entity_type) => format!("{entity_type}-merge"),
            Self::Redirect(entity_type) => format!("{entity_type}-redirect"),
            Self::Bot => "bot".to_string(),
        }
    }

    fn modifies_content(&self) -> bool {
        !matches!(self, Self::Bot)
    }
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied(String),
}

impl PermissionStatus {
    pub fn is_granted(&self) -> bool {
        matches!(self, Self::Granted)
    }
}

pub trait PermissionEvaluator: Send + Sync {
    fn check(
        &self,
        principal: &Principal,
        capability: &Capability,
        id: &EntityId,
    ) -> PermissionStatus;
}

/// Grants a capability when the principal holds the right of the same name.
/// Protected entities also need `editprotected` for anything that edits.
#[derive(Debug, Clone, Default)]
pub struct RightsEvaluator {
    protected: BTreeSet<EntityId>,
}

impl RightsEvaluator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_protected<I: IntoIterator<Item = EntityId>>(mut self, ids: I) -> Self {
        self.protected.extend(ids);
        self
    }
}

impl PermissionEvaluator for RightsEvaluator {
    fn check(
        &self,
        principal: &Principal,
        capability: &Capability,
        id: &EntityId,
    ) -> PermissionStatus {
        let right = capability.name();
        if !principal.has_right(&right) {
            return PermissionStatus::Denied(format!(
                "{} lacks the '{right}' right needed on {id}",
                principal.name()
            ));
        }
        if capability.modifies_content()
            && self.protected.contains(id)
            && !principal.has_right(EDIT_PROTECTED_RIGHT)
        {
            return PermissionStatus::Denied(format!("{id} is protected"));
        }
        PermissionStatus::Granted
    }
}

/// Ordered (capability, id) pairs; evaluation stops at the first denial.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RequiredPermissions(Vec<(Capability, EntityId)>);

impl RequiredPermissions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn require(mut self, capability: Capability, id: EntityId) -> Self {
        self.0.push((capability, id));
        self
    }

    pub fn entries(&self) -> &[(Capability, EntityId)] {
        &self.0
    }

    pub fn check(
        &self,
        evaluator: &dyn PermissionEvaluator,
        principal: &Principal,
    ) -> Result<(), EngineError> {
        for (capability, id) in &self.0 {
            if let PermissionStatus::Denied(reason) = evaluator.check(principal, capability, id) {
                debug!(
                    principal = principal.name(),
                    %capability,
                    entity = %id,
                    "permission denied"
                );
                return Err(EngineError::new(ErrorKind::PermissionDenied, reason));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn capability_names() {
        assert_eq!(Capability::Edit.name(), "edit");
        assert_eq!(Capability::Merge(EntityType::Item).name(), "item-merge");
        assert_eq!(Capability::Redirect(EntityType::Property).name(), "property-redirect");
        assert_eq!(Capability::Bot.name(), "bot");
    }

    #[test]
    fn rights_grant_capabilities() {
        let evaluator = RightsEvaluator::new();
        let editor = Principal::new("Editor").with_rights(["edit"]);
        let id = EntityId::item(1);
        assert!(evaluator.check(&editor, &Capability::Edit, &id).is_granted());
        assert!(!evaluator.check(&editor, &Capability::Merge(EntityType::Item), &id).is_granted());
    }

    #[test]
    fn protection_needs_editprotected() {
        let id = EntityId::item(1);
        let evaluator = RightsEvaluator::new().with_protected([id]);
        let editor = Principal::new("Editor").with_rights(["edit", "bot"]);
        assert!(!evaluator.check(&editor, &Capability::Edit, &id).is_granted());
        assert!(evaluator.check(&editor, &Capability::Bot, &id).is_granted());

        let admin = editor.clone().with_rights([EDIT_PROTECTED_RIGHT]);
        assert!(evaluator.check(&admin, &Capability::Edit, &id).is_granted());
        assert!(evaluator.check(&admin, &Capability::Edit, &EntityId::item(2)).is_granted());
    }

    #[test]
    fn first_denial_wins() {
        let evaluator = RightsEvaluator::new();
        let principal = Principal::new("Editor").with_rights(["edit"]);
        let required = RequiredPermissions::new()
            .require(Capability::Edit, EntityId::item(1))
            .require(Capability::Redirect(EntityType::Item), EntityId::item(1))
            .require(Capability::Merge(EntityType::Item), EntityId::item(1));
        let err = required.check(&evaluator, &principal).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::PermissionDenied);
        assert!(err.message().contains("item-redirect"), "{}", err.message());
    }
}

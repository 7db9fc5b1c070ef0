use std::collections::BTreeSet;

use entmerge_core::{EditSummary, EntityId, EntityRedirect, Principal, RevisionContent};

/// The edit a filter is asked to vet before anything is written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CandidateEdit {
    pub entity_id: EntityId,
    pub content: RevisionContent,
}

impl CandidateEdit {
    pub fn redirect(redirect: EntityRedirect) -> Self {
        Self {
            entity_id: redirect.from_id(),
            content: RevisionContent::Redirect(redirect),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterStatus {
    Pass,
    Reject(String),
}

/// Content-moderation hook run before a redirect is saved.
pub trait PreSaveFilter: Send + Sync {
    fn run(
        &self,
        edit: &CandidateEdit,
        principal: &Principal,
        summary: &EditSummary,
    ) -> FilterStatus;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct AllowAll;

impl PreSaveFilter for AllowAll {
    fn run(
        &self,
        _edit: &CandidateEdit,
        _principal: &Principal,
        _summary: &EditSummary,
    ) -> FilterStatus {
        FilterStatus::Pass
    }
}

/// Rejects redirects that point at any of the listed ids.
#[derive(Debug, Clone, Default)]
pub struct BlockedTargets {
    targets: BTreeSet<EntityId>,
}

impl FromIterator<EntityId> for BlockedTargets {
    fn from_iter<T: IntoIterator<Item = EntityId>>(iter: T) -> Self {
        Self {
            targets: iter.into_iter().collect(),
        }
    }
}

impl PreSaveFilter for BlockedTargets {
    fn run(
        &self,
        edit: &CandidateEdit,
        _principal: &Principal,
        _summary: &EditSummary,
    ) -> FilterStatus {
        match &edit.content {
            RevisionContent::Redirect(redirect) if self.targets.contains(&redirect.to_id()) => {
                FilterStatus::Reject(format!("redirects to {} are blocked", redirect.to_id()))
            }
            _ => FilterStatus::Pass,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocked_targets_only_reject_listed_ids() {
        let filter: BlockedTargets = [EntityId::item(2)].into_iter().collect();
        let principal = Principal::new("Editor");
        let summary = EditSummary::new("wbcreateredirect");

        let redirect = EntityRedirect::new(EntityId::item(1), EntityId::item(2)).unwrap();
        let blocked = CandidateEdit::redirect(redirect);
        assert!(matches!(filter.run(&blocked, &principal, &summary), FilterStatus::Reject(_)));

        let redirect = EntityRedirect::new(EntityId::item(1), EntityId::item(3)).unwrap();
        let allowed = CandidateEdit::redirect(redirect);
        assert_eq!(filter.run(&allowed, &principal, &summary), FilterStatus::Pass);
    }
}

use thiserror::Error;

use entmerge_core::{entity::new_statement_guid, ConflictKind, ConflictSet, EntitySnapshot};

/// Irreconcilable difference between source and target, or a change that no
/// longer applies to the entities it was planned for.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct MergeConflict {
    pub kind: Option<ConflictKind>,
    pub message: String,
}

impl MergeConflict {
    pub fn conflict(kind: ConflictKind, message: impl Into<String>) -> Self {
        Self {
            kind: Some(kind),
            message: message.into(),
        }
    }

    pub fn invalid(message: impl Into<String>) -> Self {
        Self {
            kind: None,
            message: message.into(),
        }
    }
}

/// One field-level step of a merge. Each op takes content off the source
/// and, unless it is a drop, folds it into the target.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeOp {
    MoveLabel { language: String },
    LabelToAlias { language: String },
    DropLabel { language: String },
    MoveDescription { language: String },
    DropDescription { language: String },
    MoveAliases { language: String },
    MoveSitelink { site: String },
    MergeSitelinkBadges { site: String },
    MoveStatement { guid: String },
    MergeStatementReferences { guid: String, into: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeSet {
    ops: Vec<ChangeOp>,
}

impl ChangeSet {
    pub fn new(ops: Vec<ChangeOp>) -> Self {
        Self { ops }
    }

    pub fn ops(&self) -> &[ChangeOp] {
        &self.ops
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Apply every op in order. On error the entities are left partially
    /// modified; callers discard both copies.
    pub fn apply(
        &self,
        source: &mut EntitySnapshot,
        target: &mut EntitySnapshot,
    ) -> Result<(), MergeConflict> {
        for op in &self.ops {
            apply_op(op, source, target)?;
        }
        Ok(())
    }
}

fn missing(what: &str, key: &str, entity: &EntitySnapshot) -> MergeConflict {
    MergeConflict::invalid(format!("{what} '{key}' no longer present on {}", entity.id()))
}

fn apply_op(
    op: &ChangeOp,
    source: &mut EntitySnapshot,
    target: &mut EntitySnapshot,
) -> Result<(), MergeConflict> {
    match op {
        ChangeOp::MoveLabel { language } => {
            if target.label(language).is_some() {
                return Err(MergeConflict::invalid(format!(
                    "{} gained a {language} label since the merge was planned",
                    target.id()
                )));
            }
            let text = source
                .remove_label(language)
                .ok_or_else(|| missing("label", language, source))?;
            target.set_label(language.as_str(), text);
        }
        ChangeOp::LabelToAlias { language } => {
            let text = source
                .remove_label(language)
                .ok_or_else(|| missing("label", language, source))?;
            target.add_aliases(language, [text]);
        }
        ChangeOp::DropLabel { language } => {
            source
                .remove_label(language)
                .ok_or_else(|| missing("label", language, source))?;
        }
        ChangeOp::MoveDescription { language } => {
            if target.description(language).is_some() {
                return Err(MergeConflict::conflict(
                    ConflictKind::Description,
                    format!(
                        "{} gained a {language} description since the merge was planned",
                        target.id()
                    ),
                ));
            }
            let text = source
                .remove_description(language)
                .ok_or_else(|| missing("description", language, source))?;
            target.set_description(language.as_str(), text);
        }
        ChangeOp::DropDescription { language } => {
            source
                .remove_description(language)
                .ok_or_else(|| missing("description", language, source))?;
        }
        ChangeOp::MoveAliases { language } => {
            let label = target.label(language).map(str::to_string);
            let aliases = source
                .remove_aliases(language)
                .into_iter()
                .filter(|alias| Some(alias) != label.as_ref());
            target.add_aliases(language, aliases);
        }
        ChangeOp::MoveSitelink { site } => {
            if target.sitelink(site).is_some() {
                return Err(MergeConflict::conflict(
                    ConflictKind::Sitelink,
                    format!("{} gained a {site} link since the merge was planned", target.id()),
                ));
            }
            let link = source
                .remove_sitelink(site)
                .ok_or_else(|| missing("site link", site, source))?;
            target
                .set_sitelink(site.as_str(), link)
                .map_err(|e| MergeConflict::invalid(e.to_string()))?;
        }
        ChangeOp::MergeSitelinkBadges { site } => {
            let link = source
                .remove_sitelink(site)
                .ok_or_else(|| missing("site link", site, source))?;
            let target_id = target.id();
            let existing = target
                .sitelink_mut(site)
                .ok_or_else(|| {
                    MergeConflict::invalid(format!("{target_id} lost its {site} link"))
                })?;
            existing.badges.extend(link.badges);
        }
        ChangeOp::MoveStatement { guid } => {
            let mut statement = source
                .remove_statement(guid)
                .ok_or_else(|| missing("statement", guid, source))?;
            statement.guid = new_statement_guid(&target.id());
            target
                .add_statement(statement)
                .map_err(|e| MergeConflict::invalid(e.to_string()))?;
        }
        ChangeOp::MergeStatementReferences { guid, into } => {
            let statement = source
                .remove_statement(guid)
                .ok_or_else(|| missing("statement", guid, source))?;
            let target_id = target.id();
            let existing = target
                .statement_mut(into)
                .ok_or_else(|| {
                    MergeConflict::invalid(format!(
                        "statement {into} no longer present on {target_id}"
                    ))
                })?;
            for reference in statement.references {
                if !existing.references.contains(&reference) {
                    existing.references.push(reference);
                }
            }
        }
    }
    Ok(())
}

/// Plans and applies folding one entity's content into another.
pub trait ContentMergeEngine: Send + Sync {
    fn plan_merge(
        &self,
        source: &EntitySnapshot,
        target: &EntitySnapshot,
        ignore: &ConflictSet,
    ) -> Result<ChangeSet, MergeConflict>;
}

/// Default merge engine.
///
/// Labels move when the target has none in that language and otherwise
/// become aliases. Aliases are unioned. Descriptions, site links, and
/// statements pointing at the target are the three conflict categories:
/// an ignored conflict leaves the content on the source, which keeps the
/// source non-empty.
#[derive(Debug, Clone, Copy, Default)]
pub struct FieldMerger;

impl FieldMerger {
    pub fn new() -> Self {
        Self
    }
}

impl ContentMergeEngine for FieldMerger {
    fn plan_merge(
        &self,
        source: &EntitySnapshot,
        target: &EntitySnapshot,
        ignore: &ConflictSet,
    ) -> Result<ChangeSet, MergeConflict> {
        if source.id() == target.id() {
            return Err(MergeConflict::invalid(format!("cannot merge {} into itself", source.id())));
        }

        let mut ops = Vec::new();
        let mut conflicts: Vec<(ConflictKind, String)> = Vec::new();

        for (language, text) in source.labels() {
            let language = language.clone();
            ops.push(match target.label(&language) {
                None => ChangeOp::MoveLabel { language },
                Some(existing) if existing == text => ChangeOp::DropLabel { language },
                Some(_) => ChangeOp::LabelToAlias { language },
            });
        }

        for (language, text) in source.descriptions() {
            match target.description(language) {
                None => ops.push(ChangeOp::MoveDescription { language: language.clone() }),
                Some(existing) if existing == text => {
                    ops.push(ChangeOp::DropDescription { language: language.clone() })
                }
                Some(existing) => {
                    if !ignore.contains(ConflictKind::Description) {
                        conflicts.push((
                            ConflictKind::Description,
                            format!(
                                "conflicting {language} descriptions: '{text}' vs '{existing}'"
                            ),
                        ));
                    }
                }
            }
        }

        for language in source.all_aliases().keys() {
            ops.push(ChangeOp::MoveAliases { language: language.clone() });
        }

        for (site, link) in source.sitelinks() {
            match target.sitelink(site) {
                None => ops.push(ChangeOp::MoveSitelink { site: site.clone() }),
                Some(existing) if existing.page == link.page => {
                    ops.push(ChangeOp::MergeSitelinkBadges { site: site.clone() })
                }
                Some(existing) => {
                    if !ignore.contains(ConflictKind::Sitelink) {
                        conflicts.push((
                            ConflictKind::Sitelink,
                            format!(
                                "conflicting site links for {site}: '{}' vs '{}'",
                                link.page, existing.page
                            ),
                        ));
                    }
                }
            }
        }

        for statement in source.statements() {
            if statement.value.links_to(&target.id()) {
                if !ignore.contains(ConflictKind::Statement) {
                    conflicts.push((
                        ConflictKind::Statement,
                        format!(
                            "statement {} links to the merge target {}",
                            statement.guid,
                            target.id()
                        ),
                    ));
                }
                continue;
            }
            let guid = statement.guid.clone();
            match target.statements().iter().find(|t| t.claims_same_as(statement)) {
                Some(existing) => ops.push(ChangeOp::MergeStatementReferences {
                    guid,
                    into: existing.guid.clone(),
                }),
                None => ops.push(ChangeOp::MoveStatement { guid }),
            }
        }

        if let Some((kind, _)) = conflicts.first() {
            let message = conflicts
                .iter()
                .map(|(_, m)| m.as_str())
                .collect::<Vec<_>>()
                .join("; ");
            return Err(MergeConflict::conflict(*kind, message));
        }

        Ok(ChangeSet::new(ops))
    }
}

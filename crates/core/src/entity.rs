use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::CoreError;
use crate::ids::{EntityId, EntityType};
use crate::value::DataValue;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Snak {
    pub property: EntityId,
    pub value: DataValue,
}

impl Snak {
    pub fn new(property: EntityId, value: DataValue) -> Self {
        Self { property, value }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reference {
    pub snaks: Vec<Snak>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Statement {
    pub guid: String,
    pub property: EntityId,
    pub value: DataValue,
    pub qualifiers: Vec<Snak>,
    pub references: Vec<Reference>,
}

impl Statement {
    /// New statement on `subject` with a freshly generated GUID.
    pub fn new(subject: &EntityId, property: EntityId, value: DataValue) -> Self {
        Self {
            guid: new_statement_guid(subject),
            property,
            value,
            qualifiers: Vec::new(),
            references: Vec::new(),
        }
    }

    pub fn with_qualifier(mut self, qualifier: Snak) -> Self {
        self.qualifiers.push(qualifier);
        self
    }

    pub fn with_reference(mut self, reference: Reference) -> Self {
        self.references.push(reference);
        self
    }

    /// Same claim: property, main value and qualifiers match. GUID and
    /// references are ignored.
    pub fn claims_same_as(&self, other: &Statement) -> bool {
        self.property == other.property
            && self.value == other.value
            && self.qualifiers == other.qualifiers
    }
}

/// `Q42$<uuid>`; the prefix names the entity the statement lives on.
pub fn new_statement_guid(subject: &EntityId) -> String {
    format!("{subject}${}", Uuid::now_v7())
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SiteLink {
    pub page: String,
    pub badges: BTreeSet<EntityId>,
}

impl SiteLink {
    pub fn new(page: impl Into<String>) -> Self {
        Self {
            page: page.into(),
            badges: BTreeSet::new(),
        }
    }
}

/// In-memory copy of an entity's content. Mutations only affect this copy;
/// nothing is persisted until it is handed to an entity writer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntitySnapshot {
    id: EntityId,
    labels: BTreeMap<String, String>,
    descriptions: BTreeMap<String, String>,
    aliases: BTreeMap<String, Vec<String>>,
    statements: Vec<Statement>,
    sitelinks: BTreeMap<String, SiteLink>,
}

impl EntitySnapshot {
    pub fn new(id: EntityId) -> Self {
        Self {
            id,
            labels: BTreeMap::new(),
            descriptions: BTreeMap::new(),
            aliases: BTreeMap::new(),
            statements: Vec::new(),
            sitelinks: BTreeMap::new(),
        }
    }

    pub fn id(&self) -> EntityId {
        self.id
    }

    pub fn entity_type(&self) -> EntityType {
        self.id.entity_type()
    }

    /// True when the entity carries no labels, descriptions, aliases,
    /// statements or site links.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
            && self.descriptions.is_empty()
            && self.aliases.is_empty()
            && self.statements.is_empty()
            && self.sitelinks.is_empty()
    }

    /// Drop all content, keeping the id.
    pub fn clear(&mut self) {
        *self = Self::new(self.id);
    }

    // Labels

    pub fn labels(&self) -> &BTreeMap<String, String> {
        &self.labels
    }

    pub fn label(&self, language: &str) -> Option<&str> {
        self.labels.get(language).map(String::as_str)
    }

    pub fn set_label(&mut self, language: impl Into<String>, text: impl Into<String>) {
        self.labels.insert(language.into(), text.into());
    }

    pub fn remove_label(&mut self, language: &str) -> Option<String> {
        self.labels.remove(language)
    }

    pub fn with_label(mut self, language: &str, text: &str) -> Self {
        self.set_label(language, text);
        self
    }

    // Descriptions

    pub fn descriptions(&self) -> &BTreeMap<String, String> {
        &self.descriptions
    }

    pub fn description(&self, language: &str) -> Option<&str> {
        self.descriptions.get(language).map(String::as_str)
    }

    pub fn set_description(&mut self, language: impl Into<String>, text: impl Into<String>) {
        self.descriptions.insert(language.into(), text.into());
    }

    pub fn remove_description(&mut self, language: &str) -> Option<String> {
        self.descriptions.remove(language)
    }

    pub fn with_description(mut self, language: &str, text: &str) -> Self {
        self.set_description(language, text);
        self
    }

    // Aliases

    pub fn all_aliases(&self) -> &BTreeMap<String, Vec<String>> {
        &self.aliases
    }

    pub fn aliases(&self, language: &str) -> &[String] {
        self.aliases.get(language).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Append aliases, skipping blanks and ones already present.
    pub fn add_aliases<I, S>(&mut self, language: &str, aliases: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut current = self.aliases.remove(language).unwrap_or_default();
        for alias in aliases {
            let alias = alias.into();
            if !alias.trim().is_empty() && !current.contains(&alias) {
                current.push(alias);
            }
        }
        if !current.is_empty() {
            self.aliases.insert(language.to_string(), current);
        }
    }

    pub fn remove_aliases(&mut self, language: &str) -> Vec<String> {
        self.aliases.remove(language).unwrap_or_default()
    }

    pub fn with_aliases(mut self, language: &str, aliases: &[&str]) -> Self {
        self.add_aliases(language, aliases.iter().copied());
        self
    }

    // Statements

    pub fn statements(&self) -> &[Statement] {
        &self.statements
    }

    pub fn statement(&self, guid: &str) -> Option<&Statement> {
        self.statements.iter().find(|s| s.guid == guid)
    }

    pub fn statement_mut(&mut self, guid: &str) -> Option<&mut Statement> {
        self.statements.iter_mut().find(|s| s.guid == guid)
    }

    pub fn add_statement(&mut self, statement: Statement) -> Result<(), CoreError> {
        if self.statement(&statement.guid).is_some() {
            return Err(CoreError::InvalidData(format!(
                "duplicate statement guid {} on {}",
                statement.guid, self.id
            )));
        }
        self.statements.push(statement);
        Ok(())
    }

    pub fn remove_statement(&mut self, guid: &str) -> Option<Statement> {
        let index = self.statements.iter().position(|s| s.guid == guid)?;
        Some(self.statements.remove(index))
    }

    pub fn with_statement(mut self, property: EntityId, value: DataValue) -> Self {
        let statement = Statement::new(&self.id, property, value);
        self.statements.push(statement);
        self
    }

    // Site links

    pub fn sitelinks(&self) -> &BTreeMap<String, SiteLink> {
        &self.sitelinks
    }

    pub fn sitelink(&self, site: &str) -> Option<&SiteLink> {
        self.sitelinks.get(site)
    }

    pub fn sitelink_mut(&mut self, site: &str) -> Option<&mut SiteLink> {
        self.sitelinks.get_mut(site)
    }

    pub fn set_sitelink(
        &mut self,
        site: impl Into<String>,
        link: SiteLink,
    ) -> Result<(), CoreError> {
        if self.entity_type() != EntityType::Item {
            return Err(CoreError::InvalidData(format!(
                "{} entities cannot carry site links",
                self.entity_type()
            )));
        }
        self.sitelinks.insert(site.into(), link);
        Ok(())
    }

    pub fn remove_sitelink(&mut self, site: &str) -> Option<SiteLink> {
        self.sitelinks.remove(site)
    }

    pub fn with_sitelink(mut self, site: &str, page: &str) -> Self {
        self.sitelinks.insert(site.to_string(), SiteLink::new(page));
        self
    }

    // Encoding

    pub fn to_msgpack(&self) -> Result<Vec<u8>, CoreError> {
        rmp_serde::to_vec(self).map_err(|e| CoreError::Serialization(e.to_string()))
    }

    pub fn from_msgpack(bytes: &[u8]) -> Result<Self, CoreError> {
        rmp_serde::from_slice(bytes).map_err(|e| CoreError::Serialization(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_entity_is_empty() {
        let entity = EntitySnapshot::new(EntityId::item(1));
        assert!(entity.is_empty());
    }

    #[test]
    fn any_content_makes_entity_non_empty() {
        let id = EntityId::item(1);
        let candidates = vec![
            EntitySnapshot::new(id).with_label("en", "Berlin"),
            EntitySnapshot::new(id).with_description("en", "city"),
            EntitySnapshot::new(id).with_aliases("en", &["Berlin, Germany"]),
            EntitySnapshot::new(id)
                .with_statement(EntityId::property(31), DataValue::EntityRef(EntityId::item(515))),
            EntitySnapshot::new(id).with_sitelink("enwiki", "Berlin"),
        ];
        for entity in candidates {
            assert!(!entity.is_empty(), "{entity:?} should not be empty");
        }
    }

    #[test]
    fn removing_all_aliases_leaves_entity_empty() {
        let mut entity = EntitySnapshot::new(EntityId::item(1)).with_aliases("de", &["a", "b"]);
        assert_eq!(entity.remove_aliases("de"), vec!["a".to_string(), "b".to_string()]);
        assert!(entity.is_empty());
    }

    #[test]
    fn aliases_are_deduplicated() {
        let mut entity = EntitySnapshot::new(EntityId::item(1));
        entity.add_aliases("en", ["x", "y", "x", " "]);
        assert_eq!(entity.aliases("en"), ["x".to_string(), "y".to_string()]);
        entity.add_aliases("fr", Vec::<String>::new());
        assert!(entity.all_aliases().get("fr").is_none());
    }

    #[test]
    fn properties_reject_sitelinks() {
        let mut entity = EntitySnapshot::new(EntityId::property(1));
        assert!(entity.set_sitelink("enwiki", SiteLink::new("P")).is_err());
    }

    #[test]
    fn statement_guid_names_subject() {
        let statement =
            Statement::new(&EntityId::item(9), EntityId::property(1), DataValue::SomeValue);
        assert!(statement.guid.starts_with("Q9$"));
    }

    #[test]
    fn duplicate_statement_guid_rejected() {
        let mut entity = EntitySnapshot::new(EntityId::item(2));
        let statement =
            Statement::new(&EntityId::item(2), EntityId::property(1), DataValue::NoValue);
        entity.add_statement(statement.clone()).unwrap();
        assert!(entity.add_statement(statement).is_err());
    }

    #[test]
    fn msgpack_preserves_content() {
        let entity = EntitySnapshot::new(EntityId::item(5))
            .with_label("en", "five")
            .with_sitelink("enwiki", "5 (number)");
        let decoded = EntitySnapshot::from_msgpack(&entity.to_msgpack().unwrap()).unwrap();
        assert_eq!(decoded, entity);
    }
}

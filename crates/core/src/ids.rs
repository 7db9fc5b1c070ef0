use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::CoreError;

/// The kind of an entity. Ids are only compatible when their kinds match.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Item,
    Property,
}

impl EntityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Item => "item",
            Self::Property => "property",
        }
    }

    pub fn prefix(&self) -> char {
        match self {
            Self::Item => 'Q',
            Self::Property => 'P',
        }
    }

    pub fn parse(s: &str) -> Result<Self, CoreError> {
        match s {
            "item" => Ok(Self::Item),
            "property" => Ok(Self::Property),
            _ => Err(CoreError::InvalidEntityId(format!("unknown entity type: {s}"))),
        }
    }

    fn from_prefix(c: char) -> Option<Self> {
        match c.to_ascii_uppercase() {
            'Q' => Some(Self::Item),
            'P' => Some(Self::Property),
            _ => None,
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Typed entity identifier, serialized as prefix + number (`Q42`, `P31`).
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EntityId {
    entity_type: EntityType,
    number: u64,
}

impl EntityId {
    pub fn new(entity_type: EntityType, number: u64) -> Self {
        Self { entity_type, number }
    }

    pub fn item(number: u64) -> Self {
        Self::new(EntityType::Item, number)
    }

    pub fn property(number: u64) -> Self {
        Self::new(EntityType::Property, number)
    }

    pub fn entity_type(&self) -> EntityType {
        self.entity_type
    }

    pub fn number(&self) -> u64 {
        self.number
    }

    pub fn serialization(&self) -> String {
        self.to_string()
    }

    pub fn is_compatible_with(&self, other: &EntityId) -> bool {
        self.entity_type == other.entity_type
    }
}

impl FromStr for EntityId {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut chars = s.chars();
        let entity_type = chars
            .next()
            .and_then(EntityType::from_prefix)
            .ok_or_else(|| CoreError::InvalidEntityId(s.to_string()))?;
        let digits = chars.as_str();
        if digits.is_empty()
            || digits.starts_with('0')
            || !digits.bytes().all(|b| b.is_ascii_digit())
        {
            return Err(CoreError::InvalidEntityId(s.to_string()));
        }
        let number = digits
            .parse::<u64>()
            .map_err(|_| CoreError::InvalidEntityId(s.to_string()))?;
        Ok(Self { entity_type, number })
    }
}

impl fmt::Debug for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityId({self})")
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", self.entity_type.prefix(), self.number)
    }
}

impl Serialize for EntityId {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for EntityId {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s: String = Deserialize::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Store-wide revision number; strictly increasing across all writes.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct RevisionId(u64);

impl RevisionId {
    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn get(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for RevisionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "r{}", self.0)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ActorId([u8; 32]);

impl ActorId {
    pub fn from_bytes(bytes: [u8; 32]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 32] {
        &self.0
    }
}

impl fmt::Debug for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "ActorId({:02x}{:02x}{:02x}{:02x})",
            self.0[0], self.0[1], self.0[2], self.0[3]
        )
    }
}

impl fmt::Display for ActorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0[..8] {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Signature([u8; 64]);

impl Signature {
    pub fn from_bytes(bytes: [u8; 64]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 64] {
        &self.0
    }
}

impl fmt::Debug for Signature {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Signature({:02x}{:02x}...)", self.0[0], self.0[1])
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_and_display() {
        let id: EntityId = "Q42".parse().unwrap();
        assert_eq!(id, EntityId::item(42));
        assert_eq!(id.to_string(), "Q42");

        let prop: EntityId = "p31".parse().unwrap();
        assert_eq!(prop.entity_type(), EntityType::Property);
        assert_eq!(prop.serialization(), "P31");
    }

    #[test]
    fn rejects_malformed_ids() {
        for bad in ["", "Q", "X12", "Q012", "Q1a", "Q-1"] {
            assert!(bad.parse::<EntityId>().is_err(), "{bad:?} should not parse");
        }
    }

    #[test]
    fn compatibility_follows_type() {
        assert!(EntityId::item(1).is_compatible_with(&EntityId::item(2)));
        assert!(!EntityId::item(1).is_compatible_with(&EntityId::property(1)));
    }

    #[test]
    fn serde_uses_serialization_string() {
        let bytes = rmp_serde::to_vec(&EntityId::property(7)).unwrap();
        let s: String = rmp_serde::from_slice(&bytes).unwrap();
        assert_eq!(s, "P7");
    }
}

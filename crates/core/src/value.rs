use serde::{Deserialize, Serialize};

use crate::ids::EntityId;

/// Main value of a statement or snak.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum DataValue {
    NoValue,
    SomeValue,
    Text(String),
    MonolingualText { language: String, text: String },
    Quantity(f64),
    Time(i64),
    EntityRef(EntityId),
    Url(String),
}

impl PartialEq for DataValue {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::NoValue, Self::NoValue) => true,
            (Self::SomeValue, Self::SomeValue) => true,
            (Self::Text(a), Self::Text(b)) => a == b,
            (
                Self::MonolingualText { language: la, text: ta },
                Self::MonolingualText { language: lb, text: tb },
            ) => la == lb && ta == tb,
            (Self::Quantity(a), Self::Quantity(b)) => a.total_cmp(b).is_eq(),
            (Self::Time(a), Self::Time(b)) => a == b,
            (Self::EntityRef(a), Self::EntityRef(b)) => a == b,
            (Self::Url(a), Self::Url(b)) => a == b,
            _ => false,
        }
    }
}

impl Eq for DataValue {}

impl DataValue {
    pub fn as_entity_ref(&self) -> Option<EntityId> {
        match self {
            DataValue::EntityRef(id) => Some(*id),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            DataValue::Text(s) | DataValue::Url(s) => Some(s),
            DataValue::MonolingualText { text, .. } => Some(text),
            _ => None,
        }
    }

    pub fn links_to(&self, id: &EntityId) -> bool {
        self.as_entity_ref().as_ref() == Some(id)
    }
}

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::ids::EntityId;

/// Records that `from`'s canonical content now lives at `to`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct EntityRedirect {
    from: EntityId,
    to: EntityId,
}

impl EntityRedirect {
    /// Both ids must share an entity type and differ.
    pub fn new(from: EntityId, to: EntityId) -> Result<Self, CoreError> {
        if from == to {
            return Err(CoreError::InvalidRedirect(format!("{from} cannot redirect to itself")));
        }
        if !from.is_compatible_with(&to) {
            return Err(CoreError::InvalidRedirect(format!(
                "{from} ({}) cannot redirect to {to} ({})",
                from.entity_type(),
                to.entity_type()
            )));
        }
        Ok(Self { from, to })
    }

    pub fn from_id(&self) -> EntityId {
        self.from
    }

    pub fn to_id(&self) -> EntityId {
        self.to
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn valid_redirect() {
        let redirect = EntityRedirect::new(EntityId::item(1), EntityId::item(2)).unwrap();
        assert_eq!(redirect.from_id(), EntityId::item(1));
        assert_eq!(redirect.to_id(), EntityId::item(2));
    }

    #[test]
    fn self_redirect_rejected() {
        assert!(EntityRedirect::new(EntityId::item(1), EntityId::item(1)).is_err());
    }

    #[test]
    fn cross_type_redirect_rejected() {
        assert!(EntityRedirect::new(EntityId::item(1), EntityId::property(2)).is_err());
    }
}

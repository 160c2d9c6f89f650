//! Named conversion records served through the generic base service.

use crate::model::entity::{Entity, EntityId};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Conversion {
    pub id: EntityId,
    /// Nullable in storage.
    pub name: Option<String>,
}

impl Conversion {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            id: 0,
            name: Some(name.into()),
        }
    }
}

impl Entity for Conversion {
    const NAME: &'static str = "Conversion";

    fn id(&self) -> EntityId {
        self.id
    }

    fn set_id(&mut self, id: EntityId) {
        self.id = id;
    }
}

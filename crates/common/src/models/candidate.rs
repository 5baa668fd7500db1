use super::entity::{EntityId, EntityKey, EntityKind};
use serde::{Deserialize, Serialize};

/// One ranked retrieval hit
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub entity_id: EntityId,
    pub score: f32,
    /// Category of the index that produced the hit
    pub source: EntityKind,
    /// Name of that index in the graph store
    pub index: String,
}

impl Candidate {
    pub fn new(entity_id: impl Into<EntityId>, score: f32, source: EntityKind, index: impl Into<String>) -> Self {
        Self {
            entity_id: entity_id.into(),
            score,
            source,
            index: index.into(),
        }
    }

    /// Graph identity of the hit
    pub fn key(&self) -> EntityKey {
        EntityKey::new(self.source, self.entity_id.clone())
    }
}

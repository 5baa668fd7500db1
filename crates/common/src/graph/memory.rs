//! In-process graph store
//!
//! Holds entities, typed edges and per-index embeddings in memory.
//! Lookups are brute-force cosine similarity; an index nothing was
//! inserted into is simply empty. Fulltext indexes score a document by
//! how many distinct query terms it contains.

use super::GraphStore;
use crate::errors::Result;
use crate::models::{Direction, Entity, EntityId, EntityKey, RelationType};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};

#[derive(Debug, Default, Clone)]
pub struct InMemoryGraph {
    entities: HashMap<EntityKey, Entity>,
    edges: Vec<(EntityKey, RelationType, EntityKey)>,
    indexes: HashMap<String, Vec<(EntityId, Vec<f32>)>>,
    keyword_indexes: HashMap<String, Vec<(EntityId, String)>>,
}

impl InMemoryGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an entity
    pub fn with_entity(mut self, entity: Entity) -> Self {
        self.entities.insert(entity.key(), entity);
        self
    }

    /// Register an embedding for an entity in the named index
    pub fn with_embedding(mut self, index: &str, id: impl Into<EntityId>, vector: Vec<f32>) -> Self {
        self.indexes
            .entry(index.to_string())
            .or_default()
            .push((id.into(), vector));
        self
    }

    /// Register searchable text for an entity in the named fulltext index
    pub fn with_keywords(mut self, index: &str, id: impl Into<EntityId>, text: impl Into<String>) -> Self {
        self.keyword_indexes
            .entry(index.to_string())
            .or_default()
            .push((id.into(), text.into()));
        self
    }

    /// Add a directed edge `from -[relation]-> to`.
    ///
    /// Endpoint categories follow from the relation.
    pub fn with_edge(mut self, from: impl Into<EntityId>, relation: RelationType, to: impl Into<EntityId>) -> Self {
        let (from_kind, to_kind) = relation.endpoints();
        self.edges.push((
            EntityKey::new(from_kind, from),
            relation,
            EntityKey::new(to_kind, to),
        ));
        self
    }

    pub fn entity_count(&self) -> usize {
        self.entities.len()
    }
}

fn cosine(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na: f32 = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb: f32 = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        0.0
    } else {
        dot / (na * nb)
    }
}

fn terms(text: &str) -> HashSet<String> {
    text.replace('\\', "")
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(str::to_lowercase)
        .collect()
}

#[async_trait]
impl GraphStore for InMemoryGraph {
    async fn search(&self, index: &str, vector: &[f32], k: usize) -> Result<Vec<(EntityId, f32)>> {
        let Some(entries) = self.indexes.get(index) else {
            return Ok(Vec::new());
        };

        let mut hits: Vec<(EntityId, f32)> = entries
            .iter()
            .map(|(id, v)| (id.clone(), cosine(vector, v)))
            .collect();
        hits.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        hits.truncate(k);
        Ok(hits)
    }

    async fn keyword_search(&self, index: &str, query: &str, k: usize) -> Result<Vec<(EntityId, f32)>> {
        let Some(entries) = self.keyword_indexes.get(index) else {
            return Ok(Vec::new());
        };

        let wanted = terms(query);
        let mut hits: Vec<(EntityId, f32)> = entries
            .iter()
            .map(|(id, text)| (id.clone(), terms(text).intersection(&wanted).count() as f32))
            .filter(|(_, score)| *score > 0.0)
            .collect();
        hits.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(&b.0))
        });
        hits.truncate(k);
        Ok(hits)
    }

    async fn fetch_entity(&self, key: &EntityKey) -> Result<Option<Entity>> {
        Ok(self.entities.get(key).cloned())
    }

    async fn fetch_related(
        &self,
        key: &EntityKey,
        relation: RelationType,
        direction: Direction,
    ) -> Result<Vec<Entity>> {
        Ok(self
            .edges
            .iter()
            .filter(|(_, rel, _)| *rel == relation)
            .filter_map(|(from, _, to)| match direction {
                Direction::Outgoing if from == key => Some(to),
                Direction::Incoming if to == key => Some(from),
                _ => None,
            })
            .filter_map(|other| self.entities.get(other).cloned())
            .collect())
    }

    async fn ping(&self) -> Result<()> {
        Ok(())
    }
}

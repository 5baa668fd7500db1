//! Graph store abstraction
//!
//! Provides the read-only retrieval boundary used by the pipeline:
//! - Vector and fulltext index lookups
//! - Entity fetch by category and id
//! - One-hop traversal by relationship type and direction
//!
//! Implementations:
//! - `Neo4jHttpStore` talks to Neo4j over its HTTP transaction API
//! - `InMemoryGraph` serves fixtures and local development

pub mod memory;
pub mod neo4j;

use crate::config::GraphConfig;
use crate::errors::{AppError, Result};
use crate::models::{Direction, Entity, EntityId, EntityKey, RelationType};
use async_trait::async_trait;
use std::sync::Arc;

pub use memory::InMemoryGraph;
pub use neo4j::Neo4jHttpStore;

/// Read access to the knowledge graph
#[async_trait]
pub trait GraphStore: Send + Sync {
    /// Nearest neighbours of `vector` in the named index, best first
    async fn search(&self, index: &str, vector: &[f32], k: usize) -> Result<Vec<(EntityId, f32)>>;

    /// Raw fulltext hits for an already escaped Lucene query, best first
    async fn keyword_search(&self, index: &str, query: &str, k: usize) -> Result<Vec<(EntityId, f32)>>;

    /// Fetch a single entity snapshot
    async fn fetch_entity(&self, key: &EntityKey) -> Result<Option<Entity>>;

    /// Entities one hop away along `relation`
    async fn fetch_related(
        &self,
        key: &EntityKey,
        relation: RelationType,
        direction: Direction,
    ) -> Result<Vec<Entity>>;

    /// Cheap round trip for readiness checks
    async fn ping(&self) -> Result<()>;
}

/// Create a graph store based on configuration
pub fn create_graph_store(config: &GraphConfig) -> Result<Arc<dyn GraphStore>> {
    match config.provider.as_str() {
        "neo4j" => Ok(Arc::new(Neo4jHttpStore::new(config)?)),
        "memory" => {
            tracing::warn!("Using in-memory graph store, retrieval will return no candidates");
            Ok(Arc::new(InMemoryGraph::new()))
        }
        other => Err(AppError::Configuration {
            message: format!("Unknown graph provider: {}", other),
        }),
    }
}

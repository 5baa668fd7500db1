//! Multi-index retrieval system
//!
//! Provides:
//! - One hybrid index per entity category behind a common trait
//! - Best-score fusion with a deterministic tie-break
//! - An ensemble retriever that queries every index concurrently

mod ensemble;
mod fusion;
mod index;
mod keywords;

pub use ensemble::{EnsembleRetriever, RetrievalOutcome};
pub use fusion::merge;
pub use index::HybridIndex;
pub use keywords::escape_lucene;

use graphqa_common::errors::Result;
use graphqa_common::models::{EntityId, EntityKind};

/// One retrieval request, shared by every index
#[derive(Debug, Clone, PartialEq)]
pub struct IndexQuery {
    pub embedding: Vec<f32>,
    /// Lucene-escaped question text for the fulltext leg
    pub keywords: String,
}

impl IndexQuery {
    pub fn new(embedding: Vec<f32>, question: &str) -> Self {
        Self {
            embedding,
            keywords: escape_lucene(question.trim()),
        }
    }

    /// Vector-only query
    pub fn vector(embedding: Vec<f32>) -> Self {
        Self {
            embedding,
            keywords: String::new(),
        }
    }
}

/// Nearest-neighbour lookup over one entity category
#[async_trait::async_trait]
pub trait SearchIndex: Send + Sync {
    /// Index name, used in logs and failure reports
    fn name(&self) -> &str;

    /// Category of the entities stored in this index
    fn kind(&self) -> EntityKind;

    /// Up to `k` hits, best first
    async fn search(&self, query: &IndexQuery, k: usize) -> Result<Vec<(EntityId, f32)>>;
}

//! GraphQA Search
//!
//! Ensemble retrieval over the question, answer, user and tag
//! indexes of the knowledge graph. Each lookup combines a vector
//! search with a fulltext search over the same category.

pub mod retrieval;

pub use retrieval::{
    escape_lucene, merge, EnsembleRetriever, HybridIndex, IndexQuery, RetrievalOutcome, SearchIndex,
};

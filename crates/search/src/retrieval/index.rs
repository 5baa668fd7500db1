//! Hybrid indexes served by the graph store
//!
//! A lookup runs the vector index and the fulltext index of one category
//! side by side. Fulltext scores are scaled by their best hit so both legs
//! share one `[0, 1]` range, and each entity keeps its better score.

use super::keywords::normalize;
use super::{IndexQuery, SearchIndex};
use graphqa_common::config::RetrievalConfig;
use graphqa_common::errors::Result;
use graphqa_common::graph::GraphStore;
use graphqa_common::models::{EntityId, EntityKind};
use std::cmp::Ordering;
use std::collections::HashMap;
use std::sync::Arc;

/// A named vector index, plus an optional fulltext index, in the graph store
pub struct HybridIndex {
    store: Arc<dyn GraphStore>,
    name: String,
    keyword_name: Option<String>,
    kind: EntityKind,
}

impl HybridIndex {
    pub fn new(store: Arc<dyn GraphStore>, name: impl Into<String>, kind: EntityKind) -> Self {
        Self {
            store,
            name: name.into(),
            keyword_name: None,
            kind,
        }
    }

    pub fn with_keywords(mut self, keyword_name: impl Into<String>) -> Self {
        self.keyword_name = Some(keyword_name.into());
        self
    }

    /// The fixed set of four indexes, one per category
    pub fn all(store: Arc<dyn GraphStore>, config: &RetrievalConfig) -> Vec<Arc<dyn SearchIndex>> {
        let names = &config.indexes;
        let keywords = &config.keyword_indexes;

        EntityKind::ALL
            .iter()
            .map(|kind| {
                let (name, keyword_name) = match kind {
                    EntityKind::Question => (&names.question, &keywords.question),
                    EntityKind::Answer => (&names.answer, &keywords.answer),
                    EntityKind::User => (&names.user, &keywords.user),
                    EntityKind::Tag => (&names.tag, &keywords.tag),
                };
                let mut index = HybridIndex::new(store.clone(), name.clone(), *kind);
                if config.hybrid {
                    index = index.with_keywords(keyword_name.clone());
                }
                Arc::new(index) as Arc<dyn SearchIndex>
            })
            .collect()
    }
}

#[async_trait::async_trait]
impl SearchIndex for HybridIndex {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> EntityKind {
        self.kind
    }

    async fn search(&self, query: &IndexQuery, k: usize) -> Result<Vec<(EntityId, f32)>> {
        let vector = self.store.search(&self.name, &query.embedding, k);

        let keyword_name = match &self.keyword_name {
            Some(name) if !query.keywords.trim().is_empty() => name,
            _ => return vector.await,
        };

        let (vector_hits, mut keyword_hits) = tokio::try_join!(
            vector,
            self.store.keyword_search(keyword_name, &query.keywords, k),
        )?;
        normalize(&mut keyword_hits);

        Ok(combine(vector_hits, keyword_hits, k))
    }
}

/// Best score per entity across both legs, then descending score and id
fn combine(vector_hits: Vec<(EntityId, f32)>, keyword_hits: Vec<(EntityId, f32)>, k: usize) -> Vec<(EntityId, f32)> {
    let mut best: HashMap<EntityId, f32> = HashMap::new();
    for (id, score) in vector_hits.into_iter().chain(keyword_hits) {
        let entry = best.entry(id).or_insert(score);
        if score > *entry {
            *entry = score;
        }
    }

    let mut hits: Vec<_> = best.into_iter().collect();
    hits.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(Ordering::Equal)
            .then_with(|| a.0.cmp(&b.0))
    });
    hits.truncate(k);
    hits
}

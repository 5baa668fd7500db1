//! Embedding service abstraction
//!
//! Provides a unified interface for embedding providers:
//! - Ollama (bge-m3 and other local embedding models)
//! - Deterministic mock for tests and local development

use crate::config::EmbeddingConfig;
use crate::errors::{AppError, Result};
use crate::metrics::record_embedding;
use async_trait::async_trait;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Trait for embedding generation
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Generate embedding for a single text
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Get the model name
    fn model_name(&self) -> &str;

    /// Get the embedding dimension
    fn dimension(&self) -> usize;
}

/// Ollama embedding client
pub struct OllamaEmbedder {
    client: reqwest::Client,
    model: String,
    dimension: usize,
    base_url: String,
}

#[derive(Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a str,
}

#[derive(Deserialize)]
struct EmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl OllamaEmbedder {
    /// Create a new Ollama embedder
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            model: config.model.clone(),
            dimension: config.dimension,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    async fn make_request(&self, text: &str) -> Result<Vec<f32>> {
        let url = format!("{}/api/embed", self.base_url);

        let response = self
            .client
            .post(&url)
            .json(&EmbedRequest {
                model: &self.model,
                input: text,
            })
            .send()
            .await
            .map_err(|e| AppError::EmbeddingUnavailable {
                message: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(AppError::EmbeddingUnavailable {
                message: format!("API error {}: {}", status, body),
            });
        }

        let result: EmbedResponse = response.json().await.map_err(|e| AppError::EmbeddingUnavailable {
            message: format!("Failed to parse response: {}", e),
        })?;

        result
            .embeddings
            .into_iter()
            .next()
            .ok_or_else(|| AppError::EmbeddingUnavailable {
                message: "Empty response".to_string(),
            })
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let start = Instant::now();
        let result = self.make_request(text).await;
        record_embedding(start.elapsed().as_secs_f64(), &self.model, result.is_ok());

        if let Err(e) = &result {
            tracing::warn!(model = %self.model, error = %e, "Embedding request failed");
        }
        result
    }

    fn model_name(&self) -> &str {
        &self.model
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Mock embedder for testing. Same text, same vector.
pub struct MockEmbedder {
    dimension: usize,
}

impl MockEmbedder {
    pub fn new(dimension: usize) -> Self {
        Self { dimension }
    }
}

#[async_trait]
impl Embedder for MockEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut hasher = DefaultHasher::new();
        text.hash(&mut hasher);
        let mut rng = StdRng::seed_from_u64(hasher.finish());
        Ok((0..self.dimension).map(|_| rng.gen_range(-1.0f32..1.0)).collect())
    }

    fn model_name(&self) -> &str {
        "mock-embedding"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }
}

/// Create an embedder based on configuration
pub fn create_embedder(config: &EmbeddingConfig) -> Result<Arc<dyn Embedder>> {
    match config.provider.as_str() {
        "ollama" => Ok(Arc::new(OllamaEmbedder::new(config)?)),
        "mock" => Ok(Arc::new(MockEmbedder::new(config.dimension))),
        other => Err(AppError::Configuration {
            message: format!("Unknown embedding provider: {}", other),
        }),
    }
}

//! GraphQA Common Library
//!
//! Shared code for all GraphQA crates including:
//! - Domain model (entities, bundles, sessions, stream events)
//! - Graph store boundary
//! - Embedding client abstraction
//! - Session storage
//! - Error types and handling
//! - Configuration management
//! - Metrics and observability

pub mod config;
pub mod embeddings;
pub mod errors;
pub mod graph;
pub mod metrics;
pub mod models;
pub mod sessions;

// Re-export commonly used types
pub use config::AppConfig;
pub use embeddings::Embedder;
pub use errors::{AppError, Result};
pub use graph::GraphStore;
pub use sessions::SessionStore;

/// Application version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

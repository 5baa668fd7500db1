//! Configuration management for GraphQA services
//!
//! Supports loading configuration from:
//! - Environment variables (prefixed with APP__)
//! - Configuration files (config.toml, config.yaml)
//! - Default values

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct AppConfig {
    /// Server configuration
    #[serde(default)]
    pub server: ServerConfig,

    /// Graph store configuration
    #[serde(default)]
    pub graph: GraphConfig,

    /// Embedding service configuration
    #[serde(default)]
    pub embedding: EmbeddingConfig,

    /// Language model configuration
    #[serde(default)]
    pub llm: LlmConfig,

    /// Ensemble retrieval configuration
    #[serde(default)]
    pub retrieval: RetrievalConfig,

    /// Graph context expansion configuration
    #[serde(default)]
    pub expansion: ExpansionConfig,

    /// Prompt assembly configuration
    #[serde(default)]
    pub prompt: PromptConfig,

    /// Observability configuration
    #[serde(default)]
    pub observability: ObservabilityConfig,

    /// Rate limiting configuration
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ServerConfig {
    /// Host to bind to
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to listen on
    #[serde(default = "default_port")]
    pub port: u16,

    /// Request timeout in seconds (non-streaming endpoints)
    #[serde(default = "default_request_timeout")]
    pub request_timeout_secs: u64,

    /// Shutdown timeout in seconds
    #[serde(default = "default_shutdown_timeout")]
    pub shutdown_timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct GraphConfig {
    /// Graph store provider: neo4j, memory
    #[serde(default = "default_graph_provider")]
    pub provider: String,

    /// HTTP endpoint of the graph store
    #[serde(default = "default_graph_url")]
    pub url: String,

    /// Database name
    #[serde(default = "default_graph_database")]
    pub database: String,

    /// Username
    #[serde(default = "default_graph_username")]
    pub username: String,

    /// Password
    #[serde(default)]
    pub password: Option<String>,

    /// Per-query timeout in milliseconds
    #[serde(default = "default_graph_timeout")]
    pub timeout_ms: u64,

    /// Maximum concurrent queries against the store
    #[serde(default = "default_graph_max_connections")]
    pub max_connections: usize,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EmbeddingConfig {
    /// Embedding provider: ollama, mock
    #[serde(default = "default_embedding_provider")]
    pub provider: String,

    /// API base URL
    #[serde(default = "default_ollama_url")]
    pub base_url: String,

    /// Model to use
    #[serde(default = "default_embedding_model")]
    pub model: String,

    /// Embedding dimension
    #[serde(default = "default_embedding_dimension")]
    pub dimension: usize,

    /// Request timeout in seconds
    #[serde(default = "default_embedding_timeout")]
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LlmConfig {
    /// Generation provider: ollama, mock
    #[serde(default = "default_llm_provider")]
    pub provider: String,

    /// API base URL
    #[serde(default = "default_ollama_url")]
    pub base_url: String,

    /// Model identifier
    #[serde(default = "default_llm_model")]
    pub model: String,

    /// Sampling temperature
    #[serde(default = "default_temperature")]
    pub temperature: f32,

    /// Context window in tokens
    #[serde(default = "default_num_ctx")]
    pub num_ctx: u32,

    /// Time allowed to open the stream, in seconds
    #[serde(default = "default_llm_connect_timeout")]
    pub connect_timeout_secs: u64,

    /// Maximum silence between two streamed chunks, in seconds
    #[serde(default = "default_llm_idle_timeout")]
    pub idle_timeout_secs: u64,

    /// Ask the model to stream its reasoning in a separate field
    #[serde(default = "default_enabled")]
    pub think: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RetrievalConfig {
    /// Candidates kept after merging
    #[serde(default = "default_k")]
    pub k: usize,

    /// Timeout for a single index lookup in milliseconds
    #[serde(default = "default_index_timeout")]
    pub index_timeout_ms: u64,

    /// Hits below this similarity are discarded per index
    #[serde(default)]
    pub min_score: f32,

    /// Delay before the single retry of a transient index failure, in milliseconds
    #[serde(default = "default_index_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Vector index names per entity category
    #[serde(default)]
    pub indexes: IndexNames,

    /// Run a fulltext lookup next to every vector lookup
    #[serde(default = "default_enabled")]
    pub hybrid: bool,

    /// Fulltext index names per entity category
    #[serde(default)]
    pub keyword_indexes: KeywordIndexNames,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct IndexNames {
    #[serde(default = "default_question_index")]
    pub question: String,
    #[serde(default = "default_answer_index")]
    pub answer: String,
    #[serde(default = "default_user_index")]
    pub user: String,
    #[serde(default = "default_tag_index")]
    pub tag: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KeywordIndexNames {
    #[serde(default = "default_question_keyword_index")]
    pub question: String,
    #[serde(default = "default_answer_keyword_index")]
    pub answer: String,
    #[serde(default = "default_user_keyword_index")]
    pub user: String,
    #[serde(default = "default_tag_keyword_index")]
    pub tag: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExpansionConfig {
    /// Maximum answers kept in one bundle
    #[serde(default = "default_max_answers")]
    pub max_answers: usize,

    /// Maximum questions listed for a user or tag candidate
    #[serde(default = "default_max_related_questions")]
    pub max_related_questions: usize,

    /// Bundles expanded concurrently per request
    #[serde(default = "default_expansion_concurrency")]
    pub concurrency: usize,

    /// Delay before the single retry of a transient failure, in milliseconds
    #[serde(default = "default_retry_backoff")]
    pub retry_backoff_ms: u64,

    /// Drop routed questions outside the hit's detected communities
    #[serde(default = "default_enabled")]
    pub community_filter: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct PromptConfig {
    /// Character budget for rendered conversation history
    #[serde(default = "default_history_budget")]
    pub history_char_budget: usize,

    /// Delimiter opening the reasoning section
    #[serde(default = "default_think_start")]
    pub think_start: String,

    /// Delimiter closing the reasoning section
    #[serde(default = "default_think_end")]
    pub think_end: String,

    /// Replaces the built-in analyst instructions when set
    #[serde(default)]
    pub system_prompt: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ObservabilityConfig {
    /// Log level (debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Enable JSON logging
    #[serde(default = "default_json_logging")]
    pub json_logging: bool,

    /// Metrics port (0 to disable)
    #[serde(default = "default_metrics_port")]
    pub metrics_port: u16,

    /// Service name for tracing
    #[serde(default = "default_service_name")]
    pub service_name: String,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RateLimitConfig {
    /// Requests per second
    #[serde(default = "default_rate_limit")]
    pub requests_per_second: u32,

    /// Burst capacity
    #[serde(default = "default_burst")]
    pub burst: u32,

    /// Enable rate limiting
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

/// Read-only view of the active setup for display by external callers
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ConfigSnapshot {
    pub llm_model: String,
    pub llm_provider: String,
    pub embedding_model: String,
    pub graph_url: String,
    pub graph_database: String,
    pub graph_user: String,
}

// Default value functions
fn default_host() -> String { "0.0.0.0".to_string() }
fn default_port() -> u16 { 8000 }
fn default_request_timeout() -> u64 { 30 }
fn default_shutdown_timeout() -> u64 { 30 }
fn default_graph_provider() -> String { "memory".to_string() }
fn default_graph_url() -> String { "http://localhost:7474".to_string() }
fn default_graph_database() -> String { "neo4j".to_string() }
fn default_graph_username() -> String { "neo4j".to_string() }
fn default_graph_timeout() -> u64 { 2_000 }
fn default_graph_max_connections() -> usize { 16 }
fn default_embedding_provider() -> String { "mock".to_string() }
fn default_ollama_url() -> String { "http://localhost:11434".to_string() }
fn default_embedding_model() -> String { "bge-m3".to_string() }
fn default_embedding_dimension() -> usize { 1024 }
fn default_embedding_timeout() -> u64 { 30 }
fn default_llm_provider() -> String { "mock".to_string() }
fn default_llm_model() -> String { "qwen3:8b".to_string() }
fn default_temperature() -> f32 { 0.6 }
fn default_num_ctx() -> u32 { 32_768 }
fn default_llm_connect_timeout() -> u64 { 30 }
fn default_llm_idle_timeout() -> u64 { 120 }
fn default_k() -> usize { 10 }
fn default_index_timeout() -> u64 { 1_500 }
fn default_index_retry_backoff() -> u64 { 100 }
fn default_question_index() -> String { "Question_index".to_string() }
fn default_answer_index() -> String { "Answer_index".to_string() }
fn default_user_index() -> String { "User_index".to_string() }
fn default_tag_index() -> String { "Tag_index".to_string() }
fn default_question_keyword_index() -> String { "Question_keyword_index".to_string() }
fn default_answer_keyword_index() -> String { "Answer_keyword_index".to_string() }
fn default_user_keyword_index() -> String { "User_keyword_index".to_string() }
fn default_tag_keyword_index() -> String { "Tag_keyword_index".to_string() }
fn default_max_answers() -> usize { 5 }
fn default_max_related_questions() -> usize { 5 }
fn default_expansion_concurrency() -> usize { 4 }
fn default_retry_backoff() -> u64 { 200 }
fn default_history_budget() -> usize { 6_000 }
fn default_think_start() -> String { "<think>".to_string() }
fn default_think_end() -> String { "</think>".to_string() }
fn default_log_level() -> String { "info".to_string() }
fn default_json_logging() -> bool { true }
fn default_metrics_port() -> u16 { 9090 }
fn default_service_name() -> String { "graphqa".to_string() }
fn default_rate_limit() -> u32 { 20 }
fn default_burst() -> u32 { 40 }
fn default_enabled() -> bool { true }

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            request_timeout_secs: default_request_timeout(),
            shutdown_timeout_secs: default_shutdown_timeout(),
        }
    }
}

impl Default for GraphConfig {
    fn default() -> Self {
        Self {
            provider: default_graph_provider(),
            url: default_graph_url(),
            database: default_graph_database(),
            username: default_graph_username(),
            password: None,
            timeout_ms: default_graph_timeout(),
            max_connections: default_graph_max_connections(),
        }
    }
}

impl Default for EmbeddingConfig {
    fn default() -> Self {
        Self {
            provider: default_embedding_provider(),
            base_url: default_ollama_url(),
            model: default_embedding_model(),
            dimension: default_embedding_dimension(),
            timeout_secs: default_embedding_timeout(),
        }
    }
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: default_llm_provider(),
            base_url: default_ollama_url(),
            model: default_llm_model(),
            temperature: default_temperature(),
            num_ctx: default_num_ctx(),
            connect_timeout_secs: default_llm_connect_timeout(),
            idle_timeout_secs: default_llm_idle_timeout(),
            think: default_enabled(),
        }
    }
}

impl Default for RetrievalConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            index_timeout_ms: default_index_timeout(),
            min_score: 0.0,
            retry_backoff_ms: default_index_retry_backoff(),
            indexes: IndexNames::default(),
            hybrid: default_enabled(),
            keyword_indexes: KeywordIndexNames::default(),
        }
    }
}

impl Default for IndexNames {
    fn default() -> Self {
        Self {
            question: default_question_index(),
            answer: default_answer_index(),
            user: default_user_index(),
            tag: default_tag_index(),
        }
    }
}

impl Default for KeywordIndexNames {
    fn default() -> Self {
        Self {
            question: default_question_keyword_index(),
            answer: default_answer_keyword_index(),
            user: default_user_keyword_index(),
            tag: default_tag_keyword_index(),
        }
    }
}

impl Default for ExpansionConfig {
    fn default() -> Self {
        Self {
            max_answers: default_max_answers(),
            max_related_questions: default_max_related_questions(),
            concurrency: default_expansion_concurrency(),
            retry_backoff_ms: default_retry_backoff(),
            community_filter: default_enabled(),
        }
    }
}

impl Default for PromptConfig {
    fn default() -> Self {
        Self {
            history_char_budget: default_history_budget(),
            think_start: default_think_start(),
            think_end: default_think_end(),
            system_prompt: None,
        }
    }
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            json_logging: default_json_logging(),
            metrics_port: default_metrics_port(),
            service_name: default_service_name(),
        }
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            requests_per_second: default_rate_limit(),
            burst: default_burst(),
            enabled: default_enabled(),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            graph: GraphConfig::default(),
            embedding: EmbeddingConfig::default(),
            llm: LlmConfig::default(),
            retrieval: RetrievalConfig::default(),
            expansion: ExpansionConfig::default(),
            prompt: PromptConfig::default(),
            observability: ObservabilityConfig::default(),
            rate_limit: RateLimitConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment and files
    pub fn load() -> Result<Self, ConfigError> {
        let env = std::env::var("APP_ENV").unwrap_or_else(|_| "development".to_string());

        let config = Config::builder()
            // Load base config file
            .add_source(File::with_name("config/default").required(false))
            // Load environment-specific config
            .add_source(File::with_name(&format!("config/{}", env)).required(false))
            // Load local overrides
            .add_source(File::with_name("config/local").required(false))
            // Load from environment variables with APP__ prefix
            // e.g., APP__LLM__MODEL=qwen3:30b
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Load from a specific TOML file
    pub fn from_file(path: &str) -> Result<Self, ConfigError> {
        let config = Config::builder()
            .add_source(File::with_name(path))
            .add_source(
                Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let config: Self = config.try_deserialize()?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings the pipeline cannot run with
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.retrieval.k == 0 {
            return Err(ConfigError::Message("retrieval.k must be at least 1".into()));
        }
        if self.expansion.concurrency == 0 {
            return Err(ConfigError::Message(
                "expansion.concurrency must be at least 1".into(),
            ));
        }
        if self.graph.max_connections == 0 {
            return Err(ConfigError::Message(
                "graph.max_connections must be at least 1".into(),
            ));
        }
        if self.prompt.think_start.is_empty() || self.prompt.think_end.is_empty() {
            return Err(ConfigError::Message("think delimiters must not be empty".into()));
        }
        if self.prompt.think_start == self.prompt.think_end {
            return Err(ConfigError::Message(
                "think_start and think_end must differ".into(),
            ));
        }
        Ok(())
    }

    /// Snapshot exposed on the config endpoint. Never carries credentials.
    pub fn snapshot(&self) -> ConfigSnapshot {
        ConfigSnapshot {
            llm_model: self.llm.model.clone(),
            llm_provider: self.llm.provider.clone(),
            embedding_model: self.embedding.model.clone(),
            graph_url: self.graph.url.clone(),
            graph_database: self.graph.database.clone(),
            graph_user: self.graph.username.clone(),
        }
    }

    /// Get request timeout as Duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.server.request_timeout_secs)
    }

    /// Get shutdown timeout as Duration
    pub fn shutdown_timeout(&self) -> Duration {
        Duration::from_secs(self.server.shutdown_timeout_secs)
    }
}

impl RetrievalConfig {
    pub fn index_timeout(&self) -> Duration {
        Duration::from_millis(self.index_timeout_ms)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

impl ExpansionConfig {
    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

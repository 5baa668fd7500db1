//! Error types for GraphQA services
//!
//! Provides a comprehensive error handling system with:
//! - Distinct error types for each pipeline failure mode
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    MissingField,

    // Resource errors (4xxx)
    NotFound,
    SessionNotFound,

    // Rate limiting (6xxx)
    RateLimited,

    // Retrieval errors (7xxx)
    StoreTimeout,
    StoreUnavailable,
    RetrievalUnavailable,
    PartialRetrieval,
    ExpansionFailure,
    StoreRejected,

    // Generation errors (8xxx)
    EmbeddingUnavailable,
    ModelUnavailable,
    ModelTimeout,
    MalformedStream,
    UpstreamError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            // Validation (1xxx)
            ErrorCode::ValidationError => 1001,
            ErrorCode::MissingField => 1002,

            // Resources (4xxx)
            ErrorCode::NotFound => 4001,
            ErrorCode::SessionNotFound => 4005,

            // Rate limits (6xxx)
            ErrorCode::RateLimited => 6001,

            // Retrieval (7xxx)
            ErrorCode::StoreTimeout => 7001,
            ErrorCode::StoreUnavailable => 7002,
            ErrorCode::RetrievalUnavailable => 7003,
            ErrorCode::PartialRetrieval => 7004,
            ErrorCode::ExpansionFailure => 7005,
            ErrorCode::StoreRejected => 7006,

            // Generation (8xxx)
            ErrorCode::EmbeddingUnavailable => 8001,
            ErrorCode::ModelUnavailable => 8002,
            ErrorCode::ModelTimeout => 8003,
            ErrorCode::MalformedStream => 8004,
            ErrorCode::UpstreamError => 8005,

            // Internal (9xxx)
            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Required field missing: {field}")]
    MissingField { field: String },

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    #[error("Session not found: {id}")]
    SessionNotFound { id: String },

    // Rate limiting
    #[error("Rate limit exceeded: {limit} requests per second")]
    RateLimited { limit: u32 },

    // Retrieval boundary
    #[error("Graph store timed out during {operation} after {timeout_ms}ms")]
    StoreTimeout { operation: String, timeout_ms: u64 },

    #[error("Graph store unavailable: {message}")]
    StoreUnavailable { message: String },

    #[error("Graph store rejected the request: {message}")]
    StoreRejected { message: String },

    #[error("Retrieval unavailable: all {} indexes failed", .failed_indexes.len())]
    RetrievalUnavailable { failed_indexes: Vec<String> },

    #[error("Context expansion failed for {entity_id}: {message}")]
    ExpansionFailure { entity_id: String, message: String },

    // Embedding / generation boundary
    #[error("Embedding service unavailable: {message}")]
    EmbeddingUnavailable { message: String },

    #[error("Language model unavailable: {message}")]
    ModelUnavailable { message: String },

    #[error("Language model timed out after {timeout_ms}ms")]
    ModelTimeout { timeout_ms: u64 },

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::MissingField { .. } => ErrorCode::MissingField,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::SessionNotFound { .. } => ErrorCode::SessionNotFound,
            AppError::RateLimited { .. } => ErrorCode::RateLimited,
            AppError::StoreTimeout { .. } => ErrorCode::StoreTimeout,
            AppError::StoreUnavailable { .. } => ErrorCode::StoreUnavailable,
            AppError::StoreRejected { .. } => ErrorCode::StoreRejected,
            AppError::RetrievalUnavailable { .. } => ErrorCode::RetrievalUnavailable,
            AppError::ExpansionFailure { .. } => ErrorCode::ExpansionFailure,
            AppError::EmbeddingUnavailable { .. } => ErrorCode::EmbeddingUnavailable,
            AppError::ModelUnavailable { .. } => ErrorCode::ModelUnavailable,
            AppError::ModelTimeout { .. } => ErrorCode::ModelTimeout,
            AppError::HttpClient(_) => ErrorCode::UpstreamError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } | AppError::MissingField { .. } => StatusCode::BAD_REQUEST,

            // 404 Not Found
            AppError::NotFound { .. } | AppError::SessionNotFound { .. } => StatusCode::NOT_FOUND,

            // 429 Too Many Requests
            AppError::RateLimited { .. } => StatusCode::TOO_MANY_REQUESTS,

            // 500 Internal Server Error
            AppError::ExpansionFailure { .. }
            | AppError::StoreRejected { .. }
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 502 Bad Gateway
            AppError::EmbeddingUnavailable { .. }
            | AppError::ModelUnavailable { .. }
            | AppError::HttpClient(_) => StatusCode::BAD_GATEWAY,

            // 503 Service Unavailable
            AppError::StoreUnavailable { .. } | AppError::RetrievalUnavailable { .. } => {
                StatusCode::SERVICE_UNAVAILABLE
            }

            // 504 Gateway Timeout
            AppError::StoreTimeout { .. } | AppError::ModelTimeout { .. } => {
                StatusCode::GATEWAY_TIMEOUT
            }
        }
    }

    /// Whether a single retry with backoff may succeed.
    ///
    /// Only retrieval and expansion consult this. Generation is never retried.
    pub fn is_transient(&self) -> bool {
        match self {
            AppError::StoreTimeout { .. } | AppError::StoreUnavailable { .. } => true,
            AppError::HttpClient(e) => e.is_timeout() || e.is_connect(),
            _ => false,
        }
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        // Log based on severity
        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let details = match &self {
            AppError::RetrievalUnavailable { failed_indexes } => {
                Some(serde_json::json!({ "failed_indexes": failed_indexes }))
            }
            AppError::Validation { field: Some(field), .. } => {
                Some(serde_json::json!({ "field": field }))
            }
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                message,
                details,
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}

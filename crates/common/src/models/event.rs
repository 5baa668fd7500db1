//! Wire events emitted by an answer stream

use crate::errors::AppError;
use serde::{Deserialize, Serialize};

/// Failure categories a stream can terminate with
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StreamErrorKind {
    RetrievalUnavailable,
    EmbeddingUnavailable,
    ModelUnavailable,
    ModelTimeout,
    SessionNotFound,
    Internal,
}

impl From<&AppError> for StreamErrorKind {
    fn from(err: &AppError) -> Self {
        match err {
            AppError::RetrievalUnavailable { .. }
            | AppError::StoreTimeout { .. }
            | AppError::StoreUnavailable { .. }
            | AppError::StoreRejected { .. } => StreamErrorKind::RetrievalUnavailable,
            AppError::EmbeddingUnavailable { .. } => StreamErrorKind::EmbeddingUnavailable,
            AppError::ModelUnavailable { .. } | AppError::HttpClient(_) => StreamErrorKind::ModelUnavailable,
            AppError::ModelTimeout { .. } => StreamErrorKind::ModelTimeout,
            AppError::SessionNotFound { .. } => StreamErrorKind::SessionNotFound,
            _ => StreamErrorKind::Internal,
        }
    }
}

/// One labeled unit of an answer stream. `Done` and `Error` are terminal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamEvent {
    ReasoningChunk { text: String },
    AnswerChunk { text: String },
    Done,
    Error { kind: StreamErrorKind, message: String },
}

impl StreamEvent {
    pub fn reasoning(text: impl Into<String>) -> Self {
        StreamEvent::ReasoningChunk { text: text.into() }
    }

    pub fn answer(text: impl Into<String>) -> Self {
        StreamEvent::AnswerChunk { text: text.into() }
    }

    pub fn error(err: &AppError) -> Self {
        StreamEvent::Error {
            kind: err.into(),
            message: err.to_string(),
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, StreamEvent::Done | StreamEvent::Error { .. })
    }

    /// SSE event name for this variant
    pub fn name(&self) -> &'static str {
        match self {
            StreamEvent::ReasoningChunk { .. } => "reasoning",
            StreamEvent::AnswerChunk { .. } => "answer",
            StreamEvent::Done => "done",
            StreamEvent::Error { .. } => "error",
        }
    }
}

/// Merge adjacent chunks of the same channel.
///
/// Two event sequences carry the same content exactly when their
/// coalesced forms are equal.
pub fn coalesce(events: impl IntoIterator<Item = StreamEvent>) -> Vec<StreamEvent> {
    let mut out: Vec<StreamEvent> = Vec::new();
    for event in events {
        match (out.last_mut(), event) {
            (Some(StreamEvent::ReasoningChunk { text: prev }), StreamEvent::ReasoningChunk { text }) => {
                prev.push_str(&text)
            }
            (Some(StreamEvent::AnswerChunk { text: prev }), StreamEvent::AnswerChunk { text }) => {
                prev.push_str(&text)
            }
            (_, event) => out.push(event),
        }
    }
    out
}

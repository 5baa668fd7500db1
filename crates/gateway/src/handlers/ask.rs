//! Streaming answer handler
//!
//! Every `StreamEvent` becomes one SSE event: the `event:` field carries
//! the channel and `data:` the tagged JSON of the event. Closing the
//! connection drops the stream, which cancels the request.

use axum::{
    extract::State,
    response::sse::{Event, KeepAlive, Sse},
    Json,
};
use futures::{Stream, StreamExt};
use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::AppState;
use graphqa_common::errors::{AppError, Result};

/// Ask request
#[derive(Debug, Deserialize, Validate)]
pub struct AskRequest {
    pub session_id: Uuid,

    #[validate(length(min = 1, max = 4000))]
    pub question: String,
}

/// Answer a question within a session as an event stream
pub async fn ask(
    State(state): State<AppState>,
    Json(request): Json<AskRequest>,
) -> Result<Sse<impl Stream<Item = std::result::Result<Event, axum::Error>>>> {
    request.validate().map_err(|e| AppError::Validation {
        message: e.to_string(),
        field: Some("question".to_string()),
    })?;

    if request.question.trim().is_empty() {
        return Err(AppError::Validation {
            message: "Question must not be blank".to_string(),
            field: Some("question".to_string()),
        });
    }

    let events = state.pipeline.ask(request.session_id, request.question).await?;

    tracing::info!(session_id = %request.session_id, "Answer stream opened");

    let stream = events.map(|event| Event::default().event(event.name()).json_data(&event));

    Ok(Sse::new(stream).keep_alive(KeepAlive::default()))
}

//! Session management handlers

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::AppState;
use graphqa_common::{errors::Result, models::Turn};

/// Create session response
#[derive(Serialize)]
pub struct CreateSessionResponse {
    pub session_id: Uuid,
    pub created_at: String,
}

/// Session with its ordered turns
#[derive(Serialize)]
pub struct SessionResponse {
    pub session_id: Uuid,
    pub title: String,
    pub created_at: String,
    pub updated_at: String,
    pub turns: Vec<Turn>,
}

/// Create a new, empty session
pub async fn create_session(State(state): State<AppState>) -> (StatusCode, Json<CreateSessionResponse>) {
    let session = state.sessions().create().await;

    (
        StatusCode::CREATED,
        Json(CreateSessionResponse {
            session_id: session.id,
            created_at: session.created_at.to_rfc3339(),
        }),
    )
}

/// Get a session and its history
pub async fn get_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<Json<SessionResponse>> {
    let session = state.sessions().get(session_id).await?;

    Ok(Json(SessionResponse {
        session_id: session.id,
        title: session.title,
        created_at: session.created_at.to_rfc3339(),
        updated_at: session.updated_at.to_rfc3339(),
        turns: session.turns,
    }))
}

/// Delete a session and its history
pub async fn delete_session(
    State(state): State<AppState>,
    Path(session_id): Path<Uuid>,
) -> Result<StatusCode> {
    state.sessions().delete(session_id).await?;

    Ok(StatusCode::NO_CONTENT)
}

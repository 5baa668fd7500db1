//! Active configuration snapshot

use axum::{extract::State, Json};
use graphqa_common::config::ConfigSnapshot;

use crate::AppState;

/// Read-only view of the active model and graph endpoint
pub async fn get_config(State(state): State<AppState>) -> Json<ConfigSnapshot> {
    Json(state.config.snapshot())
}

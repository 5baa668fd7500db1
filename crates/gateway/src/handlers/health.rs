//! Health check handlers

use axum::{extract::State, Json};
use serde::Serialize;
use crate::AppState;

#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
}

#[derive(Serialize)]
pub struct ReadyResponse {
    pub status: String,
    pub checks: HealthChecks,
}

#[derive(Serialize)]
pub struct HealthChecks {
    pub graph: CheckResult,
}

#[derive(Serialize)]
pub struct CheckResult {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Liveness probe - always returns healthy if server is running
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: graphqa_common::VERSION.to_string(),
    })
}

/// Readiness probe - round trip to the graph store
pub async fn ready(State(state): State<AppState>) -> Json<ReadyResponse> {
    let start = std::time::Instant::now();

    let graph_check = match state.store.ping().await {
        Ok(_) => CheckResult {
            status: "up".to_string(),
            latency_ms: Some(start.elapsed().as_millis() as u64),
            error: None,
        },
        Err(e) => {
            tracing::warn!(error = %e, "Graph store not reachable");
            CheckResult {
                status: "down".to_string(),
                latency_ms: None,
                error: Some(e.to_string()),
            }
        }
    };

    let all_healthy = graph_check.status == "up";

    Json(ReadyResponse {
        status: if all_healthy { "ready" } else { "not_ready" }.to_string(),
        checks: HealthChecks { graph: graph_check },
    })
}

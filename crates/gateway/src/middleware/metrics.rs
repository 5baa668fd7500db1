//! Per-route request counters and latency

use axum::{
    extract::{MatchedPath, Request},
    middleware::Next,
    response::Response,
};
use graphqa_common::metrics::RequestMetrics;

/// Record count and latency by method, route template and status
pub async fn track_requests(request: Request, next: Next) -> Response {
    let endpoint = request
        .extensions()
        .get::<MatchedPath>()
        .map(|path| path.as_str().to_string())
        .unwrap_or_else(|| "unmatched".to_string());

    let metrics = RequestMetrics::start(request.method().as_str(), &endpoint);
    let response = next.run(request).await;
    metrics.finish(response.status().as_u16());

    response
}

//! Metrics and observability utilities
//!
//! Provides Prometheus metrics for each pipeline stage
//! with standardized naming conventions.

use metrics::{counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram, Unit};
use std::time::Instant;

/// Metrics prefix for all GraphQA metrics
pub const METRICS_PREFIX: &str = "graphqa";

/// Histogram buckets for request latency (in seconds)
pub const LATENCY_BUCKETS: &[f64] = &[
    0.005,  // 5ms
    0.010,  // 10ms
    0.025,  // 25ms
    0.050,  // 50ms
    0.100,  // 100ms
    0.250,  // 250ms
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
];

/// Buckets for full generation streams (model bound, much slower)
pub const GENERATION_BUCKETS: &[f64] = &[
    0.500,  // 500ms
    1.000,  // 1s
    2.500,  // 2.5s
    5.000,  // 5s
    10.00,  // 10s
    30.00,  // 30s
    60.00,  // 1m
    120.0,  // 2m
    300.0,  // 5m
];

/// Register all metric descriptions
pub fn register_metrics() {
    // Request metrics
    describe_counter!(
        format!("{}_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total number of HTTP requests"
    );

    describe_histogram!(
        format!("{}_request_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "HTTP request latency in seconds"
    );

    // Retrieval metrics
    describe_histogram!(
        format!("{}_retrieval_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Ensemble retrieval latency in seconds"
    );

    describe_gauge!(
        format!("{}_retrieval_candidates_count", METRICS_PREFIX),
        Unit::Count,
        "Number of candidates returned by the last retrieval"
    );

    describe_counter!(
        format!("{}_index_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Vector index lookups that failed or timed out"
    );

    describe_counter!(
        format!("{}_partial_retrievals_total", METRICS_PREFIX),
        Unit::Count,
        "Retrievals that succeeded with at least one failed index"
    );

    // Expansion metrics
    describe_histogram!(
        format!("{}_expansion_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Graph context expansion latency in seconds"
    );

    describe_counter!(
        format!("{}_expansion_failures_total", METRICS_PREFIX),
        Unit::Count,
        "Candidates dropped because their neighborhood could not be read"
    );

    // Embedding metrics
    describe_counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API requests"
    );

    describe_histogram!(
        format!("{}_embedding_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Embedding generation latency in seconds"
    );

    describe_counter!(
        format!("{}_embedding_errors_total", METRICS_PREFIX),
        Unit::Count,
        "Total embedding API errors"
    );

    // Generation metrics
    describe_counter!(
        format!("{}_generations_total", METRICS_PREFIX),
        Unit::Count,
        "Generation streams by terminal outcome"
    );

    describe_histogram!(
        format!("{}_generation_duration_seconds", METRICS_PREFIX),
        Unit::Seconds,
        "Time from prompt submission to terminal event"
    );

    describe_counter!(
        format!("{}_stream_chunks_total", METRICS_PREFIX),
        Unit::Count,
        "Chunks forwarded to the caller per channel"
    );

    describe_counter!(
        format!("{}_malformed_streams_total", METRICS_PREFIX),
        Unit::Count,
        "Streams that ended with an inconsistent delimiter sequence"
    );

    describe_counter!(
        format!("{}_cancellations_total", METRICS_PREFIX),
        Unit::Count,
        "Requests abandoned by the caller before a terminal event"
    );

    // Sessions
    describe_gauge!(
        format!("{}_sessions_active", METRICS_PREFIX),
        Unit::Count,
        "Sessions currently held in memory"
    );

    tracing::info!("Metrics registered");
}

/// Helper to record request metrics
pub struct RequestMetrics {
    start: Instant,
    endpoint: String,
    method: String,
}

impl RequestMetrics {
    /// Start tracking a request
    pub fn start(method: &str, endpoint: &str) -> Self {
        Self {
            start: Instant::now(),
            endpoint: endpoint.to_string(),
            method: method.to_string(),
        }
    }

    /// Record request completion
    pub fn finish(self, status: u16) {
        let duration = self.start.elapsed().as_secs_f64();

        counter!(
            format!("{}_requests_total", METRICS_PREFIX),
            "method" => self.method.clone(),
            "endpoint" => self.endpoint.clone(),
            "status" => status.to_string()
        )
        .increment(1);

        histogram!(
            format!("{}_request_duration_seconds", METRICS_PREFIX),
            "method" => self.method,
            "endpoint" => self.endpoint
        )
        .record(duration);
    }
}

/// Helper to record retrieval metrics
pub fn record_retrieval(duration_secs: f64, candidate_count: usize, failed_indexes: &[String]) {
    histogram!(format!("{}_retrieval_duration_seconds", METRICS_PREFIX)).record(duration_secs);

    gauge!(format!("{}_retrieval_candidates_count", METRICS_PREFIX)).set(candidate_count as f64);

    for index in failed_indexes {
        counter!(
            format!("{}_index_failures_total", METRICS_PREFIX),
            "index" => index.clone()
        )
        .increment(1);
    }

    if !failed_indexes.is_empty() {
        counter!(format!("{}_partial_retrievals_total", METRICS_PREFIX)).increment(1);
    }
}

/// Helper to record expansion metrics
pub fn record_expansion(duration_secs: f64, dropped: usize) {
    histogram!(format!("{}_expansion_duration_seconds", METRICS_PREFIX)).record(duration_secs);

    if dropped > 0 {
        counter!(format!("{}_expansion_failures_total", METRICS_PREFIX)).increment(dropped as u64);
    }
}

/// Helper to record embedding metrics
pub fn record_embedding(duration_secs: f64, model: &str, success: bool) {
    let status = if success { "success" } else { "error" };

    counter!(
        format!("{}_embedding_requests_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "status" => status.to_string()
    )
    .increment(1);

    if success {
        histogram!(
            format!("{}_embedding_duration_seconds", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .record(duration_secs);
    } else {
        counter!(
            format!("{}_embedding_errors_total", METRICS_PREFIX),
            "model" => model.to_string()
        )
        .increment(1);
    }
}

/// Helper to record the terminal outcome of a generation stream
pub fn record_generation(duration_secs: f64, model: &str, outcome: &str) {
    counter!(
        format!("{}_generations_total", METRICS_PREFIX),
        "model" => model.to_string(),
        "outcome" => outcome.to_string()
    )
    .increment(1);

    histogram!(
        format!("{}_generation_duration_seconds", METRICS_PREFIX),
        "model" => model.to_string()
    )
    .record(duration_secs);
}

/// Helper to count forwarded chunks per channel
pub fn record_chunk(channel: &'static str) {
    counter!(
        format!("{}_stream_chunks_total", METRICS_PREFIX),
        "channel" => channel
    )
    .increment(1);
}

/// Helper to count streams degraded at end-of-stream
pub fn record_malformed_stream() {
    counter!(format!("{}_malformed_streams_total", METRICS_PREFIX)).increment(1);
}

/// Helper to count caller cancellations
pub fn record_cancellation() {
    counter!(format!("{}_cancellations_total", METRICS_PREFIX)).increment(1);
}

/// Helper to track the number of live sessions
pub fn record_sessions(active: usize) {
    gauge!(format!("{}_sessions_active", METRICS_PREFIX)).set(active as f64);
}

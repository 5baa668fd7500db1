//! GraphQA API Gateway
//!
//! The main entry point for all external API requests.
//! Handles:
//! - Streaming answers over Server-Sent Events
//! - Session lifecycle
//! - Rate limiting
//! - Observability (logging, metrics)

mod handlers;
mod middleware;

use axum::{
    error_handling::HandleErrorLayer,
    http::StatusCode,
    middleware::{from_fn, from_fn_with_state},
    response::IntoResponse,
    routing::{get, post},
    BoxError, Router,
};
use graphqa_common::{
    config::{AppConfig, ObservabilityConfig},
    embeddings::{create_embedder, Embedder},
    errors::Result,
    graph::{create_graph_store, GraphStore},
    metrics::{self, GENERATION_BUCKETS, LATENCY_BUCKETS, METRICS_PREFIX},
    sessions::SessionStore,
};
use graphqa_context::{create_generator, AnswerPipeline, Generator};
use metrics_exporter_prometheus::{Matcher, PrometheusBuilder};
use std::future::IntoFuture;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::TraceLayer,
};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub store: Arc<dyn GraphStore>,
    pub pipeline: AnswerPipeline,
}

impl AppState {
    /// Wire the pipeline from explicit providers
    pub fn new(
        config: AppConfig,
        store: Arc<dyn GraphStore>,
        embedder: Arc<dyn Embedder>,
        generator: Arc<dyn Generator>,
    ) -> Self {
        let pipeline = AnswerPipeline::new(&config, store.clone(), embedder, generator, SessionStore::new());
        Self {
            config: Arc::new(config),
            store,
            pipeline,
        }
    }

    /// Wire the pipeline from the configured providers
    pub fn from_config(config: AppConfig) -> Result<Self> {
        let store = create_graph_store(&config.graph)?;
        let embedder = create_embedder(&config.embedding)?;
        let generator = create_generator(&config.llm, &config.prompt)?;
        Ok(Self::new(config, store, embedder, generator))
    }

    pub fn sessions(&self) -> &SessionStore {
        self.pipeline.sessions()
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables
    dotenvy::dotenv().ok();

    let config = AppConfig::load()?;
    init_tracing(&config.observability);

    info!("Starting GraphQA API Gateway v{}", graphqa_common::VERSION);

    init_metrics(config.observability.metrics_port)?;

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    let grace = config.shutdown_timeout();

    let state = AppState::from_config(config)?;
    info!(
        model = %state.pipeline.model_name(),
        graph = %state.config.graph.provider,
        "Pipeline ready"
    );

    let app = create_router(state);

    info!("Listening on {}", addr);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    let shutdown = CancellationToken::new();
    let trigger = shutdown.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        trigger.cancel();
    });

    let server = axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.clone().cancelled_owned())
        .into_future();

    // Open answer streams are cut after the grace period
    tokio::select! {
        result = server => result?,
        _ = async {
            shutdown.cancelled().await;
            tokio::time::sleep(grace).await;
        } => warn!(grace_secs = grace.as_secs(), "Grace period elapsed, dropping open connections"),
    }

    info!("Server shutdown complete");
    Ok(())
}

fn init_tracing(config: &ObservabilityConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let builder = tracing_subscriber::fmt().with_env_filter(filter).with_target(true);

    if config.json_logging {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn init_metrics(port: u16) -> anyhow::Result<()> {
    metrics::register_metrics();
    if port == 0 {
        return Ok(());
    }

    let mut builder = PrometheusBuilder::new().with_http_listener(SocketAddr::from(([0, 0, 0, 0], port)));
    for stage in ["request", "retrieval", "expansion", "embedding"] {
        builder = builder.set_buckets_for_metric(
            Matcher::Full(format!("{}_{}_duration_seconds", METRICS_PREFIX, stage)),
            LATENCY_BUCKETS,
        )?;
    }
    builder
        .set_buckets_for_metric(
            Matcher::Full(format!("{}_generation_duration_seconds", METRICS_PREFIX)),
            GENERATION_BUCKETS,
        )?
        .install()?;

    info!(port, "Prometheus exporter listening");
    Ok(())
}

/// Create the main application router
fn create_router(state: AppState) -> Router {
    // CORS configuration
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    // Request ID propagation
    let request_id = SetRequestIdLayer::x_request_id(MakeRequestUuid);
    let propagate_id = PropagateRequestIdLayer::x_request_id();

    // Bounds time to response headers; answer bodies stream past it
    let timeout = ServiceBuilder::new()
        .layer(HandleErrorLayer::new(handle_timeout))
        .timeout(state.config.request_timeout());

    let mut api_routes = Router::new()
        // Health endpoints
        .route("/health", get(handlers::health::health))
        .route("/ready", get(handlers::health::ready))

        // Answer streaming
        .route("/ask", post(handlers::ask::ask))

        // Session endpoints
        .route("/sessions", post(handlers::sessions::create_session))
        .route(
            "/sessions/{id}",
            get(handlers::sessions::get_session).delete(handlers::sessions::delete_session),
        )

        // Active setup
        .route("/config", get(handlers::config::get_config))
        .route_layer(from_fn(middleware::metrics::track_requests));

    if state.config.rate_limit.enabled {
        let limiter = Arc::new(middleware::rate_limit::RequestLimiter::new(&state.config.rate_limit));
        api_routes = api_routes.layer(from_fn_with_state(limiter, middleware::rate_limit::rate_limit_middleware));
    }

    // Compose the app
    Router::new()
        .nest("/v2", api_routes)
        .layer(timeout)
        .layer(propagate_id)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .layer(request_id)
        .with_state(state)
}

async fn handle_timeout(err: BoxError) -> impl IntoResponse {
    if err.is::<tower::timeout::error::Elapsed>() {
        (StatusCode::REQUEST_TIMEOUT, "request timed out".to_string())
    } else {
        (StatusCode::INTERNAL_SERVER_ERROR, format!("unhandled error: {}", err))
    }
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => info!("Received Ctrl+C, starting shutdown..."),
        _ = terminate => info!("Received SIGTERM, starting shutdown..."),
    }
}

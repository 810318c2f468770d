//! HTTP server for the intentd classification service.
//!
//! Exposes single and batch classification, a health probe, and an
//! authenticated model-introspection endpoint under the `/api` prefix.
//!
//! Features:
//! - Per-IP rate limiting with an LRU-capped limiter cache
//! - JSONL access logging with size-based rotation
//! - HTTP Basic authentication on the model-info endpoint
//! - Structured logging via [`tracing`]

pub mod handlers;
pub mod logging;
pub mod middleware;
pub mod types;

pub use handlers::MAX_BODY_BYTES;
pub use logging::UsageMetrics;
pub use types::{
    BatchQueryRequest, BatchQueryResponseItem, CredentialStore, ErrorDetail, HealthResponse,
    ModelInfoResponse, QueryRequest, QueryResponse, ServerConfig, StaticCredentials,
};

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;

use eyre::Result;
use lru::LruCache;
use tokio::sync::Mutex;
use tracing::info;

use crate::artifacts::ModelBundle;

// ---------------------------------------------------------------------------
// Server state
// ---------------------------------------------------------------------------

pub struct ServerState {
    pub config: ServerConfig,
    /// Loaded model artifacts, read-only for the process lifetime.
    pub bundle: Arc<ModelBundle>,
    pub credentials: Arc<dyn CredentialStore>,
    pub rate_limiters: Mutex<LruCache<IpAddr, Arc<middleware::IpRateLimiter>>>,
    pub usage: UsageMetrics,
}

impl ServerState {
    pub fn new(config: ServerConfig, bundle: Arc<ModelBundle>) -> Self {
        let usage = UsageMetrics::new(&config.access_log_path, config.max_access_log_bytes);
        Self {
            bundle,
            credentials: Arc::new(StaticCredentials::default()),
            rate_limiters: middleware::new_rate_limiter_cache(),
            usage,
            config,
        }
    }
}

// ---------------------------------------------------------------------------
// HTTP server
// ---------------------------------------------------------------------------

/// Assemble the application router. Shared by `run_server` and the
/// integration tests so both exercise the same routes and layers.
pub fn build_router(state: Arc<ServerState>) -> axum::Router {
    use axum::{
        extract::DefaultBodyLimit,
        middleware as axum_mw,
        routing::{get, post},
        Router,
    };
    use tower_http::cors::{Any, CorsLayer};

    // Model introspection sits behind HTTP Basic auth.
    let protected = Router::new()
        .route("/api/model/info", get(handlers::model_info_handler))
        .layer(axum_mw::from_fn_with_state(
            state.clone(),
            middleware::basic_auth_middleware,
        ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/api/classify", post(handlers::classify_handler))
        .route("/api/classify/batch", post(handlers::classify_batch_handler))
        .route("/api/health", get(handlers::health_handler))
        .merge(protected)
        .layer(cors)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .with_state(state)
}

/// Run the HTTP server (blocking until shutdown).
///
/// The bundle is loaded by the caller before this is invoked, so a broken
/// model artifact can never reach the serving path.
pub async fn run_server(config: ServerConfig, bundle: Arc<ModelBundle>) -> Result<()> {
    let bind_addr = config.bind_addr;
    let rate_limit_rpm = config.rate_limit_rpm;
    let access_log = config.access_log_path.clone();

    let state = Arc::new(ServerState::new(config, bundle));
    let app = build_router(state.clone());

    let listener = tokio::net::TcpListener::bind(bind_addr).await?;
    info!(bind = %bind_addr, "intentd server listening");
    info!("Endpoints: POST /api/classify, POST /api/classify/batch, GET /api/health, GET /api/model/info (Basic auth)");
    info!(
        model_name = %state.bundle.model_name(),
        num_classes = state.bundle.classes().len(),
        digest = %state.bundle.digest(),
        "serving loaded model"
    );
    if rate_limit_rpm > 0 {
        info!(rate_limit_rpm, "rate limiting enabled");
    } else {
        info!("rate limiting disabled");
    }
    info!(access_log = %access_log);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "failed to listen for shutdown signal");
        return;
    }
    info!("shutdown signal received, draining connections");
}

//! HTTP endpoint handler functions.

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Instant;

use axum::http::StatusCode;
use axum::response::IntoResponse;

use super::types::*;
use super::ServerState;

/// Maximum request body size in bytes (1 MB).
pub const MAX_BODY_BYTES: usize = 1024 * 1024;

/// Fixed rejection message for empty single-text input.
const EMPTY_TEXT_DETAIL: &str = "Input text cannot be empty";

/// Check the caller's rate limit; Some(response) means the request is over
/// quota and should be rejected with 429.
async fn check_rate_limit(
    state: &Arc<ServerState>,
    client_ip: std::net::IpAddr,
) -> Option<axum::response::Response> {
    let limiter =
        super::middleware::get_rate_limiter(&state.config, &state.rate_limiters, client_ip).await?;
    if limiter.check().is_ok() {
        return None;
    }
    state.usage.record_error();
    Some(
        (
            StatusCode::TOO_MANY_REQUESTS,
            axum::Json(ErrorDetail::new(format!(
                "Rate limit exceeded. Maximum {} requests per minute.",
                state.config.rate_limit_rpm
            ))),
        )
            .into_response(),
    )
}

pub async fn classify_handler(
    axum::extract::State(state): axum::extract::State<Arc<ServerState>>,
    axum::extract::ConnectInfo(addr): axum::extract::ConnectInfo<SocketAddr>,
    axum::Json(request): axum::Json<QueryRequest>,
) -> axum::response::Response {
    let start = Instant::now();
    state.usage.ep_classify.fetch_add(1, Ordering::Relaxed);

    if let Some(rejection) = check_rate_limit(&state, addr.ip()).await {
        return rejection;
    }

    if request.text.trim().is_empty() {
        state.usage.record_error();
        return (
            StatusCode::BAD_REQUEST,
            axum::Json(ErrorDetail::new(EMPTY_TEXT_DETAIL)),
        )
            .into_response();
    }

    let prediction = state.bundle.classify(&request.text);
    state.usage.record(
        "classify",
        &prediction.intent,
        prediction.confidence,
        start.elapsed().as_millis() as u64,
    );

    axum::Json(QueryResponse {
        intent: prediction.intent,
        confidence: prediction.confidence,
    })
    .into_response()
}

pub async fn classify_batch_handler(
    axum::extract::State(state): axum::extract::State<Arc<ServerState>>,
    axum::extract::ConnectInfo(addr): axum::extract::ConnectInfo<SocketAddr>,
    axum::Json(request): axum::Json<BatchQueryRequest>,
) -> axum::response::Response {
    let start = Instant::now();
    state.usage.ep_classify_batch.fetch_add(1, Ordering::Relaxed);

    if let Some(rejection) = check_rate_limit(&state, addr.ip()).await {
        return rejection;
    }

    // Unlike the single path, empty strings are classified as-is: they
    // normalize to "" and score on the classifier's intercepts alone.
    let results: Vec<BatchQueryResponseItem> = request
        .texts
        .into_iter()
        .map(|text| {
            let prediction = state.bundle.classify(&text);
            BatchQueryResponseItem {
                text,
                intent: prediction.intent,
                confidence: prediction.confidence,
            }
        })
        .collect();

    state.usage.record_batch(
        "classify_batch",
        results.len(),
        start.elapsed().as_millis() as u64,
    );

    axum::Json(results).into_response()
}

pub async fn health_handler(
    axum::extract::State(state): axum::extract::State<Arc<ServerState>>,
) -> impl axum::response::IntoResponse {
    state.usage.ep_health.fetch_add(1, Ordering::Relaxed);

    axum::Json(HealthResponse {
        status: "ok".to_string(),
    })
}

/// Model introspection. Basic auth is enforced by the middleware layered on
/// this route; by the time this runs the caller is authenticated.
pub async fn model_info_handler(
    axum::extract::State(state): axum::extract::State<Arc<ServerState>>,
) -> impl axum::response::IntoResponse {
    state.usage.ep_model_info.fetch_add(1, Ordering::Relaxed);

    axum::Json(ModelInfoResponse {
        model_name: state.bundle.model_name().to_string(),
        vectorizer_type: state.bundle.vectorizer_type().to_string(),
        num_classes: state.bundle.classes().len(),
        classes: state.bundle.classes().to_vec(),
    })
}

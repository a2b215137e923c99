//! API routes.

use std::sync::Arc;

use axum::middleware;
use axum::routing::{get, post};
use axum::Router;
use metrics_exporter_prometheus::PrometheusHandle;
use tower_http::limit::RequestBodyLimitLayer;

use crate::handlers::{
    cancel_job, check_key, download_sequence, download_shot, generate, get_result, health, ready, remix, set_key,
    stitch_sequence, stream_progress, video_status,
};
use crate::metrics::metrics_middleware;
use crate::middleware::{cors_layer, rate_limit_middleware, request_id, request_logging, security_headers, RateLimiterCache};
use crate::state::AppState;

/// Create the API router.
pub fn create_router(state: AppState, metrics_handle: Option<PrometheusHandle>) -> Router {
    let key_routes = Router::new()
        .route("/check-key", get(check_key))
        .route("/set-key", post(set_key));

    let job_routes = Router::new()
        // Submission
        .route("/generate", post(generate))
        .route("/remix", post(remix))
        // Progress and results
        .route("/stream/:job_id", get(stream_progress))
        .route("/result/:job_id", get(get_result))
        .route("/jobs/:job_id/cancel", post(cancel_job));

    let media_routes = Router::new()
        .route("/stitch/:sequence_id", post(stitch_sequence))
        .route("/download/:sequence_id/:shot_number", get(download_shot))
        .route("/download-sequence/:sequence_id", get(download_sequence))
        .route("/status/:video_id", get(video_status));

    let rate_limiter = Arc::new(RateLimiterCache::new(state.config.rate_limit_rps));

    let api_routes = Router::new()
        .merge(key_routes)
        .merge(job_routes)
        .merge(media_routes)
        .layer(middleware::from_fn_with_state(rate_limiter, rate_limit_middleware));

    let health_routes = Router::new()
        .route("/health", get(health))
        .route("/healthz", get(health))
        .route("/ready", get(ready));

    let metrics_routes = if let Some(handle) = metrics_handle {
        Router::new().route("/metrics", get(move || async move { handle.render() }))
    } else {
        Router::new()
    };

    Router::new()
        .nest("/api", api_routes)
        .merge(health_routes)
        .merge(metrics_routes)
        .layer(RequestBodyLimitLayer::new(state.config.max_body_size))
        .layer(middleware::from_fn(metrics_middleware))
        .layer(middleware::from_fn(security_headers))
        .layer(middleware::from_fn(request_id))
        .layer(middleware::from_fn(request_logging))
        .layer(cors_layer(&state.config.cors_origins))
        .with_state(state)
}

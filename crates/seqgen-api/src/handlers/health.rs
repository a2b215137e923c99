//! Health check handlers.

use std::time::Instant;

use axum::extract::State;
use axum::http::StatusCode;
use axum::Json;
use chrono::Utc;
use serde::Serialize;

use crate::state::AppState;

/// Health response.
#[derive(Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub timestamp: String,
}

/// Health check endpoint (liveness probe).
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        timestamp: Utc::now().to_rfc3339(),
    })
}

/// Readiness check response.
#[derive(Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub checks: ReadinessChecks,
    pub jobs: JobCounts,
}

#[derive(Serialize)]
pub struct ReadinessChecks {
    pub result_store: CheckStatus,
    pub ffmpeg: CheckStatus,
}

#[derive(Serialize)]
pub struct JobCounts {
    pub admitted: usize,
    pub running: usize,
    pub open_streams: usize,
}

#[derive(Serialize)]
pub struct CheckStatus {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<u64>,
}

impl CheckStatus {
    fn ok(latency_ms: u64) -> Self {
        Self {
            status: "ok".to_string(),
            error: None,
            latency_ms: Some(latency_ms),
        }
    }

    fn error(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            error: Some(msg.into()),
            latency_ms: None,
        }
    }

    fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Readiness check endpoint (readiness probe).
///
/// The result store must answer. A missing FFmpeg only degrades stitching,
/// so it is reported but does not fail the probe.
pub async fn ready(
    State(state): State<AppState>,
) -> Result<Json<ReadinessResponse>, (StatusCode, Json<ReadinessResponse>)> {
    let result_store = {
        let start = Instant::now();
        match state.registry.ping().await {
            Ok(()) => CheckStatus::ok(start.elapsed().as_millis() as u64),
            Err(e) => CheckStatus::error(e.to_string()),
        }
    };

    let ffmpeg = match seqgen_media::check_ffmpeg() {
        Ok(_) => CheckStatus::ok(0),
        Err(e) => CheckStatus::error(e.to_string()),
    };

    let store_ok = result_store.is_ok();
    let status = match (store_ok, ffmpeg.is_ok()) {
        (true, true) => "ready",
        (true, false) => "degraded",
        (false, _) => "unavailable",
    };

    let response = ReadinessResponse {
        status: status.to_string(),
        checks: ReadinessChecks { result_store, ffmpeg },
        jobs: JobCounts {
            admitted: state.runner.active_jobs(),
            running: state.runner.running_jobs(),
            open_streams: state.registry.channel_count(),
        },
    };

    if store_ok {
        Ok(Json(response))
    } else {
        Err((StatusCode::SERVICE_UNAVAILABLE, Json(response)))
    }
}

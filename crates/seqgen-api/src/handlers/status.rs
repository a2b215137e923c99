//! Remote video status lookup.

use axum::extract::{Path, State};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tracing::warn;

use seqgen_video_client::RemoteStatus;

use crate::error::ApiError;
use crate::security::is_valid_video_id;
use crate::state::AppState;

/// GET /api/status/:video_id
///
/// Lookup failures are reported in the body as `{"status": "error"}` rather
/// than as an HTTP error, so pollers can keep a single code path.
pub async fn video_status(State(state): State<AppState>, Path(video_id): Path<String>) -> Response {
    if !is_valid_video_id(&video_id) {
        return ApiError::bad_request("Invalid video ID").into_response();
    }

    match state.video.retrieve(&video_id).await {
        Ok(job) => Json(RemoteStatus::from(&job)).into_response(),
        Err(e) => {
            warn!(video_id = %video_id, "Status lookup failed: {}", e);
            Json(json!({ "status": "error", "error": e.to_string() })).into_response()
        }
    }
}

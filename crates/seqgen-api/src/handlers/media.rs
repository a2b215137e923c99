//! Stitching and download of generated sequence files.

use std::path::PathBuf;
use std::time::Instant;

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{header, Response};
use axum::Json;
use serde::Serialize;
use tracing::{info, warn};

use seqgen_media::STITCHED_FILENAME;
use seqgen_models::MAX_SHOTS;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::metrics;
use crate::security::{is_valid_sequence_id, parse_shot_number};
use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct StitchResponse {
    pub success: bool,
    pub output_path: String,
    pub download_url: String,
}

fn sequence_dir(state: &AppState, sequence_id: &str) -> ApiResult<PathBuf> {
    if !is_valid_sequence_id(sequence_id) {
        return Err(ApiError::bad_request("Invalid sequence ID"));
    }
    Ok(state.config.output_dir.join(sequence_id))
}

fn shot_path(dir: &std::path::Path, shot_number: u8) -> PathBuf {
    dir.join(format!("shot_{}.mp4", shot_number))
}

/// POST /api/stitch/:sequence_id
pub async fn stitch_sequence(
    State(state): State<AppState>,
    user: AuthUser,
    Path(sequence_id): Path<String>,
) -> ApiResult<Json<StitchResponse>> {
    let dir = sequence_dir(&state, &sequence_id)?;
    if !tokio::fs::try_exists(&dir).await.unwrap_or(false) {
        return Err(ApiError::not_found(format!("Sequence not found: {}", sequence_id)));
    }

    let mut clips = Vec::new();
    for shot_number in 1..=MAX_SHOTS as u8 {
        let path = shot_path(&dir, shot_number);
        if tokio::fs::try_exists(&path).await.unwrap_or(false) {
            clips.push(path);
        }
    }
    if clips.is_empty() {
        return Err(ApiError::bad_request("No videos to stitch"));
    }

    let output = dir.join(STITCHED_FILENAME);
    let start = Instant::now();
    let stitched = match state.stitcher.stitch(&clips, &output).await {
        Ok(path) => {
            metrics::record_stitch("success", start.elapsed().as_secs_f64());
            path
        }
        Err(e) => {
            metrics::record_stitch("failure", start.elapsed().as_secs_f64());
            warn!(sequence_id = %sequence_id, "Stitching failed: {}", e);
            return Err(e.into());
        }
    };
    info!(
        uid = %user.uid,
        sequence_id = %sequence_id,
        clips = clips.len(),
        "Stitched sequence in {:.1}s",
        start.elapsed().as_secs_f64()
    );

    Ok(Json(StitchResponse {
        success: true,
        output_path: stitched.display().to_string(),
        download_url: format!("/api/download-sequence/{}", sequence_id),
    }))
}

/// GET /api/download/:sequence_id/:shot_number
pub async fn download_shot(
    State(state): State<AppState>,
    Path((sequence_id, shot_number)): Path<(String, String)>,
) -> ApiResult<Response<Body>> {
    let dir = sequence_dir(&state, &sequence_id)?;
    let shot_number = parse_shot_number(&shot_number).ok_or_else(|| ApiError::not_found("Shot not found"))?;

    let path = shot_path(&dir, shot_number);
    let filename = format!("{}_shot_{}.mp4", sequence_id, shot_number);
    send_video(path, &filename, "Shot not found").await
}

/// GET /api/download-sequence/:sequence_id
pub async fn download_sequence(
    State(state): State<AppState>,
    Path(sequence_id): Path<String>,
) -> ApiResult<Response<Body>> {
    let dir = sequence_dir(&state, &sequence_id)?;

    let path = dir.join(STITCHED_FILENAME);
    let filename = format!("{}_complete.mp4", sequence_id);
    send_video(path, &filename, "Stitched video not found").await
}

async fn send_video(path: PathBuf, filename: &str, missing: &str) -> ApiResult<Response<Body>> {
    let bytes = match tokio::fs::read(&path).await {
        Ok(bytes) => bytes,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Err(ApiError::not_found(missing)),
        Err(e) => return Err(ApiError::internal(format!("Failed to read {}: {}", path.display(), e))),
    };

    Response::builder()
        .header(header::CONTENT_TYPE, "video/mp4")
        .header(header::CONTENT_LENGTH, bytes.len())
        .header(
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", filename),
        )
        .body(Body::from(bytes))
        .map_err(|e| ApiError::internal(format!("Failed to build response: {}", e)))
}

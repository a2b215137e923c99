//! Sequence submission, result and cancellation handlers.

use std::path::PathBuf;

use axum::extract::{FromRequest, Multipart, Path, Request, State};
use axum::http::{header, StatusCode};
use axum::Json;
use serde::Serialize;
use tracing::{debug, info};
use validator::Validate;

use seqgen_media::remove_upload;
use seqgen_models::{GenerateRequest, GenerationOptions, JobAccepted, JobId, RemixRequest, SequenceResult, Shot, VideoSize};
use seqgen_worker::{validate_shot_count, SequenceSource, Submission};

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::security::{is_valid_sequence_id, is_valid_video_id, upload_path};
use crate::state::AppState;

/// Multipart field carrying the reference image for shot 1.
const REFERENCE_IMAGE_FIELD: &str = "image_1";

/// A parsed generate request plus its stored reference image, if any.
struct ParsedGenerate {
    request: GenerateRequest,
    reference_image: Option<PathBuf>,
}

/// POST /api/generate
///
/// Accepts either `application/json` (`{shots, quality?, model?}`) or
/// `multipart/form-data` with a `shots` JSON string and an optional
/// `image_1` reference image. Returns 202 with the job id and stream URL.
pub async fn generate(
    State(state): State<AppState>,
    user: AuthUser,
    request: Request,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    let is_multipart = request
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|ct| ct.starts_with("multipart/form-data"))
        .unwrap_or(false);

    let parsed = if is_multipart {
        let multipart = Multipart::from_request(request, &state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        read_multipart(&state, multipart).await?
    } else {
        let Json(request) = Json::<GenerateRequest>::from_request(request, &state)
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?;
        ParsedGenerate {
            request,
            reference_image: None,
        }
    };

    let reference_image = parsed.reference_image.clone();
    let accepted = accept_generate(&state, &user, parsed);
    if accepted.is_err() {
        if let Some(path) = reference_image {
            remove_upload(&path).await;
        }
    }
    let accepted = accepted?;
    Ok((StatusCode::ACCEPTED, Json(accepted)))
}

fn accept_generate(state: &AppState, user: &AuthUser, parsed: ParsedGenerate) -> ApiResult<JobAccepted> {
    let ParsedGenerate {
        request,
        reference_image,
    } = parsed;

    validate_shot_count(request.shots.len())?;
    request.validate()?;

    let defaults = state.runner.config();
    let quality = match request.quality.as_deref().map(str::trim).filter(|q| !q.is_empty()) {
        Some(raw) => raw.parse::<VideoSize>().map_err(|_| {
            ApiError::validation(format!("Invalid quality '{}', expected WIDTHxHEIGHT", raw))
        })?,
        None => defaults.default_quality,
    };
    let model = request
        .model
        .filter(|m| !m.trim().is_empty())
        .unwrap_or_else(|| defaults.default_model.clone());

    let total = request.shots.len();
    let mut submission = Submission::new(
        request.shots,
        SequenceSource::Create {
            reference_image: reference_image.clone(),
        },
        GenerationOptions { quality, model },
    );
    if let Some(path) = reference_image {
        submission = submission.with_cleanup(path);
    }

    let job_id = state.runner.submit(submission)?;
    info!(uid = %user.uid, job_id = %job_id, shots = total, "Sequence generation accepted");

    Ok(JobAccepted::new(job_id, total))
}

async fn read_multipart(state: &AppState, mut multipart: Multipart) -> ApiResult<ParsedGenerate> {
    let mut shots_json: Option<String> = None;
    let mut quality: Option<String> = None;
    let mut model: Option<String> = None;
    let mut reference_image: Option<PathBuf> = None;

    let read: ApiResult<()> = async {
        while let Some(field) = multipart
            .next_field()
            .await
            .map_err(|e| ApiError::bad_request(e.body_text()))?
        {
            let name = field.name().unwrap_or_default().to_string();
            match name.as_str() {
                "shots" => shots_json = Some(field_text(field).await?),
                "quality" => quality = Some(field_text(field).await?),
                "model" => model = Some(field_text(field).await?),
                REFERENCE_IMAGE_FIELD => {
                    let file_name = field.file_name().unwrap_or_default().to_string();
                    let data = field
                        .bytes()
                        .await
                        .map_err(|e| ApiError::bad_request(e.body_text()))?;
                    if file_name.is_empty() || data.is_empty() {
                        continue;
                    }
                    reference_image = Some(save_upload(state, &file_name, &data).await?);
                }
                other if other.starts_with("image_") => {
                    // Only shot 1 can carry a reference image.
                    debug!("Ignoring upload field {}", other);
                }
                _ => {}
            }
        }
        Ok(())
    }
    .await;

    let shots = read.and_then(|_| parse_shots(shots_json.as_deref()));
    match shots {
        Ok(shots) => Ok(ParsedGenerate {
            request: GenerateRequest { shots, quality, model },
            reference_image,
        }),
        Err(e) => {
            if let Some(path) = &reference_image {
                remove_upload(path).await;
            }
            Err(e)
        }
    }
}

async fn field_text(field: axum::extract::multipart::Field<'_>) -> ApiResult<String> {
    field.text().await.map_err(|e| ApiError::bad_request(e.body_text()))
}

fn parse_shots(raw: Option<&str>) -> ApiResult<Vec<Shot>> {
    match raw.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => serde_json::from_str(raw)
            .map_err(|e| ApiError::bad_request(format!("Invalid shots JSON: {}", e))),
        None => Ok(Vec::new()),
    }
}

async fn save_upload(state: &AppState, file_name: &str, data: &[u8]) -> ApiResult<PathBuf> {
    let temp_dir = &state.config.temp_dir;
    let path = upload_path(temp_dir, file_name)
        .ok_or_else(|| ApiError::bad_request("Invalid reference image file name"))?;

    tokio::fs::create_dir_all(temp_dir)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to create upload directory: {}", e)))?;
    tokio::fs::write(&path, data)
        .await
        .map_err(|e| ApiError::internal(format!("Failed to store upload: {}", e)))?;

    debug!("Stored reference image at {}", path.display());
    Ok(path)
}

/// POST /api/remix
///
/// Continues an existing remote video. Every prompt uses continuation
/// phrasing, including the first submitted shot.
pub async fn remix(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<RemixRequest>,
) -> ApiResult<(StatusCode, Json<JobAccepted>)> {
    validate_shot_count(request.shots.len())?;
    request.validate()?;
    if !is_valid_video_id(&request.video_id) {
        return Err(ApiError::validation("Invalid video_id"));
    }

    let defaults = state.runner.config();
    let total = request.shots.len();
    let submission = Submission::new(
        request.shots,
        SequenceSource::Remix {
            source_video_id: request.video_id.clone(),
        },
        GenerationOptions {
            quality: defaults.default_quality,
            model: defaults.default_model.clone(),
        },
    );

    let job_id = state.runner.submit(submission)?;
    info!(
        uid = %user.uid,
        job_id = %job_id,
        source = %request.video_id,
        shots = total,
        "Remix sequence accepted"
    );

    Ok((StatusCode::ACCEPTED, Json(JobAccepted::new(job_id, total))))
}

/// GET /api/result/:job_id
///
/// Idempotent read of the stored result. 404 until the job finishes.
pub async fn get_result(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<SequenceResult>> {
    if !is_valid_sequence_id(&job_id) {
        return Err(ApiError::bad_request("Invalid job ID"));
    }
    let job_id = JobId::from_string(job_id);

    match state.registry.result(&job_id).await? {
        Some(result) => Ok(Json(result)),
        None if state.runner.is_job_active(&job_id) => {
            Err(ApiError::not_found(format!("Job {} is still running", job_id)))
        }
        None => Err(ApiError::not_found(format!("No result for job {}", job_id))),
    }
}

#[derive(Debug, Serialize)]
pub struct CancelResponse {
    pub job_id: JobId,
    pub cancelled: bool,
}

/// POST /api/jobs/:job_id/cancel
pub async fn cancel_job(
    State(state): State<AppState>,
    user: AuthUser,
    Path(job_id): Path<String>,
) -> ApiResult<Json<CancelResponse>> {
    if !is_valid_sequence_id(&job_id) {
        return Err(ApiError::bad_request("Invalid job ID"));
    }
    let job_id = JobId::from_string(job_id);

    if !state.runner.cancel(&job_id) {
        return Err(ApiError::not_found(format!("Job {} is not running", job_id)));
    }
    info!(uid = %user.uid, job_id = %job_id, "Job cancellation requested");

    Ok(Json(CancelResponse {
        job_id,
        cancelled: true,
    }))
}

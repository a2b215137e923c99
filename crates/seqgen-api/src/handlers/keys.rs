//! API key management handlers.

use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::info;

use seqgen_video_client::KeyStatus;

use crate::auth::AuthUser;
use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// GET /api/check-key
pub async fn check_key(State(state): State<AppState>) -> Json<KeyStatus> {
    Json(state.keys.status().await)
}

#[derive(Debug, Deserialize)]
pub struct SetKeyRequest {
    #[serde(default)]
    pub api_key: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SetKeyResponse {
    pub success: bool,
    pub message: String,
}

/// POST /api/set-key
///
/// Persists the key to the config file. The next job picks it up without a
/// restart; an `OPENAI_API_KEY` in the environment still takes precedence.
pub async fn set_key(
    State(state): State<AppState>,
    user: AuthUser,
    Json(request): Json<SetKeyRequest>,
) -> ApiResult<Json<SetKeyResponse>> {
    let api_key = request
        .api_key
        .as_deref()
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .ok_or_else(|| ApiError::bad_request("API key is required"))?;

    state.keys.save(api_key).await?;
    info!(uid = %user.uid, "API key updated at {}", state.keys.config_path().display());

    Ok(Json(SetKeyResponse {
        success: true,
        message: "API key saved successfully".to_string(),
    }))
}

//! Video client error types.

use thiserror::Error;

pub type VideoClientResult<T> = Result<T, VideoClientError>;

#[derive(Debug, Error)]
pub enum VideoClientError {
    #[error("API key not configured or is empty")]
    MissingApiKey,

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Video {video_id} failed: {message}")]
    GenerationFailed { video_id: String, message: String },

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Timeout after {0} seconds")]
    Timeout(u64),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl VideoClientError {
    pub fn api(status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            message: message.into(),
        }
    }

    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        match self {
            VideoClientError::Timeout(_) | VideoClientError::Network(_) => true,
            VideoClientError::Api { status, .. } => *status == 429 || *status >= 500,
            _ => false,
        }
    }
}

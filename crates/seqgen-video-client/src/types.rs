//! Remote video service request/response types.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use seqgen_models::VideoSize;

/// Lifecycle of a remote video job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VideoJobStatus {
    Queued,
    InProgress,
    Completed,
    Failed,
    #[serde(other)]
    Unknown,
}

impl VideoJobStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VideoJobStatus::Queued => "queued",
            VideoJobStatus::InProgress => "in_progress",
            VideoJobStatus::Completed => "completed",
            VideoJobStatus::Failed => "failed",
            VideoJobStatus::Unknown => "unknown",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, VideoJobStatus::Completed | VideoJobStatus::Failed)
    }
}

/// Error object attached to a failed video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoJobError {
    #[serde(default)]
    pub code: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Remote video handle as returned by create, remix and retrieve.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoJob {
    pub id: String,
    pub status: VideoJobStatus,
    /// Render progress (0-100)
    #[serde(default)]
    pub progress: Option<f64>,
    #[serde(default)]
    pub model: Option<String>,
    #[serde(default)]
    pub size: Option<String>,
    #[serde(default)]
    pub seconds: Option<String>,
    #[serde(default)]
    pub remixed_from_video_id: Option<String>,
    #[serde(default)]
    pub error: Option<VideoJobError>,
}

impl VideoJob {
    /// Provider failure text, if the job failed.
    pub fn failure_message(&self) -> String {
        self.error
            .as_ref()
            .and_then(|e| e.message.clone().or_else(|| e.code.clone()))
            .unwrap_or_else(|| "Video generation failed".to_string())
    }
}

/// Parameters of a create call.
///
/// Remix calls never take these; they inherit everything from the source video.
#[derive(Debug, Clone)]
pub struct CreateVideoParams {
    pub model: String,
    pub prompt: String,
    pub size: VideoSize,
    pub seconds: u32,
    /// Reference image for the first frame
    pub input_reference: Option<PathBuf>,
}

/// Short status view of a remote video.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RemoteStatus {
    pub status: String,
    pub progress: f64,
}

impl From<&VideoJob> for RemoteStatus {
    fn from(job: &VideoJob) -> Self {
        Self {
            status: job.status.as_str().to_string(),
            progress: job.progress.unwrap_or(0.0),
        }
    }
}

/// A video saved locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadedVideo {
    /// Remote video identifier
    pub id: String,
    pub local_path: PathBuf,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_job_deserialize() {
        let job: VideoJob = serde_json::from_str(
            r#"{"id":"video_1","object":"video","status":"in_progress","progress":42,"model":"sora-2-pro"}"#,
        )
        .unwrap();
        assert_eq!(job.status, VideoJobStatus::InProgress);
        assert_eq!(job.progress, Some(42.0));
        assert_eq!(RemoteStatus::from(&job).status, "in_progress");
    }

    #[test]
    fn test_unknown_status_does_not_fail() {
        let job: VideoJob = serde_json::from_str(r#"{"id":"v","status":"cancelled"}"#).unwrap();
        assert_eq!(job.status, VideoJobStatus::Unknown);
        assert!(!job.status.is_terminal());
    }

    #[test]
    fn test_failure_message() {
        let job: VideoJob = serde_json::from_str(
            r#"{"id":"v","status":"failed","error":{"code":"moderation_blocked","message":"Blocked by moderation"}}"#,
        )
        .unwrap();
        assert_eq!(job.failure_message(), "Blocked by moderation");
    }
}

//! Waiting for remote videos and saving them locally.

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{debug, info};

use crate::client::VideoService;
use crate::error::{VideoClientError, VideoClientResult};
use crate::types::{DownloadedVideo, VideoJob, VideoJobStatus};

/// Progress callback: `(percent, status)`.
pub type ProgressCallback = Arc<dyn Fn(f64, &str) + Send + Sync>;

/// Saves a remote video once it is ready.
#[async_trait]
pub trait Downloader: Send + Sync {
    /// Wait for `video` to finish and write it to `{output_dir}/{base_name}.mp4`.
    async fn download(
        &self,
        video: &VideoJob,
        output_dir: &Path,
        base_name: &str,
        progress: Option<ProgressCallback>,
    ) -> VideoClientResult<DownloadedVideo>;
}

/// Polls `retrieve` until the video completes, then streams its content.
pub struct PollingDownloader {
    service: Arc<dyn VideoService>,
    poll_interval: Duration,
}

impl PollingDownloader {
    pub fn new(service: Arc<dyn VideoService>, poll_interval: Duration) -> Self {
        Self {
            service,
            poll_interval,
        }
    }

    async fn wait_until_done(
        &self,
        video: &VideoJob,
        progress: Option<&ProgressCallback>,
    ) -> VideoClientResult<VideoJob> {
        let mut current = video.clone();
        loop {
            if let (Some(cb), Some(pct)) = (progress, current.progress) {
                cb(pct, current.status.as_str());
            }

            match current.status {
                VideoJobStatus::Completed => return Ok(current),
                VideoJobStatus::Failed => {
                    return Err(VideoClientError::GenerationFailed {
                        message: current.failure_message(),
                        video_id: current.id,
                    })
                }
                status => {
                    debug!(video_id = %current.id, status = status.as_str(), "Video not ready yet");
                }
            }

            tokio::time::sleep(self.poll_interval).await;
            current = self.service.retrieve(&video.id).await?;
        }
    }
}

#[async_trait]
impl Downloader for PollingDownloader {
    async fn download(
        &self,
        video: &VideoJob,
        output_dir: &Path,
        base_name: &str,
        progress: Option<ProgressCallback>,
    ) -> VideoClientResult<DownloadedVideo> {
        let finished = self.wait_until_done(video, progress.as_ref()).await?;

        if let Some(cb) = &progress {
            cb(100.0, "downloading");
        }

        let local_path = output_dir.join(format!("{}.mp4", base_name));
        let bytes = self.service.write_content(&finished.id, &local_path).await?;
        info!(video_id = %finished.id, bytes, "Downloaded video to {}", local_path.display());

        Ok(DownloadedVideo {
            id: finished.id,
            local_path,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::VideoClientConfig;
    use crate::keys::ApiKeyStore;
    use crate::HttpVideoClient;
    use serde_json::json;
    use std::sync::Mutex;
    use tempfile::TempDir;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn service_for(server: &MockServer) -> Arc<dyn VideoService> {
        let config = VideoClientConfig::default().with_base_url(server.uri());
        let keys = Arc::new(ApiKeyStore::new("/nonexistent/config.json").with_env_key(Some("sk-test".into())));
        Arc::new(HttpVideoClient::new(config, keys).unwrap())
    }

    fn job(status: VideoJobStatus, progress: f64) -> VideoJob {
        serde_json::from_value(json!({
            "id": "video_1",
            "status": status.as_str(),
            "progress": progress,
        }))
        .unwrap()
    }

    #[tokio::test]
    async fn test_download_polls_until_completed() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/videos/video_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "video_1", "status": "in_progress", "progress": 60
            })))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/videos/video_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "id": "video_1", "status": "completed", "progress": 100
            })))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/videos/video_1/content"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(b"mp4".to_vec()))
            .mount(&server)
            .await;

        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let callback: ProgressCallback = Arc::new(move |pct, status| {
            sink.lock().unwrap().push((pct, status.to_string()));
        });

        let dir = TempDir::new().unwrap();
        let downloader = PollingDownloader::new(service_for(&server), Duration::from_millis(5));
        let downloaded = downloader
            .download(&job(VideoJobStatus::Queued, 0.0), dir.path(), "shot_1", Some(callback))
            .await
            .unwrap();

        assert_eq!(downloaded.id, "video_1");
        assert_eq!(downloaded.local_path, dir.path().join("shot_1.mp4"));
        assert_eq!(std::fs::read(&downloaded.local_path).unwrap(), b"mp4");

        let seen = seen.lock().unwrap();
        let percents: Vec<f64> = seen.iter().map(|(p, _)| *p).collect();
        assert_eq!(percents, vec![0.0, 60.0, 100.0, 100.0]);
        assert_eq!(seen.last().unwrap().1, "downloading");
    }

    #[tokio::test]
    async fn test_failed_video_is_reported() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let downloader = PollingDownloader::new(service_for(&server), Duration::from_millis(5));

        let failed: VideoJob = serde_json::from_value(json!({
            "id": "video_9",
            "status": "failed",
            "error": { "message": "billing_hard_limit_reached" }
        }))
        .unwrap();

        let err = downloader
            .download(&failed, dir.path(), "shot_1", None)
            .await
            .unwrap_err();

        assert!(matches!(err, VideoClientError::GenerationFailed { .. }));
        assert!(err.to_string().contains("billing_hard_limit_reached"));
        assert!(!dir.path().join("shot_1.mp4").exists());
    }
}

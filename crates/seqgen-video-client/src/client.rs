//! HTTP client for the remote video-generation service.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::Deserialize;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tracing::{debug, info, warn};

use crate::config::VideoClientConfig;
use crate::error::{VideoClientError, VideoClientResult};
use crate::keys::ApiKeyStore;
use crate::types::{CreateVideoParams, VideoJob};

/// Remote video-generation operations.
#[async_trait]
pub trait VideoService: Send + Sync {
    /// Start a new video.
    async fn create(&self, params: &CreateVideoParams) -> VideoClientResult<VideoJob>;

    /// Continue an existing video with a new prompt.
    async fn remix(&self, video_id: &str, prompt: &str) -> VideoClientResult<VideoJob>;

    /// Fetch the current state of a video.
    async fn retrieve(&self, video_id: &str) -> VideoClientResult<VideoJob>;

    /// Stream a finished video's MP4 bytes into `dest`. Returns bytes written.
    async fn write_content(&self, video_id: &str, dest: &Path) -> VideoClientResult<u64>;
}

#[derive(Debug, Deserialize)]
struct ApiErrorBody {
    error: ApiErrorDetail,
}

#[derive(Debug, Deserialize)]
struct ApiErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    code: Option<String>,
}

/// `VideoService` over the `/videos` REST API.
pub struct HttpVideoClient {
    http: Client,
    config: VideoClientConfig,
    keys: Arc<ApiKeyStore>,
}

impl HttpVideoClient {
    pub fn new(config: VideoClientConfig, keys: Arc<ApiKeyStore>) -> VideoClientResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(VideoClientError::Network)?;

        Ok(Self { http, config, keys })
    }

    /// Create from environment variables.
    pub fn from_env() -> VideoClientResult<Self> {
        let config = VideoClientConfig::from_env();
        let keys = Arc::new(ApiKeyStore::from_config(&config));
        Self::new(config, keys)
    }

    pub fn config(&self) -> &VideoClientConfig {
        &self.config
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
    }

    /// Map a non-success response to an API error carrying the provider text.
    async fn check(response: Response) -> VideoClientResult<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ApiErrorBody>(&body)
            .ok()
            .and_then(|b| b.error.message.or(b.error.code))
            .unwrap_or(body);

        Err(VideoClientError::api(status.as_u16(), message))
    }

    async fn send_json(&self, request: reqwest::RequestBuilder) -> VideoClientResult<VideoJob> {
        let response = request.send().await?;
        let response = Self::check(response).await?;
        let body = response.text().await?;
        serde_json::from_str(&body)
            .map_err(|e| VideoClientError::InvalidResponse(format!("{}: {}", e, body)))
    }

    async fn create_form(params: &CreateVideoParams) -> VideoClientResult<Form> {
        let mut form = Form::new()
            .text("model", params.model.clone())
            .text("prompt", params.prompt.clone())
            .text("size", params.size.to_string())
            .text("seconds", params.seconds.to_string());

        if let Some(path) = &params.input_reference {
            let bytes = tokio::fs::read(path).await?;
            let file_name = path
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_else(|| "reference.jpg".to_string());
            let part = Part::bytes(bytes)
                .file_name(file_name)
                .mime_str(mime_for(path))?;
            form = form.part("input_reference", part);
        }

        Ok(form)
    }

    /// Execute with retry logic.
    async fn with_retry<F, Fut, T>(&self, operation: F) -> VideoClientResult<T>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = VideoClientResult<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match operation().await {
                Ok(result) => return Ok(result),
                Err(e) if e.is_retryable() && attempt < self.config.max_retries => {
                    let delay = Duration::from_millis(500 * 2u64.pow(attempt));
                    warn!(
                        "Video API request failed (attempt {}), retrying in {:?}: {}",
                        attempt + 1,
                        delay,
                        e
                    );
                    tokio::time::sleep(delay).await;
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| VideoClientError::RequestFailed("Unknown error".to_string())))
    }
}

fn part_path(dest: &Path) -> PathBuf {
    let mut name = dest.as_os_str().to_owned();
    name.push(".part");
    PathBuf::from(name)
}

async fn save_body(response: Response, path: &Path) -> VideoClientResult<u64> {
    let mut file = tokio::fs::File::create(path).await?;
    let mut stream = response.bytes_stream();
    let mut written = 0u64;
    while let Some(chunk) = stream.next().await {
        let chunk = chunk?;
        file.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    file.flush().await?;
    Ok(written)
}

fn mime_for(path: &Path) -> &'static str {
    match path
        .extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
        .as_deref()
    {
        Some("png") => "image/png",
        Some("webp") => "image/webp",
        _ => "image/jpeg",
    }
}

#[async_trait]
impl VideoService for HttpVideoClient {
    async fn create(&self, params: &CreateVideoParams) -> VideoClientResult<VideoJob> {
        let key = self.keys.load().await?;
        let url = self.url("/videos");
        debug!(model = %params.model, size = %params.size, "Creating video");

        // Not idempotent: sent once, never retried.
        let form = Self::create_form(params).await?;
        let job = self
            .send_json(self.http.post(&url).bearer_auth(&key).multipart(form))
            .await?;

        info!(video_id = %job.id, "Video created");
        Ok(job)
    }

    async fn remix(&self, video_id: &str, prompt: &str) -> VideoClientResult<VideoJob> {
        let key = self.keys.load().await?;
        let url = self.url(&format!("/videos/{}/remix", video_id));
        let body = json!({ "prompt": prompt });

        let job = self
            .send_json(self.http.post(&url).bearer_auth(&key).json(&body))
            .await?;

        info!(video_id = %job.id, source_video_id = %video_id, "Video remix started");
        Ok(job)
    }

    async fn retrieve(&self, video_id: &str) -> VideoClientResult<VideoJob> {
        let key = self.keys.load().await?;
        let url = self.url(&format!("/videos/{}", video_id));

        self.with_retry(|| async { self.send_json(self.http.get(&url).bearer_auth(&key)).await })
            .await
    }

    async fn write_content(&self, video_id: &str, dest: &Path) -> VideoClientResult<u64> {
        let key = self.keys.load().await?;
        let url = self.url(&format!("/videos/{}/content", video_id));

        let response = self
            .with_retry(|| async {
                let response = self.http.get(&url).bearer_auth(&key).send().await?;
                Self::check(response).await
            })
            .await?;

        if let Some(parent) = dest.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        // Only a complete download ever appears under `dest`.
        let part = part_path(dest);
        let saved = match save_body(response, &part).await {
            Ok(written) => tokio::fs::rename(&part, dest).await.map(|_| written).map_err(Into::into),
            Err(e) => Err(e),
        };
        let written = match saved {
            Ok(written) => written,
            Err(e) => {
                if let Err(rm) = tokio::fs::remove_file(&part).await {
                    debug!("Failed to remove {}: {}", part.display(), rm);
                }
                return Err(e);
            }
        };

        debug!(video_id = %video_id, bytes = written, "Video content saved to {}", dest.display());
        Ok(written)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqgen_models::VideoSize;
    use tempfile::TempDir;
    use wiremock::matchers::{body_json, body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client_for(server: &MockServer) -> HttpVideoClient {
        let config = VideoClientConfig::default().with_base_url(server.uri());
        let keys = Arc::new(ApiKeyStore::new("/nonexistent/config.json").with_env_key(Some("sk-test".into())));
        HttpVideoClient::new(config, keys).unwrap()
    }

    fn video(id: &str, status: &str) -> serde_json::Value {
        json!({ "id": id, "object": "video", "status": status, "progress": 0 })
    }

    #[tokio::test]
    async fn test_create_sends_generation_params() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/videos"))
            .and(header("authorization", "Bearer sk-test"))
            .and(body_string_contains("sora-2-pro"))
            .and(body_string_contains("1024x1792"))
            .respond_with(ResponseTemplate::new(200).set_body_json(video("video_1", "queued")))
            .expect(1)
            .mount(&server)
            .await;

        let job = client_for(&server)
            .create(&CreateVideoParams {
                model: "sora-2-pro".into(),
                prompt: "A diner".into(),
                size: VideoSize::default(),
                seconds: 12,
                input_reference: None,
            })
            .await
            .unwrap();

        assert_eq!(job.id, "video_1");
    }

    #[tokio::test]
    async fn test_remix_sends_only_prompt() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/videos/video_1/remix"))
            .and(body_json(json!({ "prompt": "only change the dialog" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(video("video_2", "queued")))
            .expect(1)
            .mount(&server)
            .await;

        let job = client_for(&server)
            .remix("video_1", "only change the dialog")
            .await
            .unwrap();
        assert_eq!(job.id, "video_2");
    }

    #[tokio::test]
    async fn test_create_is_not_resent_after_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/videos"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server)
            .create(&CreateVideoParams {
                model: "sora-2".into(),
                prompt: "A diner".into(),
                size: VideoSize::default(),
                seconds: 12,
                input_reference: None,
            })
            .await
            .unwrap_err();
        assert!(matches!(err, VideoClientError::Api { status: 502, .. }));
    }

    #[tokio::test]
    async fn test_remix_is_not_resent_after_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/videos/video_1/remix"))
            .respond_with(ResponseTemplate::new(503))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server).remix("video_1", "again").await.unwrap_err();
        assert!(matches!(err, VideoClientError::Api { status: 503, .. }));
    }

    #[tokio::test]
    async fn test_retrieve_retries_server_errors() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/videos/video_1"))
            .respond_with(ResponseTemplate::new(502))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/videos/video_1"))
            .respond_with(ResponseTemplate::new(200).set_body_json(video("video_1", "in_progress")))
            .expect(1)
            .mount(&server)
            .await;

        let job = client_for(&server).retrieve("video_1").await.unwrap();
        assert_eq!(job.id, "video_1");
    }

    #[tokio::test]
    async fn test_api_error_carries_provider_message() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/videos/video_1"))
            .respond_with(ResponseTemplate::new(401).set_body_json(json!({
                "error": { "message": "Incorrect API key provided", "code": "invalid_api_key" }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let err = client_for(&server).retrieve("video_1").await.unwrap_err();
        match err {
            VideoClientError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "Incorrect API key provided");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_write_content_streams_to_file() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/videos/video_1/content"))
            .respond_with(ResponseTemplate::new(200).set_body_bytes(vec![7u8; 4096]))
            .mount(&server)
            .await;

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("seq").join("shot_1.mp4");
        let written = client_for(&server)
            .write_content("video_1", &dest)
            .await
            .unwrap();

        assert_eq!(written, 4096);
        assert_eq!(std::fs::metadata(&dest).unwrap().len(), 4096);
        assert!(!part_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_truncated_download_leaves_no_file() {
        use tokio::io::AsyncReadExt;
        use tokio::net::TcpListener;

        // Promise 8 KiB, send 100 bytes, then hang up.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = [0u8; 4096];
            let _ = socket.read(&mut buf).await;
            let head = "HTTP/1.1 200 OK\r\ncontent-type: video/mp4\r\ncontent-length: 8192\r\n\r\n";
            socket.write_all(head.as_bytes()).await.unwrap();
            socket.write_all(&[7u8; 100]).await.unwrap();
            socket.flush().await.unwrap();
        });

        let config = VideoClientConfig::default().with_base_url(format!("http://{}", addr));
        let keys = Arc::new(ApiKeyStore::new("/nonexistent/config.json").with_env_key(Some("sk-test".into())));
        let client = HttpVideoClient::new(config, keys).unwrap();

        let dir = TempDir::new().unwrap();
        let dest = dir.path().join("shot_1.mp4");
        assert!(client.write_content("video_1", &dest).await.is_err());

        assert!(!dest.exists());
        assert!(!part_path(&dest).exists());
    }

    #[tokio::test]
    async fn test_missing_key_fails_before_request() {
        let server = MockServer::start().await;
        let dir = TempDir::new().unwrap();
        let keys = Arc::new(ApiKeyStore::new(dir.path().join("config.json")));
        let client = HttpVideoClient::new(
            VideoClientConfig::default().with_base_url(server.uri()),
            keys,
        )
        .unwrap();

        let err = client.retrieve("video_1").await.unwrap_err();
        assert!(matches!(err, VideoClientError::MissingApiKey));
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for(Path::new("a.PNG")), "image/png");
        assert_eq!(mime_for(Path::new("a.jpg")), "image/jpeg");
    }
}

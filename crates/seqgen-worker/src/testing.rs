//! In-process fakes for job and runner tests.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use seqgen_media::{ImageResizer, MediaResult};
use seqgen_models::{JobId, ProgressEvent, VideoSize};
use seqgen_queue::{JobRegistry, StreamItem};
use seqgen_video_client::{
    CreateVideoParams, PollingDownloader, VideoClientError, VideoClientResult, VideoJob,
    VideoJobStatus, VideoService,
};

use crate::job::JobServices;

#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create { prompt: String, size: String, model: String, seconds: u32, reference: Option<PathBuf> },
    Remix { source: String, prompt: String },
}

/// Scriptable video service.
#[derive(Default)]
pub struct FakeVideoService {
    pub calls: Mutex<Vec<Call>>,
    pub(crate) counter: AtomicUsize,
    /// Fail the remix of this 1-based call number with the given provider text
    pub fail_call: Option<(usize, String)>,
    pub hang: bool,
    pub panic_on_create: bool,
}

impl FakeVideoService {
    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    async fn next_video(&self) -> VideoClientResult<VideoJob> {
        let n = self.counter.fetch_add(1, Ordering::SeqCst) + 1;
        if self.hang {
            std::future::pending::<()>().await;
        }
        if let Some((call, message)) = &self.fail_call {
            if *call == n {
                return Err(VideoClientError::api(400, message.clone()));
            }
        }
        Ok(video(&format!("video_{}", n), VideoJobStatus::Queued, 0.0))
    }
}

pub fn video(id: &str, status: VideoJobStatus, progress: f64) -> VideoJob {
    VideoJob {
        id: id.to_string(),
        status,
        progress: Some(progress),
        model: None,
        size: None,
        seconds: None,
        remixed_from_video_id: None,
        error: None,
    }
}

#[async_trait]
impl VideoService for FakeVideoService {
    async fn create(&self, params: &CreateVideoParams) -> VideoClientResult<VideoJob> {
        if self.panic_on_create {
            panic!("progress emission defect");
        }
        self.calls.lock().unwrap().push(Call::Create {
            prompt: params.prompt.clone(),
            size: params.size.to_string(),
            model: params.model.clone(),
            seconds: params.seconds,
            reference: params.input_reference.clone(),
        });
        self.next_video().await
    }

    async fn remix(&self, video_id: &str, prompt: &str) -> VideoClientResult<VideoJob> {
        self.calls.lock().unwrap().push(Call::Remix {
            source: video_id.to_string(),
            prompt: prompt.to_string(),
        });
        self.next_video().await
    }

    async fn retrieve(&self, video_id: &str) -> VideoClientResult<VideoJob> {
        Ok(video(video_id, VideoJobStatus::Completed, 100.0))
    }

    async fn write_content(&self, _video_id: &str, dest: &Path) -> VideoClientResult<u64> {
        tokio::fs::write(dest, b"mp4").await?;
        Ok(3)
    }
}

/// Resizer that records calls and returns a `.jpg` sibling path.
#[derive(Default)]
pub struct FakeResizer {
    pub calls: Mutex<Vec<(PathBuf, VideoSize)>>,
}

#[async_trait]
impl ImageResizer for FakeResizer {
    async fn resize(&self, path: &Path, size: VideoSize) -> MediaResult<PathBuf> {
        self.calls.lock().unwrap().push((path.to_path_buf(), size));
        Ok(path.with_extension("jpg"))
    }
}

pub fn services(video: Arc<FakeVideoService>, resizer: Arc<FakeResizer>) -> JobServices {
    JobServices {
        downloader: Arc::new(PollingDownloader::new(video.clone(), Duration::from_millis(1))),
        video,
        resizer,
    }
}

/// Read every event until the sentinel.
pub async fn drain(registry: &JobRegistry, job_id: &JobId) -> Vec<ProgressEvent> {
    let mut sub = registry
        .subscribe(job_id, Duration::from_millis(50))
        .expect("channel should exist");
    let mut events = Vec::new();
    while let Some(item) = sub.next().await {
        if let StreamItem::Event(event) = item {
            events.push(event);
        }
    }
    events
}

pub fn kinds(events: &[ProgressEvent]) -> Vec<&'static str> {
    events.iter().map(|e| e.event_type().as_str()).collect()
}

//! Application state.

use std::sync::Arc;
use std::time::Duration;

use seqgen_media::{ImageResizer, JpegResizer, Stitcher};
use seqgen_queue::{JobRegistry, QueueConfig};
use seqgen_video_client::{ApiKeyStore, HttpVideoClient, PollingDownloader, VideoClientConfig, VideoService};
use seqgen_worker::{JobServices, TaskRunner, WorkerConfig};
use tracing::{info, warn};

use crate::auth::JwksCache;
use crate::config::ApiConfig;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    pub config: ApiConfig,
    pub registry: JobRegistry,
    pub runner: TaskRunner,
    pub keys: Arc<ApiKeyStore>,
    pub video: Arc<dyn VideoService>,
    pub stitcher: Arc<Stitcher>,
    /// Present when token verification is enabled
    pub jwks: Option<Arc<JwksCache>>,
}

impl AppState {
    /// Create application state from the environment.
    pub async fn new(config: ApiConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let client_config = VideoClientConfig::from_env();
        let keys = Arc::new(ApiKeyStore::from_config(&client_config));
        let poll_interval = client_config.poll_interval;
        let video: Arc<dyn VideoService> = Arc::new(HttpVideoClient::new(client_config, Arc::clone(&keys))?);

        let queue_config = QueueConfig::from_env()?;
        let registry = JobRegistry::from_config(&queue_config)?;
        registry.spawn_channel_reaper(queue_config.channel_retention);

        let mut worker_config = WorkerConfig::from_env();
        worker_config.output_dir = config.output_dir.clone();

        let services = JobServices {
            video: Arc::clone(&video),
            downloader: Arc::new(PollingDownloader::new(Arc::clone(&video), poll_interval)),
            resizer: Arc::new(JpegResizer::default()) as Arc<dyn ImageResizer>,
        };
        let runner = TaskRunner::new(worker_config, registry.clone(), services);

        let jwks = match &config.firebase_project_id {
            Some(project_id) => {
                let cache = JwksCache::new(project_id.clone())?;
                match cache.refresh_keys().await {
                    Ok(count) => info!("Loaded {} Firebase signing keys", count),
                    Err(e) => warn!("Initial JWKS fetch failed, will retry on first request: {}", e),
                }
                Some(Arc::new(cache))
            }
            None => {
                warn!("FIREBASE_PROJECT_ID not set; API runs without authentication");
                None
            }
        };

        tokio::fs::create_dir_all(&config.output_dir).await?;
        tokio::fs::create_dir_all(&config.temp_dir).await?;

        Ok(Self::from_parts(config, registry, runner, keys, video).with_jwks(jwks))
    }

    /// Assemble state from already built collaborators.
    pub fn from_parts(
        config: ApiConfig,
        registry: JobRegistry,
        runner: TaskRunner,
        keys: Arc<ApiKeyStore>,
        video: Arc<dyn VideoService>,
    ) -> Self {
        Self {
            config,
            registry,
            runner,
            keys,
            video,
            stitcher: Arc::new(Stitcher::new().with_timeout(600)),
            jwks: None,
        }
    }

    pub fn with_jwks(mut self, jwks: Option<Arc<JwksCache>>) -> Self {
        self.jwks = jwks;
        self
    }

    pub fn with_stitcher(mut self, stitcher: Stitcher) -> Self {
        self.stitcher = Arc::new(stitcher);
        self
    }

    /// Cancel running jobs and wait for them to publish their results.
    pub async fn shutdown(&self, grace: Duration) {
        let cancelled = self.runner.cancel_all();
        if cancelled > 0 {
            info!("Cancelling {} job(s) for shutdown", cancelled);
        }
        if !self.runner.wait_idle(grace).await {
            warn!("{} job(s) still running after {:?}", self.runner.active_jobs(), grace);
        }
    }
}

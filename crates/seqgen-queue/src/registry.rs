//! Job registry: live progress channels plus stored results.

use std::sync::Arc;
use std::time::Duration;

use seqgen_models::{JobId, SequenceResult};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::channel::{ChannelRegistry, ProgressSender, ProgressSubscription};
use crate::config::{QueueConfig, StoreBackend};
use crate::error::QueueResult;
use crate::store::{InMemoryResultStore, RedisResultStore, ResultStore};

/// Shared registry injected into the task runner and the HTTP handlers.
///
/// Channel entries live from job launch until the stream reader sees the
/// sentinel, or until the channel reaper drops a finished channel nobody
/// read. Result entries are written once per job and are never removed
/// automatically.
#[derive(Clone)]
pub struct JobRegistry {
    channels: Arc<ChannelRegistry>,
    results: Arc<dyn ResultStore>,
}

impl JobRegistry {
    pub fn new(results: Arc<dyn ResultStore>) -> Self {
        Self {
            channels: Arc::new(ChannelRegistry::new()),
            results,
        }
    }

    /// Registry backed by process memory.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryResultStore::new()))
    }

    /// Build the registry for the configured backend.
    pub fn from_config(config: &QueueConfig) -> QueueResult<Self> {
        let results: Arc<dyn ResultStore> = match config.backend {
            StoreBackend::Memory => {
                if config.result_ttl.is_some() {
                    warn!("RESULT_TTL_SECS is ignored by the in-memory result store");
                }
                Arc::new(InMemoryResultStore::new())
            }
            StoreBackend::Redis => Arc::new(RedisResultStore::new(
                &config.redis_url,
                config.key_prefix.clone(),
                config.result_ttl,
            )?),
        };
        info!("Job registry using {:?} result store", config.backend);
        Ok(Self::new(results))
    }

    /// Register a new job's channel.
    pub fn open_channel(&self, job_id: &JobId) -> ProgressSender {
        self.channels.open(job_id)
    }

    /// Attach the single stream reader for a job.
    pub fn subscribe(&self, job_id: &JobId, keepalive: Duration) -> QueueResult<ProgressSubscription> {
        self.channels.subscribe(job_id, keepalive)
    }

    pub fn has_channel(&self, job_id: &JobId) -> bool {
        self.channels.contains(job_id)
    }

    pub fn channel_count(&self) -> usize {
        self.channels.len()
    }

    /// Drop finished channels that no reader picked up within `retention`.
    pub fn sweep_channels(&self, retention: Duration) -> usize {
        self.channels.sweep(retention)
    }

    /// Periodically sweep unread channels. Must be called inside a runtime.
    pub fn spawn_channel_reaper(&self, retention: Duration) -> JoinHandle<()> {
        let channels = Arc::clone(&self.channels);
        let period = retention.max(Duration::from_secs(1));
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(period);
            loop {
                ticker.tick().await;
                let removed = channels.sweep(retention);
                if removed > 0 {
                    info!("Dropped {} unread progress channel(s)", removed);
                }
            }
        })
    }

    pub async fn store_result(&self, result: &SequenceResult) -> QueueResult<()> {
        self.results.put(result).await
    }

    pub async fn result(&self, job_id: &JobId) -> QueueResult<Option<SequenceResult>> {
        self.results.get(job_id).await
    }

    /// Stored results; grows with every finished job.
    pub async fn result_count(&self) -> QueueResult<usize> {
        self.results.len().await
    }

    pub async fn ping(&self) -> QueueResult<()> {
        self.results.ping().await
    }
}

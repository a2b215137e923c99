//! Worker configuration.

use std::path::PathBuf;
use std::time::Duration;

use seqgen_models::{VideoSize, DEFAULT_MODEL};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Maximum jobs running at once
    pub max_concurrent_jobs: usize,
    /// Maximum jobs admitted but waiting for a slot
    pub max_queued_jobs: usize,
    /// Deadline for each remote call (create, remix, render + download)
    pub remote_call_timeout: Duration,
    /// Deadline for a whole job once it starts running
    pub job_timeout: Duration,
    /// Root directory for per-sequence output folders
    pub output_dir: PathBuf,
    /// Size used when a request does not specify one
    pub default_quality: VideoSize,
    /// Model used when a request does not specify one
    pub default_model: String,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            max_concurrent_jobs: 2,
            max_queued_jobs: 8,
            remote_call_timeout: Duration::from_secs(900),
            job_timeout: Duration::from_secs(3600), // 1 hour
            output_dir: PathBuf::from("output"),
            default_quality: VideoSize::default(),
            default_model: DEFAULT_MODEL.to_string(),
        }
    }
}

impl WorkerConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            max_concurrent_jobs: std::env::var("WORKER_MAX_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .filter(|n| *n > 0)
                .unwrap_or(defaults.max_concurrent_jobs),
            max_queued_jobs: std::env::var("WORKER_MAX_QUEUED_JOBS")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.max_queued_jobs),
            remote_call_timeout: Duration::from_secs(
                std::env::var("WORKER_REMOTE_CALL_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(900),
            ),
            job_timeout: Duration::from_secs(
                std::env::var("WORKER_JOB_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(3600),
            ),
            output_dir: std::env::var("OUTPUT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.output_dir),
            default_quality: std::env::var("DEFAULT_QUALITY")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(defaults.default_quality),
            default_model: std::env::var("DEFAULT_MODEL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or(defaults.default_model),
        }
    }

    /// Jobs that may be admitted at once (running plus waiting).
    pub fn admission_capacity(&self) -> usize {
        self.max_concurrent_jobs + self.max_queued_jobs
    }
}

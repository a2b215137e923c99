//! Bounded background task runner.
//!
//! Jobs are admitted synchronously (or rejected when the runner is full),
//! then wait for one of `max_concurrent_jobs` slots. Each running job is
//! bounded by the job deadline, can be cancelled by id, and runs in its own
//! task so a panic becomes an error event instead of a silent stream.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use seqgen_media::remove_upload;
use seqgen_models::{ErrorKind, GenerationOptions, JobId, ProgressEvent, SequenceResult, Shot};
use seqgen_queue::JobRegistry;
use tokio::sync::{watch, Semaphore};
use tracing::{error, info, warn};

use crate::classify::classify_error;
use crate::config::WorkerConfig;
use crate::error::{WorkerError, WorkerResult};
use crate::job::{cancelled, lock, validate_shot_count, GenerationJob, JobServices, ResultSlot, SequenceSource, SequenceSpec};
use crate::metrics;
use crate::sink::ProgressSink;

/// A request to generate a sequence.
#[derive(Debug, Clone)]
pub struct Submission {
    pub shots: Vec<Shot>,
    pub source: SequenceSource,
    pub options: GenerationOptions,
    /// Uploaded files to delete once the job is finished
    pub cleanup: Vec<PathBuf>,
}

impl Submission {
    pub fn new(shots: Vec<Shot>, source: SequenceSource, options: GenerationOptions) -> Self {
        Self {
            shots,
            source,
            options,
            cleanup: Vec::new(),
        }
    }

    pub fn with_cleanup(mut self, path: impl Into<PathBuf>) -> Self {
        self.cleanup.push(path.into());
        self
    }

    fn kind(&self) -> &'static str {
        match self.source {
            SequenceSource::Create { .. } => "generate",
            SequenceSource::Remix { .. } => "remix",
        }
    }
}

struct Inner {
    config: WorkerConfig,
    registry: JobRegistry,
    services: JobServices,
    permits: Arc<Semaphore>,
    admitted: AtomicUsize,
    cancels: Mutex<HashMap<JobId, watch::Sender<bool>>>,
}

impl Inner {
    fn cancels(&self) -> MutexGuard<'_, HashMap<JobId, watch::Sender<bool>>> {
        self.cancels.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Releases the admission slot when a job's driver finishes.
struct Admission<'a> {
    inner: &'a Inner,
    job_id: JobId,
}

impl Drop for Admission<'_> {
    fn drop(&mut self) {
        self.inner.cancels().remove(&self.job_id);
        let remaining = self.inner.admitted.fetch_sub(1, Ordering::SeqCst).saturating_sub(1);
        metrics::set_active_jobs(remaining);
    }
}

/// Runs sequence jobs in the background.
#[derive(Clone)]
pub struct TaskRunner {
    inner: Arc<Inner>,
}

impl TaskRunner {
    pub fn new(config: WorkerConfig, registry: JobRegistry, services: JobServices) -> Self {
        info!(
            "Task runner: {} concurrent, {} queued",
            config.max_concurrent_jobs, config.max_queued_jobs
        );
        Self {
            inner: Arc::new(Inner {
                permits: Arc::new(Semaphore::new(config.max_concurrent_jobs.max(1))),
                config,
                registry,
                services,
                admitted: AtomicUsize::new(0),
                cancels: Mutex::new(HashMap::new()),
            }),
        }
    }

    pub fn config(&self) -> &WorkerConfig {
        &self.inner.config
    }

    pub fn registry(&self) -> &JobRegistry {
        &self.inner.registry
    }

    /// Validate and admit a job, open its progress channel and start it.
    ///
    /// Returns the job id immediately. Must be called inside a Tokio runtime.
    pub fn submit(&self, submission: Submission) -> WorkerResult<JobId> {
        if let Err(e) = validate_shot_count(submission.shots.len()) {
            metrics::record_job_rejected("validation");
            return Err(e);
        }

        let capacity = self.inner.config.admission_capacity();
        let admitted = self
            .inner
            .admitted
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| (n < capacity).then_some(n + 1))
            .map_err(|_| {
                metrics::record_job_rejected("busy");
                warn!("Rejecting job: {} jobs already admitted", capacity);
                WorkerError::Busy(capacity)
            })?;

        let kind = submission.kind();
        let job_id = JobId::new();
        let sink = ProgressSink::new(self.inner.registry.open_channel(&job_id));
        let (cancel_tx, cancel_rx) = watch::channel(false);
        self.inner.cancels().insert(job_id.clone(), cancel_tx);

        let spec = SequenceSpec {
            job_id: job_id.clone(),
            shots: submission.shots,
            source: submission.source,
            options: submission.options,
        };

        metrics::record_job_submitted(kind);
        metrics::set_active_jobs(admitted + 1);
        info!(job_id = %job_id, kind, shots = spec.shots.len(), "Job admitted");

        let inner = Arc::clone(&self.inner);
        tokio::spawn(async move {
            drive(&inner, spec, sink, cancel_rx, submission.cleanup).await;
        });

        Ok(job_id)
    }

    /// Request cancellation. Returns false if the job is not running or queued.
    pub fn cancel(&self, job_id: &JobId) -> bool {
        match self.inner.cancels().get(job_id) {
            Some(tx) => {
                tx.send_replace(true);
                info!(job_id = %job_id, "Cancellation requested");
                true
            }
            None => false,
        }
    }

    /// Cancel every admitted job.
    pub fn cancel_all(&self) -> usize {
        let cancels = self.inner.cancels();
        for tx in cancels.values() {
            tx.send_replace(true);
        }
        cancels.len()
    }

    /// Jobs admitted and not yet finished.
    pub fn active_jobs(&self) -> usize {
        self.inner.admitted.load(Ordering::SeqCst)
    }

    /// Jobs currently holding a slot.
    pub fn running_jobs(&self) -> usize {
        self.inner
            .config
            .max_concurrent_jobs
            .max(1)
            .saturating_sub(self.inner.permits.available_permits())
    }

    pub fn is_job_active(&self, job_id: &JobId) -> bool {
        self.inner.cancels().contains_key(job_id)
    }

    /// Wait for all admitted jobs to finish. Returns false on timeout.
    pub async fn wait_idle(&self, timeout: Duration) -> bool {
        tokio::time::timeout(timeout, async {
            while self.active_jobs() > 0 {
                tokio::time::sleep(Duration::from_millis(25)).await;
            }
        })
        .await
        .is_ok()
    }
}

async fn drive(
    inner: &Inner,
    spec: SequenceSpec,
    sink: ProgressSink,
    mut cancel_rx: watch::Receiver<bool>,
    cleanup: Vec<PathBuf>,
) {
    let _admission = Admission {
        inner,
        job_id: spec.job_id.clone(),
    };
    let started = Instant::now();
    let slot: ResultSlot = Arc::new(Mutex::new(SequenceResult::new(
        spec.job_id.clone(),
        inner.config.output_dir.join(spec.job_id.as_str()),
    )));

    let permit = tokio::select! {
        biased;
        _ = cancelled(&mut cancel_rx) => None,
        permit = Arc::clone(&inner.permits).acquire_owned() => permit.ok(),
    };

    match permit {
        None => {
            info!(job_id = %spec.job_id, "Job cancelled before it started");
            finish_with_error(&spec, &sink, &slot, WorkerError::Cancelled, false);
        }
        Some(_permit) => {
            let job = GenerationJob::new(
                inner.services.clone(),
                &inner.config.output_dir,
                inner.config.remote_call_timeout,
                cancel_rx,
            );
            let mut handle = tokio::spawn({
                let spec = spec.clone();
                let sink = sink.clone();
                let slot = Arc::clone(&slot);
                async move { job.run_into(&spec, &sink, &slot).await }
            });

            match tokio::time::timeout(inner.config.job_timeout, &mut handle).await {
                Ok(Ok(())) => {}
                Ok(Err(join_err)) => {
                    let reason = if join_err.is_panic() {
                        "worker panicked"
                    } else {
                        "worker task was aborted"
                    };
                    error!(job_id = %spec.job_id, "Job failed: {}", reason);
                    finish_with_error(&spec, &sink, &slot, WorkerError::job_failed(reason), true);
                }
                Err(_) => {
                    handle.abort();
                    let secs = inner.config.job_timeout.as_secs();
                    warn!(job_id = %spec.job_id, "Job exceeded {}s deadline", secs);
                    finish_with_error(&spec, &sink, &slot, WorkerError::timeout("Sequence", secs), true);
                }
            }
        }
    }

    // Store before the sentinel so a reader that sees the end can fetch it.
    let result = lock(&slot).clone();
    if let Err(e) = inner.registry.store_result(&result).await {
        error!(job_id = %spec.job_id, "Failed to store result: {}", e);
    }
    sink.end();

    for path in cleanup {
        remove_upload(&path).await;
    }

    metrics::record_job_finished(result.status.as_str(), started.elapsed().as_secs_f64());
    info!(
        job_id = %spec.job_id,
        status = result.status.as_str(),
        shots = result.shots.len(),
        "Job finished in {:.1}s",
        started.elapsed().as_secs_f64()
    );
}

/// Record a failure the job itself could not report.
fn finish_with_error(spec: &SequenceSpec, sink: &ProgressSink, slot: &ResultSlot, err: WorkerError, started: bool) {
    let (kind, message) = classify_error(&err);
    let total = spec.total_shots();
    let shot_number = {
        let mut result = lock(slot);
        let current = result.next_shot_number().min(total.max(1));
        result.fail(kind, &message, err.to_string());
        current
    };
    let shot = (started && kind != ErrorKind::Validation).then_some(shot_number);
    sink.emit(ProgressEvent::error(shot, total, kind.terminal_status(), message));
}

//! Generation job: one create followed by a chain of remixes.
//!
//! Shot 1 of a fresh sequence is created from scratch (optionally with a
//! reference image). Every later shot is a remix of the video produced for
//! the shot before it, so character and setting stay consistent. A remix
//! sequence starts the chain from an existing remote video instead.

use std::future::Future;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use seqgen_media::ImageResizer;
use seqgen_models::{
    ErrorKind, GenerationOptions, JobId, ProgressEvent, SequenceResult, Shot, MAX_SHOTS,
    SHOT_DURATION_SECONDS,
};
use seqgen_video_client::{CreateVideoParams, Downloader, ProgressCallback, VideoJob, VideoService};
use tokio::sync::watch;
use tracing::Instrument;

use crate::classify::classify_error;
use crate::error::{WorkerError, WorkerResult};
use crate::logging::JobLogger;
use crate::metrics;
use crate::prompt::build_prompt;
use crate::sink::ProgressSink;

/// Shared, incrementally updated result of a running job.
pub type ResultSlot = Arc<Mutex<SequenceResult>>;

pub(crate) fn lock(slot: &ResultSlot) -> MutexGuard<'_, SequenceResult> {
    slot.lock().unwrap_or_else(|e| e.into_inner())
}

/// Where the chain of videos starts.
#[derive(Debug, Clone, PartialEq)]
pub enum SequenceSource {
    /// Create shot 1, optionally guided by an uploaded image
    Create { reference_image: Option<PathBuf> },
    /// Remix an existing remote video for shot 1
    Remix { source_video_id: String },
}

/// Everything a job needs to know about what to generate.
#[derive(Debug, Clone)]
pub struct SequenceSpec {
    pub job_id: JobId,
    pub shots: Vec<Shot>,
    pub source: SequenceSource,
    pub options: GenerationOptions,
}

impl SequenceSpec {
    pub fn total_shots(&self) -> u8 {
        self.shots.len().min(u8::MAX as usize) as u8
    }

    pub fn operation(&self) -> &'static str {
        match self.source {
            SequenceSource::Create { .. } => "generate_sequence",
            SequenceSource::Remix { .. } => "remix_sequence",
        }
    }

    /// Prompt position for the shot at `index`.
    ///
    /// In a remix sequence even the first submitted shot continues an
    /// earlier video, so it gets continuation phrasing.
    fn prompt_number(&self, index: usize) -> usize {
        match self.source {
            SequenceSource::Create { .. } => index + 1,
            SequenceSource::Remix { .. } => index + 2,
        }
    }
}

/// Check the shot count before any remote call is made.
pub fn validate_shot_count(count: usize) -> WorkerResult<()> {
    if count == 0 {
        return Err(WorkerError::validation("No shots provided"));
    }
    if count > MAX_SHOTS {
        return Err(WorkerError::validation(format!("Maximum {} shots allowed", MAX_SHOTS)));
    }
    Ok(())
}

/// Remote and local collaborators used by a job.
#[derive(Clone)]
pub struct JobServices {
    pub video: Arc<dyn VideoService>,
    pub downloader: Arc<dyn Downloader>,
    pub resizer: Arc<dyn ImageResizer>,
}

/// Runs one sequence end to end.
pub struct GenerationJob {
    services: JobServices,
    output_root: PathBuf,
    remote_call_timeout: Duration,
    cancel: watch::Receiver<bool>,
}

impl GenerationJob {
    pub fn new(
        services: JobServices,
        output_root: impl Into<PathBuf>,
        remote_call_timeout: Duration,
        cancel: watch::Receiver<bool>,
    ) -> Self {
        Self {
            services,
            output_root: output_root.into(),
            remote_call_timeout,
            cancel,
        }
    }

    /// Output directory for a job.
    pub fn output_dir(&self, job_id: &JobId) -> PathBuf {
        self.output_root.join(job_id.as_str())
    }

    /// Run the job and return its terminal result.
    pub async fn run(&self, spec: &SequenceSpec, sink: &ProgressSink) -> SequenceResult {
        let slot: ResultSlot = Arc::new(Mutex::new(SequenceResult::new(
            spec.job_id.clone(),
            self.output_dir(&spec.job_id),
        )));
        self.run_into(spec, sink, &slot).await;
        let result = lock(&slot).clone();
        result
    }

    /// Run the job, recording shots into `slot` as they finish.
    ///
    /// Exactly one terminal event is emitted through `sink`. The sentinel is
    /// left to the caller so the result can be stored first.
    pub async fn run_into(&self, spec: &SequenceSpec, sink: &ProgressSink, slot: &ResultSlot) {
        let logger = JobLogger::new(&spec.job_id, spec.operation());
        let span = logger.create_span();
        let total = spec.total_shots();

        logger.log_start(&format!("{} shot(s) with {}", spec.shots.len(), spec.options.model));

        let outcome = self.execute(spec, sink, slot, &logger).instrument(span).await;

        match outcome {
            Ok(()) => {
                let shots = {
                    let mut result = lock(slot);
                    result.complete();
                    result.shots.len()
                };
                sink.emit(ProgressEvent::complete(spec.job_id.clone(), total));
                logger.log_completion(&format!("{} shot(s) generated", shots));
            }
            Err(e) => {
                let (kind, message) = classify_error(&e);
                let shot_number = {
                    let mut result = lock(slot);
                    let current = result.next_shot_number().min(total.max(1));
                    result.fail(kind, &message, e.to_string());
                    current
                };
                // Validation failures happen before any shot starts.
                let shot = (kind != ErrorKind::Validation).then_some(shot_number);
                logger.log_error(&format!("{} ({})", message, kind.as_str()));
                sink.emit(ProgressEvent::error(shot, total, kind.terminal_status(), message));
            }
        }
    }

    async fn execute(
        &self,
        spec: &SequenceSpec,
        sink: &ProgressSink,
        slot: &ResultSlot,
        logger: &JobLogger,
    ) -> WorkerResult<()> {
        validate_shot_count(spec.shots.len())?;

        let prompts: Vec<String> = spec
            .shots
            .iter()
            .enumerate()
            .map(|(index, shot)| build_prompt(shot, spec.prompt_number(index), &spec.shots))
            .collect();
        if let Some(index) = prompts.iter().position(|p| p.trim().is_empty()) {
            return Err(WorkerError::validation(format!("Shot {} has no description", index + 1)));
        }

        let output_dir = PathBuf::from(lock(slot).output_dir.clone());
        tokio::fs::create_dir_all(&output_dir).await?;

        let total = spec.total_shots();
        let mut previous: Option<String> = match &spec.source {
            SequenceSource::Create { .. } => None,
            SequenceSource::Remix { source_video_id } => Some(source_video_id.clone()),
        };

        for (index, prompt) in prompts.into_iter().enumerate() {
            let shot_number = (index + 1) as u8;
            self.ensure_not_cancelled()?;

            sink.emit(ProgressEvent::shot_start(shot_number, total));
            logger.log_shot(shot_number, &format!("Prompt: {}", preview(&prompt)));

            let started = Instant::now();
            let video = match previous.as_deref() {
                None => {
                    let params = self.create_params(spec, prompt, logger).await?;
                    let video = self
                        .guarded(format!("Create for shot {}", shot_number), self.services.video.create(&params))
                        .await?;
                    metrics::record_remote_call("create", started.elapsed().as_secs_f64());
                    video
                }
                Some(source) => {
                    logger.log_shot(shot_number, &format!("Remixing {}", source));
                    let video = self
                        .guarded(
                            format!("Remix for shot {}", shot_number),
                            self.services.video.remix(source, &prompt),
                        )
                        .await?;
                    metrics::record_remote_call("remix", started.elapsed().as_secs_f64());
                    video
                }
            };

            let downloaded = self
                .download(&video, &output_dir, shot_number, total, sink)
                .await?;

            lock(slot).record_shot(&downloaded.id, &downloaded.local_path);
            sink.emit(ProgressEvent::shot_complete(shot_number, total, &downloaded.id));
            logger.log_shot(
                shot_number,
                &format!("Saved {} to {}", downloaded.id, downloaded.local_path.display()),
            );
            metrics::record_shot_generated(spec.operation());

            previous = Some(downloaded.id);
        }

        Ok(())
    }

    async fn create_params(
        &self,
        spec: &SequenceSpec,
        prompt: String,
        logger: &JobLogger,
    ) -> WorkerResult<CreateVideoParams> {
        let input_reference = match &spec.source {
            SequenceSource::Create {
                reference_image: Some(path),
            } => {
                if tokio::fs::try_exists(path).await.unwrap_or(false) {
                    Some(self.services.resizer.resize(path, spec.options.quality).await?)
                } else {
                    logger.log_warning(&format!(
                        "Reference image {} is missing, continuing without it",
                        path.display()
                    ));
                    None
                }
            }
            _ => None,
        };

        Ok(CreateVideoParams {
            model: spec.options.model.clone(),
            prompt,
            size: spec.options.quality,
            seconds: SHOT_DURATION_SECONDS,
            input_reference,
        })
    }

    async fn download(
        &self,
        video: &VideoJob,
        output_dir: &std::path::Path,
        shot_number: u8,
        total: u8,
        sink: &ProgressSink,
    ) -> WorkerResult<seqgen_video_client::DownloadedVideo> {
        let progress_sink = sink.clone();
        let callback: ProgressCallback = Arc::new(move |percent: f64, status: &str| {
            progress_sink.emit(ProgressEvent::progress(shot_number, total, percent, status));
        });

        let started = Instant::now();
        let base_name = format!("shot_{}", shot_number);
        let downloaded = self
            .guarded(
                format!("Render for shot {}", shot_number),
                self.services
                    .downloader
                    .download(video, output_dir, &base_name, Some(callback)),
            )
            .await?;
        metrics::record_remote_call("render", started.elapsed().as_secs_f64());
        Ok(downloaded)
    }

    fn ensure_not_cancelled(&self) -> WorkerResult<()> {
        if *self.cancel.borrow() {
            return Err(WorkerError::Cancelled);
        }
        Ok(())
    }

    /// Bound a remote call by the per-call deadline and the cancel signal.
    async fn guarded<T, E, F>(&self, operation: String, fut: F) -> WorkerResult<T>
    where
        F: Future<Output = Result<T, E>>,
        WorkerError: From<E>,
    {
        let mut cancel = self.cancel.clone();
        let secs = self.remote_call_timeout.as_secs();

        tokio::select! {
            biased;
            _ = cancelled(&mut cancel) => Err(WorkerError::Cancelled),
            res = tokio::time::timeout(self.remote_call_timeout, fut) => match res {
                Ok(inner) => inner.map_err(WorkerError::from),
                Err(_) => Err(WorkerError::timeout(operation, secs)),
            },
        }
    }
}

/// Resolves once the cancel flag is set; never resolves if the sender is gone.
pub(crate) async fn cancelled(rx: &mut watch::Receiver<bool>) {
    loop {
        if *rx.borrow_and_update() {
            return;
        }
        if rx.changed().await.is_err() {
            std::future::pending::<()>().await;
        }
    }
}

fn preview(prompt: &str) -> String {
    const LIMIT: usize = 100;
    match prompt.char_indices().nth(LIMIT) {
        Some((end, _)) => format!("{}...", &prompt[..end]),
        None => prompt.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{drain, kinds, services, Call, FakeResizer, FakeVideoService};
    use seqgen_models::{SequenceStatus, VideoSize};
    use seqgen_queue::JobRegistry;
    use tempfile::TempDir;

    struct Harness {
        registry: JobRegistry,
        video: Arc<FakeVideoService>,
        resizer: Arc<FakeResizer>,
        dir: TempDir,
        cancel_tx: watch::Sender<bool>,
        job: GenerationJob,
    }

    fn harness(video: FakeVideoService, timeout: Duration) -> Harness {
        let video = Arc::new(video);
        let resizer = Arc::new(FakeResizer::default());
        let dir = TempDir::new().unwrap();
        let (cancel_tx, cancel_rx) = watch::channel(false);
        let job = GenerationJob::new(services(video.clone(), resizer.clone()), dir.path(), timeout, cancel_rx);
        Harness {
            registry: JobRegistry::in_memory(),
            video,
            resizer,
            dir,
            cancel_tx,
            job,
        }
    }

    fn spec(count: usize, source: SequenceSource) -> SequenceSpec {
        SequenceSpec {
            job_id: JobId::new(),
            shots: (1..=count).map(|i| Shot::with_dialog(format!("Line {}", i))).collect(),
            source,
            options: GenerationOptions::default(),
        }
    }

    fn create() -> SequenceSource {
        SequenceSource::Create { reference_image: None }
    }

    async fn run(h: &Harness, spec: &SequenceSpec) -> (SequenceResult, Vec<ProgressEvent>) {
        let sink = ProgressSink::new(h.registry.open_channel(&spec.job_id));
        let result = h.job.run(spec, &sink).await;
        sink.end();
        let events = drain(&h.registry, &spec.job_id).await;
        (result, events)
    }

    #[tokio::test]
    async fn test_single_shot_creates_once() {
        let h = harness(FakeVideoService::default(), Duration::from_secs(5));
        let spec = spec(1, create());
        let (result, events) = run(&h, &spec).await;

        assert_eq!(result.status, SequenceStatus::Completed);
        assert_eq!(result.shots.len(), 1);
        assert_eq!(result.shots[0].shot_number, 1);
        assert!(result.shots[0].file_path.ends_with("shot_1.mp4"));

        let calls = h.video.calls();
        assert_eq!(calls.len(), 1);
        match &calls[0] {
            Call::Create { size, model, seconds, reference, .. } => {
                assert_eq!(size, "1024x1792");
                assert_eq!(model, "sora-2-pro");
                assert_eq!(*seconds, 12);
                assert!(reference.is_none());
            }
            other => panic!("unexpected call {:?}", other),
        }

        let kinds = kinds(&events);
        assert_eq!(kinds.first(), Some(&"shot_start"));
        assert_eq!(kinds.last(), Some(&"complete"));
        assert_eq!(kinds.iter().filter(|k| **k == "shot_complete").count(), 1);
    }

    #[tokio::test]
    async fn test_three_shots_chain_remixes() {
        let h = harness(FakeVideoService::default(), Duration::from_secs(5));
        let spec = spec(3, create());
        let (result, events) = run(&h, &spec).await;

        assert_eq!(result.status, SequenceStatus::Completed);
        let numbers: Vec<u8> = result.shots.iter().map(|s| s.shot_number).collect();
        assert_eq!(numbers, vec![1, 2, 3]);

        let calls = h.video.calls();
        assert!(matches!(&calls[0], Call::Create { prompt, .. } if !prompt.contains("the same")));
        assert!(matches!(&calls[1], Call::Remix { source, prompt } if source == "video_1" && prompt.contains("'Line 2'")));
        assert!(matches!(&calls[2], Call::Remix { source, .. } if source == "video_2"));

        let kinds = kinds(&events);
        assert_eq!(kinds.iter().filter(|k| **k == "shot_start").count(), 3);
        assert_eq!(kinds.iter().filter(|k| **k == "shot_complete").count(), 3);
        assert_eq!(kinds.iter().filter(|k| **k == "complete" || **k == "error").count(), 1);
        assert!(h.dir.path().join(spec.job_id.as_str()).join("shot_3.mp4").exists());
    }

    #[tokio::test]
    async fn test_progress_is_forwarded_between_start_and_complete() {
        let h = harness(FakeVideoService::default(), Duration::from_secs(5));
        let (_, events) = run(&h, &spec(1, create())).await;

        let percents: Vec<f64> = events
            .iter()
            .filter_map(|e| match e {
                ProgressEvent::Progress { progress, .. } => Some(*progress),
                _ => None,
            })
            .collect();
        assert_eq!(percents.last(), Some(&100.0));
        assert!(percents.iter().all(|p| (0.0..=100.0).contains(p)));
    }

    #[tokio::test]
    async fn test_too_many_shots_makes_no_remote_calls() {
        let h = harness(FakeVideoService::default(), Duration::from_secs(5));
        let (result, events) = run(&h, &spec(4, create())).await;

        assert_eq!(result.status, SequenceStatus::Error);
        assert_eq!(result.error_kind, Some(ErrorKind::Validation));
        assert!(h.video.calls().is_empty());
        assert_eq!(events.len(), 1);
        assert!(matches!(&events[0], ProgressEvent::Error { shot_number: None, .. }));
    }

    #[tokio::test]
    async fn test_remix_sequence_starts_from_existing_video() {
        let h = harness(FakeVideoService::default(), Duration::from_secs(5));
        let spec = spec(
            2,
            SequenceSource::Remix {
                source_video_id: "video_external".into(),
            },
        );
        let (result, _) = run(&h, &spec).await;

        assert_eq!(result.status, SequenceStatus::Completed);
        let calls = h.video.calls();
        assert_eq!(calls.len(), 2);
        assert!(matches!(&calls[0], Call::Remix { source, prompt } if source == "video_external" && prompt.contains("the same")));
        assert!(matches!(&calls[1], Call::Remix { source, .. } if source == "video_1"));
    }

    #[tokio::test]
    async fn test_failure_stops_chain_and_keeps_finished_shots() {
        let video = FakeVideoService {
            fail_call: Some((2, "Billing hard limit has been reached".into())),
            ..Default::default()
        };
        let h = harness(video, Duration::from_secs(5));
        let (result, events) = run(&h, &spec(3, create())).await;

        assert_eq!(result.status, SequenceStatus::Error);
        assert_eq!(result.error_kind, Some(ErrorKind::BillingLimit));
        assert_eq!(result.shots.len(), 1);
        assert_eq!(h.video.calls().len(), 2);

        match events.last().unwrap() {
            ProgressEvent::Error { shot_number, message, .. } => {
                assert_eq!(*shot_number, Some(2));
                assert!(message.contains("Billing limit"));
            }
            other => panic!("expected error event, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_remote_call_timeout() {
        let video = FakeVideoService {
            hang: true,
            ..Default::default()
        };
        let h = harness(video, Duration::from_millis(50));
        let (result, events) = run(&h, &spec(2, create())).await;

        assert_eq!(result.status, SequenceStatus::Timeout);
        assert!(result.error_message.unwrap().contains("timed out"));
        assert!(matches!(
            events.last(),
            Some(ProgressEvent::Error { status: SequenceStatus::Timeout, .. })
        ));
    }

    #[tokio::test]
    async fn test_cancel_interrupts_remote_call() {
        let video = FakeVideoService {
            hang: true,
            ..Default::default()
        };
        let h = harness(video, Duration::from_secs(60));
        let spec = spec(1, create());
        let sink = ProgressSink::new(h.registry.open_channel(&spec.job_id));

        let cancel_tx = h.cancel_tx.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let _ = cancel_tx.send(true);
        });

        let result = h.job.run(&spec, &sink).await;
        assert_eq!(result.status, SequenceStatus::Cancelled);
        assert_eq!(result.error_kind, Some(ErrorKind::Cancelled));
    }

    #[tokio::test]
    async fn test_reference_image_is_resized_for_create() {
        let h = harness(FakeVideoService::default(), Duration::from_secs(5));
        let image = h.dir.path().join("upload.png");
        std::fs::write(&image, b"png").unwrap();

        let mut spec = spec(2, SequenceSource::Create {
            reference_image: Some(image.clone()),
        });
        spec.options.quality = VideoSize::new(1280, 720);
        let (result, _) = run(&h, &spec).await;

        assert_eq!(result.status, SequenceStatus::Completed);
        assert_eq!(
            h.resizer.calls.lock().unwrap().clone(),
            vec![(image.clone(), VideoSize::new(1280, 720))]
        );
        assert!(matches!(
            &h.video.calls()[0],
            Call::Create { reference: Some(r), size, .. } if *r == image.with_extension("jpg") && size == "1280x720"
        ));
    }

    #[tokio::test]
    async fn test_missing_reference_image_is_skipped() {
        let h = harness(FakeVideoService::default(), Duration::from_secs(5));
        let spec = spec(1, SequenceSource::Create {
            reference_image: Some(h.dir.path().join("gone.png")),
        });
        let (result, _) = run(&h, &spec).await;

        assert_eq!(result.status, SequenceStatus::Completed);
        assert!(h.resizer.calls.lock().unwrap().is_empty());
    }

    #[test]
    fn test_validate_shot_count() {
        assert!(validate_shot_count(0).is_err());
        assert!(validate_shot_count(1).is_ok());
        assert!(validate_shot_count(3).is_ok());
        assert!(matches!(validate_shot_count(4), Err(WorkerError::Validation(m)) if m == "Maximum 3 shots allowed"));
    }
}

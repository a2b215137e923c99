//! Progress emission for one job.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use seqgen_models::{JobId, ProgressEvent};
use seqgen_queue::ProgressSender;
use tracing::{debug, warn};

/// Wraps a job's progress channel and enforces a single terminal event.
#[derive(Debug, Clone)]
pub struct ProgressSink {
    sender: ProgressSender,
    terminal_sent: Arc<AtomicBool>,
    ended: Arc<AtomicBool>,
}

impl ProgressSink {
    pub fn new(sender: ProgressSender) -> Self {
        Self {
            sender,
            terminal_sent: Arc::new(AtomicBool::new(false)),
            ended: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn job_id(&self) -> &JobId {
        self.sender.job_id()
    }

    /// Push an event.
    ///
    /// Anything after the first terminal event is dropped.
    pub fn emit(&self, event: ProgressEvent) {
        if self.terminal_sent.load(Ordering::SeqCst) {
            warn!(
                job_id = %self.job_id(),
                event = event.event_type().as_str(),
                "Dropping event emitted after terminal event"
            );
            return;
        }
        if event.is_terminal() && self.terminal_sent.swap(true, Ordering::SeqCst) {
            return;
        }
        if !self.sender.send(event) {
            debug!(job_id = %self.job_id(), "Progress channel closed, event discarded");
        }
    }

    pub fn terminal_sent(&self) -> bool {
        self.terminal_sent.load(Ordering::SeqCst)
    }

    /// Push the end-of-stream sentinel once.
    pub fn end(&self) {
        if !self.ended.swap(true, Ordering::SeqCst) {
            self.sender.end();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use seqgen_models::SequenceStatus;
    use seqgen_queue::{JobRegistry, StreamItem};
    use std::time::Duration;

    #[tokio::test]
    async fn test_single_terminal_event_and_sentinel() {
        let registry = JobRegistry::in_memory();
        let job_id = JobId::new();
        let sink = ProgressSink::new(registry.open_channel(&job_id));

        sink.emit(ProgressEvent::shot_start(1, 1));
        sink.emit(ProgressEvent::complete(job_id.clone(), 1));
        sink.emit(ProgressEvent::error(None, 1, SequenceStatus::Error, "late"));
        sink.emit(ProgressEvent::shot_start(2, 1));
        sink.end();
        sink.end();

        assert!(sink.terminal_sent());

        let mut sub = registry.subscribe(&job_id, Duration::from_secs(1)).unwrap();
        let mut events = Vec::new();
        while let Some(item) = sub.next().await {
            if let StreamItem::Event(e) = item {
                events.push(e.event_type().as_str());
            }
        }
        assert_eq!(events, vec!["shot_start", "complete"]);
    }
}

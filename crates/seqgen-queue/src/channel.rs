//! Per-job progress channels.
//!
//! Each job gets one FIFO of [`ProgressFrame`]s. The worker holds the
//! [`ProgressSender`]; at most one [`ProgressSubscription`] reads it at a
//! time. The channel is removed from the registry when the reader sees
//! [`ProgressFrame::End`], or by [`ChannelRegistry::sweep`] once its producer
//! has been gone longer than the retention window with no reader attached.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use seqgen_models::{JobId, ProgressEvent, ProgressFrame};
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::error::{QueueError, QueueResult};

enum Slot {
    /// No reader attached; frames buffer in the receiver
    Idle {
        rx: mpsc::UnboundedReceiver<ProgressFrame>,
        /// First sweep that found the producer gone
        closed_since: Option<Instant>,
    },
    /// A subscription currently owns the receiver
    Subscribed,
}

/// Live progress channels keyed by job.
#[derive(Default)]
pub struct ChannelRegistry {
    slots: Mutex<HashMap<JobId, Slot>>,
}

impl ChannelRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    fn slots(&self) -> MutexGuard<'_, HashMap<JobId, Slot>> {
        // A poisoned map is still structurally valid.
        self.slots.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Create the channel for a job and return its producer half.
    ///
    /// Replaces any existing channel with the same id.
    pub fn open(&self, job_id: &JobId) -> ProgressSender {
        let (tx, rx) = mpsc::unbounded_channel();
        if self.slots().insert(job_id.clone(), Slot::idle(rx)).is_some() {
            warn!(job_id = %job_id, "Replaced existing progress channel");
        }
        ProgressSender {
            job_id: job_id.clone(),
            tx,
        }
    }

    /// Attach the single reader for a job.
    pub fn subscribe(
        self: &Arc<Self>,
        job_id: &JobId,
        keepalive: Duration,
    ) -> QueueResult<ProgressSubscription> {
        let mut slots = self.slots();
        let slot = slots
            .get_mut(job_id)
            .ok_or_else(|| QueueError::job_not_found(job_id.as_str()))?;

        match std::mem::replace(slot, Slot::Subscribed) {
            Slot::Idle { rx, .. } => {
                debug!(job_id = %job_id, "Progress stream attached");
                Ok(ProgressSubscription {
                    job_id: job_id.clone(),
                    rx: Some(rx),
                    keepalive,
                    registry: Arc::clone(self),
                })
            }
            Slot::Subscribed => Err(QueueError::AlreadySubscribed(job_id.to_string())),
        }
    }

    pub fn contains(&self, job_id: &JobId) -> bool {
        self.slots().contains_key(job_id)
    }

    pub fn len(&self) -> usize {
        self.slots().len()
    }

    pub fn is_empty(&self) -> bool {
        self.slots().is_empty()
    }

    fn remove(&self, job_id: &JobId) {
        self.slots().remove(job_id);
    }

    /// Drop unread channels whose producer has been gone for `retention`.
    ///
    /// A producer is first seen gone by one sweep and removed by a later one,
    /// so with a periodic sweep the entry lives between one and two periods.
    /// Channels with an attached reader are never touched. Returns the number
    /// of channels removed.
    pub fn sweep(&self, retention: Duration) -> usize {
        let now = Instant::now();
        let mut slots = self.slots();
        let before = slots.len();
        slots.retain(|job_id, slot| match slot {
            Slot::Idle { rx, closed_since } if rx.is_closed() => {
                let since = *closed_since.get_or_insert(now);
                let keep = now.duration_since(since) < retention;
                if !keep {
                    debug!(job_id = %job_id, "Dropping unread progress channel");
                }
                keep
            }
            _ => true,
        });
        before - slots.len()
    }

    /// Give the receiver back after a reader disconnects early.
    fn restore(&self, job_id: &JobId, rx: mpsc::UnboundedReceiver<ProgressFrame>) {
        if let Some(slot) = self.slots().get_mut(job_id) {
            *slot = Slot::idle(rx);
        }
    }
}

impl Slot {
    fn idle(rx: mpsc::UnboundedReceiver<ProgressFrame>) -> Self {
        Slot::Idle {
            rx,
            closed_since: None,
        }
    }
}

/// Producer half of a job's progress channel.
#[derive(Debug, Clone)]
pub struct ProgressSender {
    job_id: JobId,
    tx: mpsc::UnboundedSender<ProgressFrame>,
}

impl ProgressSender {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Push an event. Returns false if the channel is gone.
    pub fn send(&self, event: ProgressEvent) -> bool {
        self.tx.send(ProgressFrame::Event(event)).is_ok()
    }

    /// Push the end-of-stream sentinel.
    pub fn end(&self) -> bool {
        self.tx.send(ProgressFrame::End).is_ok()
    }
}

/// Item yielded to a stream reader.
#[derive(Debug, Clone, PartialEq)]
pub enum StreamItem {
    Event(ProgressEvent),
    /// No event within the keepalive window
    Keepalive,
}

/// Consumer half of a job's progress channel.
pub struct ProgressSubscription {
    job_id: JobId,
    rx: Option<mpsc::UnboundedReceiver<ProgressFrame>>,
    keepalive: Duration,
    registry: Arc<ChannelRegistry>,
}

impl ProgressSubscription {
    pub fn job_id(&self) -> &JobId {
        &self.job_id
    }

    /// Wait for the next item.
    ///
    /// Yields [`StreamItem::Keepalive`] when nothing arrives within the
    /// keepalive window. Returns `None` once the sentinel is seen; the
    /// channel has then been removed from the registry.
    pub async fn next(&mut self) -> Option<StreamItem> {
        let rx = self.rx.as_mut()?;

        let frame = match tokio::time::timeout(self.keepalive, rx.recv()).await {
            Err(_) => return Some(StreamItem::Keepalive),
            Ok(frame) => frame,
        };

        match frame {
            Some(ProgressFrame::Event(event)) => Some(StreamItem::Event(event)),
            Some(ProgressFrame::End) | None => {
                self.rx = None;
                self.registry.remove(&self.job_id);
                debug!(job_id = %self.job_id, "Progress stream finished, channel released");
                None
            }
        }
    }

    pub fn is_finished(&self) -> bool {
        self.rx.is_none()
    }
}

impl Drop for ProgressSubscription {
    fn drop(&mut self) {
        if let Some(rx) = self.rx.take() {
            debug!(job_id = %self.job_id, "Progress stream detached before end");
            self.registry.restore(&self.job_id, rx);
        }
    }
}

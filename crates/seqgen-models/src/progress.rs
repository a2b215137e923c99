//! Progress event types.
//!
//! Events are pushed from the worker to a single stream reader. Each variant
//! carries only the fields relevant to its kind.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use crate::job::{JobId, SequenceStatus};

/// Progress event kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProgressEventType {
    ShotStart,
    Progress,
    ShotComplete,
    Complete,
    Error,
}

impl ProgressEventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProgressEventType::ShotStart => "shot_start",
            ProgressEventType::Progress => "progress",
            ProgressEventType::ShotComplete => "shot_complete",
            ProgressEventType::Complete => "complete",
            ProgressEventType::Error => "error",
        }
    }
}

/// Progress event envelope.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ProgressEvent {
    /// A shot's remote call is about to start
    ShotStart {
        shot_number: u8,
        total_shots: u8,
        message: String,
    },

    /// Download/generation progress for a shot (0-100)
    Progress {
        shot_number: u8,
        total_shots: u8,
        progress: f64,
        message: String,
    },

    /// A shot was generated and saved locally
    ShotComplete {
        shot_number: u8,
        total_shots: u8,
        video_id: String,
        message: String,
    },

    /// All shots finished
    Complete {
        sequence_id: JobId,
        total_shots: u8,
        message: String,
    },

    /// The job stopped with a failure, timeout or cancellation
    Error {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        shot_number: Option<u8>,
        total_shots: u8,
        status: SequenceStatus,
        message: String,
    },
}

impl ProgressEvent {
    pub fn shot_start(shot_number: u8, total_shots: u8) -> Self {
        ProgressEvent::ShotStart {
            shot_number,
            total_shots,
            message: format!("Starting shot {} of {}", shot_number, total_shots),
        }
    }

    /// Create a progress event; the percentage is clamped to 0-100.
    pub fn progress(shot_number: u8, total_shots: u8, percent: f64, status: impl AsRef<str>) -> Self {
        let progress = if percent.is_finite() { percent.clamp(0.0, 100.0) } else { 0.0 };
        ProgressEvent::Progress {
            shot_number,
            total_shots,
            progress,
            message: format!("Shot {}: {} ({:.0}%)", shot_number, status.as_ref(), progress),
        }
    }

    pub fn shot_complete(shot_number: u8, total_shots: u8, video_id: impl Into<String>) -> Self {
        ProgressEvent::ShotComplete {
            shot_number,
            total_shots,
            video_id: video_id.into(),
            message: format!("Shot {} of {} complete", shot_number, total_shots),
        }
    }

    pub fn complete(sequence_id: JobId, total_shots: u8) -> Self {
        ProgressEvent::Complete {
            sequence_id,
            total_shots,
            message: format!("All {} shots generated", total_shots),
        }
    }

    pub fn error(
        shot_number: Option<u8>,
        total_shots: u8,
        status: SequenceStatus,
        message: impl Into<String>,
    ) -> Self {
        ProgressEvent::Error {
            shot_number,
            total_shots,
            status,
            message: message.into(),
        }
    }

    pub fn event_type(&self) -> ProgressEventType {
        match self {
            ProgressEvent::ShotStart { .. } => ProgressEventType::ShotStart,
            ProgressEvent::Progress { .. } => ProgressEventType::Progress,
            ProgressEvent::ShotComplete { .. } => ProgressEventType::ShotComplete,
            ProgressEvent::Complete { .. } => ProgressEventType::Complete,
            ProgressEvent::Error { .. } => ProgressEventType::Error,
        }
    }

    /// `complete` and `error` end a job's event sequence.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ProgressEvent::Complete { .. } | ProgressEvent::Error { .. })
    }
}

/// Item carried by a progress channel.
///
/// `End` is the sentinel that closes a stream; it is never serialized as an
/// event.
#[derive(Debug, Clone, PartialEq)]
pub enum ProgressFrame {
    Event(ProgressEvent),
    End,
}

//! Sequence job definitions.

use std::fmt;
use std::path::Path;

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for a sequence job.
///
/// The same identifier keys the progress stream, the stored result and the
/// output directory: `sequence_{YYYYmmdd_HHMMSS}_{uuid}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Generate a new job ID.
    pub fn new() -> Self {
        Self(format!(
            "sequence_{}_{}",
            Utc::now().format("%Y%m%d_%H%M%S"),
            Uuid::new_v4().simple()
        ))
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Check that an identifier is safe to use as a directory name.
    ///
    /// Valid format: ASCII alphanumerics, `_` and `-`, 1-128 chars.
    pub fn is_valid(s: &str) -> bool {
        !s.is_empty()
            && s.len() <= 128
            && s.chars().all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    }
}

impl Default for JobId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// Sequence lifecycle status.
///
/// Starts at `InProgress` and moves exactly once to a terminal state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum SequenceStatus {
    #[default]
    InProgress,
    Completed,
    Error,
    /// A remote call or the whole job exceeded its deadline
    Timeout,
    /// The client cancelled the job
    Cancelled,
}

impl SequenceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            SequenceStatus::InProgress => "in_progress",
            SequenceStatus::Completed => "completed",
            SequenceStatus::Error => "error",
            SequenceStatus::Timeout => "timeout",
            SequenceStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, SequenceStatus::InProgress)
    }
}

impl fmt::Display for SequenceStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Per-shot status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ShotStatus {
    #[default]
    Completed,
}

/// Classification of a job failure shown to users.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    /// Missing or unusable local configuration
    Config,
    /// Request rejected before any remote call
    Validation,
    /// Provider billing limit reached
    BillingLimit,
    /// Provider rejected the credential
    InvalidCredential,
    /// Any other provider failure
    Remote,
    /// Deadline exceeded
    Timeout,
    /// Cancelled by the client
    Cancelled,
    /// Local failure (file I/O, worker defect)
    Internal,
}

impl ErrorKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Config => "config",
            ErrorKind::Validation => "validation",
            ErrorKind::BillingLimit => "billing_limit",
            ErrorKind::InvalidCredential => "invalid_credential",
            ErrorKind::Remote => "remote",
            ErrorKind::Timeout => "timeout",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        }
    }

    /// Terminal status implied by this failure.
    pub fn terminal_status(&self) -> SequenceStatus {
        match self {
            ErrorKind::Timeout => SequenceStatus::Timeout,
            ErrorKind::Cancelled => SequenceStatus::Cancelled,
            _ => SequenceStatus::Error,
        }
    }
}

/// Result of one generated shot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ShotResult {
    /// 1-based position in the sequence
    pub shot_number: u8,
    /// Remote video identifier
    pub video_id: String,
    /// Local MP4 path
    pub file_path: String,
    pub status: ShotStatus,
}

/// Terminal (or in-flight) state of a sequence job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct SequenceResult {
    pub sequence_id: JobId,
    pub output_dir: String,
    pub status: SequenceStatus,
    /// Shot results in shot order
    pub shots: Vec<ShotResult>,
    /// Human-readable failure message
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
    /// Raw underlying error text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<ErrorKind>,
    pub started_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finished_at: Option<DateTime<Utc>>,
}

impl SequenceResult {
    /// Start a new in-progress result.
    pub fn new(sequence_id: JobId, output_dir: impl AsRef<Path>) -> Self {
        Self {
            sequence_id,
            output_dir: output_dir.as_ref().to_string_lossy().to_string(),
            status: SequenceStatus::InProgress,
            shots: Vec::new(),
            error_message: None,
            error: None,
            error_kind: None,
            started_at: Utc::now(),
            finished_at: None,
        }
    }

    /// Number the next shot would get.
    pub fn next_shot_number(&self) -> u8 {
        self.shots.len() as u8 + 1
    }

    /// Append a completed shot. Shot numbers are assigned here so they stay
    /// contiguous and 1-based.
    pub fn record_shot(&mut self, video_id: impl Into<String>, file_path: impl AsRef<Path>) -> &ShotResult {
        let shot = ShotResult {
            shot_number: self.next_shot_number(),
            video_id: video_id.into(),
            file_path: file_path.as_ref().to_string_lossy().to_string(),
            status: ShotStatus::Completed,
        };
        self.shots.push(shot);
        &self.shots[self.shots.len() - 1]
    }

    /// Mark as completed. Returns false if already terminal.
    pub fn complete(&mut self) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = SequenceStatus::Completed;
        self.finished_at = Some(Utc::now());
        true
    }

    /// Mark as failed. Returns false if already terminal.
    pub fn fail(&mut self, kind: ErrorKind, message: impl Into<String>, raw: impl Into<String>) -> bool {
        if self.status.is_terminal() {
            return false;
        }
        self.status = kind.terminal_status();
        self.error_kind = Some(kind);
        self.error_message = Some(message.into());
        self.error = Some(raw.into());
        self.finished_at = Some(Utc::now());
        true
    }

    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

//! Worker error types.

use thiserror::Error;

pub type WorkerResult<T> = Result<T, WorkerError>;

#[derive(Debug, Error)]
pub enum WorkerError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Server busy: {0} jobs already admitted")]
    Busy(usize),

    #[error("{operation} timed out after {secs} seconds")]
    Timeout { operation: String, secs: u64 },

    #[error("Job cancelled")]
    Cancelled,

    #[error("Job failed: {0}")]
    JobFailed(String),

    #[error("{0}")]
    Remote(#[from] seqgen_video_client::VideoClientError),

    #[error("Media error: {0}")]
    Media(#[from] seqgen_media::MediaError),

    #[error("Queue error: {0}")]
    Queue(#[from] seqgen_queue::QueueError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl WorkerError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn job_failed(msg: impl Into<String>) -> Self {
        Self::JobFailed(msg.into())
    }

    pub fn timeout(operation: impl Into<String>, secs: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            secs,
        }
    }

    /// Rejected before a job was created.
    pub fn is_rejection(&self) -> bool {
        matches!(self, WorkerError::Validation(_) | WorkerError::Busy(_))
    }
}

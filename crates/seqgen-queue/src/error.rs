//! Queue error types.

use thiserror::Error;

pub type QueueResult<T> = Result<T, QueueError>;

#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Job not found: {0}")]
    JobNotFound(String),

    #[error("Job {0} already has an active stream")]
    AlreadySubscribed(String),

    #[error("Invalid configuration: {0}")]
    Config(String),

    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl QueueError {
    pub fn connection_failed(msg: impl Into<String>) -> Self {
        Self::ConnectionFailed(msg.into())
    }

    pub fn job_not_found(job_id: impl Into<String>) -> Self {
        Self::JobNotFound(job_id.into())
    }
}

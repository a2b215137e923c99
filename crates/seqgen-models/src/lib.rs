//! Shared data models for the seqgen backend.
//!
//! This crate provides Serde-serializable types for:
//! - Shots and generation options
//! - Sequence jobs and per-shot results
//! - Progress event schemas pushed to stream clients
//! - Submission request/response bodies

pub mod generation;
pub mod job;
pub mod progress;
pub mod request;
pub mod shot;

// Re-export common types
pub use generation::{GenerationOptions, VideoSize, DEFAULT_MODEL, DEFAULT_QUALITY, SHOT_DURATION_SECONDS};
pub use job::{ErrorKind, JobId, SequenceResult, SequenceStatus, ShotResult, ShotStatus};
pub use progress::{ProgressEvent, ProgressEventType, ProgressFrame};
pub use request::{GenerateRequest, JobAccepted, RemixRequest};
pub use shot::{Shot, MAX_SHOTS};

//! Shot sequencing worker.
//!
//! This crate provides:
//! - Prompt building for first and continuation shots
//! - The generation job (create, then a chain of remixes, with downloads)
//! - A bounded task runner with deadlines, cancellation and panic isolation
//! - Failure classification for user-facing messages

pub mod classify;
pub mod config;
pub mod error;
pub mod job;
pub mod logging;
pub mod metrics;
pub mod prompt;
pub mod runner;
pub mod sink;

#[cfg(test)]
mod testing;

pub use classify::{classify_error, classify_text};
pub use config::WorkerConfig;
pub use error::{WorkerError, WorkerResult};
pub use job::{validate_shot_count, GenerationJob, JobServices, ResultSlot, SequenceSource, SequenceSpec};
pub use logging::JobLogger;
pub use prompt::build_prompt;
pub use runner::{Submission, TaskRunner};
pub use sink::ProgressSink;

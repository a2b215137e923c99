//! Job and shot metrics.
//!
//! Recorded through the `metrics` facade; the API binary installs the
//! Prometheus recorder.

use metrics::{counter, gauge, histogram};

/// Metric names as constants for consistency.
pub mod names {
    pub const JOBS_SUBMITTED_TOTAL: &str = "seqgen_jobs_submitted_total";
    pub const JOBS_REJECTED_TOTAL: &str = "seqgen_jobs_rejected_total";
    pub const JOBS_FINISHED_TOTAL: &str = "seqgen_jobs_finished_total";
    pub const JOB_DURATION_SECONDS: &str = "seqgen_job_duration_seconds";
    pub const JOBS_ACTIVE: &str = "seqgen_jobs_active";
    pub const SHOTS_GENERATED_TOTAL: &str = "seqgen_shots_generated_total";
    pub const REMOTE_CALL_DURATION_SECONDS: &str = "seqgen_remote_call_duration_seconds";
}

pub fn record_job_submitted(kind: &str) {
    let labels = [("kind", kind.to_string())];
    counter!(names::JOBS_SUBMITTED_TOTAL, &labels).increment(1);
}

pub fn record_job_rejected(reason: &str) {
    let labels = [("reason", reason.to_string())];
    counter!(names::JOBS_REJECTED_TOTAL, &labels).increment(1);
}

/// Record a finished job by terminal status.
pub fn record_job_finished(status: &str, duration_secs: f64) {
    let labels = [("status", status.to_string())];
    counter!(names::JOBS_FINISHED_TOTAL, &labels).increment(1);
    histogram!(names::JOB_DURATION_SECONDS, &labels).record(duration_secs);
}

pub fn set_active_jobs(count: usize) {
    gauge!(names::JOBS_ACTIVE).set(count as f64);
}

pub fn record_shot_generated(operation: &str) {
    let labels = [("operation", operation.to_string())];
    counter!(names::SHOTS_GENERATED_TOTAL, &labels).increment(1);
}

pub fn record_remote_call(operation: &str, duration_secs: f64) {
    let labels = [("operation", operation.to_string())];
    histogram!(names::REMOTE_CALL_DURATION_SECONDS, &labels).record(duration_secs);
}

//! Prometheus metrics for the API server.

use std::sync::LazyLock;
use std::time::Instant;

use axum::body::Body;
use axum::http::{Request, Response};
use axum::middleware::Next;
use metrics::{counter, gauge, histogram};
use metrics_exporter_prometheus::{BuildError, PrometheusBuilder, PrometheusHandle};
use regex_lite::Regex;

/// Initialize the Prometheus metrics recorder.
/// Returns a handle that can be used to render metrics.
pub fn init_metrics() -> Result<PrometheusHandle, BuildError> {
    PrometheusBuilder::new().install_recorder()
}

/// Metric names as constants for consistency.
pub mod names {
    // HTTP metrics
    pub const HTTP_REQUESTS_TOTAL: &str = "seqgen_http_requests_total";
    pub const HTTP_REQUEST_DURATION_SECONDS: &str = "seqgen_http_request_duration_seconds";
    pub const HTTP_REQUESTS_IN_FLIGHT: &str = "seqgen_http_requests_in_flight";

    // Progress stream metrics
    pub const STREAMS_OPENED_TOTAL: &str = "seqgen_streams_opened_total";
    pub const STREAMS_ACTIVE: &str = "seqgen_streams_active";
    pub const STREAM_EVENTS_SENT: &str = "seqgen_stream_events_sent_total";

    // Stitching
    pub const STITCH_DURATION_SECONDS: &str = "seqgen_stitch_duration_seconds";

    // Rate limiting metrics
    pub const RATE_LIMIT_HITS_TOTAL: &str = "seqgen_rate_limit_hits_total";
}

/// Record an HTTP request.
pub fn record_http_request(method: &str, path: &str, status: u16, duration_secs: f64) {
    let labels = [
        ("method", method.to_string()),
        ("path", sanitize_path(path)),
        ("status", status.to_string()),
    ];

    counter!(names::HTTP_REQUESTS_TOTAL, &labels).increment(1);
    histogram!(names::HTTP_REQUEST_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record a progress stream being attached.
pub fn record_stream_opened() {
    counter!(names::STREAMS_OPENED_TOTAL).increment(1);
    gauge!(names::STREAMS_ACTIVE).increment(1.0);
}

/// Record a progress stream ending or disconnecting.
pub fn record_stream_closed() {
    gauge!(names::STREAMS_ACTIVE).decrement(1.0);
}

/// Record an event pushed to a stream reader.
pub fn record_stream_event(event_type: &str) {
    let labels = [("type", event_type.to_string())];
    counter!(names::STREAM_EVENTS_SENT, &labels).increment(1);
}

pub fn record_stitch(status: &str, duration_secs: f64) {
    let labels = [("status", status.to_string())];
    histogram!(names::STITCH_DURATION_SECONDS, &labels).record(duration_secs);
}

/// Record rate limit hit.
pub fn record_rate_limit_hit(endpoint: &str) {
    let labels = [("endpoint", sanitize_path(endpoint))];
    counter!(names::RATE_LIMIT_HITS_TOTAL, &labels).increment(1);
}

static SEQUENCE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"sequence_[0-9]{8}_[0-9]{6}_[0-9a-f]+").expect("valid regex"));
static STATUS_VIDEO_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/status/[A-Za-z0-9_-]+").expect("valid regex"));
static NUMERIC_SEGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"/[0-9]+(/|$)").expect("valid regex"));

/// Sanitize path for metrics labels (remove IDs, etc.).
fn sanitize_path(path: &str) -> String {
    let path = SEQUENCE_ID.replace_all(path, ":id");
    let path = STATUS_VIDEO_ID.replace_all(&path, "/status/:video_id");
    let path = NUMERIC_SEGMENT.replace_all(&path, "/:n$1");
    path.to_string()
}

/// Metrics middleware for HTTP requests.
pub async fn metrics_middleware(request: Request<Body>, next: Next) -> Response<Body> {
    let method = request.method().to_string();
    let path = request.uri().path().to_string();
    let start = Instant::now();

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).increment(1.0);

    let response = next.run(request).await;

    gauge!(names::HTTP_REQUESTS_IN_FLIGHT).decrement(1.0);

    let status = response.status().as_u16();
    let duration = start.elapsed().as_secs_f64();

    record_http_request(&method, &path, status, duration);

    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sanitize_path() {
        assert_eq!(
            sanitize_path("/api/download/sequence_20250101_120000_0a1b2c3d4e5f/2"),
            "/api/download/:id/:n"
        );
        assert_eq!(
            sanitize_path("/api/stream/sequence_20250101_120000_deadbeef"),
            "/api/stream/:id"
        );
        assert_eq!(sanitize_path("/api/status/video_abc123"), "/api/status/:video_id");
        assert_eq!(sanitize_path("/health"), "/health");
    }
}

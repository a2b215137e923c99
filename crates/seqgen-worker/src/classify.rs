//! Failure classification for user-facing messages.
//!
//! Provider errors only come as free text, so matching is best-effort and
//! case-insensitive. The raw text is always kept next to the message.

use seqgen_models::ErrorKind;
use seqgen_video_client::VideoClientError;

use crate::error::WorkerError;

const BILLING_MARKERS: &[&str] = &["billing", "hard limit", "insufficient_quota", "exceeded your current quota"];
const CREDENTIAL_MARKERS: &[&str] = &["invalid_api_key", "incorrect api key", "invalid api key", "unauthorized"];

/// Classify provider error text.
pub fn classify_text(raw: &str) -> ErrorKind {
    let lower = raw.to_lowercase();
    if BILLING_MARKERS.iter().any(|m| lower.contains(m)) {
        ErrorKind::BillingLimit
    } else if CREDENTIAL_MARKERS.iter().any(|m| lower.contains(m)) {
        ErrorKind::InvalidCredential
    } else {
        ErrorKind::Remote
    }
}

/// Classify a job failure and produce the message shown to the user.
pub fn classify_error(err: &WorkerError) -> (ErrorKind, String) {
    let raw = err.to_string();
    let kind = match err {
        WorkerError::Config(_) | WorkerError::Remote(VideoClientError::MissingApiKey) => ErrorKind::Config,
        WorkerError::Validation(_) | WorkerError::Busy(_) => ErrorKind::Validation,
        WorkerError::Timeout { .. } => ErrorKind::Timeout,
        WorkerError::Cancelled => ErrorKind::Cancelled,
        WorkerError::Remote(VideoClientError::Api { status: 401, .. }) => ErrorKind::InvalidCredential,
        WorkerError::Remote(VideoClientError::Io(_)) | WorkerError::Io(_) | WorkerError::Media(_) => ErrorKind::Internal,
        WorkerError::Remote(_) => classify_text(&raw),
        WorkerError::JobFailed(_) | WorkerError::Queue(_) => ErrorKind::Internal,
    };

    let message = match kind {
        ErrorKind::Config => "API key not configured or is empty".to_string(),
        ErrorKind::BillingLimit => {
            "Billing limit reached. Please check your OpenAI account billing settings.".to_string()
        }
        ErrorKind::InvalidCredential => "Invalid API key. Please update your API key and try again.".to_string(),
        ErrorKind::Remote => format!("Video generation failed: {}", raw),
        ErrorKind::Timeout => format!("Generation timed out: {}", raw),
        ErrorKind::Cancelled => "Generation cancelled".to_string(),
        ErrorKind::Validation => raw,
        ErrorKind::Internal => match err {
            WorkerError::Media(_) => format!("Failed to prepare reference image: {}", raw),
            WorkerError::JobFailed(_) | WorkerError::Queue(_) => format!("Internal error: {}", raw),
            _ => format!("Failed to save generated video: {}", raw),
        },
    };

    (kind, message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_text() {
        assert_eq!(classify_text("Billing hard limit has been reached"), ErrorKind::BillingLimit);
        assert_eq!(classify_text("Incorrect API key provided: sk-***"), ErrorKind::InvalidCredential);
        assert_eq!(classify_text("code: INVALID_API_KEY"), ErrorKind::InvalidCredential);
        assert_eq!(classify_text("Blocked by moderation"), ErrorKind::Remote);
    }

    #[test]
    fn test_remote_error_keeps_raw_text() {
        let err = WorkerError::Remote(VideoClientError::api(400, "Blocked by moderation"));
        let (kind, message) = classify_error(&err);
        assert_eq!(kind, ErrorKind::Remote);
        assert!(message.starts_with("Video generation failed:"));
        assert!(message.contains("Blocked by moderation"));
    }

    #[test]
    fn test_structural_kinds() {
        let (kind, _) = classify_error(&WorkerError::Remote(VideoClientError::MissingApiKey));
        assert_eq!(kind, ErrorKind::Config);

        let (kind, _) = classify_error(&WorkerError::Remote(VideoClientError::api(401, "nope")));
        assert_eq!(kind, ErrorKind::InvalidCredential);

        let (kind, message) = classify_error(&WorkerError::timeout("Remix for shot 2", 900));
        assert_eq!(kind, ErrorKind::Timeout);
        assert!(message.contains("900 seconds"));

        let (kind, _) = classify_error(&WorkerError::Cancelled);
        assert_eq!(kind.terminal_status().as_str(), "cancelled");
    }

    #[test]
    fn test_internal_messages() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "read-only");
        let (kind, message) = classify_error(&WorkerError::Io(io));
        assert_eq!(kind, ErrorKind::Internal);
        assert!(message.starts_with("Failed to save generated video"));

        let (kind, message) = classify_error(&WorkerError::job_failed("worker panicked"));
        assert_eq!(kind, ErrorKind::Internal);
        assert!(message.contains("worker panicked"));
    }

    #[test]
    fn test_failed_render_is_classified_by_text() {
        let err = WorkerError::Remote(VideoClientError::GenerationFailed {
            video_id: "video_1".into(),
            message: "billing_hard_limit_reached".into(),
        });
        assert_eq!(classify_error(&err).0, ErrorKind::BillingLimit);
    }
}

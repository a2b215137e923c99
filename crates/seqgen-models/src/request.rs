//! Submission request and response bodies.

use serde::{Deserialize, Serialize};
use validator::{Validate, ValidationError};

use crate::job::JobId;
use crate::shot::{Shot, MAX_SHOTS};

/// Request to generate a new sequence.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_generate_shots"))]
pub struct GenerateRequest {
    /// Shots in order (1-3)
    #[validate(length(min = 1, max = 3, message = "Between 1 and 3 shots are required"), nested)]
    pub shots: Vec<Shot>,

    /// Output size, e.g. `1024x1792`
    #[serde(default)]
    pub quality: Option<String>,

    /// Generation model
    #[serde(default)]
    pub model: Option<String>,
}

/// Request to continue an existing remote video through remix calls.
#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[validate(schema(function = "validate_remix_dialogs"))]
pub struct RemixRequest {
    /// Remote identifier of the video to continue from
    #[validate(length(min = 1, max = 256))]
    pub video_id: String,

    /// Remix shots in order (1-3)
    #[validate(length(min = 1, max = 3, message = "Between 1 and 3 shots are required"), nested)]
    pub shots: Vec<Shot>,
}

/// Shot 1 needs a description; later shots are remixes and need dialog.
fn validate_generate_shots(request: &GenerateRequest) -> Result<(), ValidationError> {
    if request.shots.first().is_some_and(Shot::is_blank) {
        let mut err = ValidationError::new("shot_blank");
        err.message = Some("Shot 1 has no description".into());
        return Err(err);
    }
    if let Some(index) = request.shots.iter().skip(1).position(|s| s.dialog().is_none()) {
        let mut err = ValidationError::new("dialog_required");
        err.message = Some(format!("Shot {} requires dialog", index + 2).into());
        return Err(err);
    }
    Ok(())
}

/// Every remix shot must say something.
fn validate_remix_dialogs(request: &RemixRequest) -> Result<(), ValidationError> {
    if request.shots.iter().any(|s| s.dialog().is_none()) {
        let mut err = ValidationError::new("dialog_required");
        err.message = Some("Each remix shot requires dialog".into());
        return Err(err);
    }
    Ok(())
}

/// Response returned as soon as a job is accepted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobAccepted {
    pub job_id: JobId,
    pub stream_url: String,
    pub result_url: String,
    pub total_shots: u8,
}

impl JobAccepted {
    pub fn new(job_id: JobId, total_shots: usize) -> Self {
        Self {
            stream_url: format!("/api/stream/{}", job_id),
            result_url: format!("/api/result/{}", job_id),
            job_id,
            total_shots: total_shots.min(MAX_SHOTS) as u8,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generate_request_shot_bounds() {
        let empty = GenerateRequest { shots: vec![], quality: None, model: None };
        assert!(empty.validate().is_err());

        let four = GenerateRequest {
            shots: vec![Shot::with_dialog("a"); 4],
            quality: None,
            model: None,
        };
        assert!(four.validate().is_err());

        let three = GenerateRequest {
            shots: vec![Shot::with_dialog("a"); 3],
            quality: None,
            model: None,
        };
        assert!(three.validate().is_ok());
    }

    #[test]
    fn test_generate_rejects_blank_first_shot() {
        let request = GenerateRequest {
            shots: vec![Shot {
                dialog: Some("  ".into()),
                ..Default::default()
            }],
            quality: None,
            model: None,
        };
        assert!(request.validate().is_err());

        let request = GenerateRequest {
            shots: vec![Shot {
                environment: Some("a diner".into()),
                ..Default::default()
            }],
            quality: None,
            model: None,
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_generate_continuation_shots_require_dialog() {
        let request = GenerateRequest {
            shots: vec![
                Shot::with_dialog("A"),
                Shot {
                    characters: Some("x".into()),
                    ..Default::default()
                },
            ],
            quality: None,
            model: None,
        };
        let err = request.validate().unwrap_err();
        assert!(err.to_string().contains("Shot 2 requires dialog"));
    }

    #[test]
    fn test_remix_requires_dialog() {
        let request = RemixRequest {
            video_id: "video_123".to_string(),
            shots: vec![Shot::with_dialog("Hi"), Shot::default()],
        };
        assert!(request.validate().is_err());

        let request = RemixRequest {
            video_id: "video_123".to_string(),
            shots: vec![Shot::with_dialog("Hi")],
        };
        assert!(request.validate().is_ok());
    }

    #[test]
    fn test_job_accepted_urls() {
        let id = JobId::from_string("sequence_x");
        let accepted = JobAccepted::new(id, 2);
        assert_eq!(accepted.stream_url, "/api/stream/sequence_x");
        assert_eq!(accepted.result_url, "/api/result/sequence_x");
        assert_eq!(accepted.total_shots, 2);
    }
}

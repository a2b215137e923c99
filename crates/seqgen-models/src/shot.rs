//! Shot descriptions.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Maximum number of shots in one sequence.
pub const MAX_SHOTS: usize = 3;

/// One user-supplied shot description.
///
/// All fields are optional free text. Remix shots additionally require
/// a non-blank `dialog`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema, Validate)]
pub struct Shot {
    /// Who appears in the shot
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2000))]
    pub characters: Option<String>,

    /// Where the shot takes place
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2000))]
    pub environment: Option<String>,

    /// Lighting description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2000))]
    pub lighting: Option<String>,

    /// Camera angles and movement
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2000))]
    pub camera_angles: Option<String>,

    /// Spoken line
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2000))]
    pub dialog: Option<String>,

    /// Voice or microphone description
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[validate(length(max = 2000))]
    pub voice: Option<String>,
}

impl Shot {
    /// Create a shot that only carries dialog.
    pub fn with_dialog(dialog: impl Into<String>) -> Self {
        Self {
            dialog: Some(dialog.into()),
            ..Default::default()
        }
    }

    pub fn characters(&self) -> Option<&str> {
        non_blank(&self.characters)
    }

    pub fn environment(&self) -> Option<&str> {
        non_blank(&self.environment)
    }

    pub fn lighting(&self) -> Option<&str> {
        non_blank(&self.lighting)
    }

    pub fn camera_angles(&self) -> Option<&str> {
        non_blank(&self.camera_angles)
    }

    pub fn dialog(&self) -> Option<&str> {
        non_blank(&self.dialog)
    }

    pub fn voice(&self) -> Option<&str> {
        non_blank(&self.voice)
    }

    /// True when no field carries any text.
    pub fn is_blank(&self) -> bool {
        self.characters().is_none()
            && self.environment().is_none()
            && self.lighting().is_none()
            && self.camera_angles().is_none()
            && self.dialog().is_none()
            && self.voice().is_none()
    }
}

/// Treat missing and whitespace-only fields the same way.
fn non_blank(field: &Option<String>) -> Option<&str> {
    field.as_deref().map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_blank_fields_are_absent() {
        let shot = Shot {
            characters: Some("   ".to_string()),
            environment: Some(" a diner ".to_string()),
            ..Default::default()
        };

        assert_eq!(shot.characters(), None);
        assert_eq!(shot.environment(), Some("a diner"));
        assert_eq!(shot.dialog(), None);
    }

    #[test]
    fn test_shot_deserializes_missing_fields() {
        let shot: Shot = serde_json::from_str(r#"{"dialog":"Hello"}"#).unwrap();
        assert_eq!(shot, Shot::with_dialog("Hello"));
    }
}

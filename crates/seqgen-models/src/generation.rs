//! Generation parameters.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Default output size (vertical high-res).
pub const DEFAULT_QUALITY: &str = "1024x1792";

/// Default generation model.
pub const DEFAULT_MODEL: &str = "sora-2-pro";

/// Fixed clip length for newly created shots.
pub const SHOT_DURATION_SECONDS: u32 = 12;

/// Pixel dimensions in `WIDTHxHEIGHT` form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct VideoSize {
    pub width: u32,
    pub height: u32,
}

impl VideoSize {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }
}

impl Default for VideoSize {
    fn default() -> Self {
        Self::new(1024, 1792)
    }
}

impl fmt::Display for VideoSize {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.width, self.height)
    }
}

impl FromStr for VideoSize {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (w, h) = s
            .trim()
            .split_once(['x', 'X'])
            .ok_or_else(|| format!("Invalid size '{}', expected WIDTHxHEIGHT", s))?;
        let width: u32 = w.parse().map_err(|_| format!("Invalid width in '{}'", s))?;
        let height: u32 = h.parse().map_err(|_| format!("Invalid height in '{}'", s))?;
        if width == 0 || height == 0 {
            return Err(format!("Size '{}' must be non-zero", s));
        }
        Ok(Self { width, height })
    }
}

impl TryFrom<String> for VideoSize {
    type Error = String;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<VideoSize> for String {
    fn from(size: VideoSize) -> Self {
        size.to_string()
    }
}

/// Options shared by every shot of one sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationOptions {
    /// Output size passed to the create call
    pub quality: VideoSize,
    /// Model passed to the create call
    pub model: String,
}

impl Default for GenerationOptions {
    fn default() -> Self {
        Self {
            quality: VideoSize::default(),
            model: DEFAULT_MODEL.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_video_size_parse() {
        let size: VideoSize = "1792x1024".parse().unwrap();
        assert_eq!(size, VideoSize::new(1792, 1024));
        assert_eq!(size.to_string(), "1792x1024");
        assert_eq!(DEFAULT_QUALITY.parse::<VideoSize>().unwrap(), VideoSize::default());
    }

    #[test]
    fn test_video_size_rejects_garbage() {
        assert!("big".parse::<VideoSize>().is_err());
        assert!("0x100".parse::<VideoSize>().is_err());
        assert!("100x".parse::<VideoSize>().is_err());
    }

    #[test]
    fn test_video_size_serializes_as_string() {
        let json = serde_json::to_string(&VideoSize::new(720, 1280)).unwrap();
        assert_eq!(json, "\"720x1280\"");
    }
}

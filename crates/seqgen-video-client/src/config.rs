//! Video client configuration.

use std::path::PathBuf;
use std::time::Duration;

/// Default API root.
pub const DEFAULT_BASE_URL: &str = "https://api.openai.com/v1";

/// Configuration for the video-generation client.
#[derive(Debug, Clone)]
pub struct VideoClientConfig {
    /// API root, without trailing slash
    pub base_url: String,
    /// API key from the environment; takes precedence over the config file
    pub api_key: Option<String>,
    /// JSON file holding `{"openai_api_key": ".."}`
    pub config_path: PathBuf,
    /// Per-request timeout
    pub timeout: Duration,
    /// Delay between status polls while a video renders
    pub poll_interval: Duration,
    /// Max retries for transient failures
    pub max_retries: u32,
}

impl Default for VideoClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: None,
            config_path: PathBuf::from("config.json"),
            timeout: Duration::from_secs(120),
            poll_interval: Duration::from_secs(10),
            max_retries: 2,
        }
    }
}

impl VideoClientConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            base_url: std::env::var("OPENAI_BASE_URL")
                .map(|s| s.trim_end_matches('/').to_string())
                .unwrap_or(defaults.base_url),
            api_key: std::env::var("OPENAI_API_KEY")
                .ok()
                .map(|k| k.trim().to_string())
                .filter(|k| !k.is_empty()),
            config_path: std::env::var("CONFIG_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.config_path),
            timeout: Duration::from_secs(
                std::env::var("OPENAI_TIMEOUT")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(120),
            ),
            poll_interval: Duration::from_secs(
                std::env::var("OPENAI_POLL_INTERVAL")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(10),
            ),
            max_retries: std::env::var("OPENAI_MAX_RETRIES")
                .ok()
                .and_then(|s| s.parse().ok())
                .unwrap_or(2),
        }
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_config_defaults() {
        let config = VideoClientConfig::default();
        assert_eq!(config.base_url, DEFAULT_BASE_URL);
        assert_eq!(config.poll_interval, Duration::from_secs(10));
        assert_eq!(config.config_path, PathBuf::from("config.json"));
    }
}

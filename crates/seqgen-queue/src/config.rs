//! Registry configuration.

use std::str::FromStr;
use std::time::Duration;

use crate::error::QueueError;

/// Where terminal results are kept.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StoreBackend {
    #[default]
    Memory,
    Redis,
}

impl FromStr for StoreBackend {
    type Err = QueueError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "memory" | "in-memory" | "" => Ok(StoreBackend::Memory),
            "redis" => Ok(StoreBackend::Redis),
            other => Err(QueueError::Config(format!("unknown result store '{}'", other))),
        }
    }
}

/// Configuration for the job registry.
#[derive(Debug, Clone)]
pub struct QueueConfig {
    pub backend: StoreBackend,
    /// Redis URL, used by the Redis backend
    pub redis_url: String,
    /// Expiry for stored results (Redis only); `None` keeps them forever
    pub result_ttl: Option<Duration>,
    /// Key prefix for Redis entries
    pub key_prefix: String,
    /// How long a finished, never-read progress channel is kept
    pub channel_retention: Duration,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            redis_url: "redis://localhost:6379".to_string(),
            result_ttl: None,
            key_prefix: "seqgen".to_string(),
            channel_retention: Duration::from_secs(3600),
        }
    }
}

impl QueueConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Result<Self, QueueError> {
        let defaults = Self::default();
        Ok(Self {
            backend: std::env::var("RESULT_STORE")
                .ok()
                .map(|s| s.parse())
                .transpose()?
                .unwrap_or_default(),
            redis_url: std::env::var("REDIS_URL").unwrap_or(defaults.redis_url),
            result_ttl: std::env::var("RESULT_TTL_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            key_prefix: std::env::var("REDIS_KEY_PREFIX").unwrap_or(defaults.key_prefix),
            channel_retention: std::env::var("CHANNEL_RETENTION_SECS")
                .ok()
                .and_then(|s| s.parse::<u64>().ok())
                .map(Duration::from_secs)
                .unwrap_or(defaults.channel_retention),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backend_parse() {
        assert_eq!("redis".parse::<StoreBackend>().unwrap(), StoreBackend::Redis);
        assert_eq!("Memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert!("postgres".parse::<StoreBackend>().is_err());
    }

    #[test]
    fn test_defaults_never_expire() {
        let config = QueueConfig::default();
        assert_eq!(config.backend, StoreBackend::Memory);
        assert!(config.result_ttl.is_none());
        assert_eq!(config.channel_retention, Duration::from_secs(3600));
    }
}

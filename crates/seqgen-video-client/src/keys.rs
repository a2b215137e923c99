//! API key loading and persistence.
//!
//! The key is resolved on every use, so a key saved through the API applies
//! to the next remote call without a restart.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::config::VideoClientConfig;
use crate::error::{VideoClientError, VideoClientResult};

/// Value shipped in sample config files.
pub const API_KEY_PLACEHOLDER: &str = "your-api-key-here";

#[derive(Debug, Default, Serialize, Deserialize)]
struct KeyFile {
    #[serde(default)]
    openai_api_key: Option<String>,
}

/// Whether a usable key is available.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyStatus {
    /// A key was found
    pub configured: bool,
    /// The key is non-empty and not the placeholder
    pub has_value: bool,
}

/// Resolves the API key from the environment or a JSON config file.
#[derive(Debug, Clone)]
pub struct ApiKeyStore {
    config_path: PathBuf,
    env_key: Option<String>,
}

impl ApiKeyStore {
    pub fn new(config_path: impl AsRef<Path>) -> Self {
        Self {
            config_path: config_path.as_ref().to_path_buf(),
            env_key: None,
        }
    }

    pub fn from_config(config: &VideoClientConfig) -> Self {
        Self {
            config_path: config.config_path.clone(),
            env_key: config.api_key.clone(),
        }
    }

    pub fn with_env_key(mut self, key: Option<String>) -> Self {
        self.env_key = key;
        self
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Raw key as stored, if any.
    async fn raw_key(&self) -> Option<String> {
        if let Some(key) = &self.env_key {
            return Some(key.clone());
        }

        let contents = match tokio::fs::read_to_string(&self.config_path).await {
            Ok(contents) => contents,
            Err(e) => {
                debug!("Config file {} not readable: {}", self.config_path.display(), e);
                return None;
            }
        };

        match serde_json::from_str::<KeyFile>(&contents) {
            Ok(file) => file.openai_api_key,
            Err(e) => {
                debug!("Config file {} is not valid JSON: {}", self.config_path.display(), e);
                None
            }
        }
    }

    /// Load a usable key.
    pub async fn load(&self) -> VideoClientResult<String> {
        self.raw_key()
            .await
            .map(|k| k.trim().to_string())
            .filter(|k| !k.is_empty() && k != API_KEY_PLACEHOLDER)
            .ok_or(VideoClientError::MissingApiKey)
    }

    pub async fn status(&self) -> KeyStatus {
        let key = self.raw_key().await;
        let has_value = key
            .as_deref()
            .map(str::trim)
            .map(|k| !k.is_empty() && k != API_KEY_PLACEHOLDER)
            .unwrap_or(false);
        KeyStatus {
            configured: key.is_some(),
            has_value,
        }
    }

    /// Write the key to the config file.
    ///
    /// An environment key still takes precedence over the saved one.
    pub async fn save(&self, api_key: &str) -> VideoClientResult<()> {
        let api_key = api_key.trim();
        if api_key.is_empty() {
            return Err(VideoClientError::MissingApiKey);
        }

        if let Some(parent) = self.config_path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent).await?;
            }
        }

        let body = serde_json::to_string_pretty(&KeyFile {
            openai_api_key: Some(api_key.to_string()),
        })?;
        tokio::fs::write(&self.config_path, body).await?;

        info!("API key saved to {} (length: {})", self.config_path.display(), api_key.len());
        Ok(())
    }
}

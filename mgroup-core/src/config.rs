//! Configuration management.

use crate::error::{GroupError, Result};
use crate::paths;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Persistent configuration for marathon-group.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub storage: StorageConfig,
    pub artifacts: ArtifactConfig,
    pub operation_timeout_secs: u64,
    pub retry_attempts: u32,
    pub retry_delay_ms: u64,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            artifacts: ArtifactConfig::default(),
            operation_timeout_secs: 300,
            retry_attempts: 3,
            retry_delay_ms: 1000,
            log_level: "info".to_string(),
        }
    }
}

/// Block storage settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub rexray_bin: String,
    pub volume_size_gb: u64,
    pub filesystem: String,
    pub mount_root: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            rexray_bin: "rexray".to_string(),
            volume_size_gb: 16,
            filesystem: "ext4".to_string(),
            mount_root: paths::mount_root(),
        }
    }
}

/// Artifact strategy settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ArtifactConfig {
    pub staging_root: PathBuf,
    pub publish: PublishMethod,
    pub volume_policy: ArtifactVolumePolicy,
}

impl Default for ArtifactConfig {
    fn default() -> Self {
        Self {
            staging_root: paths::staging_root(),
            publish: PublishMethod::default(),
            volume_policy: ArtifactVolumePolicy::default(),
        }
    }
}

/// How archives reach the artifact server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "snake_case")]
pub enum PublishMethod {
    /// Copy into a directory served by the artifact server.
    Directory { serve_dir: PathBuf },
    /// Upload with HTTP PUT to the artifact server.
    HttpPut,
}

impl Default for PublishMethod {
    fn default() -> Self {
        PublishMethod::Directory { serve_dir: PathBuf::from("/var/www/html") }
    }
}

/// What happens to a bind volume once its content ships as an artifact.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ArtifactVolumePolicy {
    /// Leave the volume entry next to the new URI.
    #[default]
    Keep,
    /// Drop the volume entry from the app.
    Remove,
}

/// Bounded retry with exponential backoff for idempotent operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self { attempts: 3, delay: Duration::from_millis(1000) }
    }
}

impl Config {
    /// Load configuration from the default location.
    pub fn load() -> Result<Self> {
        Self::load_from(&paths::config_path())
    }

    /// Load configuration from a file. A missing file yields the defaults.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path).map_err(|e| GroupError::InvalidConfig {
            reason: format!("Failed to read config {:?}: {}", path, e),
        })?;
        let config: Config = serde_json::from_str(&content).map_err(|e| {
            GroupError::InvalidConfig {
                reason: format!("Failed to parse config {:?}: {}", path, e),
            }
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that could never work.
    pub fn validate(&self) -> Result<()> {
        if self.operation_timeout_secs == 0 {
            return Err(GroupError::InvalidConfig {
                reason: "operation_timeout_secs must be greater than zero".to_string(),
            });
        }
        if self.retry_attempts == 0 {
            return Err(GroupError::InvalidConfig {
                reason: "retry_attempts must be at least 1".to_string(),
            });
        }
        if self.storage.filesystem.is_empty() {
            return Err(GroupError::InvalidConfig {
                reason: "storage.filesystem must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn operation_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_timeout_secs)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            attempts: self.retry_attempts,
            delay: Duration::from_millis(self.retry_delay_ms),
        }
    }
}

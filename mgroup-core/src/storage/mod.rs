//! Block storage backend abstraction.
//!
//! The externalizer never touches host mount state itself; every device and
//! mount operation goes through a [`StorageBackend`].

pub mod command;
pub mod rexray;

use crate::error::BackendError;
use std::fmt;
use std::path::{Path, PathBuf};

pub use rexray::RexRayBackend;

/// Result type for backend operations.
pub type BackendResult<T> = std::result::Result<T, BackendError>;

/// Handle to a volume known to the storage backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeHandle {
    pub name: String,
}

/// Local block device a volume is mapped to (e.g. `/dev/xvdf`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevicePath(PathBuf);

impl DevicePath {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self(path.into())
    }

    pub fn as_path(&self) -> &Path {
        &self.0
    }
}

impl fmt::Display for DevicePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.display())
    }
}

/// Storage backend trait.
///
/// Provides the block volume lifecycle used to pre-populate external volumes.
#[async_trait::async_trait]
pub trait StorageBackend: Send + Sync {
    /// Check whether a volume with this name exists.
    async fn exists(&self, name: &str) -> BackendResult<bool>;

    /// Create a volume.
    async fn create(&self, name: &str) -> BackendResult<VolumeHandle>;

    /// Attach a volume to this host and return its block device.
    async fn map(&self, name: &str) -> BackendResult<DevicePath>;

    /// Create a filesystem on a device. Destroys any existing content.
    async fn format(&self, device: &DevicePath) -> BackendResult<()>;

    /// Mount a device at a local directory.
    async fn mount(&self, device: &DevicePath, mount_point: &Path) -> BackendResult<()>;

    /// Flush pending writes under a mount point to the device.
    async fn sync(&self, mount_point: &Path) -> BackendResult<()>;

    /// Unmount a device.
    async fn unmount(&self, device: &DevicePath) -> BackendResult<()>;

    /// Detach a volume from this host.
    async fn unmap(&self, name: &str) -> BackendResult<()>;
}

//! Block volume strategy.
//!
//! Provisioning: `CheckExists -> CreateIfAbsent -> MapDevice -> FormatDevice -> Ready`.
//! Content copy: `CheckVolume -> CheckSource -> MapDevice -> Mount ->
//! CreateDestPath -> Copy -> Sync -> Unmount -> UnmapDevice -> CleanupTemp`.
//!
//! Once a device is mapped or mounted, release steps run on every exit path.
//! The error of the main work wins over a cleanup error, which is logged.

use super::fsutil::{copy_target, copy_tree, normalize_permissions};
use super::{bounded, bounded_retry, ExternalizerSettings, VolumeRequest};
use crate::error::{BlockStep, GroupError, Result};
use crate::storage::{DevicePath, StorageBackend};
use crate::types::ExternalVolumeRef;
use std::fmt::Display;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// How a provisioning run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProvisionOutcome {
    /// The volume already existed and was left untouched.
    Existing,
    /// The volume was created and formatted.
    Created,
}

/// Pre-populates external block volumes from local directories.
#[derive(Clone)]
pub struct BlockVolumeExternalizer {
    backend: Arc<dyn StorageBackend>,
    settings: ExternalizerSettings,
}

impl BlockVolumeExternalizer {
    pub fn new(backend: Arc<dyn StorageBackend>, settings: ExternalizerSettings) -> Self {
        Self { backend, settings }
    }

    /// Provision the volume (if needed), copy the bind content into it and
    /// return the reference the app should use.
    #[instrument(skip(self, request), fields(volume = %request.name))]
    pub async fn externalize(&self, request: &VolumeRequest) -> Result<ExternalVolumeRef> {
        let outcome = self.provision(&request.name).await?;
        debug!("Provisioning of {} ended as {:?}", request.name, outcome);

        self.populate(&request.name, &request.source, &request.remainder_path).await?;
        Ok(ExternalVolumeRef::rexray(&request.name))
    }

    /// Make sure a formatted volume named `name` exists.
    ///
    /// An existing volume is never formatted again.
    #[instrument(skip(self))]
    pub async fn provision(&self, name: &str) -> Result<ProvisionOutcome> {
        let exists =
            self.step_retry(BlockStep::CheckExists, name, || self.backend.exists(name)).await?;
        if exists {
            info!("Volume {} already exists, skipping creation", name);
            return Ok(ProvisionOutcome::Existing);
        }

        info!("Creating volume {}", name);
        self.step(BlockStep::CreateIfAbsent, name, self.backend.create(name)).await?;

        let device = self.step(BlockStep::MapDevice, name, self.backend.map(name)).await?;
        let formatted =
            self.step(BlockStep::FormatDevice, name, self.backend.format(&device)).await;
        let unmapped =
            self.step_retry(BlockStep::UnmapDevice, name, || self.backend.unmap(name)).await;
        settle(formatted, [unmapped])?;

        info!("Volume {} created and formatted", name);
        Ok(ProvisionOutcome::Created)
    }

    /// Copy `source` into the volume at `dest_subpath` (relative to the
    /// volume root).
    #[instrument(skip(self))]
    pub async fn populate(&self, name: &str, source: &Path, dest_subpath: &str) -> Result<()> {
        let exists =
            self.step_retry(BlockStep::CheckVolume, name, || self.backend.exists(name)).await?;
        if !exists {
            return Err(GroupError::VolumeNotFound { volume: name.to_string() });
        }

        let source_exists = tokio::fs::try_exists(source).await.map_err(|e| {
            provisioning(BlockStep::CheckSource, name, format!("cannot stat {:?}: {}", source, e))
        })?;
        if !source_exists {
            return Err(GroupError::SourcePathNotFound { path: source.to_path_buf() });
        }

        let device = self.step(BlockStep::MapDevice, name, self.backend.map(name)).await?;
        let mount_point = self.mount_point(name);

        let copied = self.mount_and_copy(name, &device, &mount_point, source, dest_subpath).await;
        let unmapped =
            self.step_retry(BlockStep::UnmapDevice, name, || self.backend.unmap(name)).await;
        let cleaned = remove_mount_point(name, &mount_point).await;
        settle(copied, [unmapped, cleaned])?;

        info!("Populated volume {} from {:?}", name, source);
        Ok(())
    }

    async fn mount_and_copy(
        &self,
        name: &str,
        device: &DevicePath,
        mount_point: &Path,
        source: &Path,
        dest_subpath: &str,
    ) -> Result<()> {
        tokio::fs::create_dir_all(mount_point).await.map_err(|e| {
            provisioning(BlockStep::Mount, name, format!("cannot create {:?}: {}", mount_point, e))
        })?;
        self.step(BlockStep::Mount, name, self.backend.mount(device, mount_point)).await?;
        debug!("Mounted {} at {:?}", device, mount_point);

        let copied = self.copy_content(name, mount_point, source, dest_subpath).await;
        let unmounted =
            self.step_retry(BlockStep::Unmount, name, || self.backend.unmount(device)).await;
        settle(copied, [unmounted])
    }

    async fn copy_content(
        &self,
        name: &str,
        mount_point: &Path,
        source: &Path,
        dest_subpath: &str,
    ) -> Result<()> {
        let target = copy_target(mount_point, dest_subpath, source);
        let target_dir = if source.is_dir() {
            target.clone()
        } else {
            target.parent().map(Path::to_path_buf).unwrap_or_else(|| mount_point.to_path_buf())
        };
        tokio::fs::create_dir_all(&target_dir).await.map_err(|e| {
            provisioning(
                BlockStep::CreateDestPath,
                name,
                format!("cannot create {:?}: {}", target_dir, e),
            )
        })?;

        let (src, dst, root) = (source.to_path_buf(), target.clone(), mount_point.to_path_buf());
        let copy = async move {
            tokio::task::spawn_blocking(move || {
                copy_tree(&src, &dst)?;
                normalize_permissions(&root)
            })
            .await
            .map_err(|e| e.to_string())?
            .map_err(|e| e.to_string())
        };
        self.step(BlockStep::Copy, name, copy).await?;
        debug!("Copied {:?} to {:?}", source, target);

        self.step(BlockStep::Sync, name, self.backend.sync(mount_point)).await
    }

    fn mount_point(&self, name: &str) -> PathBuf {
        self.settings.mount_root.join(name.replace('/', "_"))
    }

    async fn step<T, E, Fut>(&self, step: BlockStep, volume: &str, op: Fut) -> Result<T>
    where
        E: Display,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        bounded(self.settings.operation_timeout, op)
            .await
            .map_err(|failure| provisioning(step, volume, failure.to_string()))
    }

    async fn step_retry<T, E, F, Fut>(&self, step: BlockStep, volume: &str, op: F) -> Result<T>
    where
        E: Display,
        F: FnMut() -> Fut,
        Fut: Future<Output = std::result::Result<T, E>>,
    {
        let what = format!("{} of {}", step, volume);
        bounded_retry(self.settings.retry, self.settings.operation_timeout, &what, op)
            .await
            .map_err(|failure| provisioning(step, volume, failure.to_string()))
    }
}

/// Remove the now-empty mount point.
///
/// Only `remove_dir`: if unmounting failed, the device content is still
/// visible here and must not be deleted.
async fn remove_mount_point(name: &str, mount_point: &Path) -> Result<()> {
    match tokio::fs::remove_dir(mount_point).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(provisioning(
            BlockStep::CleanupTemp,
            name,
            format!("cannot remove {:?}: {}", mount_point, e),
        )),
    }
}

fn provisioning(step: BlockStep, volume: &str, reason: String) -> GroupError {
    GroupError::Provisioning { step, volume: volume.to_string(), reason }
}

/// Combine the result of the main work with the results of its cleanup steps.
pub(crate) fn settle<T, const N: usize>(result: Result<T>, cleanups: [Result<()>; N]) -> Result<T> {
    match result {
        Err(e) => {
            for cleanup in cleanups {
                if let Err(cleanup_err) = cleanup {
                    warn!("Cleanup after failure also failed: {}", cleanup_err);
                }
            }
            Err(e)
        }
        Ok(value) => {
            let mut failures = cleanups.into_iter().filter_map(|c| c.err());
            match failures.next() {
                Some(first) => {
                    for other in failures {
                        warn!("Additional cleanup failure: {}", other);
                    }
                    Err(first)
                }
                None => Ok(value),
            }
        }
    }
}

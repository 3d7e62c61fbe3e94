//! REX-Ray storage backend.
//!
//! Drives the `rexray` CLI for volume lifecycle and the standard Linux tools
//! (`mkfs`, `mount`, `umount`, `sync`) for device handling.

use super::command::run;
use super::{BackendResult, DevicePath, StorageBackend, VolumeHandle};
use crate::config::StorageConfig;
use crate::error::BackendError;
use serde_json::Value;
use std::path::Path;
use tracing::{info, instrument};

/// Storage backend backed by a REX-Ray installation on this host.
#[derive(Debug, Clone)]
pub struct RexRayBackend {
    rexray_bin: String,
    volume_size_gb: u64,
    filesystem: String,
}

impl RexRayBackend {
    pub fn new(config: &StorageConfig) -> Self {
        Self {
            rexray_bin: config.rexray_bin.clone(),
            volume_size_gb: config.volume_size_gb,
            filesystem: config.filesystem.clone(),
        }
    }

    async fn rexray(&self, args: &[&str]) -> BackendResult<String> {
        run(&self.rexray_bin, args).await
    }
}

#[async_trait::async_trait]
impl StorageBackend for RexRayBackend {
    #[instrument(skip(self))]
    async fn exists(&self, name: &str) -> BackendResult<bool> {
        let out = self.rexray(&["volume", "ls", name, "--format", "json"]).await?;
        let volumes = parse_json(&self.rexray_bin, &out)?;
        Ok(volume_listed(&volumes, name))
    }

    #[instrument(skip(self))]
    async fn create(&self, name: &str) -> BackendResult<VolumeHandle> {
        let size = self.volume_size_gb.to_string();
        info!("Creating {}GB volume {}", size, name);
        self.rexray(&["volume", "create", name, "--size", size.as_str()]).await?;
        Ok(VolumeHandle { name: name.to_string() })
    }

    #[instrument(skip(self))]
    async fn map(&self, name: &str) -> BackendResult<DevicePath> {
        let out = self.rexray(&["volume", "attach", name, "--format", "json"]).await?;
        let attached = parse_json(&self.rexray_bin, &out)?;
        find_device_name(&attached).map(DevicePath::new).ok_or_else(|| {
            BackendError::UnexpectedOutput {
                program: self.rexray_bin.clone(),
                reason: format!("no device reported for volume {}", name),
            }
        })
    }

    #[instrument(skip(self), fields(device = %device))]
    async fn format(&self, device: &DevicePath) -> BackendResult<()> {
        info!("Formatting {} as {}", device, self.filesystem);
        let device = device.to_string();
        run("mkfs", &["-t", self.filesystem.as_str(), device.as_str()]).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(device = %device))]
    async fn mount(&self, device: &DevicePath, mount_point: &Path) -> BackendResult<()> {
        let device = device.to_string();
        let mount_point = mount_point.to_string_lossy().to_string();
        run("mount", &[device.as_str(), mount_point.as_str()]).await?;
        Ok(())
    }

    async fn sync(&self, _mount_point: &Path) -> BackendResult<()> {
        run("sync", &[]).await?;
        Ok(())
    }

    #[instrument(skip(self), fields(device = %device))]
    async fn unmount(&self, device: &DevicePath) -> BackendResult<()> {
        let device = device.to_string();
        run("umount", &[device.as_str()]).await?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn unmap(&self, name: &str) -> BackendResult<()> {
        self.rexray(&["volume", "detach", name]).await?;
        Ok(())
    }
}

fn parse_json(program: &str, out: &str) -> BackendResult<Value> {
    if out.trim().is_empty() {
        return Ok(Value::Array(Vec::new()));
    }
    serde_json::from_str(out).map_err(|e| BackendError::UnexpectedOutput {
        program: program.to_string(),
        reason: format!("invalid JSON: {}", e),
    })
}

/// Whether a `volume ls` listing contains a volume with exactly this name.
fn volume_listed(listing: &Value, name: &str) -> bool {
    let entries: Vec<&Value> = match listing {
        Value::Array(list) => list.iter().collect(),
        Value::Object(map) => map.values().collect(),
        _ => Vec::new(),
    };
    entries.iter().any(|v| v.get("name").and_then(Value::as_str) == Some(name))
}

/// First `deviceName` reported anywhere in an attach response.
fn find_device_name(value: &Value) -> Option<String> {
    match value {
        Value::Object(map) => {
            if let Some(Value::String(device)) = map.get("deviceName") {
                if !device.is_empty() {
                    return Some(device.clone());
                }
            }
            map.values().find_map(find_device_name)
        }
        Value::Array(list) => list.iter().find_map(find_device_name),
        _ => None,
    }
}

//! Artifact strategy.
//!
//! `StageDirectory -> CopyContent -> Compress -> Publish -> CleanupStaging`.
//! The staging directory is removed on every exit path.

use super::block::settle;
use super::fsutil::{copy_target, copy_tree};
use super::{bounded, bounded_retry, ExternalizerSettings, Failure, VolumeRequest};
use crate::error::{ArtifactStep, GroupError, Result};
use crate::publish::ArtifactPublisher;
use flate2::write::GzEncoder;
use flate2::Compression;
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, instrument};

/// Ships bind volume content as gzip-compressed tarballs.
#[derive(Clone)]
pub struct ArtifactExternalizer {
    publisher: Arc<dyn ArtifactPublisher>,
    settings: ExternalizerSettings,
}

impl ArtifactExternalizer {
    pub fn new(publisher: Arc<dyn ArtifactPublisher>, settings: ExternalizerSettings) -> Self {
        Self { publisher, settings }
    }

    /// Archive name for a derived volume name.
    pub fn artifact_name(volume_name: &str) -> String {
        format!("{}.tgz", volume_name)
    }

    /// Package the bind content, publish it to `server` and return the URI
    /// the app should fetch.
    #[instrument(skip(self, request), fields(volume = %request.name))]
    pub async fn externalize(&self, request: &VolumeRequest, server: &str) -> Result<String> {
        let artifact = Self::artifact_name(&request.name);

        let staging = self
            .settings
            .staging_root
            .join(format!("{}-{}", request.name.replace('/', "_"), uuid::Uuid::new_v4()));
        tokio::fs::create_dir_all(&staging).await.map_err(|e| {
            artifact_err(
                ArtifactStep::StageDirectory,
                &artifact,
                format!("cannot create {:?}: {}", staging, e),
            )
        })?;
        debug!("Staging {} in {:?}", artifact, staging);

        let published = self.package_and_publish(request, server, &artifact, &staging).await;
        let cleaned = tokio::fs::remove_dir_all(&staging).await.map_err(|e| {
            artifact_err(
                ArtifactStep::CleanupStaging,
                &artifact,
                format!("cannot remove {:?}: {}", staging, e),
            )
        });
        let uri = settle(published, [cleaned])?;

        info!("Published {} as {}", request.name, uri);
        Ok(uri)
    }

    async fn package_and_publish(
        &self,
        request: &VolumeRequest,
        server: &str,
        artifact: &str,
        staging: &Path,
    ) -> Result<String> {
        let source_exists = tokio::fs::try_exists(&request.source).await.map_err(|e| {
            artifact_err(
                ArtifactStep::CopyContent,
                artifact,
                format!("cannot stat {:?}: {}", request.source, e),
            )
        })?;
        if !source_exists {
            return Err(GroupError::SourcePathNotFound { path: request.source.clone() });
        }

        // content/<first segment>/<remainder> mirrors the container path.
        let content = staging.join("content");
        let top = content.join(&request.first_segment);
        let target = copy_target(&top, &request.remainder_path, &request.source);
        let source = request.source.clone();
        self.blocking(ArtifactStep::CopyContent, artifact, move || copy_tree(&source, &target))
            .await?;

        let archive = staging.join(artifact);
        let (archive_path, first_segment) = (archive.clone(), request.first_segment.clone());
        self.blocking(ArtifactStep::Compress, artifact, move || {
            write_archive(&archive_path, &first_segment, &top)
        })
        .await?;
        debug!("Compressed {} to {:?}", artifact, archive);

        let what = format!("{} of {}", ArtifactStep::Publish, artifact);
        bounded_retry(self.settings.retry, self.settings.operation_timeout, &what, || {
            self.publisher.publish(&archive, server, artifact)
        })
        .await
        .map_err(|failure| match failure {
            Failure::Failed(e) => e,
            timed_out => artifact_err(ArtifactStep::Publish, artifact, timed_out.to_string()),
        })
    }

    async fn blocking<F>(&self, step: ArtifactStep, artifact: &str, work: F) -> Result<()>
    where
        F: FnOnce() -> std::io::Result<()> + Send + 'static,
    {
        let task = async move {
            tokio::task::spawn_blocking(work)
                .await
                .map_err(|e| e.to_string())?
                .map_err(|e| e.to_string())
        };
        bounded(self.settings.operation_timeout, task)
            .await
            .map_err(|failure| artifact_err(step, artifact, failure.to_string()))
    }
}

/// Write `dir` into a gzip-compressed tarball at `archive`, rooted at `name`.
pub fn write_archive(archive: &Path, name: &str, dir: &Path) -> std::io::Result<()> {
    let file = File::create(archive)?;
    let encoder = GzEncoder::new(file, Compression::default());
    let mut builder = tar::Builder::new(encoder);
    builder.follow_symlinks(false);

    if dir.is_dir() {
        builder.append_dir_all(name, dir)?;
    } else {
        builder.append_path_with_name(dir, name)?;
    }

    builder.into_inner()?.finish()?.sync_all()
}

fn artifact_err(step: ArtifactStep, artifact: &str, reason: String) -> GroupError {
    GroupError::Artifact { step, artifact: artifact.to_string(), reason }
}

/// Every path inside a tarball, for inspection in tests and diagnostics.
pub fn archive_entries(archive: &Path) -> std::io::Result<Vec<PathBuf>> {
    let file = File::open(archive)?;
    let mut reader = tar::Archive::new(flate2::read::GzDecoder::new(file));
    let mut paths = Vec::new();
    for entry in reader.entries()? {
        paths.push(entry?.path()?.into_owned());
    }
    Ok(paths)
}

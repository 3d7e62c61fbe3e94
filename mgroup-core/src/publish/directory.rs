//! Publish by copying into a directory the artifact server serves.

use super::{artifact_uri, ArtifactPublisher};
use crate::error::{GroupError, Result};
use std::path::{Path, PathBuf};
use tracing::{info, instrument};

/// Publisher that drops archives into a served directory.
#[derive(Debug, Clone)]
pub struct DirectoryPublisher {
    serve_dir: PathBuf,
}

impl DirectoryPublisher {
    pub fn new(serve_dir: PathBuf) -> Self {
        Self { serve_dir }
    }
}

#[async_trait::async_trait]
impl ArtifactPublisher for DirectoryPublisher {
    #[instrument(skip(self, archive), fields(serve_dir = ?self.serve_dir))]
    async fn publish(&self, archive: &Path, server: &str, artifact_name: &str) -> Result<String> {
        let publish_err = |reason: String| GroupError::Publish {
            artifact: artifact_name.to_string(),
            reason,
        };

        tokio::fs::create_dir_all(&self.serve_dir)
            .await
            .map_err(|e| publish_err(format!("cannot create {:?}: {}", self.serve_dir, e)))?;

        // Copy under a temporary name first so the server never serves a
        // half-written archive.
        let target = self.serve_dir.join(artifact_name);
        let partial = self.serve_dir.join(format!(".{}.partial", artifact_name));
        tokio::fs::copy(archive, &partial)
            .await
            .map_err(|e| publish_err(format!("cannot copy to {:?}: {}", partial, e)))?;
        tokio::fs::rename(&partial, &target)
            .await
            .map_err(|e| publish_err(format!("cannot move into {:?}: {}", target, e)))?;

        info!("Published {} to {:?}", artifact_name, target);
        Ok(artifact_uri(server, artifact_name))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_publish_copies_and_returns_uri() {
        let src = TempDir::new().unwrap();
        let served = TempDir::new().unwrap();
        let archive = src.path().join("bundle.tgz");
        std::fs::write(&archive, b"archive bytes").unwrap();

        let publisher = DirectoryPublisher::new(served.path().join("www"));
        let uri = publisher.publish(&archive, "10.0.0.1", "g1-web-app.tgz").await.unwrap();

        assert_eq!(uri, "http://10.0.0.1/g1-web-app.tgz");
        let published = served.path().join("www").join("g1-web-app.tgz");
        assert_eq!(std::fs::read(published).unwrap(), b"archive bytes");
        assert!(!served.path().join("www").join(".g1-web-app.tgz.partial").exists());
    }

    #[tokio::test]
    async fn test_publish_missing_archive_fails() {
        let served = TempDir::new().unwrap();
        let publisher = DirectoryPublisher::new(served.path().to_path_buf());
        let err = publisher
            .publish(Path::new("/nonexistent/bundle.tgz"), "10.0.0.1", "x.tgz")
            .await
            .unwrap_err();
        assert!(matches!(err, GroupError::Publish { .. }));
    }
}

//! Artifact publishing.
//!
//! A publisher makes a local archive downloadable from the artifact server
//! and returns the URI the orchestrator should fetch.

pub mod directory;
pub mod http;

use crate::config::PublishMethod;
use crate::error::Result;
use std::path::Path;
use std::sync::Arc;

pub use directory::DirectoryPublisher;
pub use http::HttpPutPublisher;

/// Artifact publisher trait.
#[async_trait::async_trait]
pub trait ArtifactPublisher: Send + Sync {
    /// Publish `archive` as `artifact_name` on `server` and return its URI.
    async fn publish(&self, archive: &Path, server: &str, artifact_name: &str) -> Result<String>;
}

/// Download URI of an artifact on the artifact server.
pub fn artifact_uri(server: &str, artifact_name: &str) -> String {
    format!("http://{}/{}", server, artifact_name)
}

/// Build the publisher selected in configuration.
pub fn from_config(method: &PublishMethod) -> Result<Arc<dyn ArtifactPublisher>> {
    Ok(match method {
        PublishMethod::Directory { serve_dir } => {
            Arc::new(DirectoryPublisher::new(serve_dir.clone()))
        }
        PublishMethod::HttpPut => Arc::new(HttpPutPublisher::new()?),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_artifact_uri() {
        assert_eq!(artifact_uri("10.0.0.1", "g1-web-app.tgz"), "http://10.0.0.1/g1-web-app.tgz");
        assert_eq!(
            artifact_uri("files.local:8080", "g1-web-app.tgz"),
            "http://files.local:8080/g1-web-app.tgz"
        );
    }
}

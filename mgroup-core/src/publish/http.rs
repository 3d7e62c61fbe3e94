//! Publish by uploading to the artifact server over HTTP.

use super::{artifact_uri, ArtifactPublisher};
use crate::error::{GroupError, Result};
use reqwest::Client;
use std::path::Path;
use tracing::{info, instrument};

/// Publisher that uploads archives with `PUT http://<server>/<artifact>`.
#[derive(Debug, Clone)]
pub struct HttpPutPublisher {
    client: Client,
}

impl HttpPutPublisher {
    pub fn new() -> Result<Self> {
        let client = Client::builder().build().map_err(|e| GroupError::InvalidConfig {
            reason: format!("Failed to create HTTP client: {}", e),
        })?;
        Ok(Self { client })
    }
}

#[async_trait::async_trait]
impl ArtifactPublisher for HttpPutPublisher {
    #[instrument(skip(self, archive))]
    async fn publish(&self, archive: &Path, server: &str, artifact_name: &str) -> Result<String> {
        let publish_err = |reason: String| GroupError::Publish {
            artifact: artifact_name.to_string(),
            reason,
        };

        let body = tokio::fs::read(archive)
            .await
            .map_err(|e| publish_err(format!("cannot read {:?}: {}", archive, e)))?;

        let uri = artifact_uri(server, artifact_name);
        let response = self
            .client
            .put(&uri)
            .header(reqwest::header::CONTENT_TYPE, "application/gzip")
            .body(body)
            .send()
            .await
            .map_err(|e| publish_err(format!("upload to {} failed: {}", uri, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            return Err(publish_err(format!("upload to {} returned HTTP {}", uri, status)));
        }

        info!("Uploaded {} to {}", artifact_name, uri);
        Ok(uri)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Accept one request, return its raw bytes, and answer with `status`.
    async fn serve_once(status: &'static str) -> (String, tokio::task::JoinHandle<Vec<u8>>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap().to_string();

        let handle = tokio::spawn(async move {
            let (mut stream, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 4096];
            loop {
                let n = stream.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
                if request_complete(&request) {
                    break;
                }
            }
            let response =
                format!("HTTP/1.1 {}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n", status);
            stream.write_all(response.as_bytes()).await.unwrap();
            request
        });

        (addr, handle)
    }

    fn request_complete(request: &[u8]) -> bool {
        let text = String::from_utf8_lossy(request);
        let Some(header_end) = text.find("\r\n\r\n") else {
            return false;
        };
        let length = text[..header_end]
            .lines()
            .find_map(|l| {
                let (name, value) = l.split_once(':')?;
                name.eq_ignore_ascii_case("content-length").then(|| value.trim().parse().ok())?
            })
            .unwrap_or(0usize);
        request.len() >= header_end + 4 + length
    }

    #[tokio::test]
    async fn test_put_uploads_archive() {
        let dir = tempfile::TempDir::new().unwrap();
        let archive = dir.path().join("bundle.tgz");
        std::fs::write(&archive, b"tgz-bytes").unwrap();

        let (addr, server) = serve_once("201 Created").await;
        let publisher = HttpPutPublisher::new().unwrap();
        let uri = publisher.publish(&archive, &addr, "g1-web-app.tgz").await.unwrap();
        assert_eq!(uri, format!("http://{}/g1-web-app.tgz", addr));

        let request = String::from_utf8(server.await.unwrap()).unwrap();
        assert!(request.starts_with("PUT /g1-web-app.tgz HTTP/1.1"));
        assert!(request.ends_with("tgz-bytes"));
    }

    #[tokio::test]
    async fn test_put_rejected_by_server() {
        let dir = tempfile::TempDir::new().unwrap();
        let archive = dir.path().join("bundle.tgz");
        std::fs::write(&archive, b"tgz-bytes").unwrap();

        let (addr, _server) = serve_once("500 Internal Server Error").await;
        let publisher = HttpPutPublisher::new().unwrap();
        let err = publisher.publish(&archive, &addr, "g1-web-app.tgz").await.unwrap_err();
        assert!(matches!(err, GroupError::Publish { .. }));
    }
}

//! Volume externalization.
//!
//! Moves the content of a local bind volume somewhere the cluster can reach
//! it. Two strategies exist:
//! - [`BlockVolumeExternalizer`] pre-populates an external block volume
//! - [`ArtifactExternalizer`] ships the content as a downloadable archive
//!
//! Both run strictly one volume at a time: they share the host mount
//! namespace and staging tree.

pub mod artifact;
pub mod block;
pub mod fsutil;

use crate::config::{Config, RetryPolicy};
use std::fmt::{self, Display};
use std::future::Future;
use std::path::PathBuf;
use std::time::Duration;
use tracing::warn;

pub use artifact::ArtifactExternalizer;
pub use block::{BlockVolumeExternalizer, ProvisionOutcome};

/// One bind volume to externalize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeRequest {
    /// Derived unique name (`<group>-<app>-<sanitized host path>`)
    pub name: String,

    /// Local source path, already resolved against the source root
    pub source: PathBuf,

    /// First segment of the container path (e.g. `src` for `/src/app`)
    pub first_segment: String,

    /// Rest of the container path (e.g. `app` for `/src/app`), may be empty
    pub remainder_path: String,
}

/// Settings shared by both strategies.
#[derive(Debug, Clone)]
pub struct ExternalizerSettings {
    /// Directory block devices are mounted under while being populated
    pub mount_root: PathBuf,

    /// Directory artifact staging directories are created under
    pub staging_root: PathBuf,

    /// Upper bound for any single external operation
    pub operation_timeout: Duration,

    /// Retry policy for idempotent operations
    pub retry: RetryPolicy,
}

impl ExternalizerSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            mount_root: config.storage.mount_root.clone(),
            staging_root: config.artifacts.staging_root.clone(),
            operation_timeout: config.operation_timeout(),
            retry: config.retry_policy(),
        }
    }
}

/// Why a bounded operation did not succeed.
#[derive(Debug, PartialEq)]
pub(crate) enum Failure<E> {
    /// The operation itself failed.
    Failed(E),
    /// The operation did not finish in time.
    TimedOut(Duration),
}

impl<E: Display> Display for Failure<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Failed(e) => e.fmt(f),
            Self::TimedOut(limit) => write!(f, "timed out after {}s", limit.as_secs_f64()),
        }
    }
}

/// Run `op` under a timeout.
pub(crate) async fn bounded<T, E, Fut>(limit: Duration, op: Fut) -> Result<T, Failure<E>>
where
    Fut: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, op).await {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(e)) => Err(Failure::Failed(e)),
        Err(_) => Err(Failure::TimedOut(limit)),
    }
}

/// Run an idempotent operation under a timeout, retrying with exponential
/// backoff until it succeeds or the policy's attempts are used up.
pub(crate) async fn bounded_retry<T, E, F, Fut>(
    policy: RetryPolicy,
    limit: Duration,
    what: &str,
    mut op: F,
) -> Result<T, Failure<E>>
where
    E: Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let attempts = policy.attempts.max(1);
    let mut attempt = 1;
    loop {
        match bounded(limit, op()).await {
            Ok(value) => return Ok(value),
            Err(failure) if attempt < attempts => {
                let delay = policy.delay * 2u32.saturating_pow(attempt - 1);
                warn!(
                    "{} failed (attempt {}/{}): {}, retrying in {:?}",
                    what, attempt, attempts, failure, delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(failure) => return Err(failure),
        }
    }
}

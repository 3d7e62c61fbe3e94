//! Error types for marathon-group.
//!
//! All errors use `thiserror` so that the step and cause of a failure travel
//! with it up to the CLI.

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for marathon-group operations.
pub type Result<T> = std::result::Result<T, GroupError>;

/// Main error type for marathon-group.
#[derive(Error, Debug)]
pub enum GroupError {
    // Input errors
    #[error("Malformed input: {reason}")]
    MalformedInput { reason: String },

    #[error("Malformed volume {index} in app {app_id}: {reason}")]
    MalformedVolume { app_id: String, index: usize, reason: String },

    // Block volume errors
    #[error("Volume {volume}: {step} failed: {reason}")]
    Provisioning { step: BlockStep, volume: String, reason: String },

    #[error("Volume not found in storage backend: {volume}")]
    VolumeNotFound { volume: String },

    #[error("Source path not found: {path:?}")]
    SourcePathNotFound { path: PathBuf },

    // Artifact errors
    #[error("Artifact {artifact}: {step} failed: {reason}")]
    Artifact { step: ArtifactStep, artifact: String, reason: String },

    #[error("Failed to publish artifact {artifact}: {reason}")]
    Publish { artifact: String, reason: String },

    // Context wrapper so diagnostics name the failing app
    #[error("App {app_id}: {source}")]
    App {
        app_id: String,
        #[source]
        source: Box<GroupError>,
    },

    // Configuration errors
    #[error("Invalid configuration: {reason}")]
    InvalidConfig { reason: String },

    // File system errors
    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl GroupError {
    /// Attach the id of the app being transformed.
    pub fn in_app(self, app_id: &str) -> Self {
        Self::App { app_id: app_id.to_string(), source: Box::new(self) }
    }

    /// The innermost error, skipping any `App` wrappers.
    pub fn root(&self) -> &GroupError {
        match self {
            Self::App { source, .. } => source.root(),
            other => other,
        }
    }
}

/// Errors raised by a storage backend collaborator.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{program} exited with {status}: {stderr}")]
    CommandFailed { program: String, status: String, stderr: String },

    #[error("unexpected output from {program}: {reason}")]
    UnexpectedOutput { program: String, reason: String },
}

/// States of the block volume provisioning and content copy workflows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockStep {
    CheckExists,
    CreateIfAbsent,
    MapDevice,
    FormatDevice,
    CheckVolume,
    CheckSource,
    Mount,
    CreateDestPath,
    Copy,
    Sync,
    Unmount,
    UnmapDevice,
    CleanupTemp,
}

impl fmt::Display for BlockStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::CheckExists => "check-exists",
            Self::CreateIfAbsent => "create",
            Self::MapDevice => "map-device",
            Self::FormatDevice => "format-device",
            Self::CheckVolume => "check-volume",
            Self::CheckSource => "check-source",
            Self::Mount => "mount",
            Self::CreateDestPath => "create-dest-path",
            Self::Copy => "copy",
            Self::Sync => "sync",
            Self::Unmount => "unmount",
            Self::UnmapDevice => "unmap-device",
            Self::CleanupTemp => "cleanup-temp",
        };
        f.write_str(name)
    }
}

/// States of the artifact workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactStep {
    StageDirectory,
    CopyContent,
    Compress,
    Publish,
    CleanupStaging,
}

impl fmt::Display for ArtifactStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::StageDirectory => "stage-directory",
            Self::CopyContent => "copy-content",
            Self::Compress => "compress",
            Self::Publish => "publish",
            Self::CleanupStaging => "cleanup-staging",
        };
        f.write_str(name)
    }
}

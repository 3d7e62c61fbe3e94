//! marathon-group core library
//!
//! Assembles container definitions into Marathon service groups and rewrites
//! them for a shared cluster: VIP port mappings, edge load balancer labels,
//! and externalized bind volumes.

pub mod assembler;
pub mod config;
pub mod error;
pub mod externalizer;
pub mod observability;
pub mod paths;
pub mod publish;
pub mod storage;
pub mod transform;
pub mod types;

// Re-export commonly used items
pub use assembler::{read_container_list, GroupAssembler};
pub use config::{ArtifactVolumePolicy, Config, PublishMethod};
pub use error::{ArtifactStep, BackendError, BlockStep, GroupError, Result};
pub use externalizer::{
    ArtifactExternalizer, BlockVolumeExternalizer, ExternalizerSettings, VolumeRequest,
};
pub use observability::init as init_logging;
pub use publish::ArtifactPublisher;
pub use storage::{DevicePath, RexRayBackend, StorageBackend, VolumeHandle};
pub use transform::{ExternalizedVolume, GroupTransformer, Strategy, TransformOptions, Transformed};
pub use types::{App, ExternalVolumeRef, Group};

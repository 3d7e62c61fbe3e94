//! Group transformation.
//!
//! Rewrites an assembled group so it can run on a shared cluster:
//! - every app may schedule on any resource role
//! - static host ports become VIP-labelled container ports behind the edge
//!   load balancer
//! - local bind volumes are externalized, either as pre-populated block
//!   volumes or as downloadable artifacts
//!
//! All bind volumes are validated before the first one is externalized, so a
//! malformed entry never leaves half-provisioned storage behind.

use crate::config::ArtifactVolumePolicy;
use crate::error::{GroupError, Result};
use crate::externalizer::{ArtifactExternalizer, BlockVolumeExternalizer, VolumeRequest};
use crate::types::app::{labels_mut, HAPROXY_GROUP_EXTERNAL, HAPROXY_GROUP_LABEL, VIP_LABEL};
use crate::types::volume::{
    derive_volume_name, has_dot_segment, is_local_bind, sanitize_host_path, split_container_path,
    LOCAL_BIND_PREFIX,
};
use crate::types::{App, Group};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;
use tracing::{debug, info, instrument};

/// Resource role accepting offers from any role.
pub const ANY_ROLE: &str = "*";

/// Per-invocation options.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TransformOptions {
    /// Selects the artifact strategy when set, the block volume strategy
    /// otherwise.
    pub artifact_server_address: Option<String>,

    /// What happens to bind volumes shipped as artifacts.
    pub artifact_volume_policy: ArtifactVolumePolicy,
}

impl TransformOptions {
    /// Externalize bind volumes as block volumes.
    pub fn block() -> Self {
        Self::default()
    }

    /// Externalize bind volumes as artifacts served by `server`.
    pub fn artifact(server: impl Into<String>) -> Self {
        Self { artifact_server_address: Some(server.into()), ..Self::default() }
    }

    pub fn with_volume_policy(mut self, policy: ArtifactVolumePolicy) -> Self {
        self.artifact_volume_policy = policy;
        self
    }

    pub fn strategy(&self) -> Strategy {
        match self.artifact_server_address {
            Some(_) => Strategy::Artifact,
            None => Strategy::Block,
        }
    }
}

/// How a bind volume was externalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Block,
    Artifact,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Block => f.write_str("block"),
            Self::Artifact => f.write_str("artifact"),
        }
    }
}

/// One externalized bind volume.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalizedVolume {
    pub app_id: String,
    pub volume: String,
    pub strategy: Strategy,
    /// External volume name or artifact URI
    pub location: String,
}

/// Result of a transform run.
#[derive(Debug, Clone, PartialEq)]
pub struct Transformed {
    pub group: Group,
    pub report: Vec<ExternalizedVolume>,
}

/// A validated bind volume awaiting externalization.
#[derive(Debug, Clone)]
struct PlannedVolume {
    index: usize,
    request: VolumeRequest,
}

/// Applies the cluster rewrite rules to a group.
pub struct GroupTransformer {
    block: Option<BlockVolumeExternalizer>,
    artifact: Option<ArtifactExternalizer>,
    source_root: PathBuf,
}

impl GroupTransformer {
    /// Create a transformer resolving `./` host paths against `source_root`.
    pub fn new(source_root: impl Into<PathBuf>) -> Self {
        Self { block: None, artifact: None, source_root: source_root.into() }
    }

    pub fn with_block(mut self, externalizer: BlockVolumeExternalizer) -> Self {
        self.block = Some(externalizer);
        self
    }

    pub fn with_artifacts(mut self, externalizer: ArtifactExternalizer) -> Self {
        self.artifact = Some(externalizer);
        self
    }

    /// Transform every app of `group`, one app and one volume at a time.
    ///
    /// # Errors
    ///
    /// Returns `MalformedVolume` before any side effect if a bind volume
    /// lacks a usable `containerPath` or `hostPath`. Externalization errors
    /// are wrapped with the id of the failing app.
    #[instrument(
        skip(self, group, options),
        fields(group = %group.id, strategy = %options.strategy())
    )]
    pub async fn transform(
        &self,
        mut group: Group,
        options: &TransformOptions,
    ) -> Result<Transformed> {
        let plans = group
            .apps
            .iter()
            .map(|app| self.plan_volumes(&group.id, app))
            .collect::<Result<Vec<_>>>()?;

        let pending: usize = plans.iter().map(Vec::len).sum();
        if pending > 0 {
            self.check_strategy_available(options)?;
        }
        info!("Transforming {} app(s), {} bind volume(s)", group.apps.len(), pending);

        let mut report = Vec::with_capacity(pending);
        for (app, plan) in group.apps.iter_mut().zip(plans) {
            let app_id = app.id().to_string();

            app.set_accepted_resource_roles(&[ANY_ROLE]);
            let rewritten = rewrite_port_mappings(&group.id, app);
            if rewritten > 0 {
                app.set_label(HAPROXY_GROUP_LABEL, HAPROXY_GROUP_EXTERNAL);
                debug!("Rewrote {} port mapping(s) of {}", rewritten, app_id);
            }

            self.externalize_volumes(app, plan, options, &mut report)
                .await
                .map_err(|e| e.in_app(&app_id))?;
        }

        info!("Transformed group {}", group.id);
        Ok(Transformed { group, report })
    }

    /// Validate the bind volumes of one app and derive their requests.
    fn plan_volumes(&self, group_id: &str, app: &App) -> Result<Vec<PlannedVolume>> {
        let mut plan = Vec::new();
        for (index, volume) in app.volumes().iter().enumerate() {
            let Some(host_path) = volume.get("hostPath").and_then(Value::as_str) else {
                continue;
            };
            if !is_local_bind(host_path) {
                continue;
            }

            let malformed = |reason: &str| GroupError::MalformedVolume {
                app_id: app.id().to_string(),
                index,
                reason: reason.to_string(),
            };

            let container_path = match volume.get("containerPath") {
                Some(Value::String(path)) => path,
                Some(_) => return Err(malformed("containerPath must be a string")),
                None => return Err(malformed("bind volume is missing containerPath")),
            };
            if has_dot_segment(container_path) {
                return Err(malformed("containerPath must not contain . or .. segments"));
            }
            let (first_segment, remainder_path) = split_container_path(container_path);
            if first_segment.is_empty() {
                return Err(malformed("containerPath must name a directory below /"));
            }
            if sanitize_host_path(host_path).is_empty() {
                return Err(malformed("hostPath must name a path below ./"));
            }

            let relative = host_path.strip_prefix(LOCAL_BIND_PREFIX).unwrap_or(host_path);
            if has_dot_segment(relative) {
                return Err(malformed("hostPath must not contain . or .. segments below ./"));
            }
            plan.push(PlannedVolume {
                index,
                request: VolumeRequest {
                    name: derive_volume_name(group_id, app.id(), host_path),
                    source: self.source_root.join(relative),
                    first_segment,
                    remainder_path,
                },
            });
        }
        Ok(plan)
    }

    fn check_strategy_available(&self, options: &TransformOptions) -> Result<()> {
        let configured = match options.strategy() {
            Strategy::Block => self.block.is_some(),
            Strategy::Artifact => self.artifact.is_some(),
        };
        if configured {
            Ok(())
        } else {
            Err(not_configured(options.strategy()))
        }
    }

    async fn externalize_volumes(
        &self,
        app: &mut App,
        plan: Vec<PlannedVolume>,
        options: &TransformOptions,
        report: &mut Vec<ExternalizedVolume>,
    ) -> Result<()> {
        let app_id = app.id().to_string();
        let mut removed = Vec::new();

        for planned in plan {
            let request = &planned.request;
            let location = match &options.artifact_server_address {
                None => {
                    let block =
                        self.block.as_ref().ok_or_else(|| not_configured(Strategy::Block))?;
                    let external = block.externalize(request).await?;
                    let external_value = serde_json::to_value(&external).map_err(|e| {
                        GroupError::Other(anyhow::anyhow!("cannot encode external volume: {}", e))
                    })?;
                    if let Some(Value::Object(volume)) =
                        app.volumes_mut().and_then(|volumes| volumes.get_mut(planned.index))
                    {
                        rewrite_block_volume(volume, &request.first_segment, external_value);
                    }
                    external.name
                }
                Some(server) => {
                    let artifacts = self
                        .artifact
                        .as_ref()
                        .ok_or_else(|| not_configured(Strategy::Artifact))?;
                    let uri = artifacts.externalize(request, server).await?;
                    app.push_uri(uri.clone());
                    if options.artifact_volume_policy == ArtifactVolumePolicy::Remove {
                        removed.push(planned.index);
                    }
                    uri
                }
            };

            report.push(ExternalizedVolume {
                app_id: app_id.clone(),
                volume: request.name.clone(),
                strategy: options.strategy(),
                location,
            });
        }

        if let Some(volumes) = app.volumes_mut() {
            // Highest index first so earlier indices stay valid.
            for index in removed.into_iter().rev() {
                volumes.remove(index);
            }
        }
        Ok(())
    }
}

fn not_configured(strategy: Strategy) -> GroupError {
    GroupError::InvalidConfig { reason: format!("no {} externalizer configured", strategy) }
}

/// Turn static host ports into VIP-labelled container ports.
///
/// Returns the number of rewritten mappings. Mappings without a positive
/// integer `hostPort` are left alone.
pub fn rewrite_port_mappings(group_id: &str, app: &mut App) -> usize {
    let app_id = app.id().to_string();
    let mut rewritten = 0;

    for mapping in app.port_mappings_mut() {
        let Some(host_port) = mapping.get("hostPort").and_then(Value::as_u64).filter(|p| *p != 0)
        else {
            continue;
        };

        let vip = format!("/{}-{}:{}", group_id, app_id, host_port);
        labels_mut(mapping).insert(VIP_LABEL.to_string(), Value::String(vip));
        mapping.insert("containerPort".to_string(), Value::from(host_port));
        mapping.insert("hostPort".to_string(), Value::from(0));
        rewritten += 1;
    }

    rewritten
}

/// Point a bind volume entry at its external block volume.
fn rewrite_block_volume(volume: &mut Map<String, Value>, first_segment: &str, external: Value) {
    volume.remove("hostPath");
    volume.insert("containerPath".to_string(), Value::String(first_segment.to_string()));
    volume.insert("external".to_string(), external);
}

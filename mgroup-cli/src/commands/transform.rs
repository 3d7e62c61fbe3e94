//! `transform`: assemble, rewrite for the cluster and externalize bind volumes.

use super::{spinner, write_output};
use anyhow::{Context, Result};
use colored::Colorize;
use mgroup_core::publish;
use mgroup_core::{
    ArtifactExternalizer, ArtifactVolumePolicy, BlockVolumeExternalizer, Config,
    ExternalizedVolume, ExternalizerSettings, GroupAssembler, GroupTransformer, RexRayBackend,
    Strategy, TransformOptions,
};
use std::path::PathBuf;
use std::sync::Arc;
use tabled::{settings::Style, Table, Tabled};
use tracing::debug;

/// Arguments of the `transform` subcommand.
#[derive(Debug, Clone, Default)]
pub struct TransformArgs {
    pub input: PathBuf,
    pub name: String,
    pub artifact_server: Option<String>,
    pub output: Option<PathBuf>,
    pub remove_bind_volumes: bool,
    pub source_root: Option<PathBuf>,
    pub timeout: Option<u64>,
}

/// Run the full pipeline and write the transformed group.
pub async fn transform(args: TransformArgs, mut config: Config) -> Result<()> {
    apply_overrides(&mut config, &args);
    config.validate().context("Invalid configuration")?;

    let source_root = match &args.source_root {
        Some(root) => root.clone(),
        None => std::env::current_dir().context("Failed to determine current directory")?,
    };

    let group = GroupAssembler::assemble_file(&args.name, &args.input)
        .with_context(|| format!("Failed to assemble group from {}", args.input.display()))?;

    let options = TransformOptions {
        artifact_server_address: args.artifact_server.clone(),
        artifact_volume_policy: config.artifacts.volume_policy,
    };
    let transformer = build_transformer(&config, options.strategy(), source_root)?;
    debug!("Transforming with {} strategy", options.strategy());

    let progress = spinner(&format!("Transforming group {}...", group.id));
    let result = transformer.transform(group, &options).await;
    progress.finish_and_clear();
    let transformed = result.context("Failed to transform group")?;

    let json = transformed.group.to_json()?;
    write_output(args.output.as_deref(), &json)?;

    eprintln!(
        "{} Group {} transformed ({} app(s), {} volume(s) externalized)",
        "✓".green().bold(),
        transformed.group.id.bold(),
        transformed.group.apps.len(),
        transformed.report.len()
    );
    if !transformed.report.is_empty() {
        eprintln!("{}", report_table(&transformed.report));
    }

    Ok(())
}

/// Apply command-line overrides on top of the loaded configuration.
fn apply_overrides(config: &mut Config, args: &TransformArgs) {
    if let Some(secs) = args.timeout {
        config.operation_timeout_secs = secs;
    }
    if args.remove_bind_volumes {
        config.artifacts.volume_policy = ArtifactVolumePolicy::Remove;
    }
}

/// Wire up only the externalizer the chosen strategy needs.
fn build_transformer(
    config: &Config,
    strategy: Strategy,
    source_root: PathBuf,
) -> Result<GroupTransformer> {
    let settings = ExternalizerSettings::from_config(config);
    let transformer = GroupTransformer::new(source_root);

    Ok(match strategy {
        Strategy::Block => {
            let backend = Arc::new(RexRayBackend::new(&config.storage));
            transformer.with_block(BlockVolumeExternalizer::new(backend, settings))
        }
        Strategy::Artifact => {
            let publisher = publish::from_config(&config.artifacts.publish)
                .context("Failed to set up artifact publisher")?;
            transformer.with_artifacts(ArtifactExternalizer::new(publisher, settings))
        }
    })
}

#[derive(Tabled)]
struct VolumeRow {
    #[tabled(rename = "APP")]
    app: String,
    #[tabled(rename = "VOLUME")]
    volume: String,
    #[tabled(rename = "STRATEGY")]
    strategy: String,
    #[tabled(rename = "LOCATION")]
    location: String,
}

fn report_table(report: &[ExternalizedVolume]) -> String {
    let rows: Vec<VolumeRow> = report
        .iter()
        .map(|v| VolumeRow {
            app: v.app_id.clone(),
            volume: v.volume.clone(),
            strategy: v.strategy.to_string(),
            location: v.location.clone(),
        })
        .collect();

    let mut table = Table::new(rows);
    table.with(Style::rounded());
    table.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_apply_overrides() {
        let mut config = Config::default();
        let args = TransformArgs {
            timeout: Some(30),
            remove_bind_volumes: true,
            ..TransformArgs::default()
        };

        apply_overrides(&mut config, &args);

        assert_eq!(config.operation_timeout_secs, 30);
        assert_eq!(config.artifacts.volume_policy, ArtifactVolumePolicy::Remove);
    }

    #[test]
    fn test_no_overrides_keeps_config() {
        let mut config = Config::default();
        apply_overrides(&mut config, &TransformArgs::default());
        assert_eq!(config.operation_timeout_secs, Config::default().operation_timeout_secs);
        assert_eq!(config.artifacts.volume_policy, ArtifactVolumePolicy::Keep);
    }

    #[test]
    fn test_report_table_lists_volumes() {
        let table = report_table(&[ExternalizedVolume {
            app_id: "web".to_string(),
            volume: "g1-web-app".to_string(),
            strategy: Strategy::Artifact,
            location: "http://10.0.0.1/g1-web-app.tgz".to_string(),
        }]);
        assert!(table.contains("APP"));
        assert!(table.contains("g1-web-app"));
        assert!(table.contains("artifact"));
    }

    #[tokio::test]
    async fn test_transform_without_bind_volumes() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("containers.json");
        std::fs::write(
            &input,
            r#"[{"id": "web", "container": {"docker": {"portMappings": [{"hostPort": 8080}]}}}]"#,
        )
        .unwrap();
        let output = dir.path().join("group.json");

        let args = TransformArgs {
            input,
            name: "g1".to_string(),
            output: Some(output.clone()),
            source_root: Some(dir.path().to_path_buf()),
            ..TransformArgs::default()
        };
        transform(args, Config::default()).await.unwrap();

        let written: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written["id"], "g1");
        assert_eq!(
            written["apps"][0]["container"]["docker"]["portMappings"][0]["labels"]["VIP_0"],
            "/g1-web:8080"
        );
    }

    #[tokio::test]
    async fn test_transform_rejects_zero_timeout() {
        let args = TransformArgs { timeout: Some(0), ..TransformArgs::default() };
        assert!(transform(args, Config::default()).await.is_err());
    }
}

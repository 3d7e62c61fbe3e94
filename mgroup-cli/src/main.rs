use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(name = "marathon-group")]
#[command(about = "Turn container lists into Marathon service groups", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file (defaults to $MGROUP_CONFIG, then the user config dir)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level used when RUST_LOG is not set
    #[arg(long, global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Wrap a container list into a service group without rewriting it
    Group {
        /// Container list (one app object or an array of apps)
        #[arg(short, long)]
        input: PathBuf,

        /// Group name
        #[arg(short, long)]
        name: String,

        /// Output file ("-" or omitted for stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Assemble a group and rewrite it for the cluster
    Transform {
        /// Container list (one app object or an array of apps)
        #[arg(short, long)]
        input: PathBuf,

        /// Group name
        #[arg(short, long)]
        name: String,

        /// Ship bind volumes as artifacts served from this address
        /// instead of provisioning block volumes
        #[arg(short, long)]
        artifact_server: Option<String>,

        /// Output file ("-" or omitted for stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Drop bind volumes once their content ships as an artifact
        #[arg(long)]
        remove_bind_volumes: bool,

        /// Directory "./" host paths are resolved against (default: cwd)
        #[arg(long)]
        source_root: Option<PathBuf>,

        /// Timeout in seconds for each storage or publish operation
        #[arg(long)]
        timeout: Option<u64>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() {
    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        eprintln!("{} {:#}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    let config = commands::load_config(cli.config.as_deref())?;
    let level = cli.log_level.as_deref().unwrap_or(&config.log_level);
    mgroup_core::init_logging(level)
        .map_err(|e| anyhow::anyhow!("{}", e))
        .context("Failed to initialize logging")?;

    match cli.command {
        Commands::Group { input, name, output } => {
            commands::group::group(&input, &name, output.as_deref())?;
        }
        Commands::Transform {
            input,
            name,
            artifact_server,
            output,
            remove_bind_volumes,
            source_root,
            timeout,
        } => {
            let args = commands::transform::TransformArgs {
                input,
                name,
                artifact_server,
                output,
                remove_bind_volumes,
                source_root,
                timeout,
            };
            commands::transform::transform(args, config).await?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_transform_flags() {
        let cli = Cli::parse_from([
            "marathon-group",
            "transform",
            "-i",
            "containers.json",
            "-n",
            "g1",
            "-a",
            "10.0.0.1",
            "--remove-bind-volumes",
            "--timeout",
            "60",
        ]);
        match cli.command {
            Commands::Transform { name, artifact_server, remove_bind_volumes, timeout, .. } => {
                assert_eq!(name, "g1");
                assert_eq!(artifact_server.as_deref(), Some("10.0.0.1"));
                assert!(remove_bind_volumes);
                assert_eq!(timeout, Some(60));
            }
            Commands::Group { .. } => panic!("expected transform"),
        }
    }

    #[test]
    fn test_group_requires_name() {
        let parsed = Cli::try_parse_from(["marathon-group", "group", "-i", "containers.json"]);
        assert!(parsed.is_err());
    }
}

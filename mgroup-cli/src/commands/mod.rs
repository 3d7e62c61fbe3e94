//! CLI command implementations

pub mod group;
pub mod transform;

use anyhow::{Context, Result};
use indicatif::{ProgressBar, ProgressStyle};
use mgroup_core::Config;
use std::io::Write;
use std::path::Path;
use std::time::Duration;

/// Load configuration from `path`, or from the default location.
pub fn load_config(path: Option<&Path>) -> Result<Config> {
    let config = match path {
        Some(path) => Config::load_from(path),
        None => Config::load(),
    };
    config.context("Failed to load configuration")
}

/// Whether an output argument means stdout.
fn is_stdout(output: Option<&Path>) -> bool {
    output.map_or(true, |p| p == Path::new("-"))
}

/// Write the result document.
///
/// Files are written to a temporary sibling and renamed into place, so a
/// reader never sees a partial document.
pub fn write_output(output: Option<&Path>, content: &str) -> Result<()> {
    let path = match output {
        Some(path) if !is_stdout(output) => path,
        _ => {
            let mut stdout = std::io::stdout().lock();
            writeln!(stdout, "{}", content).context("Failed to write to stdout")?;
            return stdout.flush().context("Failed to write to stdout");
        }
    };

    let dir = path.parent().filter(|d| !d.as_os_str().is_empty()).unwrap_or(Path::new("."));
    let mut file = tempfile::NamedTempFile::new_in(dir)
        .with_context(|| format!("Failed to create temporary file in {}", dir.display()))?;
    writeln!(file, "{}", content)
        .and_then(|_| file.as_file().sync_all())
        .with_context(|| format!("Failed to write {}", path.display()))?;
    file.persist(path)
        .map_err(|e| e.error)
        .with_context(|| format!("Failed to move output into place at {}", path.display()))?;
    Ok(())
}

/// Spinner on stderr for long-running steps.
pub fn spinner(message: &str) -> ProgressBar {
    let spinner = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
        .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
    spinner.set_style(style);
    spinner.set_message(message.to_string());
    spinner.enable_steady_tick(Duration::from_millis(100));
    spinner
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_is_stdout() {
        assert!(is_stdout(None));
        assert!(is_stdout(Some(Path::new("-"))));
        assert!(!is_stdout(Some(Path::new("group.json"))));
    }

    #[test]
    fn test_write_output_replaces_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("group.json");
        std::fs::write(&path, "stale").unwrap();

        write_output(Some(&path), "{\"id\": \"g1\"}").unwrap();

        assert_eq!(std::fs::read_to_string(&path).unwrap(), "{\"id\": \"g1\"}\n");
        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_write_output_missing_dir_fails() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("missing/group.json");
        assert!(write_output(Some(&path), "{}").is_err());
        assert!(!path.exists());
    }

    #[test]
    fn test_load_config_from_file() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"operation_timeout_secs": 42}"#).unwrap();

        let config = load_config(Some(&path)).unwrap();
        assert_eq!(config.operation_timeout_secs, 42);
    }
}

//! Centralized path configuration for marathon-group.

use std::path::PathBuf;

/// Environment variable naming an explicit configuration file.
pub const CONFIG_ENV: &str = "MGROUP_CONFIG";

/// Get the configuration directory.
///
/// Uses the platform config directory (e.g. `~/.config/marathon-group`),
/// falling back to the system temp directory when there is no home.
pub fn config_dir() -> PathBuf {
    dirs::config_dir().unwrap_or_else(std::env::temp_dir).join("marathon-group")
}

/// Get the configuration file path.
///
/// Resolution order:
/// 1. `MGROUP_CONFIG` environment variable
/// 2. `<config_dir>/config.json`
pub fn config_path() -> PathBuf {
    if let Ok(path) = std::env::var(CONFIG_ENV) {
        return PathBuf::from(path);
    }
    config_dir().join("config.json")
}

/// Scratch root for everything this tool creates on the local host.
pub fn work_dir() -> PathBuf {
    std::env::temp_dir().join("marathon-group")
}

/// Default root under which block devices are mounted while being populated.
pub fn mount_root() -> PathBuf {
    work_dir().join("mnt")
}

/// Default root for artifact staging directories.
pub fn staging_root() -> PathBuf {
    work_dir().join("staging")
}

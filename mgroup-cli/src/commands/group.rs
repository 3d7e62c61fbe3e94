//! `group`: assemble only.

use super::write_output;
use anyhow::{Context, Result};
use colored::Colorize;
use mgroup_core::GroupAssembler;
use std::path::Path;

/// Wrap a container list into a named group and write it out unchanged.
pub fn group(input: &Path, name: &str, output: Option<&Path>) -> Result<()> {
    let group = GroupAssembler::assemble_file(name, input)
        .with_context(|| format!("Failed to assemble group from {}", input.display()))?;

    let json = group.to_json()?;
    write_output(output, &json)?;

    eprintln!(
        "{} Group {} assembled with {} app(s)",
        "✓".green().bold(),
        group.id.bold(),
        group.apps.len()
    );
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use mgroup_core::Group;
    use tempfile::TempDir;

    #[test]
    fn test_group_wraps_single_app() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("containers.json");
        std::fs::write(&input, "{\"id\": \"web\",\n  \"cpus\": 0.5}\n").unwrap();
        let output = dir.path().join("group.json");

        group(&input, "g1", Some(&output)).unwrap();

        let written = Group::from_json(&std::fs::read_to_string(&output).unwrap()).unwrap();
        assert_eq!(written.id, "g1");
        assert_eq!(written.apps.len(), 1);
        assert_eq!(written.apps[0].id(), "web");
        assert!(written.apps[0].as_map().get("acceptedResourceRoles").is_none());
    }

    #[test]
    fn test_group_bad_input_writes_nothing() {
        let dir = TempDir::new().unwrap();
        let input = dir.path().join("containers.json");
        std::fs::write(&input, "not json").unwrap();
        let output = dir.path().join("group.json");

        assert!(group(&input, "g1", Some(&output)).is_err());
        assert!(!output.exists());
    }
}
